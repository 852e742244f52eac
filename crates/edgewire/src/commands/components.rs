//! Component listing and detail views, answered from the cached config.

use std::collections::HashMap;

use serde::Serialize;
use tabled::Tabled;

use edgewire_core::{Component, Edge, EdgeConfig};

use crate::cli::{ComponentArgs, ComponentsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentEntry<'a> {
    category: &'static str,
    id: &'a str,
    alias: &'a str,
    factory_id: &'a str,
    enabled: bool,
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "Factory")]
    factory: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl From<&ComponentEntry<'_>> for ComponentRow {
    fn from(e: &ComponentEntry<'_>) -> Self {
        Self {
            category: e.category.into(),
            id: e.id.into(),
            alias: if e.alias == e.id { String::new() } else { e.alias.into() },
            factory: e.factory_id.into(),
            enabled: if e.enabled { "yes" } else { "no" }.into(),
        }
    }
}

fn entry<'a>(category: &'static str, c: &'a Component) -> ComponentEntry<'a> {
    ComponentEntry {
        category,
        id: &c.id,
        alias: c.display_name(),
        factory_id: &c.factory_id,
        enabled: c.is_enabled,
    }
}

/// Resolve a nature given by full id or by its last segment.
fn resolve_nature<'a>(config: &'a EdgeConfig, wanted: &str) -> Result<&'a str, CliError> {
    config
        .natures()
        .values()
        .find(|n| n.id == wanted || n.name == wanted)
        .map(|n| n.id.as_str())
        .ok_or_else(|| CliError::NotFound {
            resource_type: "Nature".into(),
            identifier: wanted.into(),
            list_command: "factories".into(),
        })
}

fn list_entries<'a>(
    config: &'a EdgeConfig,
    args: &ComponentsArgs,
) -> Result<Vec<ComponentEntry<'a>>, CliError> {
    let ignore: Vec<&str> = args.ignore.iter().map(String::as_str).collect();
    let categorized = config.list_active_components(&ignore);

    let Some(nature) = &args.nature else {
        return Ok(categorized
            .iter()
            .flat_map(|group| {
                group
                    .components
                    .iter()
                    .map(move |c| entry(group.category.title, *c))
            })
            .collect());
    };

    let nature_id = resolve_nature(config, nature)?;
    let category_of: HashMap<&str, &'static str> = categorized
        .iter()
        .flat_map(|group| {
            group
                .components
                .iter()
                .map(move |c| (c.id.as_str(), group.category.title))
        })
        .collect();

    Ok(config
        .components_implementing_nature(nature_id)
        .into_iter()
        .filter(|c| !ignore.contains(&c.id.as_str()))
        .map(|c| entry(category_of.get(c.id.as_str()).copied().unwrap_or("-"), c))
        .collect())
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(edge: &Edge, args: &ComponentsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = edge.valid_config().await?;
    let entries = list_entries(&config, args)?;

    let out = output::render_list(
        &global.output,
        &entries,
        |e| ComponentRow::from(e),
        |e| e.id.to_owned(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(config: &EdgeConfig, c: &Component) -> String {
    let mut lines = vec![
        format!("ID:       {}", c.id),
        format!("Alias:    {}", c.display_name()),
        format!(
            "Factory:  {}",
            if c.is_singleton() { "-" } else { c.factory_id.as_str() }
        ),
        format!("Enabled:  {}", c.is_enabled),
    ];
    let natures = config.nature_ids_by_component_id(&c.id);
    if !natures.is_empty() {
        lines.push("Natures:".into());
        lines.extend(natures.iter().map(|n| format!("  {n}")));
    }
    if !c.properties.is_empty() {
        lines.push("Properties:".into());
        let width = c.properties.keys().map(String::len).max().unwrap_or(0);
        lines.extend(
            c.properties
                .iter()
                .map(|(k, v)| format!("  {k:<width$} = {v}")),
        );
    }
    lines.join("\n")
}

pub async fn show(edge: &Edge, args: &ComponentArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = edge.valid_config().await?;
    let component = config
        .component(&args.id)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "Component".into(),
            identifier: args.id.clone(),
            list_command: "components".into(),
        })?;

    let out = output::render_single(
        &global.output,
        component,
        |c| detail(&config, c),
        |c| c.id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
