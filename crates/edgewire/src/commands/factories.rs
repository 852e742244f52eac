//! Factory listing and per-factory property schema.

use serde::Serialize;
use tabled::Tabled;

use edgewire_core::{Edge, EdgeConfig, FactoryProperty};

use crate::cli::{FactoriesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FactoryEntry<'a> {
    category: &'static str,
    id: &'a str,
    name: &'a str,
    components: &'a [String],
}

#[derive(Tabled)]
struct FactoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Factory")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Components")]
    components: String,
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    property_type: String,
    #[tabled(rename = "Required")]
    required: String,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<&FactoryEntry<'_>> for FactoryRow {
    fn from(e: &FactoryEntry<'_>) -> Self {
        Self {
            category: e.category.into(),
            id: e.id.into(),
            name: e.name.into(),
            components: e.components.join(", "),
        }
    }
}

impl From<&FactoryProperty> for PropertyRow {
    fn from(p: &FactoryProperty) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            property_type: p.property_type.clone(),
            required: if p.is_required { "yes" } else { "" }.into(),
            default: if p.is_password || p.default_value.is_null() {
                String::new()
            } else {
                p.default_value.to_string()
            },
        }
    }
}

fn entries(config: &EdgeConfig) -> Vec<FactoryEntry<'_>> {
    config
        .list_available_factories()
        .into_iter()
        .flat_map(|group| {
            group.factories.into_iter().map(move |f| FactoryEntry {
                category: group.category.title,
                id: &f.id,
                name: &f.name,
                components: &f.component_ids,
            })
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(edge: &Edge, args: FactoriesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let Some(factory_id) = args.id else {
        let config = edge.valid_config().await?;
        let list = entries(&config);
        let out = output::render_list(
            &global.output,
            &list,
            |e| FactoryRow::from(e),
            |e| e.id.to_owned(),
        );
        output::print_output(&out, global.quiet);
        return Ok(());
    };

    let (factory, properties) = edge.factory_properties(&factory_id).await?;
    tracing::debug!(factory = %factory.id, properties = properties.len(), "loaded factory schema");

    let out = output::render_list(
        &global.output,
        &properties,
        |p| PropertyRow::from(p),
        |p| p.id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
