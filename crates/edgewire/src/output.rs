//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use edgewire_core::LogLevel;

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Fixed-width level tag, colored by severity when `color` is set.
pub fn level_tag(level: LogLevel, color: bool) -> String {
    let tag = format!("{:<5}", level.to_string());
    if !color {
        return tag;
    }
    match level {
        LogLevel::Error => tag.red().bold().to_string(),
        LogLevel::Warn => tag.yellow().to_string(),
        LogLevel::Info => tag.green().to_string(),
        LogLevel::Debug | LogLevel::Trace => tag.dimmed().to_string(),
    }
}

pub fn dim(text: &str, color: bool) -> String {
    if color {
        text.dimmed().to_string()
    } else {
        text.to_owned()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list in the chosen format. `to_row` builds the table row,
/// `id_fn` the line emitted in plain mode.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Plain => data.iter().map(id_fn).collect::<Vec<_>>().join("\n"),
        structured => render_structured(structured, data),
    }
}

/// Render one item. Table mode uses the pre-formatted `detail_fn`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Plain => id_fn(data),
        structured => render_structured(structured, data),
    }
}

/// Print rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_structured<T: serde::Serialize + ?Sized>(format: &OutputFormat, data: &T) -> String {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
    };
    rendered.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize output");
        String::new()
    })
}
