//! Channel metadata and live telemetry.

use serde_json::Value;
use tabled::Tabled;

use edgewire_core::{ChannelAddress, ChannelInfo, CurrentData, Edge};

use crate::cli::{ChannelsArgs, ChannelsCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "Channel")]
    id: String,
    #[tabled(rename = "Type")]
    channel_type: String,
    #[tabled(rename = "Access")]
    access: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Text")]
    text: String,
}

impl From<&ChannelInfo> for ChannelRow {
    fn from(c: &ChannelInfo) -> Self {
        Self {
            id: c.id.clone(),
            channel_type: c.channel.channel_type.to_string(),
            access: c.channel.access_mode.to_string(),
            unit: c.channel.unit.clone(),
            level: c.channel.level.to_string(),
            text: c.channel.text.clone(),
        }
    }
}

/// One line of `channels watch` output.
#[derive(Debug)]
struct Sample {
    time: String,
    values: Vec<(String, Option<Value>)>,
}

fn sample(data: &CurrentData, addresses: &[ChannelAddress], time: String) -> Sample {
    Sample {
        time,
        values: addresses
            .iter()
            .map(|addr| (addr.to_string(), data.get(addr).cloned()))
            .collect(),
    }
}

fn render_sample(format: &OutputFormat, s: &Sample, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let values: serde_json::Map<String, Value> = s
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().unwrap_or(Value::Null)))
                .collect();
            serde_json::json!({"time": s.time, "values": values}).to_string()
        }
        _ => {
            let values: Vec<String> = s
                .values
                .iter()
                .map(|(k, v)| {
                    let v = v.as_ref().map_or_else(|| "-".to_owned(), Value::to_string);
                    format!("{}={v}", output::dim(k, color))
                })
                .collect();
            format!("{}  {}", s.time, values.join("  "))
        }
    }
}

fn parse_addresses(raw: &[String]) -> Result<Vec<ChannelAddress>, CliError> {
    raw.iter()
        .map(|s| {
            s.parse::<ChannelAddress>()
                .map_err(|e| CliError::Validation {
                    field: "channel".into(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(edge: &Edge, args: ChannelsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ChannelsCommand::List { component } => {
            let channels = edge.channels(&component).await?;
            let out = output::render_list(
                &global.output,
                &channels,
                |c| ChannelRow::from(c),
                |c| format!("{component}/{}", c.id),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        ChannelsCommand::Watch { channels, count } => watch(edge, &channels, count, global).await,
    }
}

async fn watch(
    edge: &Edge,
    raw: &[String],
    count: Option<usize>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let addresses = parse_addresses(raw)?;
    let subscriber = format!("edgewire-cli-{}", std::process::id());
    let color = output::should_color(&global.color);

    let mut stream = edge.current_data();
    edge.subscribe_channels(subscriber.clone(), addresses.clone());
    tracing::info!(channels = addresses.len(), "watching channels");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0usize;
    loop {
        tokio::select! {
            data = stream.changed() => {
                let Some(data) = data else { break };
                let time = chrono::Local::now().format("%H:%M:%S").to_string();
                let line = render_sample(&global.output, &sample(&data, &addresses, time), color);
                output::print_output(&line, global.quiet);
                printed += 1;
                if count.is_some_and(|n| printed >= n) {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    edge.unsubscribe(&subscriber);
    Ok(())
}
