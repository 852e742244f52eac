//! `edgewire log`: tail the Edge's system log until interrupted.

use tokio::sync::broadcast::error::RecvError;

use edgewire_core::{Edge, LogLevel, SystemLog};

use crate::cli::{GlobalOpts, LogArgs, LogLevelFilter, OutputFormat};
use crate::error::CliError;
use crate::output;

fn severity(level: LogLevel) -> u8 {
    match level {
        LogLevel::Error => 0,
        LogLevel::Warn => 1,
        LogLevel::Info => 2,
        LogLevel::Debug => 3,
        LogLevel::Trace => 4,
    }
}

impl From<LogLevelFilter> for LogLevel {
    fn from(filter: LogLevelFilter) -> Self {
        match filter {
            LogLevelFilter::Error => Self::Error,
            LogLevelFilter::Warn => Self::Warn,
            LogLevelFilter::Info => Self::Info,
            LogLevelFilter::Debug => Self::Debug,
            LogLevelFilter::Trace => Self::Trace,
        }
    }
}

fn passes(line: &SystemLog, min: Option<LogLevel>) -> bool {
    min.is_none_or(|min| severity(line.level) <= severity(min))
}

fn render_line(format: &OutputFormat, line: &SystemLog, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::to_string(line).unwrap_or_default()
        }
        _ => {
            let time = line.timestamp().map_or_else(
                || line.time.clone(),
                |t| {
                    t.with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S%.3f")
                        .to_string()
                },
            );
            format!(
                "{} {} {} {}",
                output::dim(&time, color),
                output::level_tag(line.level, color),
                output::dim(&format!("[{}]", line.source), color),
                line.message
            )
        }
    }
}

pub async fn handle(edge: &Edge, args: LogArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let min = args.level.map(LogLevel::from);
    let color = output::should_color(&global.color);

    // Receiver first so no line between subscribe and listen is lost.
    let mut lines = edge.system_log_events();
    edge.subscribe_system_log().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0usize;
    loop {
        tokio::select! {
            received = lines.recv() => match received {
                Ok(line) => {
                    if !passes(&line, min) {
                        continue;
                    }
                    output::print_output(&render_line(&global.output, &line, color), global.quiet);
                    printed += 1;
                    if args.count.is_some_and(|n| printed >= n) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "log output fell behind, lines dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => break,
        }
    }

    if let Err(e) = edge.unsubscribe_system_log().await {
        tracing::debug!(error = %e, "unsubscribe from system log failed");
    }
    Ok(())
}
