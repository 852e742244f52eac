mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::io::IsTerminal;
use std::time::Duration;

use clap::Parser;
use indicatif::ProgressBar;
use tracing_subscriber::EnvFilter;

use edgewire_core::Session;

use crate::cli::{ChannelsCommand, Cli, Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;

            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "edgewire", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let file = edgewire_config::load_config()?;
            let target = config::resolve_target(&cli.global, &file)?;
            let session = connect(&target, &cli.global).await?;
            let edge = session.edge(&target.edge_id);

            tracing::debug!(command = ?cmd, edge = %edge.id(), "dispatching command");
            let result = match command_deadline(&cmd, &target) {
                Some(limit) => tokio::time::timeout(limit, commands::dispatch(cmd, &edge, &cli.global))
                    .await
                    .unwrap_or_else(|_| {
                        Err(CliError::Timeout {
                            method: "command".into(),
                            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        })
                    }),
                None => commands::dispatch(cmd, &edge, &cli.global).await,
            };

            session.shutdown();
            result
        }
    }
}

/// Streaming commands run until interrupted; everything else is bounded.
fn command_deadline(cmd: &Command, target: &Target) -> Option<Duration> {
    match cmd {
        Command::Log(_)
        | Command::Channels(cli::ChannelsArgs {
            command: ChannelsCommand::Watch { .. },
        }) => None,
        _ => target.session.timing.request_timeout,
    }
}

async fn connect(target: &Target, global: &GlobalOpts) -> Result<Session, CliError> {
    let spinner = if global.quiet || !std::io::stderr().is_terminal() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_message(format!(
        "Connecting to {} ({})",
        target.session.url, target.profile_name
    ));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let session = Session::connect(target.session.clone()).await;
    spinner.finish_and_clear();
    Ok(session?)
}
