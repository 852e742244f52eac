//! Command dispatch: bridges CLI args -> Edge calls -> output formatting.

pub mod channels;
pub mod components;
pub mod config_cmd;
pub mod factories;
pub mod log;
pub mod set;

use edgewire_core::Edge;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an Edge-bound command to its handler.
pub async fn dispatch(cmd: Command, edge: &Edge, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Components(args) => components::list(edge, &args, global).await,
        Command::Component(args) => components::show(edge, &args, global).await,
        Command::Factories(args) => factories::handle(edge, args, global).await,
        Command::Channels(args) => channels::handle(edge, args, global).await,
        Command::Log(args) => log::handle(edge, args, global).await,
        Command::Set(args) => set::handle(edge, args, global).await,
        // Config and Completions are handled before connecting
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
