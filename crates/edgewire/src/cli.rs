//! Clap derive structures for the `edgewire` CLI.
//!
//! Also compiled by `build.rs` for man pages, so nothing here may depend
//! on crates outside clap and clap_complete.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// edgewire -- talk to an OpenEMS-style Edge from the command line
#[derive(Debug, Parser)]
#[command(
    name = "edgewire",
    version,
    about = "Inspect and configure energy Edges over JSON-RPC/WebSocket",
    long_about = "Connects to an Edge (directly or through a backend) over its\n\
        JSON-RPC WebSocket, browses the component configuration, streams\n\
        live channel values and the system log, and updates properties.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "EDGEWIRE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// WebSocket URL (overrides profile), e.g. ws://192.168.1.10:8085/websocket
    #[arg(long, short = 'u', env = "EDGEWIRE_URL", global = true)]
    pub url: Option<String>,

    /// Edge id behind the endpoint (overrides profile)
    #[arg(long, short = 'e', env = "EDGEWIRE_EDGE", global = true)]
    pub edge: Option<String>,

    /// Login name (overrides profile)
    #[arg(long, env = "EDGEWIRE_USERNAME", global = true, hide_env = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "EDGEWIRE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "EDGEWIRE_INSECURE", global = true)]
    pub insecure: bool,

    /// Connect and request timeout in seconds (overrides profile)
    #[arg(long, env = "EDGEWIRE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured components, grouped by category
    #[command(alias = "comp")]
    Components(ComponentsArgs),

    /// Show one component with its properties
    Component(ComponentArgs),

    /// List installable factories, grouped by category
    Factories(FactoriesArgs),

    /// Inspect channel metadata or stream live values
    #[command(alias = "ch")]
    Channels(ChannelsArgs),

    /// Stream the Edge's system log
    Log(LogArgs),

    /// Update one property of a component
    Set(SetArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Components ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ComponentsArgs {
    /// Leave these component ids out of the listing
    #[arg(long, short = 'x', value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Only components implementing this nature (full id or last segment)
    #[arg(long, short = 'n')]
    pub nature: Option<String>,
}

#[derive(Debug, Args)]
pub struct ComponentArgs {
    /// Component id, e.g. ess0
    pub id: String,
}

// ── Factories ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FactoriesArgs {
    /// Show the property schema of one factory instead of the listing
    pub id: Option<String>,
}

// ── Channels ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ChannelsArgs {
    #[command(subcommand)]
    pub command: ChannelsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ChannelsCommand {
    /// List channel metadata of a component
    #[command(alias = "ls")]
    List {
        /// Component id
        component: String,
    },

    /// Subscribe to channels and print values as they arrive
    Watch {
        /// Channel addresses, e.g. _sum/EssSoc _sum/GridActivePower
        #[arg(required = true)]
        channels: Vec<String>,

        /// Stop after this many updates
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },
}

// ── Log ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Stop after this many lines
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Only lines at this level or more severe
    #[arg(long, short = 'l', value_enum)]
    pub level: Option<LogLevelFilter>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevelFilter {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// ── Set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Component id
    pub component: String,

    /// Property name, e.g. enabled
    pub property: String,

    /// New value; parsed as JSON, falling back to a plain string
    pub value: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the current configuration
    Show,

    /// Add or replace a profile
    Add {
        /// Profile name
        name: String,
        /// WebSocket URL
        url: String,
        /// Edge id behind the endpoint
        #[arg(long, default_value = "0")]
        edge: String,
        /// Login name
        #[arg(long)]
        username: Option<String>,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
