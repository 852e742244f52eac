//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text, and each error onto a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use edgewire_config::ConfigError;
use edgewire_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(edgewire::connection_failed),
        help(
            "{reason}\n\
             Check that the Edge is reachable and the URL points at its websocket.\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Connection lost before the Edge answered")]
    #[diagnostic(code(edgewire::connection_lost), help("Run the command again."))]
    ConnectionLost,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(edgewire::auth_failed),
        help("Store the right password with: edgewire config set-password")
    )]
    AuthFailed { message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(edgewire::no_credentials),
        help(
            "Store one with: edgewire config set-password --profile {profile}\n\
             Or set the EDGEWIRE_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Edge responses ───────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(edgewire::not_found),
        help("Run: edgewire {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Edge rejected the request ({code}): {message}")]
    #[diagnostic(code(edgewire::rejected))]
    Rejected { code: i64, message: String },

    #[error("Request '{method}' timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(edgewire::timeout),
        help("Increase the timeout with --timeout or check the Edge's load.")
    )]
    Timeout { method: String, timeout_ms: u64 },

    #[error("{message}")]
    #[diagnostic(code(edgewire::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(edgewire::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(edgewire::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: edgewire config add <name> <url>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No edge configured")]
    #[diagnostic(
        code(edgewire::no_config),
        help(
            "Pass --url, or create a profile with: edgewire config add <name> <url>\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(edgewire::config))]
    Config(Box<ConfigError>),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionLost => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::ConnectionLost => Self::ConnectionLost,
            CoreError::Timeout { method, timeout_ms } => Self::Timeout { method, timeout_ms },
            CoreError::Remote { code, message, .. } => Self::Rejected { code, message },
            CoreError::ComponentNotFound { id } => Self::NotFound {
                resource_type: "Component".into(),
                identifier: id,
                list_command: "components".into(),
            },
            CoreError::FactoryNotFound { id } => Self::NotFound {
                resource_type: "Factory".into(),
                identifier: id,
                list_command: "factories".into(),
            },
            CoreError::ChannelNotFound { address } => {
                let component = address.split('/').next().unwrap_or_default().to_owned();
                Self::NotFound {
                    resource_type: "Channel".into(),
                    identifier: address,
                    list_command: format!("channels list {component}"),
                }
            }
            CoreError::EdgeNotFound { id } => Self::NotFound {
                resource_type: "Edge".into(),
                identifier: id,
                list_command: "config show".into(),
            },
            other => Self::Protocol {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: "see: edgewire config profiles".into(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}
