//! Persistent configuration for edgewire.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `edgewire_core::SessionConfig`. The CLI layers its
//! own flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgewire_core::{AuthCredentials, SessionConfig, TlsVerification};

const KEYRING_SERVICE: &str = "edgewire";
const ENV_PREFIX: &str = "EDGEWIRE_";
const PASSWORD_ENV: &str = "EDGEWIRE_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named edge profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// The profile named `name`, or the default profile.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Connect and request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named edge profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// WebSocket endpoint (e.g., "ws://192.168.1.10:8085/websocket").
    pub url: String,

    /// Edge id inside the endpoint. A directly reached Edge is "0".
    #[serde(default = "default_edge_id")]
    pub edge_id: String,

    /// Username, for backends that need one.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            edge_id: default_edge_id(),
            username: None,
            password: None,
            password_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_edge_id() -> String {
    "0".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "edgewire", "edgewire").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("edgewire");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Nested keys are separated by a double underscore:
/// `EDGEWIRE_PROFILES__HOME__URL=ws://...`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

/// Store `password` for `profile_name` in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

/// Resolve the password: profile's `password_env`, then `EDGEWIRE_PASSWORD`,
/// then the system keyring, then plaintext in the config.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(pw));
    }

    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Some(SecretString::from(pw));
        }
    }

    profile.password.clone().map(SecretString::from)
}

/// Credentials for `profile`. A profile without any password connects
/// unauthenticated, unless it names a username.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match (resolve_password(profile, profile_name), &profile.username) {
        (Some(password), username) => Ok(AuthCredentials::Password {
            username: username.clone(),
            password,
        }),
        (None, Some(_)) => Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        }),
        (None, None) => Ok(AuthCredentials::None),
    }
}

/// TLS handling for a profile. Plain `ws://` never uses it.
pub fn resolve_tls(profile: &Profile, defaults: &Defaults) -> TlsVerification {
    if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Build a `SessionConfig` from a profile, without CLI flag overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected a ws:// or wss:// URL, got {}", profile.url),
        });
    }

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    let mut config = SessionConfig::new(url);
    config.auth = resolve_auth(profile, profile_name)?;
    config.tls = resolve_tls(profile, defaults);
    config.connect_timeout = timeout;
    config.timing.request_timeout = Some(timeout);
    Ok(config)
}

// ── Tests ───────────────────────────────────────────────────────────
