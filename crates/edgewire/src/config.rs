//! CLI configuration: profile lookup with `GlobalOpts` overrides layered on.

use edgewire_config::{Config, Profile, config_path};
use edgewire_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Where to connect and which Edge to talk to.
#[derive(Debug)]
pub struct Target {
    pub profile_name: String,
    pub edge_id: String,
    pub session: SessionConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Build the connection target. Flags override the profile; without a
/// profile, `--url` alone is enough.
pub fn resolve_target(global: &GlobalOpts, config: &Config) -> Result<Target, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut profile = match (config.profiles.get(&profile_name), &global.url) {
        (Some(profile), _) => profile.clone(),
        (None, Some(url)) => Profile::new(url.clone()),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(config),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(url) = &global.url {
        profile.url.clone_from(url);
    }
    if let Some(edge) = &global.edge {
        profile.edge_id.clone_from(edge);
    }
    if let Some(username) = &global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let session =
        edgewire_config::profile_to_session_config(&profile, &profile_name, &config.defaults)?;
    tracing::debug!(profile = %profile_name, url = %session.url, edge = %profile.edge_id, "resolved target");

    Ok(Target {
        profile_name,
        edge_id: profile.edge_id,
        session,
    })
}
