//! Config command handlers. None of these connect to an Edge.

use edgewire_config::{Config, Profile, config_path, load_config, save_config, store_password};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{active_profile_name, available_profiles};
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

/// Copy of `config` with plaintext passwords masked.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    for profile in config.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    config
}

fn validate_url(raw: &str) -> Result<(), CliError> {
    let url: url::Url = raw.parse().map_err(|e| CliError::Validation {
        field: "url".into(),
        reason: format!("{raw}: {e}"),
    })?;
    if matches!(url.scheme(), "ws" | "wss") {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "url".into(),
            reason: format!("expected a ws:// or wss:// URL, got {raw}"),
        })
    }
}

fn profile_not_found(name: String, config: &Config) -> CliError {
    CliError::ProfileNotFound {
        name,
        available: available_profiles(config),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config_path().display());
            Ok(())
        }

        ConfigCommand::Show => {
            let config = redacted(&load_config()?);
            let out = output::render_single(
                &global.output,
                &config,
                |c| format!("{c:#?}"),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Add {
            name,
            url,
            edge,
            username,
        } => {
            validate_url(&url)?;
            let mut config = load_config()?;

            let mut profile = Profile::new(url);
            profile.edge_id = edge;
            profile.username = username;
            let replaced = config.profiles.insert(name.clone(), profile).is_some();

            let default_missing = config
                .default_profile
                .as_ref()
                .is_none_or(|d| !config.profiles.contains_key(d));
            if default_missing {
                config.default_profile = Some(name.clone());
            }

            save_config(&config)?;
            if !global.quiet {
                let verb = if replaced { "Replaced" } else { "Added" };
                eprintln!("✓ {verb} profile '{name}' in {}", config_path().display());
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let config = load_config()?;
            if config.profiles.is_empty() {
                eprintln!("No profiles configured. Run: edgewire config add <name> <url>");
                return Ok(());
            }
            let default = config.default_profile.as_deref().unwrap_or("default");
            for name in config.profiles.keys() {
                let marker = if name == default { " *" } else { "" };
                println!("{name}{marker}");
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut config = load_config()?;
            if !config.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &config));
            }
            config.default_profile = Some(name.clone());
            save_config(&config)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let config = load_config()?;
            let name = profile.unwrap_or_else(|| active_profile_name(global, &config));
            if !config.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &config));
            }

            let password = rpassword::prompt_password("Password: ")?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("✓ Password stored in system keyring for profile '{name}'");
            }
            Ok(())
        }
    }
}
