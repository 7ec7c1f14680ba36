//! Config subcommand handlers.

use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

/// Mask every plaintext password so the config can be shown safely.
fn redact(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

/// Map an interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redact(config::load_config()?);
            let out = output::render(global.output, &cfg)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Add one under [profiles.<name>] in the config file.");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config()?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            let password = rpassword::prompt_password(format!("Password for '{profile_name}': "))
                .map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            config::store_password(&profile_name, &SecretString::from(password))?;
            if !global.quiet {
                eprintln!("✓ Password for '{profile_name}' stored in system keyring");
            }
            Ok(())
        }
    }
}
