//! Config subcommand handlers.

use secrecy::SecretString;

use tpsguard_config::ConfigError;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Map an interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?.redacted();
            let out = output::render_single(global.output, &cfg, |c| {
                toml::to_string_pretty(c).unwrap_or_else(|e| format!("# cannot render config: {e}"))
            })?;
            output::print_output(&out);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string());
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load(global)?;
            let username = cfg.username()?;

            let password =
                rpassword::prompt_password(format!("Password for {username}: ")).map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            config::store_password(username, &SecretString::from(password)).map_err(|e| match e {
                ConfigError::Keyring(e) => CliError::Keyring {
                    reason: format!("failed to store password: {e}"),
                },
                other => other.into(),
            })?;
            eprintln!("✓ Password for {username} stored in system keyring");
            Ok(())
        }
    }
}
