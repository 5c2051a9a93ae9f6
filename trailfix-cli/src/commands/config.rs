//! Configuration management CLI commands.
//!
//! Provides `config show`, `config init` and `config path`.

use clap::Subcommand;
use trailfix::config::{config_file_path, to_config_string, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (access token masked)
    Show,

    /// Write a default config.ini if none exists
    Init,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init => run_init(),
        ConfigCommands::Path => run_path(),
    }
}

/// Print the effective configuration.
fn run_show() -> Result<(), CliError> {
    let mut config = ConfigFile::load()?;
    config.map.access_token = config.map.access_token.as_deref().map(mask);
    print!("{}", to_config_string(&config));
    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let existed = config_file_path().exists();
    let path = ConfigFile::ensure_exists()?;
    if existed {
        println!("Config already exists: {}", path.display());
    } else {
        println!("Created {}", path.display());
        println!("Set access_token in the [map] section before starting a session.");
    }
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn mask(token: &str) -> String {
    let tail: String = token
        .chars()
        .skip(token.chars().count().saturating_sub(4))
        .collect();
    format!("****{}", tail)
}
