use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across binaries
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands
#[derive(Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum CommonCommands {
    /// Run one rotation pass (default behavior)
    #[default]
    Run,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::{ConfigError, ConfigOverrides, Configuration, ValidatedConfig};
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log level implied by the verbosity flags.
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments. `RUST_LOG` takes precedence when set.
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(
        config_path: Option<&PathBuf>,
        overrides: &ConfigOverrides,
    ) -> Result<Configuration, ConfigError> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path, overrides)
            }
            None => Configuration::load(overrides),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        let config = config.redacted();
        if json {
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("dumprotate configuration:");
            println!("=========================");
            match &config.backup.dir {
                Some(dir) => println!("Backup directory: {}", dir.display()),
                None => println!("Backup directory: <unset>"),
            }
            match &config.backup.keep {
                Some(keep) => println!("Keep (h,d,w,m,y): {keep}"),
                None => println!("Keep (h,d,w,m,y): <unset>"),
            }
            match &config.mysql.connection {
                Some(c) => println!("Connection: {}@{}", c.user, c.host),
                None => println!("Connection: <unset>"),
            }
            println!("Excluded databases: {:?}", config.mysql.exclude);
            println!("Extra dump arguments: {:?}", config.mysql.dump_args);
            match config.mysql.niceness {
                Some(n) => println!("Niceness: {n}"),
                None => println!("Niceness: disabled"),
            }
            println!("Dry run: {}", config.rotation.dry_run);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<ValidatedConfig, ConfigError> {
        log::info!("Validating configuration...");
        let validated = config.validate()?;
        log::info!("Configuration validation passed");
        Ok(validated)
    }

    /// Handle commands that don't run a rotation pass.
    ///
    /// Returns `Ok(true)` when the command was handled.
    pub fn handle_common_command(
        command: &CommonCommands,
        config: &Configuration,
        version: &str,
    ) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{version}");
                Ok(true)
            }
            CommonCommands::Run => Ok(false),
        }
    }

    /// Standard version information for a binary
    pub fn version_info(name: &str, version: &str, rust_version: &str) -> String {
        format!("{name} {version} (rust {rust_version})")
    }
}
