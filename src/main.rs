//! dumprotate
//!
//! Dumps every database on a MySQL server into hourly, daily, weekly, monthly
//! and yearly rotation directories, keeping a bounded number of artifacts in
//! each.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use common::cli::utils::{
    handle_common_command, init_logging, load_config, validate_config, version_info,
};
use common::cli::{CommonArgs, CommonCommands};
use common::config::{
    BackupOverrides, ConfigOverrides, ConnectionConfig, MysqlOverrides, RotationOverrides,
};
use common::KeepSchedule;
use rotation::error::FAILURE_EXIT_CODE;
use rotation::{
    Collaborators, DriverSettings, LocalArtifactStore, MysqlSource, RotationDriver,
    RotationError, RotationMetrics, SystemClock, TierCatalog,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "dumprotate", author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Artifacts to keep per tier: hourly,daily,weekly,monthly,yearly (-1 = unlimited, 0 = off)
    #[arg(long, value_name = "H,D,W,M,Y", allow_hyphen_values = true)]
    keep: Option<KeepSchedule>,

    /// Root directory holding one subdirectory per tier
    #[arg(long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    /// MySQL connection as host,user,password
    #[arg(long, value_name = "HOST,USER,PASSWORD")]
    connection: Option<ConnectionConfig>,

    /// Databases never dumped
    #[arg(long, value_name = "DB,...", value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Log what would be created and deleted without touching anything
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<CommonCommands>,

    /// Extra argument passed to mysqldump before the connection arguments (repeatable)
    #[arg(long = "dump-arg", value_name = "ARG", allow_hyphen_values = true)]
    dump_args: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backup: BackupOverrides {
                dir: self.backup_dir.clone(),
                keep: self.keep,
            },
            mysql: MysqlOverrides {
                connection: self.connection.clone(),
                exclude: self.exclude.clone(),
                dump_args: Some(self.dump_args.clone()).filter(|args| !args.is_empty()),
            },
            rotation: RotationOverrides {
                dry_run: self.dry_run.then_some(true),
            },
        }
    }
}

fn version() -> String {
    version_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_RUST_VERSION"),
    )
}

/// Exit code for a command line clap refused. Help and version requests succeed.
fn usage_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => FAILURE_EXIT_CODE,
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<RotationError>()
        .map_or(FAILURE_EXIT_CODE, RotationError::exit_code)
}

async fn rotate(cli: &Cli) -> Result<()> {
    let config =
        load_config(cli.common.config.as_ref(), &cli.overrides()).map_err(RotationError::from)?;

    let command = cli.command.clone().unwrap_or_default();
    if handle_common_command(&command, &config, &version())? {
        return Ok(());
    }

    let validated = validate_config(&config).map_err(RotationError::from)?;
    let catalog = TierCatalog::new(&validated.keep);
    if catalog.is_empty() {
        warn!("Every tier has a keep count of 0, nothing to do");
        return Ok(());
    }

    let source = Arc::new(MysqlSource::new(
        validated.connection.clone(),
        &validated.mysql,
    ));
    let collaborators = Collaborators {
        entities: source.clone(),
        producer: source,
        store: Arc::new(LocalArtifactStore::new(&validated.backup_dir)),
        clock: Arc::new(SystemClock),
    };
    let settings = DriverSettings::from(&validated);

    info!(
        backup_dir = %validated.backup_dir.display(),
        keep = %validated.keep,
        host = %validated.connection.host,
        dry_run = validated.dry_run,
        "Starting dumprotate"
    );

    let driver = RotationDriver::new(catalog, collaborators, settings, RotationMetrics::new());
    driver.bootstrap().await?;
    let summary = driver.run().await?;

    driver.metrics().summary().log();
    info!(
        entities = summary.entities.len(),
        excluded = summary.excluded.len(),
        dumps = summary.entities.iter().map(|e| e.dumps()).sum::<usize>(),
        "Rotation finished"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };
    init_logging(&cli.common);

    match rotate(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}
