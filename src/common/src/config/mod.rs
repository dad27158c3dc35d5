use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

mod keep;

pub use keep::{KeepCount, KeepSchedule, TIER_COUNT, UNLIMITED_SENTINEL};

/// Configuration file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "dumprotate.toml";

/// Prefix for environment overrides, e.g. `DUMPROTATE__BACKUP__KEEP=0,7,4,12,-1`.
pub const ENV_PREFIX: &str = "DUMPROTATE__";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required option: --{0}")]
    Missing(&'static str),

    #[error("--keep: {0}")]
    InvalidKeep(String),

    #[error("--connection: {0}")]
    InvalidConnection(String),

    #[error("--backup-dir: The directory {} does not exist", .0.display())]
    BackupDirMissing(PathBuf),

    #[error("--backup-dir: {} is not a directory", .0.display())]
    BackupDirNotDirectory(PathBuf),

    #[error("--backup-dir: {} is not writeable", .0.display())]
    BackupDirNotWritable(PathBuf),

    #[error("--backup-dir: {} is not writeable", .path.display())]
    TierDirNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to load configuration")]
    Load(#[from] Box<figment::Error>),
}

/// Credentials for the MySQL server, written as `host,user,password`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionConfig {
    pub host: String,
    pub user: String,
    pub password: String,
}

impl ConnectionConfig {
    /// Copy of the connection with the password masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            host: self.host.clone(),
            user: self.user.clone(),
            password: "****".to_string(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"****")
            .finish()
    }
}

impl FromStr for ConnectionConfig {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').collect();
        match parts.as_slice() {
            [host, user, password] => Ok(Self {
                host: host.to_string(),
                user: user.to_string(),
                password: password.to_string(),
            }),
            _ => Err(ConfigError::InvalidConnection(format!(
                "must consist of 3 parts (host,user,password), got {}",
                parts.len()
            ))),
        }
    }
}

impl TryFrom<String> for ConnectionConfig {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConnectionConfig> for String {
    fn from(connection: ConnectionConfig) -> Self {
        format!(
            "{},{},{}",
            connection.host, connection.user, connection.password
        )
    }
}

/// Where backups live and how many of each tier to keep.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct BackupConfig {
    /// Backup root; one subdirectory per active tier is created below it.
    ///
    /// Env: DUMPROTATE__BACKUP__DIR
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Keep-counts for hourly, daily, weekly, monthly and yearly backups.
    ///
    /// Env: DUMPROTATE__BACKUP__KEEP
    #[serde(default)]
    pub keep: Option<KeepSchedule>,
}

/// Settings for the MySQL entity lister and dump producer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MysqlConfig {
    /// Env: DUMPROTATE__MYSQL__CONNECTION
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,
    /// Databases that are never backed up.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Extra arguments passed verbatim to the dump program.
    #[serde(default)]
    pub dump_args: Vec<String>,
    /// Run every external command under `nice -n <niceness>`.
    #[serde(default = "default_niceness")]
    pub niceness: Option<i32>,
    #[serde(default = "default_mysql_bin")]
    pub mysql_bin: String,
    #[serde(default = "default_mysqldump_bin")]
    pub mysqldump_bin: String,
    #[serde(default = "default_gzip_bin")]
    pub gzip_bin: String,
}

fn default_niceness() -> Option<i32> {
    Some(19)
}

fn default_mysql_bin() -> String {
    "mysql".to_string()
}

fn default_mysqldump_bin() -> String {
    "mysqldump".to_string()
}

fn default_gzip_bin() -> String {
    "gzip".to_string()
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            connection: None,
            exclude: Vec::new(),
            dump_args: Vec::new(),
            niceness: default_niceness(),
            mysql_bin: default_mysql_bin(),
            mysqldump_bin: default_mysqldump_bin(),
            gzip_bin: default_gzip_bin(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RotationConfig {
    /// Log what would be produced, duplicated and deleted without touching anything.
    ///
    /// Env: DUMPROTATE__ROTATION__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub mysql: MysqlConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
}

/// Command-line values layered on top of file and environment configuration.
///
/// Unset fields are skipped so they never mask lower layers.
#[derive(Clone, Debug, Serialize, Default)]
pub struct ConfigOverrides {
    pub backup: BackupOverrides,
    pub mysql: MysqlOverrides,
    pub rotation: RotationOverrides,
}

#[derive(Clone, Debug, Serialize, Default)]
pub struct BackupOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep: Option<KeepSchedule>,
}

#[derive(Clone, Debug, Serialize, Default)]
pub struct MysqlOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_args: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Default)]
pub struct RotationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// Configuration with every required option present.
#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub backup_dir: PathBuf,
    pub keep: KeepSchedule,
    pub connection: ConnectionConfig,
    pub mysql: MysqlConfig,
    pub dry_run: bool,
}

impl Configuration {
    /// Build the layered figment: defaults, TOML file, environment, command line.
    pub fn figment(config_file: &Path, overrides: &ConfigOverrides) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }

    /// Load configuration from `dumprotate.toml`, the environment and the given overrides.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::figment(Path::new(DEFAULT_CONFIG_FILE), overrides)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Like [`Configuration::load`], but the file must exist.
    pub fn load_from_path(path: &Path, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Self::figment(path, overrides)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Check required options and the backup root, returning the validated settings.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let keep = self.backup.keep.ok_or(ConfigError::Missing("keep"))?;
        let connection = self
            .mysql
            .connection
            .clone()
            .ok_or(ConfigError::Missing("connection"))?;
        let backup_dir = self
            .backup
            .dir
            .clone()
            .ok_or(ConfigError::Missing("backup-dir"))?;

        if !backup_dir.exists() {
            return Err(ConfigError::BackupDirMissing(backup_dir));
        }
        if !backup_dir.is_dir() {
            return Err(ConfigError::BackupDirNotDirectory(backup_dir));
        }

        Ok(ValidatedConfig {
            backup_dir,
            keep,
            connection,
            mysql: self.mysql.clone(),
            dry_run: self.rotation.dry_run,
        })
    }

    /// Copy of the configuration that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.mysql.connection = config.mysql.connection.as_ref().map(|c| c.redacted());
        config
    }
}
