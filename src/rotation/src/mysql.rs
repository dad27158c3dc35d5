//! MySQL-backed entity lister and dump producer.
//!
//! Databases are enumerated with the `mysql` client and dumped with
//! `mysqldump` piped through `gzip -c`. Every child runs under `nice` unless
//! niceness is disabled. The password travels in `MYSQL_PWD` so it never
//! appears in a process listing or a log line.

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use common::config::{ConnectionConfig, MysqlConfig};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::artifact::Entity;
use crate::collaborator::{DumpProducer, EntityLister};
use crate::error::CollaboratorError;

const PASSWORD_ENV: &str = "MYSQL_PWD";
const LIST_QUERY: &str = "show databases";

/// A program plus arguments, optionally wrapped in `nice -n <niceness>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    niceness: Option<i32>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            niceness: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn niceness(mut self, niceness: Option<i32>) -> Self {
        self.niceness = niceness;
        self
    }

    /// Full argument vector, `nice` prefix included.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 4);
        if let Some(niceness) = self.niceness {
            argv.extend(["nice".to_string(), "-n".to_string(), niceness.to_string()]);
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn command(&self, password: Option<&str>) -> Command {
        let argv = self.argv();
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]).kill_on_drop(true);
        if let Some(password) = password {
            command.env(PASSWORD_ENV, password);
        }
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Talks to a MySQL server through its command-line clients.
#[derive(Debug, Clone)]
pub struct MysqlSource {
    connection: ConnectionConfig,
    mysql_bin: String,
    mysqldump_bin: String,
    gzip_bin: String,
    dump_args: Vec<String>,
    niceness: Option<i32>,
}

impl MysqlSource {
    pub fn new(connection: ConnectionConfig, config: &MysqlConfig) -> Self {
        Self {
            connection,
            mysql_bin: config.mysql_bin.clone(),
            mysqldump_bin: config.mysqldump_bin.clone(),
            gzip_bin: config.gzip_bin.clone(),
            dump_args: config.dump_args.clone(),
            niceness: config.niceness,
        }
    }

    pub fn list_command(&self) -> CommandSpec {
        CommandSpec::new(&self.mysql_bin)
            .args(["-h", self.connection.host.as_str(), "-u", self.connection.user.as_str()])
            .args(["-e", LIST_QUERY, "-B", "-N"])
            .niceness(self.niceness)
    }

    /// `mysqldump <extra args> -h <host> -u <user> <database>`
    pub fn dump_command(&self, entity: &Entity) -> CommandSpec {
        CommandSpec::new(&self.mysqldump_bin)
            .args(self.dump_args.iter().cloned())
            .args(["-h", self.connection.host.as_str(), "-u", self.connection.user.as_str()])
            .arg(entity.name())
            .niceness(self.niceness)
    }

    pub fn compress_command(&self) -> CommandSpec {
        CommandSpec::new(&self.gzip_bin)
            .arg("-c")
            .niceness(self.niceness)
    }

    fn password(&self) -> Option<&str> {
        Some(self.connection.password.as_str()).filter(|p| !p.is_empty())
    }

    async fn discard_partial(target: &Path) {
        if let Err(e) = fs::remove_file(target).await {
            warn!(path = %target.display(), error = %e, "Failed to remove partial dump");
        }
    }
}

fn spawn_failed(
    operation: &'static str,
    spec: &CommandSpec,
    e: std::io::Error,
) -> CollaboratorError {
    CollaboratorError::Unavailable {
        operation,
        message: format!("failed to start '{spec}': {e}"),
    }
}

fn check_status(
    operation: &'static str,
    spec: &CommandSpec,
    status: ExitStatus,
) -> Result<(), CollaboratorError> {
    if status.success() {
        return Ok(());
    }
    Err(CollaboratorError::Exited {
        operation,
        command: spec.to_string(),
        status: status.code(),
    })
}

#[async_trait]
impl EntityLister for MysqlSource {
    async fn list_entities(&self) -> Result<Vec<Entity>, CollaboratorError> {
        let spec = self.list_command();
        debug!(command = %spec, "Listing databases");

        let output = spec
            .command(self.password())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_failed("list_entities", &spec, e))?;

        if !output.status.success() {
            warn!(
                command = %spec,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Database listing failed"
            );
        }
        check_status("list_entities", &spec, output.status)?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Entity::new)
            .collect())
    }
}

#[async_trait]
impl DumpProducer for MysqlSource {
    async fn produce(&self, entity: &Entity, target: &Path) -> Result<(), CollaboratorError> {
        let dump_spec = self.dump_command(entity);
        let gzip_spec = self.compress_command();
        debug!(
            dump = %dump_spec,
            compress = %gzip_spec,
            target = %target.display(),
            "Dumping database"
        );

        // Never clobber an existing artifact; everything removed on failure below
        // was created by this call.
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .await
            .map_err(|e| CollaboratorError::io("dump", target, e))?
            .into_std()
            .await;

        let mut dump = match dump_spec
            .command(self.password())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                Self::discard_partial(target).await;
                return Err(spawn_failed("dump", &dump_spec, e));
            }
        };

        let piped: Option<Stdio> = dump
            .stdout
            .take()
            .and_then(|stdout| stdout.try_into().ok());
        let Some(piped) = piped else {
            Self::discard_partial(target).await;
            return Err(CollaboratorError::Unavailable {
                operation: "dump",
                message: format!("could not pipe output of '{dump_spec}'"),
            });
        };

        let gzip = gzip_spec
            .command(None)
            .stdin(piped)
            .stdout(Stdio::from(file))
            .spawn();
        let mut gzip = match gzip {
            Ok(child) => child,
            Err(e) => {
                let _ = dump.kill().await;
                Self::discard_partial(target).await;
                return Err(spawn_failed("dump", &gzip_spec, e));
            }
        };

        let dump_status = dump.wait().await;
        let gzip_status = gzip.wait().await;

        let result = dump_status
            .map_err(|e| CollaboratorError::io("dump", target, e))
            .and_then(|status| check_status("dump", &dump_spec, status))
            .and_then(|()| gzip_status.map_err(|e| CollaboratorError::io("dump", target, e)))
            .and_then(|status| check_status("dump", &gzip_spec, status));

        if result.is_err() {
            Self::discard_partial(target).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> ConnectionConfig {
        ConnectionConfig {
            host: "db.internal".to_string(),
            user: "backup".to_string(),
            password: "s3cret".to_string(),
        }
    }

    fn source(config: MysqlConfig) -> MysqlSource {
        MysqlSource::new(connection(), &config)
    }

    #[test]
    fn test_list_command_is_niced_by_default() {
        let source = source(MysqlConfig::default());

        assert_eq!(
            source.list_command().argv(),
            vec![
                "nice", "-n", "19", "mysql", "-h", "db.internal", "-u", "backup", "-e",
                "show databases", "-B", "-N"
            ]
        );
    }

    #[test]
    fn test_dump_command_puts_extra_args_first() {
        let source = source(MysqlConfig {
            dump_args: vec!["--single-transaction".to_string()],
            niceness: None,
            ..Default::default()
        });

        assert_eq!(
            source.dump_command(&Entity::new("shop")).argv(),
            vec![
                "mysqldump",
                "--single-transaction",
                "-h",
                "db.internal",
                "-u",
                "backup",
                "shop"
            ]
        );
        assert_eq!(source.compress_command().to_string(), "gzip -c");
    }

    #[tokio::test]
    async fn test_existing_artifact_is_never_overwritten() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let target = temp_dir.path().join("2024_06_01_12:00:00__shop.tar.gz");
        std::fs::write(&target, b"earlier dump").unwrap();

        let err = source(MysqlConfig::default())
            .produce(&Entity::new("shop"), &target)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CollaboratorError::Io {
                operation: "dump",
                ..
            }
        ));
        assert_eq!(std::fs::read(&target).unwrap(), b"earlier dump");
    }

    #[test]
    fn test_password_never_in_command_line() {
        let source = source(MysqlConfig::default());

        assert!(!source.list_command().to_string().contains("s3cret"));
        assert!(
            !source
                .dump_command(&Entity::new("shop"))
                .to_string()
                .contains("s3cret")
        );
        assert_eq!(source.password(), Some("s3cret"));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn scripted_source(dir: &Path, mysql: &str, mysqldump: &str) -> MysqlSource {
            source(MysqlConfig {
                niceness: None,
                mysql_bin: script(dir, "mysql", mysql),
                mysqldump_bin: script(dir, "mysqldump", mysqldump),
                gzip_bin: script(dir, "gzip", "cat"),
                ..Default::default()
            })
        }

        #[tokio::test]
        async fn test_scripted_clients() {
            let temp_dir = TempDir::new().unwrap();
            let source = scripted_source(
                temp_dir.path(),
                r#"printf 'information_schema\n\n  shop  \nblog\n'"#,
                r#"printf "dump of %s as $MYSQL_PWD" "$5""#,
            );

            let entities = source.list_entities().await.unwrap();
            let names: Vec<&str> = entities.iter().map(Entity::name).collect();
            assert_eq!(names, vec!["information_schema", "shop", "blog"]);

            let target = temp_dir.path().join("shop.tar.gz");
            source.produce(&Entity::new("shop"), &target).await.unwrap();
            assert_eq!(
                std::fs::read_to_string(&target).unwrap(),
                "dump of shop as s3cret"
            );
        }

        #[tokio::test]
        async fn test_failed_dump_reports_status_and_removes_file() {
            let temp_dir = TempDir::new().unwrap();
            let source = scripted_source(temp_dir.path(), "exit 4", "echo partial; exit 3");

            let err = source.list_entities().await.unwrap_err();
            assert_eq!(err.status_code(), 4);

            let target = temp_dir.path().join("shop.tar.gz");
            let err = source
                .produce(&Entity::new("shop"), &target)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                CollaboratorError::Exited {
                    operation: "dump",
                    status: Some(3),
                    ..
                }
            ));
            assert!(!target.exists());
        }
    }
}
