//! Test configuration builder for creating test setups quickly.

use std::path::Path;

use crate::config::{Configuration, KeepSchedule};

/// Builder for creating test configurations.
///
/// Starts from a configuration that already has a connection and no niceness
/// wrapper, so only the backup directory and keep schedule usually need setting.
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = Configuration::default();
        config.mysql.connection = Some(
            "localhost,test,test"
                .parse()
                .expect("static connection string is valid"),
        );
        config.mysql.niceness = None;
        Self { config }
    }

    pub fn with_backup_dir(mut self, dir: &Path) -> Self {
        self.config.backup.dir = Some(dir.to_path_buf());
        self
    }

    /// Set the keep schedule from its textual form.
    ///
    /// # Panics
    ///
    /// Panics if `keep` is not a valid schedule.
    pub fn with_keep(mut self, keep: &str) -> Self {
        let schedule: KeepSchedule = keep.parse().expect("invalid keep schedule in test");
        self.config.backup.keep = Some(schedule);
        self
    }

    pub fn with_exclude(mut self, names: &[&str]) -> Self {
        self.config.mysql.exclude = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_dump_args(mut self, args: &[&str]) -> Self {
        self.config.mysql.dump_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.config.rotation.dry_run = true;
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_valid_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = TestConfigBuilder::new()
            .with_backup_dir(temp_dir.path())
            .with_keep("0,7,4,12,-1")
            .with_exclude(&["mysql"])
            .build();

        let validated = config.validate().unwrap();
        assert_eq!(validated.keep.to_string(), "0,7,4,12,-1");
        assert_eq!(validated.mysql.exclude, vec!["mysql"]);
        assert!(validated.mysql.niceness.is_none());
        assert!(!validated.dry_run);
    }
}
