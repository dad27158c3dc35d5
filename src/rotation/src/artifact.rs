//! Entities, artifacts and the artifact naming convention.
//!
//! Artifacts are named `<tier-dir>/<YYYY>_<MM>_<DD>_<HH>:<MM>:<SS>__<entity>.tar.gz`.
//! The payload is a single gzip-compressed dump stream, not a tar archive; the
//! `.tar.gz` extension is kept so existing backup trees keep rotating.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::tier::TierName;

/// `strftime` pattern of the timestamp part of an artifact file name.
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H:%M:%S";

/// Separator between timestamp and entity name.
pub const ENTITY_SEPARATOR: &str = "__";

pub const ARTIFACT_EXTENSION: &str = ".tar.gz";

/// Something that gets backed up, e.g. a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    name: String,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_excluded(&self, exclude: &HashSet<String>) -> bool {
        exclude.contains(&self.name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One backup file belonging to an (entity, tier) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub entity: String,
    pub tier: TierName,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// File name for an artifact of `entity` created at `created_at`.
pub fn artifact_file_name<Tz>(created_at: &DateTime<Tz>, entity: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "{}{ENTITY_SEPARATOR}{entity}{ARTIFACT_EXTENSION}",
        created_at.format(TIMESTAMP_FORMAT)
    )
}

/// Full path of a new artifact inside `tier_dir`.
pub fn artifact_path<Tz>(tier_dir: &Path, created_at: &DateTime<Tz>, entity: &str) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    tier_dir.join(artifact_file_name(created_at, entity))
}

/// Split an artifact file name into its timestamp and entity name.
///
/// Returns `None` for anything that does not follow the naming convention.
pub fn parse_file_name(file_name: &str) -> Option<(NaiveDateTime, &str)> {
    let stem = file_name.strip_suffix(ARTIFACT_EXTENSION)?;
    let (timestamp, entity) = stem.split_once(ENTITY_SEPARATOR)?;
    if entity.is_empty() {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    Some((timestamp, entity))
}

/// Whether `file_name` is an artifact of exactly `entity`.
pub fn belongs_to(file_name: &str, entity: &str) -> bool {
    parse_file_name(file_name).is_some_and(|(_, name)| name == entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn timestamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 7, 4, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_file_name_follows_convention() {
        assert_eq!(
            artifact_file_name(&timestamp(), "app"),
            "2024_03_07_04:05:09__app.tar.gz"
        );
        assert_eq!(
            artifact_path(Path::new("/bck/daily"), &timestamp(), "app"),
            PathBuf::from("/bck/daily/2024_03_07_04:05:09__app.tar.gz")
        );
    }

    #[test]
    fn test_parse_file_name() {
        let (ts, entity) = parse_file_name("2024_03_07_04:05:09__my_db.tar.gz").unwrap();
        assert_eq!(entity, "my_db");
        assert_eq!(ts, timestamp().naive_local());

        assert!(parse_file_name("2024_03_07_04:05:09__app.sql").is_none());
        assert!(parse_file_name("notes__app.tar.gz").is_none());
        assert!(parse_file_name("2024_03_07_04:05:09__.tar.gz").is_none());
    }

    #[test]
    fn test_belongs_to_matches_entity_exactly() {
        let name = "2024_03_07_04:05:09__app.tar.gz";
        assert!(belongs_to(name, "app"));
        assert!(!belongs_to(name, "pp"));
        assert!(!belongs_to(name, "myapp"));
        assert!(!belongs_to("2024_03_07_04:05:09__myapp.tar.gz", "app"));
        assert!(belongs_to("2024_03_07_04:05:09__my__app.tar.gz", "my__app"));
        assert!(!belongs_to("2024_03_07_04:05:09__my__app.tar.gz", "app"));
    }

    #[test]
    fn test_entity_exclusion() {
        let exclude: HashSet<String> = ["mysql", "information_schema"]
            .into_iter()
            .map(String::from)
            .collect();

        assert!(Entity::new("mysql").is_excluded(&exclude));
        assert!(Entity::new("information_schema").is_excluded(&exclude));
        assert!(!Entity::new("app").is_excluded(&exclude));
    }
}
