//! Versioned schema migrations.
//!
//! Migration files live in one directory and are named
//! `NNN_description.sql` (any number of leading digits). Applied versions
//! are recorded in a `schema_migrations` table; each pending migration
//! runs inside its own transaction together with its bookkeeping row.

use crate::driver::{Driver, DriverError, Params};
use rowmap_core::value::Value;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

const ENSURE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS schema_migrations (
    version     INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at  TEXT NOT NULL
)";

///
/// MigrationError
///

#[derive(Debug, ThisError)]
pub enum MigrationError {
    #[error("migration file name must be 'NNN_description.sql': {}", path.display())]
    InvalidFileName { path: PathBuf },

    #[error("duplicate migration version {version}: {} and {}", first.display(), second.display())]
    DuplicateVersion {
        version: u64,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("cannot read migration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("migration {version} failed: {source}")]
    Failed {
        version: u64,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

///
/// MigrationInfo
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MigrationInfo {
    pub version: u64,
    pub description: String,
    pub path: PathBuf,
}

///
/// MigrationRunner
///

#[derive(Clone, Debug)]
pub struct MigrationRunner {
    dir: PathBuf,
}

impl MigrationRunner {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// All migrations on disk, sorted by version. A missing directory
    /// yields an empty list.
    pub fn discover(&self) -> Result<Vec<MigrationInfo>, MigrationError> {
        let mut found: Vec<MigrationInfo> = Vec::new();

        if !self.dir.exists() {
            return Ok(found);
        }

        let entries = walkdir::WalkDir::new(&self.dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "sql")
            });

        for entry in entries {
            let info = parse_file_name(entry.path())?;
            if let Some(existing) = found.iter().find(|m| m.version == info.version) {
                return Err(MigrationError::DuplicateVersion {
                    version: info.version,
                    first: existing.path.clone(),
                    second: info.path,
                });
            }
            found.push(info);
        }

        found.sort_by_key(|m| m.version);
        Ok(found)
    }

    /// Versions already recorded in `schema_migrations`, ascending.
    pub fn applied(&self, driver: &mut dyn Driver) -> Result<Vec<u64>, MigrationError> {
        driver.execute_script(ENSURE_TABLE_SQL)?;
        let result = driver.execute(
            "SELECT version FROM schema_migrations ORDER BY version",
            &Params::new(),
        )?;
        let versions = result
            .rows
            .iter()
            .filter_map(|row| match row.value("version") {
                Value::Int(v) if v >= 0 => Some(v.unsigned_abs()),
                _ => None,
            })
            .collect();
        Ok(versions)
    }

    /// Migrations on disk not yet applied, sorted by version.
    pub fn pending(&self, driver: &mut dyn Driver) -> Result<Vec<MigrationInfo>, MigrationError> {
        let applied = self.applied(driver)?;
        let pending = self
            .discover()?
            .into_iter()
            .filter(|m| !applied.contains(&m.version))
            .collect();
        Ok(pending)
    }

    /// Highest applied version, if any.
    pub fn current_version(&self, driver: &mut dyn Driver) -> Result<Option<u64>, MigrationError> {
        Ok(self.applied(driver)?.last().copied())
    }

    /// Apply every pending migration in version order. Each migration and
    /// its bookkeeping row commit together; a failure rolls back that
    /// migration and stops, leaving earlier ones applied.
    pub fn apply_all(&self, driver: &mut dyn Driver) -> Result<Vec<u64>, MigrationError> {
        let pending = self.pending(driver)?;
        let mut applied = Vec::with_capacity(pending.len());

        for migration in pending {
            let sql =
                std::fs::read_to_string(&migration.path).map_err(|source| MigrationError::Io {
                    path: migration.path.clone(),
                    source,
                })?;

            driver.begin()?;
            if let Err(source) = run_one(driver, &migration, &sql) {
                let _ = driver.rollback();
                return Err(MigrationError::Failed {
                    version: migration.version,
                    source,
                });
            }
            driver.commit()?;

            info!(
                version = migration.version,
                description = %migration.description,
                "applied migration"
            );
            applied.push(migration.version);
        }

        Ok(applied)
    }

}

fn run_one(
    driver: &mut dyn Driver,
    migration: &MigrationInfo,
    sql: &str,
) -> Result<(), DriverError> {
    driver.execute_script(sql)?;

    let applied_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("unknown"));
    driver.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) \
         VALUES (:version, :description, :applied_at)",
        &Params::new()
            .with("version", i64::try_from(migration.version).unwrap_or(i64::MAX))
            .with("description", migration.description.clone())
            .with("applied_at", applied_at),
    )?;
    Ok(())
}

/// Split `NNN_description.sql` into version and description.
fn parse_file_name(path: &Path) -> Result<MigrationInfo, MigrationError> {
    let invalid = || MigrationError::InvalidFileName {
        path: path.to_path_buf(),
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(invalid)?;
    let (digits, rest) = stem.split_once('_').ok_or_else(invalid)?;
    if digits.is_empty() || rest.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let version: u64 = digits.parse().map_err(|_| invalid())?;

    Ok(MigrationInfo {
        version,
        description: rest.to_string(),
        path: path.to_path_buf(),
    })
}

///
/// TESTS
///
