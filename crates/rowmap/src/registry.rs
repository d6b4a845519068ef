use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tracing::debug;

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("query not found: '{name}'")]
    QueryNotFound { name: String },

    #[error("duplicate query name '{name}': {} and {}", first.display(), second.display())]
    DuplicateQuery {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("cannot read sql file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

///
/// SqlRegistry
///
/// Loads and caches `.sql` files from a directory tree, one statement per
/// file, namespaced by path:
///
/// ```text
/// sql/user/get_by_id.sql        → "user.get_by_id"
/// sql/billing/invoice/list.sql  → "billing.invoice.list"
/// ```
///
/// The registry is immutable after loading: load once at startup, then
/// read-only for the lifetime of the application. Registry-loaded SQL is
/// trusted and never sanitized.
///

#[derive(Debug, Default)]
pub struct SqlRegistry {
    queries: HashMap<String, String>,
    paths: HashMap<String, PathBuf>,
}

impl SqlRegistry {
    /// Recursively load all `.sql` files under `root`. A missing root
    /// directory yields an empty registry.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let root = root.as_ref();
        let mut registry = Self::default();

        if !root.exists() {
            return Ok(registry);
        }

        let walk = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "sql")
            });

        for entry in walk {
            let path = entry.path();
            let name = namespace_key(root, path);

            if let Some(first) = registry.paths.get(&name) {
                return Err(RegistryError::DuplicateQuery {
                    name,
                    first: first.clone(),
                    second: path.to_path_buf(),
                });
            }

            let sql = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            registry.queries.insert(name.clone(), sql.trim().to_string());
            registry.paths.insert(name, path.to_path_buf());
        }

        debug!(queries = registry.queries.len(), root = %root.display(), "sql registry loaded");
        Ok(registry)
    }

    /// Look up SQL text by namespace-qualified name.
    pub fn get(&self, name: &str) -> Result<&str, RegistryError> {
        self.queries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| RegistryError::QueryNotFound {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    /// All registered query names, sorted alphabetically.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Dot-separated namespace key for a SQL file relative to the root.
fn namespace_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(last) = parts.last_mut() {
        if let Some(stem) = last.strip_suffix(".sql") {
            *last = stem.to_string();
        }
    }
    parts.join(".")
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, relative: &str, sql: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, sql).unwrap();
    }

    #[test]
    fn namespaces_nested_files_with_dots() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "user/get_by_id.sql", "SELECT 1");
        write(dir.path(), "billing/invoice/list.sql", "SELECT 2");

        let registry = SqlRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("user.get_by_id").unwrap(), "SELECT 1");
        assert_eq!(registry.get("billing.invoice.list").unwrap(), "SELECT 2");
        assert_eq!(
            registry.names(),
            ["billing.invoice.list", "user.get_by_id"]
        );
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "q.sql", "\n  SELECT 1\n\n");

        let registry = SqlRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.get("q").unwrap(), "SELECT 1");
    }

    #[test]
    fn unknown_name_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SqlRegistry::load(dir.path()).unwrap();
        let err = registry.get("nope").unwrap_err();
        assert!(matches!(err, RegistryError::QueryNotFound { .. }));
    }

    #[test]
    fn colliding_namespace_keys_error() {
        let dir = tempfile::tempdir().unwrap();
        // "a/b.sql" and "a.b.sql" both resolve to "a.b".
        write(dir.path(), "a/b.sql", "SELECT 1");
        write(dir.path(), "a.b.sql", "SELECT 2");

        let err = SqlRegistry::load(dir.path()).unwrap_err();
        let RegistryError::DuplicateQuery { name, .. } = err else {
            panic!("expected duplicate query error");
        };
        assert_eq!(name, "a.b");
    }

    #[test]
    fn missing_root_is_empty_registry() {
        let registry = SqlRegistry::load("/nonexistent/rowmap-sql").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn non_sql_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "readme.md", "not sql");
        write(dir.path(), "q.sql", "SELECT 1");

        let registry = SqlRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
