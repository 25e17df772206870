//! Exclusion resolution for a sync source
//!
//! A transfer skips two kinds of paths: whatever the per-source ignore file
//! lists (handed to rsync as a bulk exclusion source) and the folder names
//! given explicitly on the command line or in the settings file.

use std::path::{Path, PathBuf};

/// Name of the ignore file looked up directly under the source root
pub const IGNORE_FILE_NAME: &str = ".codesyncignore";

/// Combined exclusion specification for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    ignore_file: Option<PathBuf>,
    folders: Vec<String>,
}

impl Exclusions {
    /// Resolve exclusions for `source`.
    ///
    /// A missing ignore file is the normal case and is not reported.
    /// Folder order is preserved and duplicates are kept; rsync treats
    /// repeated patterns idempotently.
    pub fn resolve(source: &Path, folders: &[String]) -> Self {
        let candidate = source.join(IGNORE_FILE_NAME);
        let ignore_file = candidate.exists().then_some(candidate);

        if let Some(path) = &ignore_file {
            tracing::debug!("Using ignore file {}", path.display());
        }

        Self {
            ignore_file,
            folders: folders.to_vec(),
        }
    }

    /// Path of the ignore file, if one was present at resolution time
    pub fn ignore_file(&self) -> Option<&Path> {
        self.ignore_file.as_deref()
    }

    /// Explicit folder names, in the order given
    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    pub fn is_empty(&self) -> bool {
        self.ignore_file.is_none() && self.folders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn folders(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_without_ignore_file() {
        let temp = TempDir::new().unwrap();

        let exclusions = Exclusions::resolve(temp.path(), &folders(&["node_modules", "dist"]));

        assert!(exclusions.ignore_file().is_none());
        assert_eq!(exclusions.folders(), &["node_modules", "dist"]);
        assert!(!exclusions.is_empty());
    }

    #[test]
    fn test_resolve_with_ignore_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(IGNORE_FILE_NAME), "*.log\n").unwrap();

        let exclusions = Exclusions::resolve(temp.path(), &[]);

        assert_eq!(
            exclusions.ignore_file(),
            Some(temp.path().join(IGNORE_FILE_NAME).as_path())
        );
        assert!(exclusions.folders().is_empty());
    }

    #[test]
    fn test_resolve_keeps_duplicates_in_order() {
        let temp = TempDir::new().unwrap();

        let exclusions = Exclusions::resolve(temp.path(), &folders(&["tmp", "dist", "tmp"]));

        assert_eq!(exclusions.folders(), &["tmp", "dist", "tmp"]);
    }

    #[test]
    fn test_ignore_file_in_subdirectory_is_not_used() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(IGNORE_FILE_NAME), "*.log\n").unwrap();

        let exclusions = Exclusions::resolve(temp.path(), &[]);

        assert!(exclusions.is_empty());
    }
}
