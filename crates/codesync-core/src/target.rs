//! The (source, destination, exclusions) tuple a session syncs

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// What one sync session mirrors, and where to
///
/// Built once at session start and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    source: PathBuf,
    destination: String,
    ignore_folders: Vec<String>,
}

impl SyncTarget {
    /// Resolve `source` against `base_dir` and build a target.
    ///
    /// The source must exist; it is canonicalized so the watcher and the
    /// transfer command see the same absolute path. The destination is an
    /// opaque `[user@]host[:port]:path` locator and is not inspected.
    pub fn resolve(
        base_dir: &Path,
        source: impl AsRef<Path>,
        destination: impl Into<String>,
        ignore_folders: Vec<String>,
    ) -> Result<Self> {
        let joined = base_dir.join(source.as_ref());
        let source = dunce::canonicalize(&joined).map_err(|e| Error::SourceNotFound {
            path: joined.clone(),
            source: e,
        })?;

        Ok(Self {
            source,
            destination: destination.into(),
            ignore_folders,
        })
    }

    /// Absolute, canonical source directory
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn ignore_folders(&self) -> &[String] {
        &self.ignore_folders
    }
}
