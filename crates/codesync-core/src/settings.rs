//! Persisted session settings
//!
//! `codesync init` saves a source/destination pair to a JSON file next to
//! the project so `codesync load` can start the same session later:
//!
//! ```json
//! {
//!   "source": "src",
//!   "destination": "user@server:/app",
//!   "ignoreFolders": ["node_modules", "dist"],
//!   "created": "2024-05-01T12:00:00.000Z"
//! }
//! ```

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::target::SyncTarget;

/// Settings file used when no name is given
pub const DEFAULT_SETTINGS_FILE: &str = ".codesync.json";

/// A saved sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Source path relative to the directory the settings were created in
    pub source: String,
    /// Destination locator, passed to rsync as-is
    pub destination: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ignore_folders: Vec<String>,
    /// Informational only; unreadable values load as `None`
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
}

impl Settings {
    /// Create settings for `source`, stored relative to `base_dir`
    pub fn new(
        base_dir: &Path,
        source: impl AsRef<Path>,
        destination: impl Into<String>,
        ignore_folders: Vec<String>,
    ) -> Self {
        Self {
            source: relative_source(base_dir, source.as_ref()),
            destination: destination.into(),
            ignore_folders,
            created: Some(Utc::now()),
        }
    }

    /// Load and validate settings from `path`
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::SettingsNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|e| Error::InvalidSettings {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate(path)?;

        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings to `path` as pretty-printed JSON, atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())
    }

    /// Resolve the stored source against `base_dir` into a sync target
    pub fn target(&self, base_dir: &Path) -> Result<SyncTarget> {
        SyncTarget::resolve(
            base_dir,
            &self.source,
            self.destination.clone(),
            self.ignore_folders.clone(),
        )
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let missing = if self.source.trim().is_empty() {
            Some("source")
        } else if self.destination.trim().is_empty() {
            Some("destination")
        } else {
            None
        };

        match missing {
            Some(field) => Err(Error::InvalidSettings {
                path: path.to_path_buf(),
                message: format!("missing {}", field),
            }),
            None => Ok(()),
        }
    }
}

/// Express `source` relative to `base_dir`, using `..` to climb out of it.
///
/// The base itself becomes `"."`. Only a source on another root (a
/// different drive on Windows) is stored as an absolute path.
fn relative_source(base_dir: &Path, source: &Path) -> String {
    let absolute = lexical_normalize(&base_dir.join(source));
    let base = lexical_normalize(base_dir);

    let mut target = absolute.components().peekable();
    let mut from = base.components().peekable();
    while target.peek().is_some() && target.peek() == from.peek() {
        target.next();
        from.next();
    }

    let shares_root = absolute.components().next() == base.components().next();
    if !shares_root {
        return absolute.to_string_lossy().into_owned();
    }

    let relative: PathBuf = from
        .map(|_| Component::ParentDir)
        .chain(target)
        .collect();

    if relative.as_os_str().is_empty() {
        ".".to_string()
    } else {
        relative.to_string_lossy().into_owned()
    }
}

/// Remove `.` and resolve `..` components without touching the filesystem
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

/// Replace `path` with `content` in a single rename, so a concurrent `load`
/// sees either the previous settings or the new ones.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    // Removed automatically if anything below fails
    let mut staged = tempfile::Builder::new()
        .prefix(".codesync")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;

    staged
        .write_all(content)
        .map_err(|e| Error::io(staged.path(), e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| Error::io(staged.path(), e))?;

    staged.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
