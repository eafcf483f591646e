//! The project manifest (`package.json`) and the publish-time guard.
//!
//! [`ProjectManifest`] is read once, owned by the release pipeline and
//! written back explicitly. Only the `version` field is ever changed; key
//! order and every other value round-trip untouched.
//!
//! [`ManifestGuard`] covers the publish window: it keeps a backup of the
//! manifest while publish-irrelevant fields are stripped on disk and puts
//! the original back when restored or dropped.

use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::runner::{CommandRunner, RunError, RunOptions};

/// File name of the manifest in the project root.
pub const MANIFEST_FILE: &str = "package.json";

/// Suffix appended to the manifest path for the publish backup.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Errors from reading, writing or guarding the manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// A file operation on the manifest or its backup failed.
    #[error("{action} {path}: {source}")]
    Io {
        /// What was being done.
        action: &'static str,
        /// File involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The manifest's top level is not a JSON object.
    #[error("{path} must contain a JSON object")]
    NotAnObject {
        /// Manifest path.
        path: Utf8PathBuf,
    },

    /// The manifest has no string `version` field.
    #[error("{path} has no \"version\" field")]
    MissingVersion {
        /// Manifest path.
        path: Utf8PathBuf,
    },

    /// Removing a field through the package manager failed.
    #[error("failed to strip manifest field: {0}")]
    Strip(#[from] RunError),
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

fn io_error(action: &'static str, path: &Utf8Path) -> impl FnOnce(std::io::Error) -> ManifestError {
    let path = path.to_path_buf();
    move |source| ManifestError::Io {
        action,
        path,
        source,
    }
}

/// In-memory `package.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectManifest {
    path: Utf8PathBuf,
    fields: Map<String, Value>,
}

impl ProjectManifest {
    /// Read and parse the manifest at `path`.
    ///
    /// A leading byte-order mark is ignored.
    #[instrument]
    pub fn load(path: &Utf8Path) -> ManifestResult<Self> {
        let raw = fs::read_to_string(path).map_err(io_error("failed to read", path))?;
        let text = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
        let value: Value = serde_json::from_str(text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Object(fields) = value else {
            return Err(ManifestError::NotAnObject {
                path: path.to_path_buf(),
            });
        };
        let manifest = Self {
            path: path.to_path_buf(),
            fields,
        };
        manifest.version()?;
        debug!(name = ?manifest.name(), "manifest loaded");
        Ok(manifest)
    }

    /// Where the manifest lives on disk.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Package name, if present.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// The raw `version` string.
    pub fn version(&self) -> ManifestResult<&str> {
        self.fields
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| ManifestError::MissingVersion {
                path: self.path.clone(),
            })
    }

    /// Replace the version in memory. Call [`persist`](Self::persist) to save.
    pub fn set_version(&mut self, version: &str) {
        self.fields
            .insert("version".to_string(), Value::String(version.to_string()));
    }

    /// Render as written to disk: two-space indentation, trailing newline.
    pub fn render(&self) -> ManifestResult<String> {
        let mut text =
            serde_json::to_string_pretty(&self.fields).map_err(|source| ManifestError::Parse {
                path: self.path.clone(),
                source,
            })?;
        text.push('\n');
        Ok(text)
    }

    /// Write the manifest back, replacing the file atomically.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn persist(&self) -> ManifestResult<()> {
        let text = self.render()?;
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(io_error("failed to write", &self.path))?;
        tmp.write_all(text.as_bytes())
            .map_err(io_error("failed to write", &self.path))?;
        // Keep the original file mode; temp files are created owner-only.
        if let Ok(meta) = fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(io_error("failed to write", &self.path))?;
        }
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .map_err(io_error("failed to replace", &self.path))?;
        info!(version = ?self.fields.get("version"), "manifest written");
        Ok(())
    }
}

/// Backup of the manifest held for the duration of a publish.
///
/// Restores the original manifest when dropped unless
/// [`restore`](Self::restore) already did.
#[derive(Debug)]
#[must_use = "dropping the guard restores the manifest immediately"]
pub struct ManifestGuard {
    manifest: Utf8PathBuf,
    backup: Utf8PathBuf,
    restored: bool,
}

impl ManifestGuard {
    /// Copy the manifest to its sibling backup file.
    #[instrument]
    pub fn backup(manifest: &Utf8Path) -> ManifestResult<Self> {
        let backup = Utf8PathBuf::from(format!("{manifest}{BACKUP_SUFFIX}"));
        fs::copy(manifest, &backup).map_err(io_error("failed to back up", manifest))?;
        info!(%backup, "manifest backed up");
        Ok(Self {
            manifest: manifest.to_path_buf(),
            backup,
            restored: false,
        })
    }

    /// Path of the backup file.
    pub fn backup_path(&self) -> &Utf8Path {
        &self.backup
    }

    /// Remove `fields` from the manifest on disk, one `npm pkg delete` each.
    #[instrument(skip(self, runner))]
    pub fn strip(
        &self,
        runner: &impl CommandRunner,
        fields: &[String],
        opts: &RunOptions,
    ) -> ManifestResult<()> {
        for field in fields {
            runner.run_buffered("npm", &["pkg", "delete", field], opts)?;
            debug!(%field, "stripped");
        }
        Ok(())
    }

    /// Move the backup back over the manifest.
    pub fn restore(mut self) -> ManifestResult<()> {
        self.restore_in_place()
    }

    fn restore_in_place(&mut self) -> ManifestResult<()> {
        fs::rename(&self.backup, &self.manifest)
            .map_err(io_error("failed to restore", &self.manifest))?;
        self.restored = true;
        info!(manifest = %self.manifest, "manifest restored");
        Ok(())
    }
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(err) = self.restore_in_place() {
            warn!(error = %err, backup = %self.backup, "could not restore manifest");
        }
    }
}
