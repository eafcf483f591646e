//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Merging with sensible defaults
//!
//! # Supported formats
//!
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - files passed with `--config`
//! - `.pkgrel.<ext>` in current directory or any parent
//! - `pkgrel.<ext>` in current directory or any parent
//! - `~/.config/pkgrel/config.<ext>` (user config)
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use pkgrel_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! let settings = config.release_settings();
//! println!("pushing to {}", settings.remote);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::NpmClient;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A config file given explicitly does not exist.
    #[error("config file not found: {path}")]
    MissingFile {
        /// The path that was passed in.
        path: Utf8PathBuf,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The configuration for pkgrel.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Release workflow overrides.
    pub release: Option<ReleaseConfig>,
}

/// The `[release]` table. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Registry tooling to drive (`npm`, `yarn` or `pnpm`).
    pub npm_client: Option<NpmClient>,
    /// Package script to run before the changelog is written.
    pub build_script: Option<String>,
    /// Request provenance attestation when publishing.
    pub provenance: Option<bool>,
    /// Git remote to push to (default: `origin`).
    pub remote: Option<String>,
    /// Prefix for release tags (default: none, so tags are `1.2.3`).
    pub tag_prefix: Option<String>,
    /// Release commit message; `%s` is replaced by the version.
    pub commit_message: Option<String>,
    /// Changelog path relative to the project root.
    pub changelog_file: Option<Utf8PathBuf>,
    /// Build output directory removed before the version is written.
    pub dist_dir: Option<Utf8PathBuf>,
    /// Top-level `package.json` fields removed for the duration of publish.
    pub publish_clean_fields: Option<Vec<String>>,
}

/// Project release conventions with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseSettings {
    /// Git remote to push to.
    pub remote: String,
    /// Prefix for release tags.
    pub tag_prefix: String,
    /// Release commit message template.
    pub commit_message: String,
    /// Changelog path relative to the project root.
    pub changelog_file: Utf8PathBuf,
    /// Build output directory relative to the project root.
    pub dist_dir: Utf8PathBuf,
    /// Fields stripped from the manifest while publishing.
    pub publish_clean_fields: Vec<String>,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            tag_prefix: String::new(),
            commit_message: "chore(release): publish version %s".to_string(),
            changelog_file: Utf8PathBuf::from("CHANGELOG.md"),
            dist_dir: Utf8PathBuf::from("dist"),
            publish_clean_fields: vec!["devDependencies".to_string(), "scripts".to_string()],
        }
    }
}

impl ReleaseSettings {
    /// The tag for `version`.
    pub fn tag_for(&self, version: &str) -> String {
        format!("{}{version}", self.tag_prefix)
    }

    /// The release commit message for `version`.
    pub fn commit_message_for(&self, version: &str) -> String {
        self.commit_message.replace("%s", version)
    }
}

impl Config {
    /// Resolve the `[release]` table against the built-in defaults.
    pub fn release_settings(&self) -> ReleaseSettings {
        let defaults = ReleaseSettings::default();
        let Some(release) = &self.release else {
            return defaults;
        };
        ReleaseSettings {
            remote: release.remote.clone().unwrap_or(defaults.remote),
            tag_prefix: release.tag_prefix.clone().unwrap_or(defaults.tag_prefix),
            commit_message: release
                .commit_message
                .clone()
                .unwrap_or(defaults.commit_message),
            changelog_file: release
                .changelog_file
                .clone()
                .unwrap_or(defaults.changelog_file),
            dist_dir: release.dist_dir.clone().unwrap_or(defaults.dist_dir),
            publish_clean_fields: release
                .publish_clean_fields
                .clone()
                .unwrap_or(defaults.publish_clean_fields),
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "pkgrel";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/pkgrel/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Explicit files are loaded after discovered files, later ones winning.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/pkgrel/config.<ext>`)
    /// 4. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            tracing::debug!(path = %project_config, "found project config");
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            if !file.is_file() {
                return Err(ConfigError::MissingFile { path: file.clone() });
            }
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    break;
                }
            }

            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/pkgrel/` on Linux, `~/Library/Application Support/pkgrel/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the local data directory path, used for log files.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}
