//! Run configuration: defaults, TOML config file and command-line layers.
//!
//! Layers are merged in order, later layers winning field by field:
//! built-in defaults, then the config file, then command-line overrides.
//! The merged result is validated before a run starts.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::download::{CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, MediaTypeFilter};

/// Default media directory, relative to the working directory.
pub const DEFAULT_TARGET_DIRECTORY: &str = "./Media";

/// Accepted range for `max_concurrency`.
pub const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=100;

/// Accepted range for timeouts in seconds.
const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=3600;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config{}: {source}", .path.as_ref().map(|p| format!(" file {}", p.display())).unwrap_or_default())]
    Parse {
        /// Config file path, when parsing a file.
        path: Option<PathBuf>,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// One configuration layer; every field is optional.
///
/// The same shape is deserialized from the config file and built from
/// command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Directory receiving downloaded media.
    pub target_directory: Option<PathBuf>,
    /// Ceiling on concurrently running downloads.
    pub max_concurrency: Option<usize>,
    /// Keep bytes of rejected media types under their temporary name.
    pub keep_all_files: Option<bool>,
    /// Report the task list without network or filesystem changes.
    pub dry_run: Option<bool>,
    /// Media type allow-list, e.g. `["image/*", "application/pdf"]`.
    pub allowed_media_types: Option<Vec<String>>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Idle timeout between body reads in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parses a layer from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on syntax errors or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizeConfig {
    /// Directory receiving downloaded media; must exist before the run.
    pub target_directory: PathBuf,
    /// Ceiling on concurrently running downloads.
    pub max_concurrency: usize,
    /// Keep bytes of rejected media types under their temporary name.
    pub keep_all_files: bool,
    /// Report the task list without network or filesystem changes.
    pub dry_run: bool,
    /// Media types that are stored and mapped.
    pub allowed_media_types: MediaTypeFilter,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Idle timeout between body reads in seconds; `None` for no limit.
    pub read_timeout_secs: Option<u64>,
}

impl Default for LocalizeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_DIRECTORY)
    }
}

impl LocalizeConfig {
    /// Default settings for the given target directory.
    pub fn new(target_directory: impl Into<PathBuf>) -> Self {
        Self {
            target_directory: target_directory.into(),
            max_concurrency: DEFAULT_CONCURRENCY,
            keep_all_files: false,
            dry_run: false,
            allowed_media_types: MediaTypeFilter::default(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: None,
        }
    }

    /// Merges layers over the defaults (later layers win) and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the merged values are out of range.
    pub fn from_layers<'a, I>(layers: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a FileConfig>,
    {
        let config = layers
            .into_iter()
            .fold(Self::default(), |config, layer| config.apply(layer));
        config.validate()?;
        Ok(config)
    }

    /// Overlays the fields set in `layer`.
    #[must_use]
    pub fn apply(mut self, layer: &FileConfig) -> Self {
        if let Some(dir) = &layer.target_directory {
            self.target_directory.clone_from(dir);
        }
        if let Some(value) = layer.max_concurrency {
            self.max_concurrency = value;
        }
        if let Some(value) = layer.keep_all_files {
            self.keep_all_files = value;
        }
        if let Some(value) = layer.dry_run {
            self.dry_run = value;
        }
        if let Some(types) = &layer.allowed_media_types {
            self.allowed_media_types = MediaTypeFilter::new(types);
        }
        if let Some(value) = layer.connect_timeout_secs {
            self.connect_timeout_secs = value;
        }
        if layer.read_timeout_secs.is_some() {
            self.read_timeout_secs = layer.read_timeout_secs;
        }
        self
    }

    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "target_directory",
                message: "must not be empty".to_string(),
            });
        }
        if !CONCURRENCY_RANGE.contains(&self.max_concurrency) {
            return Err(ConfigError::Invalid {
                field: "max_concurrency",
                message: format!(
                    "{} is outside {}..={}",
                    self.max_concurrency,
                    CONCURRENCY_RANGE.start(),
                    CONCURRENCY_RANGE.end()
                ),
            });
        }
        validate_timeout("connect_timeout_secs", Some(self.connect_timeout_secs))?;
        validate_timeout("read_timeout_secs", self.read_timeout_secs)?;

        let patterns = self.allowed_media_types.patterns();
        if patterns.is_empty() {
            return Err(ConfigError::Invalid {
                field: "allowed_media_types",
                message: "must list at least one media type".to_string(),
            });
        }
        if let Some(bad) = patterns.iter().find(|p| *p != "*" && !p.contains('/')) {
            return Err(ConfigError::Invalid {
                field: "allowed_media_types",
                message: format!("`{bad}` is not a media type pattern"),
            });
        }
        Ok(())
    }
}

fn validate_timeout(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !TIMEOUT_RANGE_SECS.contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            message: format!("{value} is outside 1..=3600"),
        });
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// Indicates whether configuration was loaded from disk.
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mdlocal/config.toml`
/// 2. `$HOME/.config/mdlocal/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("mdlocal")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("mdlocal")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from an explicit path, or from the default path if present.
///
/// An explicit path must exist; a missing default file is not an error.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(FileConfig::load(path)?),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(p) if p.is_file() => Some(FileConfig::load(p)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = LocalizeConfig::from_layers([]).unwrap();
        assert_eq!(config.target_directory, PathBuf::from("./Media"));
        assert_eq!(config.max_concurrency, 5);
        assert!(!config.keep_all_files);
        assert!(!config.dry_run);
        assert_eq!(config.allowed_media_types, MediaTypeFilter::default());
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.read_timeout_secs, None);
    }

    #[test]
    fn test_parse_full_file() {
        let layer = FileConfig::from_toml_str(
            r#"
            target_directory = "assets/media"
            max_concurrency = 8
            keep_all_files = true
            dry_run = false
            allowed_media_types = ["image/*"]
            connect_timeout_secs = 10
            read_timeout_secs = 60
            "#,
        )
        .unwrap();

        let config = LocalizeConfig::from_layers([&layer]).unwrap();
        assert_eq!(config.target_directory, PathBuf::from("assets/media"));
        assert_eq!(config.max_concurrency, 8);
        assert!(config.keep_all_files);
        assert!(config.allowed_media_types.allows("image/png"));
        assert!(!config.allowed_media_types.allows("application/pdf"));
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.read_timeout_secs, Some(60));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = FileConfig::from_toml_str("max_concurency = 3");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_later_layers_win() {
        let file = FileConfig {
            max_concurrency: Some(8),
            keep_all_files: Some(true),
            ..FileConfig::default()
        };
        let cli = FileConfig {
            max_concurrency: Some(2),
            ..FileConfig::default()
        };

        let config = LocalizeConfig::from_layers([&file, &cli]).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert!(config.keep_all_files, "unset CLI fields keep file values");
    }

    #[test]
    fn test_concurrency_out_of_range_rejected() {
        for value in [0, 101] {
            let layer = FileConfig {
                max_concurrency: Some(value),
                ..FileConfig::default()
            };
            let err = LocalizeConfig::from_layers([&layer]).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { field: "max_concurrency", .. }),
                "got {err:?}"
            );
        }
    }

    #[test]
    fn test_timeout_out_of_range_rejected() {
        let layer = FileConfig {
            read_timeout_secs: Some(0),
            ..FileConfig::default()
        };
        let err = LocalizeConfig::from_layers([&layer]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "read_timeout_secs", .. }));
    }

    #[test]
    fn test_empty_allow_list_rejected() {
        let layer = FileConfig {
            allowed_media_types: Some(vec![]),
            ..FileConfig::default()
        };
        let err = LocalizeConfig::from_layers([&layer]).unwrap_err();
        assert!(err.to_string().contains("allowed_media_types"));
    }

    #[test]
    fn test_malformed_media_pattern_rejected() {
        let layer = FileConfig {
            allowed_media_types: Some(vec!["png".to_string()]),
            ..FileConfig::default()
        };
        let err = LocalizeConfig::from_layers([&layer]).unwrap_err();
        assert!(err.to_string().contains("png"));
    }

    #[test]
    fn test_load_file_config_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "max_concurrency = 3\n").unwrap();

        let loaded = load_file_config(Some(&path)).unwrap();
        assert!(loaded.loaded_from_file());
        assert_eq!(loaded.config.unwrap().max_concurrency, Some(3));
    }

    #[test]
    fn test_load_file_config_explicit_missing_is_error() {
        let temp = TempDir::new().unwrap();
        let result = load_file_config(Some(&temp.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "max_concurrency = \"many\"\n").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"), "got {err}");
    }
}
