//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: enables TOML files (`skillkit.toml`, `config.toml`)
//! - `yaml-config`: enables YAML files (`skillkit.yaml`, `skillkit.yml`, ...)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`skillkit.{profile}.toml`)
//! 3. Main config file (`skillkit.toml` / `skillkit.yaml`)
//! 4. Environment variables (`SKILLKIT_*`)
//! 5. Programmatic overrides via [`ConfigLoader::set`]
//!
//! [`ConfigLoader::merge`] supplies a whole [`SkillConfig`] as the base
//! layer instead, so files and the environment still apply on top of it.
//!
//! # Environment Variable Mapping
//!
//! Variables use the `SKILLKIT_` prefix with `__` as the nesting separator:
//!
//! - `SKILLKIT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `SKILLKIT_DISPATCH__APP_ID=amzn1.ask.skill.x` → `dispatch.app_id = "amzn1.ask.skill.x"`
//! - `SKILLKIT_STORAGE__BACKEND=file` → `storage.backend = "file"`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./skillkit.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SkillConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "SKILLKIT_";
const PROFILE_VAR: &str = "SKILLKIT_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev` and `prod` short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `SKILLKIT_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Replaces the built-in defaults.
    defaults: Figment,
    /// Keyed overrides, merged last.
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (disables searching).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the profile taken from the environment.
    pub fn new() -> Self {
        Self {
            defaults: Figment::new(),
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/skillkit` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("skillkit")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Uses `config` as the base layer in place of the built-in defaults.
    pub fn merge(mut self, config: SkillConfig) -> Self {
        self.defaults = self.defaults.merge(Serialized::defaults(config));
        self
    }

    /// Overrides one dotted key, e.g. `set("logging.level", "debug")`,
    /// on top of every other source.
    pub fn set<V: Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<SkillConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: SkillConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            attributes_table = ?config.dispatch.attributes_table,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let base = std::mem::take(&mut self.defaults);
        let mut figment = Figment::from(Serialized::defaults(SkillConfig::default())).merge(base);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, path)?;
        } else if let Some(found) = self.locate() {
            if let Some(overlay) = &found.profile {
                debug!(path = %overlay.display(), "Loading profile-specific config");
                figment = merge_config_file(figment, overlay)?;
            }
            info!(path = %found.main.display(), "Loading configuration file");
            figment = merge_config_file(figment, &found.main)?;
        } else {
            warn!("No configuration file found, using defaults");
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("skillkit")))
            .collect()
    }

    /// Finds the first main config file, directory by directory, and its
    /// `<stem>.<profile>.<ext>` sibling if one exists.
    fn locate(&self) -> Option<FoundFiles> {
        let names = candidate_names();
        self.resolve_search_paths().into_iter().find_map(|dir| {
            names.iter().map(|name| dir.join(name)).find(|p| p.exists())
        })
        .map(|main| FoundFiles {
            profile: profile_variant(&main, &self.profile).filter(|p| p.exists()),
            main,
        })
    }
}

struct FoundFiles {
    main: PathBuf,
    profile: Option<PathBuf>,
}

/// File names searched for, in priority order, for the enabled formats.
#[cfg_attr(
    not(any(feature = "toml-config", feature = "yaml-config")),
    allow(unused_mut)
)]
fn candidate_names() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "toml-config")]
    names.extend(["skillkit.toml", "config.toml"]);
    #[cfg(feature = "yaml-config")]
    names.extend(["skillkit.yaml", "skillkit.yml", "config.yaml", "config.yml"]);
    names
}

fn profile_variant(main: &Path, profile: &Profile) -> Option<PathBuf> {
    let stem = main.file_stem()?.to_str()?;
    let ext = main.extension()?.to_str()?;
    Some(main.with_file_name(format!("{stem}.{profile}.{ext}")))
}

/// Merges a single file, dispatching on its extension.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<SkillConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<SkillConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, StorageBackend};
    use skillkit_framework::DispatchConfig;

    fn isolated() -> (tempfile::TempDir, ConfigLoader) {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new()
            .without_env()
            .profile("test")
            .search_path(dir.path());
        (dir, loader)
    }

    #[test]
    fn test_default_config() {
        let (_dir, loader) = isolated();
        let config = loader.load().unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config, SkillConfig::default());
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Development"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/skillkit.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skillkit.ini");
        std::fs::write(&path, "level = debug").unwrap();

        let err = ConfigLoader::new()
            .without_env()
            .file(&path)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn test_programmatic_override() {
        let (_dir, loader) = isolated();
        let config = loader
            .merge(SkillConfig {
                dispatch: DispatchConfig {
                    attributes_table: Some("sessions".into()),
                    ..Default::default()
                },
                storage: crate::config::StorageConfig {
                    backend: StorageBackend::Memory,
                    base_dir: None,
                },
                ..Default::default()
            })
            .load()
            .unwrap();

        assert_eq!(config.dispatch.attributes_table.as_deref(), Some("sessions"));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_override_failing_validation() {
        let (_dir, loader) = isolated();
        let err = loader
            .merge(SkillConfig {
                dispatch: DispatchConfig {
                    attributes_table: Some("sessions".into()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_set_overrides_base_layer() {
        let (_dir, loader) = isolated();
        let config = loader
            .merge(SkillConfig {
                logging: crate::config::LoggingConfig {
                    level: LogLevel::Warn,
                    thread_ids: true,
                    ..Default::default()
                },
                ..Default::default()
            })
            .set("logging.level", "debug")
            .set("dispatch.app_id", "amzn1.ask.skill.y")
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.thread_ids);
        assert_eq!(config.dispatch.app_id.as_deref(), Some("amzn1.ask.skill.y"));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_with_profile() {
        let (dir, loader) = isolated();
        std::fs::write(
            dir.path().join("skillkit.test.toml"),
            "[logging]\nlevel = \"trace\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("skillkit.toml"),
            "[dispatch]\napp_id = \"amzn1.ask.skill.x\"\n",
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.dispatch.app_id.as_deref(), Some("amzn1.ask.skill.x"));
        assert_eq!(config.logging.level, LogLevel::Trace);
    }
}
