//! Layered settings and versioned task records.
//!
//! [`Settings`] resolve in this order, later layers winning:
//! 1. built-in defaults
//! 2. a TOML file (`settings.toml` in the platform config directory unless a path is given)
//! 3. environment variables prefixed with `SAYONARA_` (`SAYONARA_ACTIVE_PRNG=system`)
//!
//! [`TaskConfig`] is the JSON record a task is built from. It carries no behavior.

use crate::algorithms::FREE_SPACE_FILE_UNIT;
use crate::crypto::PrngKind;
use crate::targets::TargetConfig;
use crate::{WipeError, WipeResult};
use ::config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "SAYONARA";
pub const TASK_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Method used by targets that do not name one
    pub default_unused_space_method: String,
    pub active_prng: PrngKind,
    /// Maximum size of one bulk-fill file
    pub fill_unit_bytes: u64,
    /// Upper bound on scratch files created while erasing resident data
    pub resident_file_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_unused_space_method: "random".to_string(),
            active_prng: PrngKind::default(),
            fill_unit_bytes: FREE_SPACE_FILE_UNIT,
            resident_file_limit: 65_536,
        }
    }
}

impl Settings {
    /// `settings.toml` in the per-user configuration directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "sayonara", "sayonara-freespace")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Load all layers. An explicit `path` must exist; the default one may be absent.
    pub fn load(path: Option<&Path>) -> WipeResult<Self> {
        let (file, required) = match path {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (Self::default_path(), false),
        };

        let mut builder = Config::builder();
        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), required, "Loading settings");
            builder = builder.add_source(
                File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text (no file or environment layers)
    pub fn from_toml_str(text: &str) -> WipeResult<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> WipeResult<()> {
        if self.fill_unit_bytes == 0 {
            return Err(WipeError::Config(
                "fill_unit_bytes must be greater than zero".to_string(),
            ));
        }
        if self.default_unused_space_method.trim().is_empty() {
            return Err(WipeError::Config(
                "default_unused_space_method must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialized form of a task: a name and its erasure targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub version: u32,
    pub name: String,
    pub targets: Vec<TargetConfig>,
}

impl TaskConfig {
    pub fn new(name: impl Into<String>, targets: Vec<TargetConfig>) -> Self {
        Self {
            version: TASK_CONFIG_VERSION,
            name: name.into(),
            targets,
        }
    }

    pub fn from_json(text: &str) -> WipeResult<Self> {
        let config: TaskConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> WipeResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> WipeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> WipeResult<()> {
        if self.version != TASK_CONFIG_VERSION {
            return Err(WipeError::Config(format!(
                "unsupported task version {} (expected {})",
                self.version, TASK_CONFIG_VERSION
            )));
        }
        if self.targets.is_empty() {
            return Err(WipeError::Config(format!(
                "task '{}' has no targets",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::UnusedSpaceConfig;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_unused_space_method, "random");
        assert_eq!(settings.fill_unit_bytes, 10 * 1024 * 1024);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            default_unused_space_method = "gutmann"
            active_prng = "system"
            "#,
        )
        .unwrap();

        assert_eq!(settings.default_unused_space_method, "gutmann");
        assert_eq!(settings.active_prng, PrngKind::System);
        assert_eq!(settings.fill_unit_bytes, FREE_SPACE_FILE_UNIT);
    }

    #[test]
    fn test_zero_fill_unit_rejected() {
        let result = Settings::from_toml_str("fill_unit_bytes = 0");
        assert!(matches!(result, Err(WipeError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "fill_unit_bytes = 4096\nactive_prng = \"userspace\"").unwrap();

        std::env::set_var("SAYONARA_ACTIVE_PRNG", "system");
        let settings = Settings::load(Some(file.path()));
        std::env::remove_var("SAYONARA_ACTIVE_PRNG");

        let settings = settings.unwrap();
        assert_eq!(settings.fill_unit_bytes, 4096);
        assert_eq!(settings.active_prng, PrngKind::System);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/settings.toml")));
        assert!(matches!(result, Err(WipeError::Config(_))));
    }

    #[test]
    fn test_task_config_json() {
        let config = TaskConfig::from_json(
            r#"{
                "version": 1,
                "name": "nightly",
                "targets": [
                    { "kind": "unused_space", "drive": "/srv", "erase_cluster_tips": true },
                    { "kind": "unused_space", "drive": "/home", "erase_cluster_tips": false, "method": "zero" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.targets.len(), 2);
        assert_eq!(
            config.targets[1],
            TargetConfig::UnusedSpace(UnusedSpaceConfig {
                drive: "/home".into(),
                erase_cluster_tips: false,
                method: Some("zero".to_string()),
            })
        );

        let again = TaskConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_task_config_version_checked() {
        let result = TaskConfig::from_json(r#"{"version": 2, "name": "x", "targets": []}"#);
        assert!(matches!(result, Err(WipeError::Config(msg)) if msg.contains("version")));
    }

    #[test]
    fn test_task_config_needs_targets() {
        let result = TaskConfig::new("empty", Vec::new()).validate();
        assert!(matches!(result, Err(WipeError::Config(_))));
    }
}
