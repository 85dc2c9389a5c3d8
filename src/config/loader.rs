//! Configuration loader.
//!
//! Handles YAML file discovery, environment detection, and overlay merging.
//! The environment section (`development`, `test`, `production`) is merged
//! over the base document key by key, then stripped before deserialization.

use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

use super::error::{ConfigResult, ConfigurationError};
use super::FulfillmentConfig;

const CONFIG_FILE_NAMES: [&str; 2] = ["fulfillment-config.yaml", "fulfillment-config.yml"];
const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];

/// Loaded configuration plus the context it was resolved from
pub struct ConfigManager {
    config: FulfillmentConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    ///
    /// When no configuration file can be discovered the defaults are used;
    /// an explicit directory that lacks the file is still an error (see
    /// [`ConfigManager::load_from_directory_with_env`]).
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration with an explicit environment, useful for tests
    /// that must not touch process environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let (config_directory, config_file) = match config_dir {
            Some(dir) => {
                let file = Self::find_config_file(&dir)?;
                (dir, Some(file))
            }
            None => {
                let dir = Self::default_config_directory();
                let file = Self::find_config_file(&dir).ok();
                (dir, file)
            }
        };

        let mut config = match &config_file {
            Some(path) => {
                debug!(
                    environment = environment,
                    path = %path.display(),
                    "loading configuration"
                );
                Self::load_and_merge_config(path, environment)?
            }
            None => {
                debug!(
                    environment = environment,
                    "no configuration file found, using defaults"
                );
                FulfillmentConfig::default()
            }
        };

        config.system.environment = environment.to_string();
        config.validate()?;

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    fn detect_environment() -> String {
        env::var("FULFILLMENT_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// Default configuration directory: `config/` under the project root
    fn default_config_directory() -> PathBuf {
        if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
            return PathBuf::from(manifest_dir).join("config");
        }

        // walk up from the working directory looking for the config file
        if let Ok(mut current) = env::current_dir() {
            loop {
                let candidate = current.join("config");
                if CONFIG_FILE_NAMES.iter().any(|name| candidate.join(name).exists()) {
                    return candidate;
                }
                if !current.pop() {
                    break;
                }
            }
        }

        PathBuf::from("config")
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched = Vec::new();
        for name in CONFIG_FILE_NAMES {
            let path = config_directory.join(name);
            if path.exists() {
                return Ok(path);
            }
            searched.push(path);
        }
        Err(ConfigurationError::config_file_not_found(searched))
    }

    /// Parse the YAML file and merge the active environment's overlay
    fn load_and_merge_config(
        config_file: &Path,
        environment: &str,
    ) -> ConfigResult<FulfillmentConfig> {
        let yaml_content = std::fs::read_to_string(config_file)
            .map_err(|e| ConfigurationError::file_read_error(config_file.display().to_string(), e))?;

        let mut yaml_data: YamlValue = serde_yaml::from_str(&yaml_content)
            .map_err(|e| ConfigurationError::invalid_yaml(config_file.display().to_string(), e))?;

        if let Some(overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!(environment = environment, "applying environment overlay");
            Self::merge_yaml_values(&mut yaml_data, overrides);
        }

        if let YamlValue::Mapping(map) = &mut yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(YamlValue::String(section.to_string()));
            }
        }

        serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(
                config_file.display().to_string(),
                format!("failed to deserialize configuration: {e}"),
            )
        })
    }

    /// Recursively merge override values into the base document
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }
}

/// Global configuration singleton for hosts that want one shared instance
static GLOBAL_CONFIG: OnceLock<Arc<ConfigManager>> = OnceLock::new();
static CONFIG_LOCK: Mutex<()> = Mutex::new(());

impl ConfigManager {
    /// Get or initialize the global configuration instance.
    ///
    /// Never fails: an unloadable configuration falls back to defaults so
    /// embedding hosts keep running with the documented behavior.
    pub fn global() -> Arc<ConfigManager> {
        GLOBAL_CONFIG
            .get_or_init(|| {
                let _lock = CONFIG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                ConfigManager::load().unwrap_or_else(|e| {
                    warn!(error = %e, "configuration loading failed, using defaults");
                    Arc::new(ConfigManager {
                        config: FulfillmentConfig::default(),
                        environment: Self::detect_environment(),
                        config_directory: PathBuf::from("config"),
                    })
                })
            })
            .clone()
    }

    /// Initialize the global instance from a specific directory (first call wins)
    pub fn initialize_global(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let _lock = CONFIG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let manager = ConfigManager::load_from_directory(config_dir)?;
        let _ = GLOBAL_CONFIG.set(manager.clone());
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, contents: &str) {
        let mut file = std::fs::File::create(dir.join("fulfillment-config.yaml")).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_environment_overlay_merges_over_base() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
sla:
  call_center_minutes: 90
  operations_minutes: 300
retry:
  max_retries: 5

test:
  sla:
    call_center_minutes: 5
"#,
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let config = manager.config();

        // overlay wins for the overridden key only
        assert_eq!(config.sla.call_center_minutes, 5);
        assert_eq!(config.sla.operations_minutes, 300);
        assert_eq!(config.retry.max_retries, 5);
        // untouched sections keep defaults
        assert_eq!(config.sla.finance_minutes, 1440);
        assert_eq!(manager.environment(), "test");
        assert_eq!(config.system.environment, "test");
    }

    #[test]
    fn test_other_environment_sections_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
production:
  sla:
    call_center_minutes: 15
"#,
        );

        let manager = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "development",
        )
        .unwrap();
        assert_eq!(manager.config().sla.call_center_minutes, 60);
    }

    #[test]
    fn test_explicit_directory_without_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "sla: [not, a, mapping");
        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(result, Err(ConfigurationError::InvalidYaml { .. })));
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "sla:\n  returns_minutes: 0\n");
        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }
}
