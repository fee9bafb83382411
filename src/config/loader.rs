//! Configuration Loader
//!
//! Environment-aware configuration loading: YAML file discovery, environment
//! detection, override merging and `DATABASE_URL` expansion.

use super::error::{ConfigResult, ConfigurationError};
use super::CaseworkConfig;
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_NAMES: [&str; 2] = ["casework-config.yaml", "casework-config.yml"];
const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];

pub struct ConfigManager {
    config: CaseworkConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Tests use this to avoid touching process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let mut config = Self::load_and_merge_config(&config_directory, environment)?;

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }

        config.validate()?;

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            environment = environment,
            database_host = %config.database.host,
            worker_pool_size = config.orchestration.worker_pool_size,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration
    pub fn from_config(config: CaseworkConfig) -> Arc<ConfigManager> {
        let environment = if config.environment.is_empty() {
            Self::detect_environment()
        } else {
            config.environment.clone()
        };
        Arc::new(ConfigManager {
            config,
            environment,
            config_directory: PathBuf::from("config"),
        })
    }

    pub fn config(&self) -> &CaseworkConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Sanitized configuration for debugging that masks sensitive fields
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Detect current environment: CASEWORK_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("CASEWORK_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                "Configuration file exceeds 1MB limit",
            ));
        }

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "file_type",
                "directory or special file",
                "Configuration path must point to a regular file",
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    fn sanitize_config_for_logging(config: &CaseworkConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "url"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        if !val.is_null() {
                            *val = serde_json::Value::String("[MASKED]".to_string());
                        }
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in CONFIG_FILE_NAMES {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.exists() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<CaseworkConfig> {
        let config_file = Self::find_config_file(config_directory)?;
        let yaml_content = Self::read_config_file_safely(&config_file)?;

        let mut yaml_data: YamlValue = serde_yaml::from_str(&yaml_content)
            .map_err(|e| ConfigurationError::invalid_yaml(config_file.display().to_string(), e))?;

        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!("Applying environment-specific overrides for: {}", environment);
            Self::merge_yaml_values(&mut yaml_data, env_overrides);
        }

        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(YamlValue::String(section.to_string()));
            }
        }

        let mut config: CaseworkConfig = serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(
                config_file.display().to_string(),
                format!("Failed to deserialize configuration: {e}"),
            )
        })?;

        config.environment = environment.to_string();

        Ok(config)
    }

    /// Recursively merge YAML values (environment overrides into base config)
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value);
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
