//! Configuration Loader
//!
//! Environment-aware loading: a base `freshmaker.toml`, an optional
//! `freshmaker.<env>.toml` overlay and `FRESHMAKER__SECTION__KEY` environment
//! overrides, merged in that order.

use super::error::{ConfigResult, ConfigurationError};
use super::FreshmakerConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_NAME: &str = "freshmaker.toml";
const ENV_PREFIX: &str = "FRESHMAKER";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: FreshmakerConfig,
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
    /// Useful for testing without modifying process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            catalog_url = %config.catalog.server_url,
            dry_run = config.dry_run,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &FreshmakerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the current environment from `FRESHMAKER_ENV`
    pub fn detect_environment() -> String {
        env::var("FRESHMAKER_ENV").unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("FRESHMAKER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge(directory: &Path, environment: &str) -> ConfigResult<FreshmakerConfig> {
        let base_path = directory.join(BASE_FILE_NAME);
        if !base_path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound {
                searched_paths: vec![base_path],
            });
        }
        let env_path = directory.join(format!("freshmaker.{environment}.toml"));

        let merged = Config::builder()
            .add_source(File::from(base_path.as_path()).format(FileFormat::Toml))
            .add_source(
                File::from(env_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ConfigurationError::load_failed(base_path.display().to_string(), e))?;

        merged
            .try_deserialize::<FreshmakerConfig>()
            .map_err(|e| ConfigurationError::load_failed(base_path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_base_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigFileNotFound { .. }));
    }

    #[test]
    fn test_environment_overlay_wins_over_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("freshmaker.toml"),
            r#"
            dry_run = false

            [catalog]
            server_url = "https://catalog.example.com/"
            network_timeout_ms = 1000

            [rebuild]
            rebuilt_nvr_release_suffix = ".p"
            bundle_autorebuild_tag_exceptions = ["foo-operator-2.1"]

            [api]
            base_url = "https://freshmaker.example.com/"
            "#,
        )
        .unwrap();
        fs::write(
            dir.path().join("freshmaker.test.toml"),
            r#"
            dry_run = true
            "#,
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let config = manager.config();
        assert!(config.dry_run);
        assert_eq!(config.catalog.network_timeout_ms, 1000);
        assert_eq!(
            config.rebuild.bundle_autorebuild_tag_exceptions,
            vec!["foo-operator-2.1".to_string()]
        );
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_invalid_loaded_config_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("freshmaker.toml"), "dry_run = true\n").unwrap();
        let err =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingRequiredField { .. }
        ));
    }
}
