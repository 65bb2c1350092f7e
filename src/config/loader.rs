//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::BaseDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "MGSL";

/// Config file name
const CONFIG_FILE_NAME: &str = "synclink.toml";

/// Directory under the platform config dir
const APP_DIR_NAME: &str = "synclink";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "MGSL_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `MGSL_CONFIG` environment variable (explicit path)
    /// 2. `./synclink.toml` (current directory)
    /// 3. `synclink/synclink.toml` in the per-user config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        debug!(path = ?config_path, "configuration loaded");

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Malformed environment overrides are ignored here.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(err) = apply_env_overrides(&mut config) {
            debug!(error = %err, "ignoring environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            self.config = load_from_file(path)?;
            apply_env_overrides(&mut self.config)?;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|p| p.exists())
}

/// Per-user config directory (`$XDG_CONFIG_HOME`, `~/Library/Application Support`
/// or `%APPDATA%`).
fn get_config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply environment variable overrides to the configuration.
///
/// - `MGSL_LOG_LEVEL=debug`
/// - `MGSL_LOG_FORMAT=json`
/// - `MGSL_WAIT_TIMEOUT_MS=500`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_LOG_LEVEL")) {
        config.logging.level = val;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_LOG_FORMAT")) {
        config.logging.format = match val.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => {
                return Err(ConfigError::env_parse(
                    format!("{ENV_PREFIX}_LOG_FORMAT"),
                    "Expected json, pretty or compact",
                ))
            }
        };
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_WAIT_TIMEOUT_MS")) {
        config.session.wait_timeout_ms = Some(val.parse().map_err(|_| {
            ConfigError::env_parse(format!("{ENV_PREFIX}_WAIT_TIMEOUT_MS"), "Invalid timeout")
        })?);
    }

    Ok(())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME))
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert!(loader.config().session.blocked_io);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("MGSL_WAIT_TIMEOUT_MS", "750");
        env::set_var("MGSL_LOG_FORMAT", "JSON");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().session.wait_timeout_ms, Some(750));
        assert_eq!(loader.config().logging.format, LogFormat::Json);

        env::remove_var("MGSL_WAIT_TIMEOUT_MS");
        env::remove_var("MGSL_LOG_FORMAT");
    }

    #[test]
    #[serial]
    fn test_bad_env_override() {
        env::set_var("MGSL_WAIT_TIMEOUT_MS", "soon");
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
        env::remove_var("MGSL_WAIT_TIMEOUT_MS");
    }
}
