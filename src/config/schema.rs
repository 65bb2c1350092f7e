//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the
//! keys it changes. Selector values inside port profiles are given by name,
//! e.g. `protocol = "bisync"` or `encoding = "fm0"`.

use crate::driver::Timeout;
use crate::settings::{Defaults, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Session I/O options
    pub session: SessionConfig,
    /// Named port profiles
    pub ports: BTreeMap<String, PortProfile>,
}

impl Config {
    /// Look up a port profile by alias.
    pub fn profile(&self, alias: &str) -> Option<&PortProfile> {
        self.ports.get(alias)
    }

    /// Resolve a name through the profile aliases to a device port name.
    pub fn resolve_port(&self, name: &str) -> String {
        self.ports
            .get(name)
            .map(|p| p.port.clone())
            .unwrap_or_else(|| name.to_string())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error" or a
    /// full `EnvFilter` string
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

/// Session I/O options applied when a port is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Default event wait timeout in milliseconds; absent waits forever
    pub wait_timeout_ms: Option<u64>,
    /// Block reads and writes until data moves
    pub blocked_io: bool,
    /// Return data from receive errors instead of discarding it
    pub ignore_read_errors: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: None,
            blocked_io: true,
            ignore_read_errors: true,
        }
    }
}

impl SessionConfig {
    /// Get the wait timeout as a [`Timeout`]
    pub fn wait_timeout(&self) -> Timeout {
        self.wait_timeout_ms
            .map_or(Timeout::Forever, Timeout::from_millis)
    }
}

/// A named port with the configuration to apply when it is opened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortProfile {
    /// Device port name, e.g. "MGHDLC1"
    pub port: String,
    /// Settings applied after open
    pub settings: Option<Settings>,
    /// Persistent defaults written after open
    pub defaults: Option<Defaults>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Encoding, Interface, Parity, Protocol};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.session.blocked_io);
        assert!(config.session.ignore_read_errors);
        assert_eq!(config.session.wait_timeout(), Timeout::Forever);
        assert!(config.ports.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [session]
            wait_timeout_ms = 250

            [ports.modem]
            port = "MGHDLC2"

            [ports.modem.settings]
            protocol = "async"
            encoding = "NRZ"
            async_data_rate = 4800
            async_parity = "even"

            [ports.modem.defaults]
            interface = "rs422"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.session.wait_timeout(),
            Timeout::After(Duration::from_millis(250))
        );
        // Defaults should still work
        assert!(config.session.blocked_io);

        let profile = config.profile("modem").unwrap();
        let settings = profile.settings.as_ref().unwrap();
        assert_eq!(settings.protocol, Protocol::Async);
        assert_eq!(settings.encoding, Encoding::Nrz);
        assert_eq!(settings.async_data_rate, 4800);
        assert_eq!(settings.async_parity, Parity::Even);
        assert_eq!(settings.async_data_bits, 8);
        assert_eq!(profile.defaults.unwrap().interface, Interface::Rs422);
        assert_eq!(config.resolve_port("modem"), "MGHDLC2");
        assert_eq!(config.resolve_port("MGHDLC7"), "MGHDLC7");
    }

    #[test]
    fn test_unknown_selector_name_fails() {
        let toml_str = r#"
            [ports.x]
            port = "MGHDLC1"
            settings = { protocol = "sdlc" }
        "#;
        let err = toml::from_str::<Config>(toml_str).unwrap_err();
        assert!(err.to_string().contains("unknown protocol 'sdlc'"));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.ports.insert(
            "line".to_string(),
            PortProfile {
                port: "MGHDLC1".to_string(),
                settings: Some(Settings::default()),
                defaults: None,
            },
        );
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[logging]"));
        assert!(toml_str.contains("[ports.line.settings]"));
        assert!(toml_str.contains("protocol = \"hdlc\""));

        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }
}
