//! Layered application configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional YAML file,
//! `CALCULATOR__*` environment variables (nested keys split on `__`, e.g.
//! `CALCULATOR__CLIENT__PORT=9091`), then command-line overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use calculator_sdk::{ClientConfig, ValidationLimits};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "CALCULATOR__";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Upper bound for draining in-flight calls after a shutdown signal.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".to_owned(),
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if `listen_addr` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.listen_addr '{}': {e}", self.listen_addr)))
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub validation: ValidationLimits,
    pub logging: LoggingConfig,
}

/// Values from the command line that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Port for both the listener and the client.
    pub port: Option<u16>,
    pub host: Option<String>,
}

impl AppConfig {
    /// Build the layered provider without extracting it.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingFile`] if `path` is given but is not a file.
    pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load defaults, the optional YAML file and the environment, then validate.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if a source cannot be read or parsed, or if
    /// the merged values are inconsistent.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(path)?)
    }

    /// # Errors
    /// Returns a [`ConfigError`] if extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(port) = overrides.port {
            self.client.port = port;
            if let Ok(mut addr) = self.server.listen_addr.parse::<SocketAddr>() {
                addr.set_port(port);
                self.server.listen_addr = addr.to_string();
            }
        }
        if let Some(host) = &overrides.host {
            self.client.host.clone_from(host);
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if self.client.host.trim().is_empty() {
            return Err(ConfigError::Invalid("client.host must not be empty".to_owned()));
        }
        if self.client.max_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "client.max_retry_attempts must be at least 1".to_owned(),
            ));
        }
        if self.client.request_timeout_secs == 0 || self.client.connection_timeout_secs == 0 {
            return Err(ConfigError::Invalid("client timeouts must be positive".to_owned()));
        }

        let limits = &self.validation;
        if limits.min_safe_value.is_nan()
            || limits.max_safe_value.is_nan()
            || limits.min_safe_value >= limits.max_safe_value
        {
            return Err(ConfigError::Invalid(format!(
                "validation.min_safe_value ({}) must be below validation.max_safe_value ({})",
                limits.min_safe_value, limits.max_safe_value
            )));
        }
        if limits.max_exponent.is_nan() || limits.max_exponent <= 0.0 {
            return Err(ConfigError::Invalid(
                "validation.max_exponent must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_saphyr::to_string(self).map_err(|e| ConfigError::Render(e.to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.listen_addr, "0.0.0.0:9090");
        assert_eq!(cfg.server.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.client.port, 9090);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let file = write_yaml(
            "server:\n  listen_addr: \"127.0.0.1:7000\"\nclient:\n  port: 7000\n  max_retry_attempts: 5\nvalidation:\n  max_exponent: 50\n",
        );
        let figment = AppConfig::figment(Some(file.path())).unwrap();
        let cfg = AppConfig::from_figment(&figment).unwrap();

        assert_eq!(cfg.server.listen_addr, "127.0.0.1:7000");
        assert_eq!(cfg.client.port, 7000);
        assert_eq!(cfg.client.max_retry_attempts, 5);
        assert_eq!(cfg.client.host, "localhost");
        assert!((cfg.validation.max_exponent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load_or_default(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_yaml("client:\n  prot: 1\n");
        let figment = AppConfig::figment(Some(file.path())).unwrap();
        assert!(matches!(
            AppConfig::from_figment(&figment),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_inconsistent_limits_rejected() {
        let mut cfg = AppConfig::default();
        cfg.validation.min_safe_value = 10.0;
        cfg.validation.max_safe_value = 1.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_listen_addr_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.listen_addr = "nowhere".to_owned();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("server.listen_addr"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut cfg = AppConfig::default();
        cfg.apply_cli_overrides(&CliOverrides {
            port: Some(9191),
            host: Some("calc.internal".to_owned()),
        });
        assert_eq!(cfg.server.listen_addr, "0.0.0.0:9191");
        assert_eq!(cfg.client.port, 9191);
        assert_eq!(cfg.client.endpoint_uri(), "http://calc.internal:9191");
    }

    #[test]
    fn test_yaml_rendering_round_trips() {
        let cfg = AppConfig::default();
        let yaml = cfg.to_yaml().unwrap();
        assert!(yaml.contains("listen_addr"));
        let parsed: AppConfig = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(parsed, cfg);
    }
}
