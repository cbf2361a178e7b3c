//! Layered configuration loading.
//!
//! Later layers override earlier ones:
//!
//! 1. built-in defaults
//! 2. a TOML or JSON file
//! 3. a `.env` file (feeds the process environment)
//! 4. environment variables `PREFIX__SECTION__KEY`

use std::env;
use std::fs;
use std::path::Path;

use crate::schema::LogFormat;
use crate::{ConfigError, CourierConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "COURIER";

/// Builds a [`CourierConfig`] from layered sources.
///
/// ```no_run
/// use courier_config::ConfigLoader;
///
/// # fn main() -> Result<(), courier_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("courier.toml")?
///     .with_dotenv()?
///     .with_env_prefix("COURIER")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: CourierConfig,
    env_prefix: Option<String>,
    env_vars: Option<Vec<(String, String)>>,
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to the built-in defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = CourierConfig::default();
        self
    }

    /// Loads a file; the format follows the extension (`.toml` or `.json`).
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, malformed, or has unknown
    /// keys.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;

        Ok(self)
    }

    /// Loads a file if it exists.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in the given format (`toml` or
    /// `json`).
    ///
    /// ```
    /// use courier_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[broker]\ntopic = \"orders\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.broker.topic, "orders");
    /// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if parsing fails or the format is unknown.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Loads `.env` from the working directory into the process environment,
    /// if present.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv(e)),
        }
    }

    /// Enables environment overrides of the form `PREFIX__SECTION__KEY`,
    /// e.g. `COURIER__INGEST__MAX_PAYLOAD_BYTES=2048`.
    ///
    /// Empty values are ignored.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails if an override cannot be parsed or validation fails.
    pub fn load(self) -> Result<CourierConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    ///
    /// # Errors
    ///
    /// Fails if an override cannot be parsed.
    pub fn load_unvalidated(mut self) -> Result<CourierConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars = self
                .env_vars
                .take()
                .unwrap_or_else(|| env::vars().collect());
            self.apply_env_overrides(&prefix, vars)?;
        }
        Ok(self.config)
    }

    fn parse_file(content: &str, path: &Path) -> Result<CourierConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(
        &mut self,
        prefix: &str,
        vars: Vec<(String, String)>,
    ) -> Result<(), ConfigError> {
        let section_prefix = format!("{prefix}__");

        for (key, value) in vars {
            let Some(path) = key.strip_prefix(&section_prefix) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            self.apply_env_var(&key, path, value.trim())?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, path: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }

            ["INGEST", "MAX_PAYLOAD_BYTES"] => {
                config.ingest.max_payload_bytes = parse_int(key, value)?;
            }
            ["INGEST", "ENQUEUE_TIMEOUT_MS"] => {
                config.ingest.enqueue_timeout_ms = parse_int(key, value)?;
            }

            ["BROKER", "SERVERS"] => {
                config.broker.servers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["BROKER", "TOPIC"] => config.broker.topic = value.to_string(),
            ["BROKER", "CONNECT_TIMEOUT_MS"] => {
                config.broker.connect_timeout_ms = parse_int(key, value)?;
            }

            ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = value.to_string(),

            // Unknown keys are ignored so unrelated COURIER__ variables do not
            // break startup.
            _ => {}
        }

        Ok(())
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected non-negative integer"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> ConfigLoader {
        ConfigLoader::new()
            .with_env_prefix(DEFAULT_ENV_PREFIX)
            .with_env_vars(vars.iter().map(|(k, v)| (*k, *v)))
    }

    #[test]
    fn test_defaults_load() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, CourierConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = env(&[
            ("COURIER__SERVER__HTTP_ADDR", "127.0.0.1:9000"),
            ("COURIER__INGEST__MAX_PAYLOAD_BYTES", "2048"),
            ("COURIER__INGEST__ENQUEUE_TIMEOUT_MS", "250"),
            ("COURIER__BROKER__SERVERS", "nats://a:4222, nats://b:4222"),
            ("COURIER__BROKER__TOPIC", "orders"),
            ("COURIER__TELEMETRY__LOGGING__FORMAT", "pretty"),
            ("COURIER__TELEMETRY__METRICS__ENABLED", "true"),
        ])
        .load()
        .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:9000");
        assert_eq!(config.ingest.max_payload_bytes, 2048);
        assert_eq!(config.ingest.enqueue_timeout_ms, 250);
        assert_eq!(
            config.broker.servers,
            vec!["nats://a:4222".to_string(), "nats://b:4222".to_string()]
        );
        assert_eq!(config.broker.topic, "orders");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
        assert!(config.telemetry.metrics.enabled);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let config = env(&[
            ("COURIER__BROKER__TOPIC", ""),
            ("COURIER__INGEST__MAX_PAYLOAD_BYTES", "   "),
        ])
        .load()
        .unwrap();

        assert_eq!(config.broker.topic, "ingress-topic");
        assert_eq!(config.ingest.max_payload_bytes, 1_048_576);
    }

    #[test]
    fn test_env_parse_error_names_variable() {
        let err = env(&[("COURIER__INGEST__ENQUEUE_TIMEOUT_MS", "soon")])
            .load()
            .unwrap_err();

        match err {
            ConfigError::EnvParseError { var, .. } => {
                assert_eq!(var, "COURIER__INGEST__ENQUEUE_TIMEOUT_MS");
            }
            other => panic!("expected EnvParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_other_prefixes_and_unknown_keys_ignored() {
        let config = env(&[
            ("OTHER__BROKER__TOPIC", "nope"),
            ("COURIERX__BROKER__TOPIC", "nope"),
            ("COURIER__UNKNOWN__KEY", "whatever"),
        ])
        .load()
        .unwrap();

        assert_eq!(config.broker.topic, "ingress-topic");
    }

    #[test]
    fn test_env_validated_after_override() {
        let err = env(&[("COURIER__BROKER__TOPIC", "a.b")]).load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "broker.topic"));
    }

    #[test]
    fn test_toml_file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [server]
            http_addr = "127.0.0.1:8081"

            [broker]
            topic = "from-file"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .with_env_prefix("COURIER")
            .with_env_vars([("COURIER__BROKER__TOPIC", "from-env")])
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:8081");
        assert_eq!(config.broker.topic, "from-env");
        assert_eq!(config.ingest.enqueue_timeout_ms, 5000);
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"ingest": {{"max_payload_bytes": 4096}}}}"#).unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.ingest.max_payload_bytes, 4096);
    }

    #[test]
    fn test_missing_and_optional_files() {
        let err = ConfigLoader::new()
            .with_file("/definitely/not/here.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));

        let config = ConfigLoader::new()
            .with_optional_file("/definitely/not/here.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, CourierConfig::default());
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let result = ConfigLoader::new().with_string("[server]\nport = 80", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server: {{}}").unwrap();

        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
