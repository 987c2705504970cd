/// Service configuration.
///
/// Settings live in a TOML file; the service root and timeout can be
/// overridden from the environment (a `.env` file is honored) so deployments
/// can point the same config at different backends.

use std::env;
use std::fs;

use serde::Deserialize;

use crate::logging::LogLevel;
use crate::transport::REQUEST_TIMEOUT_SECS;

/// Environment variable overriding `[service] root`.
pub const ENV_SERVICE_ROOT: &str = "CATALOG_SERVICE_ROOT";
/// Environment variable overriding `[service] timeout_secs`.
pub const ENV_TIMEOUT_SECS: &str = "CATALOG_TIMEOUT_SECS";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[service]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceSection {
    /// Datastore name used in identifiers and requirement checks.
    pub name: String,
    /// Web service root, already carrying the common request parameters
    /// (ends with "?service=...&datasource=N").
    pub root: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> LoggingSection {
        LoggingSection { level: default_log_level(), file: None }
    }
}

fn default_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "Info".to_string()
}

impl ServiceConfig {
    /// Loads the config file and applies environment overrides.
    pub fn load(path: &str) -> Result<ServiceConfig, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("reading config file {}: {}", path, e))?;
        let mut config = ServiceConfig::parse(&text)
            .map_err(|e| format!("parsing config file {}: {}", path, e))?;

        dotenv::dotenv().ok();
        if let Ok(root) = env::var(ENV_SERVICE_ROOT) {
            config.service.root = root;
        }
        if let Ok(timeout) = env::var(ENV_TIMEOUT_SECS) {
            config.service.timeout_secs = timeout
                .parse()
                .map_err(|_| format!("{} must be a number of seconds, not \"{}\"", ENV_TIMEOUT_SECS, timeout))?;
        }
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<ServiceConfig, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Parsed minimum log level; unknown names fall back to Info.
    pub fn log_level(&self) -> LogLevel {
        match self.logging.level.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warning" | "warn" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}
