use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::freshness::FreshnessConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::source::ServiceNowConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub servicenow: ServiceNowConfig,
    #[serde(default)]
    pub cache: OrchestratorConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub change_bus: ChangeBusConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Durable cache database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("snowdash.db")
}

/// In-process change bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangeBusConfig {
    #[serde(default = "default_bus_enabled")]
    pub enabled: bool,
    /// Events buffered per subscriber before it starts lagging.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for ChangeBusConfig {
    fn default() -> Self {
        Self {
            enabled: default_bus_enabled(),
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_enabled() -> bool {
    true
}

fn default_bus_capacity() -> usize {
    256
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub servicenow: SanitizedServiceNowConfig,
    pub cache: OrchestratorConfig,
    pub freshness: FreshnessConfig,
    pub change_bus: ChangeBusConfig,
}

/// Sanitized ServiceNow config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServiceNowConfig {
    pub instance_url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u64,
    pub include_slas: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            servicenow: SanitizedServiceNowConfig {
                instance_url: config.servicenow.instance_url.clone(),
                username: config.servicenow.username.clone(),
                password_configured: !config.servicenow.password.is_empty(),
                timeout_secs: config.servicenow.timeout_secs,
                include_slas: config.servicenow.include_slas,
            },
            cache: config.cache.clone(),
            freshness: config.freshness.clone(),
            change_bus: config.change_bus.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[servicenow]
instance_url = "https://example.service-now.com"
username = "admin"
password = "hunter2"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path.to_str().unwrap(), "snowdash.db");
        assert_eq!(config.cache.fetch_timeout_ms, 10_000);
        assert_eq!(config.freshness, FreshnessConfig::default());
        assert!(config.change_bus.enabled);
        assert_eq!(config.change_bus.capacity, 256);
    }

    #[test]
    fn test_deserialize_missing_servicenow_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9090

[database]
path = "/var/lib/snowdash/cache.db"

[servicenow]
instance_url = "https://example.service-now.com"
username = "admin"
password = "hunter2"
timeout_secs = 10
include_slas = false

[cache]
fetch_timeout_ms = 5000
serve_stale_on_upstream_error = true

[freshness]
critical_ttl_ms = 30000

[change_bus]
enabled = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.servicenow.timeout_secs, 10);
        assert!(!config.servicenow.include_slas);
        assert_eq!(config.cache.fetch_timeout_ms, 5000);
        assert!(config.cache.serve_stale_on_upstream_error);
        assert_eq!(config.freshness.critical_ttl_ms, 30_000);
        assert!(!config.change_bus.enabled);
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.servicenow.password_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("password_configured"));
    }
}
