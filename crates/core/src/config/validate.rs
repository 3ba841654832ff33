use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - ServiceNow instance URL is http(s) and credentials are present
/// - Timeouts and freshness TTLs are non-zero
/// - Freshness tiers keep their ordering
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // ServiceNow validation
    let url = config.servicenow.instance_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ConfigError::ValidationError(format!(
            "servicenow.instance_url must be an http(s) URL, got '{}'",
            url
        )));
    }
    if config.servicenow.username.is_empty() {
        return Err(ConfigError::ValidationError(
            "servicenow.username cannot be empty".to_string(),
        ));
    }
    if config.servicenow.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "servicenow.timeout_secs cannot be 0".to_string(),
        ));
    }

    // Cache validation
    if config.cache.fetch_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "cache.fetch_timeout_ms cannot be 0".to_string(),
        ));
    }
    if config.cache.health_probe_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "cache.health_probe_timeout_ms cannot be 0".to_string(),
        ));
    }
    if config.cache.publish_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "cache.publish_timeout_ms cannot be 0".to_string(),
        ));
    }

    // Freshness validation
    if let Some(tier) = config.freshness.zero_tier() {
        return Err(ConfigError::ValidationError(format!(
            "freshness.{} cannot be 0",
            tier
        )));
    }
    if let Some(violation) = config.freshness.ordering_violation() {
        return Err(ConfigError::ValidationError(violation));
    }

    // Change bus validation
    if config.change_bus.enabled && config.change_bus.capacity == 0 {
        return Err(ConfigError::ValidationError(
            "change_bus.capacity cannot be 0 when the bus is enabled".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::freshness::FreshnessConfig;

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[servicenow]
instance_url = "https://example.service-now.com"
username = "admin"
password = "secret"
"#,
        )
        .unwrap()
    }

    fn assert_invalid(config: &Config, needle: &str) {
        let result = validate_config(config);
        let Err(ConfigError::ValidationError(message)) = result else {
            panic!("expected validation error, got {:?}", result);
        };
        assert!(message.contains(needle), "message: {}", message);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        assert_invalid(&config, "server.port");
    }

    #[test]
    fn test_validate_instance_url_scheme() {
        let mut config = valid_config();
        config.servicenow.instance_url = "example.service-now.com".to_string();
        assert_invalid(&config, "instance_url");
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = valid_config();
        config.cache.fetch_timeout_ms = 0;
        assert_invalid(&config, "fetch_timeout_ms");

        let mut config = valid_config();
        config.servicenow.timeout_secs = 0;
        assert_invalid(&config, "timeout_secs");

        let mut config = valid_config();
        config.cache.publish_timeout_ms = 0;
        assert_invalid(&config, "publish_timeout_ms");
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = valid_config();
        config.freshness.high_ttl_ms = 0;
        assert_invalid(&config, "high_ttl_ms");
    }

    #[test]
    fn test_validate_tier_ordering() {
        let mut config = valid_config();
        config.freshness = FreshnessConfig {
            closed_ttl_ms: 1_000,
            ..Default::default()
        };
        assert_invalid(&config, "closed_ttl_ms");
    }

    #[test]
    fn test_validate_disabled_bus_ignores_capacity() {
        let mut config = valid_config();
        config.change_bus.enabled = false;
        config.change_bus.capacity = 0;
        assert!(validate_config(&config).is_ok());
    }
}
