use super::{types::Config, ConfigError};

/// Longest accepted grace or settle delay.
const MAX_DELAY_MS: u64 = 60_000;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Campaign grace and settle delays are within (0, 60s]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Campaign validation
    check_delay("campaign.grace_interval_ms", config.campaign.grace_interval_ms)?;
    check_delay("campaign.settle_delay_ms", config.campaign.settle_delay_ms)?;

    Ok(())
}

fn check_delay(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_DELAY_MS {
        return Err(ConfigError::ValidationError(format!(
            "{} must be between 1 and {} (got {})",
            name, MAX_DELAY_MS, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Config::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_grace_fails() {
        let mut config = Config::default();
        config.campaign.grace_interval_ms = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("campaign.grace_interval_ms"));
    }

    #[test]
    fn test_validate_settle_too_long_fails() {
        let mut config = Config::default();
        config.campaign.settle_delay_ms = 120_000;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("campaign.settle_delay_ms"));
    }
}
