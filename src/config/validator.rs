//! Configuration validation

use super::LaunchConfig;
use anyhow::Result;

/// Validate launcher settings
pub fn validate_launch(config: &LaunchConfig) -> Result<()> {
    if config.np == 0 {
        anyhow::bail!("np must be at least 1");
    }

    if config.port_range == 0 {
        anyhow::bail!("port_range must be at least 1");
    }

    if config.connect_timeout_ms == 0 {
        anyhow::bail!("connect_timeout_ms must be greater than 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_launch(&LaunchConfig::default()).is_ok());
    }

    #[test]
    fn test_single_process_is_valid() {
        let config = LaunchConfig { np: 1, ..Default::default() };
        assert!(validate_launch(&config).is_ok());
    }

    #[test]
    fn test_rejects_zero_values() {
        let config = LaunchConfig { np: 0, ..Default::default() };
        assert!(validate_launch(&config).is_err());

        let config = LaunchConfig { port_range: 0, ..Default::default() };
        assert!(validate_launch(&config).is_err());

        let config = LaunchConfig { connect_timeout_ms: 0, ..Default::default() };
        assert!(validate_launch(&config).is_err());
    }
}
