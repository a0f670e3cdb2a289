//! Optional TOML configuration file
//!
//! ```toml
//! poll_interval_ms = 5
//!
//! [osc]
//! client_port = 9001
//! max_subscriptions = 64
//! ```

use anyhow::{Context, Result};
use oscmux::OscConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Delay between `update` calls
    pub poll_interval_ms: u64,
    pub osc: OscConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            osc: OscConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: CliConfig = toml::from_str(text)?;
        config.osc.validate()?;
        if config.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(CliConfig::parse("").unwrap(), CliConfig::default());
    }

    #[test]
    fn test_osc_table() {
        let config = CliConfig::parse(
            r#"
            poll_interval_ms = 20

            [osc]
            client_port = 9001
            max_publications = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.osc.client_port, 9001);
        assert_eq!(config.osc.max_publications, 4);
        assert_eq!(config.osc.max_ports, OscConfig::default().max_ports);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(CliConfig::parse("[osc]\nmax_packet_size = 8").is_err());
        assert!(CliConfig::parse("poll_interval_ms = 0").is_err());
    }
}
