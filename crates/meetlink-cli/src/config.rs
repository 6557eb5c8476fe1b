//! CLI configuration file

use anyhow::{Context, Result};
use meetlink_client::{DefaultBrowserBehavior, SignalingClientConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Contents of `meetlink.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub signaling: SignalingClientConfig,
    pub browser: DefaultBrowserBehavior,
}

impl CliConfig {
    /// Load from `path`, or from the user config dir if present, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        debug!("loading config from {}", path.display());
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: CliConfig = toml::from_str(text)?;
        config.signaling.validate()?;
        Ok(config)
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("meetlink").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(CliConfig::parse("").unwrap(), CliConfig::default());
    }

    #[test]
    fn test_sections() {
        let config = CliConfig::parse(
            r#"
            [signaling]
            ping_pong_interval_ms = 5000
            max_num_of_videos = 9

            [signaling.client_details]
            app_name = "meetlink-cli"

            [browser]
            firefox = true
            send_side_bwe = false
            "#,
        )
        .unwrap();
        assert_eq!(config.signaling.ping_pong_interval_ms, 5000);
        assert_eq!(config.signaling.max_num_of_videos, 9);
        assert_eq!(config.signaling.close_timeout_ms, 2000);
        assert_eq!(config.signaling.client_details.app_name, "meetlink-cli");
        assert!(config.browser.firefox);
        assert!(!config.browser.send_side_bwe);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(CliConfig::parse("[signaling]\nclose_timeout_ms = 0\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(CliConfig::load(Some(Path::new("/nonexistent/meetlink.toml"))).is_err());
    }
}
