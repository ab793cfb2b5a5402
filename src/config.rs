//! Process configuration.
//!
//! Read once at startup from environment variables:
//! - `HOST` / `PORT` - address the local API listens on (default `127.0.0.1:3000`)
//! - `WORKING_DIR` - root for persisted state (default: current directory)
//! - `VEO_POLL_INTERVAL_SECS` - seconds between status passes (default 5)
//! - `VEO_POLLING` - set to `false`/`0` to start with polling disabled
//!
//! The remote endpoint itself is not part of this config; it lives in the
//! persisted connection settings so it can be changed at runtime.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::poller::DEFAULT_POLL_INTERVAL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("cannot determine working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub working_dir: PathBuf,
    /// Directory the task collection and settings are saved in
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    /// Whether polling starts enabled
    pub polling_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match std::env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: v,
            })?,
            Err(_) => 3000,
        };

        let working_dir = match std::env::var("WORKING_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()?,
        };

        let poll_interval = match std::env::var("VEO_POLL_INTERVAL_SECS") {
            Ok(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "VEO_POLL_INTERVAL_SECS",
                        value: v,
                    })
                }
            },
            Err(_) => DEFAULT_POLL_INTERVAL,
        };

        let polling_enabled = std::env::var("VEO_POLLING")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Ok(Self {
            host,
            port,
            data_dir: working_dir.join(".veo-studio"),
            working_dir,
            poll_interval,
            polling_enabled,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag(""));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" OFF "));
        assert!(!parse_flag("0"));
    }
}
