//! Server settings: an optional TOML file (`DRILL_CONFIG_PATH`) with a
//! `PORT` override from the environment.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! max_problem_count = 500
//! session_problem_count = 40
//! ```

use std::path::Path;

use drill_core::complexity::{DEFAULT_MAX_PROBLEM_COUNT, MAX_PROBLEM_BUDGET};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("`{field}` is outside the allowed problem budget: {value}")]
    Budget { field: &'static str, value: u64 },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Budget for `/api/problems` when the request names none.
    pub max_problem_count: u64,
    /// Budget of the problem set behind a practice session.
    pub session_problem_count: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            max_problem_count: DEFAULT_MAX_PROBLEM_COUNT,
            session_problem_count: 50,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Reads `DRILL_CONFIG_PATH` and `PORT`. A broken file is logged and the
    /// defaults are used instead.
    pub fn from_env() -> Self {
        let config = match std::env::var("DRILL_CONFIG_PATH") {
            Ok(path) => match Self::load(&path) {
                Ok(config) => {
                    info!(target: "server", %path, "Loaded server config (TOML)");
                    config
                }
                Err(e) => {
                    error!(target: "server", %path, error = %e, "Failed to load server config; using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.with_port_override(std::env::var("PORT").ok().as_deref())
    }

    pub fn with_port_override(mut self, port: Option<&str>) -> Self {
        if let Some(raw) = port {
            match raw.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!(target: "server", port = raw, "Ignoring unparsable PORT"),
            }
        }
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_problem_count", self.max_problem_count),
            ("session_problem_count", self.session_problem_count),
        ] {
            if !(1..=MAX_PROBLEM_BUDGET).contains(&value) {
                return Err(ConfigError::Budget { field, value });
            }
        }
        Ok(())
    }
}
