use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{error::LoggerError, format::LoggerFormat};

pub const ENV_LOG_LEVEL: &str = "MEMQ_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "MEMQ_LOG_FORMAT";
pub const ENV_QUEUE_LOG_LEVEL: &str = "MEMQ_QUEUE_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `"info"` or `"memq_core=trace,info"`.
    pub level: String,
    /// Level for the queue's own spans (`memq_core` target), layered over `level`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_level: Option<String>,
    pub with_targets: bool,
    pub use_color: bool,
}

impl LoggerConfig {
    /// Defaults overridden by `MEMQ_LOG_LEVEL`, `MEMQ_QUEUE_LOG_LEVEL` and `MEMQ_LOG_FORMAT`
    /// when set.
    pub fn from_env() -> Result<Self, LoggerError> {
        let mut cfg = Self::default();
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            cfg.level = level;
        }
        if let Ok(level) = std::env::var(ENV_QUEUE_LOG_LEVEL) {
            cfg.queue_level = Some(level);
        }
        if let Ok(format) = std::env::var(ENV_LOG_FORMAT) {
            cfg.format = format.parse()?;
        }
        Ok(cfg)
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            queue_level: None,
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
        }
    }
}
