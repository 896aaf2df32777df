use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Construction parameters for a [`Queue`](crate::Queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfig {
    /// Admission buffer size: how many tasks may wait unclaimed before `push` blocks.
    pub capacity: usize,
    /// Maximum number of idle wait cells kept for reuse.
    ///
    /// `None` keeps up to `capacity` cells; `Some(0)` disables pooling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_limit: Option<usize>,
}

impl QueueConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pool_limit: None,
        }
    }

    pub fn with_pool_limit(mut self, limit: usize) -> Self {
        self.pool_limit = Some(limit);
        self
    }

    #[inline]
    pub fn effective_pool_limit(&self) -> usize {
        self.pool_limit.unwrap_or(self.capacity)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(QueueConfig::new(0).validate(), Err(ConfigError::ZeroCapacity));
        assert!(QueueConfig::new(1).validate().is_ok());
    }

    #[test]
    fn pool_limit_defaults_to_capacity() {
        let cfg = QueueConfig::new(16);
        assert_eq!(cfg.effective_pool_limit(), 16);
        assert_eq!(cfg.with_pool_limit(0).effective_pool_limit(), 0);
    }

    #[test]
    fn deserialize_fills_missing_fields() {
        let cfg: QueueConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, QueueConfig::default());

        let cfg: QueueConfig = serde_json::from_str(r#"{"capacity":8,"poolLimit":2}"#).unwrap();
        assert_eq!(cfg.capacity, 8);
        assert_eq!(cfg.effective_pool_limit(), 2);
    }

    #[test]
    fn serialize_omits_unset_pool_limit() {
        let json = serde_json::to_string(&QueueConfig::new(4)).unwrap();
        assert_eq!(json, r#"{"capacity":4}"#);
    }
}
