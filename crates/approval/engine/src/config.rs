//! Configuration for the approval engine

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between background timeout scans
    #[serde(default = "default_timeout_check_interval")]
    pub timeout_check_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_check_interval_secs: default_timeout_check_interval(),
        }
    }
}

fn default_timeout_check_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval() {
        assert_eq!(EngineConfig::default().timeout_check_interval_secs, 60);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.timeout_check_interval_secs, 60);
    }
}
