//! Match configuration.

use serde::{Deserialize, Serialize};

/// Limits applied to every match the registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Number of slots in each match.
    pub slot_count: usize,

    /// Match names longer than this (in characters) are truncated.
    pub max_name_len: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            slot_count: 8,
            max_name_len: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_config_default() {
        let config = MatchConfig::default();
        assert_eq!(config.slot_count, 8);
        assert_eq!(config.max_name_len, 50);
    }
}
