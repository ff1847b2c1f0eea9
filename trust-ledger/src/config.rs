//! Configuration for the verification ledger

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Verification ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Service name
    pub service_name: String,

    /// Minimum seconds between two identity submissions by one subject
    pub resubmission_cooldown_secs: i64,

    /// Prior submissions after which new submissions go to manual review
    pub manual_review_after_attempts: u32,

    /// Subjects whose submissions always go to manual review
    pub review_watchlist: BTreeSet<String>,

    /// Challenge configuration
    pub challenge: ChallengeConfig,

    /// Step-up verification thresholds
    pub step_up: StepUpConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            service_name: "trust-ledger".to_string(),
            resubmission_cooldown_secs: 300, // 5 minutes
            manual_review_after_attempts: 3,
            review_watchlist: BTreeSet::new(),
            challenge: ChallengeConfig::default(),
            step_up: StepUpConfig::default(),
        }
    }
}

/// One-time-code challenge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Challenge lifetime (seconds)
    pub ttl_secs: i64,

    /// Failed answers before the challenge locks
    pub max_failed_attempts: u32,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600, // 10 minutes
            max_failed_attempts: 5,
        }
    }
}

/// Thresholds for requiring additional verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepUpConfig {
    /// Any transaction at or above this always steps up
    pub high_amount: u64,

    /// Below identity verification, transactions above this step up
    pub low_trust_amount: u64,
}

impl Default for StepUpConfig {
    fn default() -> Self {
        Self {
            high_amount: 10_000,
            low_trust_amount: 100,
        }
    }
}

impl LedgerConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults, then apply environment overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = LedgerConfig::default();

        if let Ok(secs) = std::env::var("TRUST_LEDGER_COOLDOWN_SECS") {
            config.resubmission_cooldown_secs = secs
                .parse()
                .map_err(|e| crate::Error::Config(format!("TRUST_LEDGER_COOLDOWN_SECS: {}", e)))?;
        }

        if let Ok(list) = std::env::var("TRUST_LEDGER_REVIEW_WATCHLIST") {
            config.review_watchlist = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }
}
