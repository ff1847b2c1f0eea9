//! Error types for risk engine

use crate::types::FlagReason;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Risk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Custom limit above the hard ceiling
    #[error("Limit {field} of {requested} exceeds hard ceiling {ceiling}")]
    CeilingExceeded {
        /// Limit field name
        field: &'static str,
        /// Requested value
        requested: Decimal,
        /// Hard ceiling
        ceiling: Decimal,
    },

    /// Same flag reason raised twice in a row
    #[error("Duplicate consecutive flag: {0}")]
    DuplicateFlag(FlagReason),

    /// Appeal or decision without an active suspension
    #[error("No active suspension for subject {0}")]
    NotSuspended(String),

    /// Appeal filed after the deadline
    #[error("Appeal deadline passed at {deadline}")]
    AppealWindowClosed {
        /// Appeal deadline
        deadline: DateTime<Utc>,
    },

    /// Second appeal while one is pending
    #[error("Appeal already pending for subject {0}")]
    AppealAlreadyFiled(String),

    /// Decision without a pending appeal
    #[error("No pending appeal for subject {0}")]
    NoPendingAppeal(String),

    /// Rejected caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Verification ledger or storage failure
    #[error(transparent)]
    Ledger(#[from] trust_ledger::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
