//! Error types for the trust ledger

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Document type outside the accepted set
    #[error("Invalid document type: {0}")]
    InvalidDocumentType(String),

    /// Claimed name conflicts with a previously approved identity
    #[error("Name mismatch: claimed name does not match approved identity")]
    NameMismatch,

    /// Identity resubmitted before the cooldown elapsed
    #[error("Cooldown active: resubmission allowed after {retry_at}")]
    CooldownActive {
        /// Earliest instant a new submission is accepted
        retry_at: DateTime<Utc>,
    },

    /// Card number failed Luhn validation
    #[error("Invalid card number")]
    InvalidCardNumber,

    /// Rejection submitted without a reason for the subject
    #[error("Rejection requires a reason visible to the subject")]
    RejectionReasonRequired,

    /// Verification record not found
    #[error("Verification not found: {0}")]
    VerificationNotFound(String),

    /// Payment link not found
    #[error("Payment link not found: {0}")]
    PaymentLinkNotFound(String),

    /// No active challenge for the subject
    #[error("No active challenge for subject {0}")]
    ChallengeNotFound(String),

    /// Challenge locked after too many failed answers
    #[error("Challenge locked after {attempts} failed attempts")]
    ChallengeLocked {
        /// Failed attempts so far
        attempts: u32,
    },

    /// Transition not allowed from the record's current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config(err.to_string())
    }
}
