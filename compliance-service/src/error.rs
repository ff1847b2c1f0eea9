use crate::types::DisputeStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("Dispute not found: {0}")]
    DisputeNotFound(Uuid),

    #[error("Dispute {0} is resolved and cannot change")]
    TerminalState(Uuid),

    #[error("Invalid dispute transition from {from} to {to}")]
    InvalidTransition { from: DisputeStatus, to: DisputeStatus },

    #[error("Invalid insurance policy: {0}")]
    InvalidInsurancePolicy(String),

    #[error("No background check of type {category} in progress for {subject}")]
    CheckNotFound { subject: String, category: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Ledger(#[from] trust_ledger::Error),
}

pub type Result<T> = std::result::Result<T, ComplianceError>;
