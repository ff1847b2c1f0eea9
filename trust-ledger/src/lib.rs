//! Trust Ledger
//!
//! Verification records, payment links and one-time-code challenges for
//! users and partners. The ledger is the source of truth for a subject's
//! trust level; every other trust & safety component reads it from here.
//!
//! # Architecture
//!
//! - **Injected storage**: one [`storage::Store`] per record type
//! - **Per-subject writers**: operations on one subject are serialized
//! - **Injected clock**: every deadline is evaluated through [`clock::Clock`]
//! - **Lazy expiry**: lapsed state is cleared on read, never by a scheduler
//!
//! # Invariants
//!
//! - Trust level never decreases
//! - Records are append-only; corrections are new submissions
//! - Full card numbers and CVVs are never stored

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod challenge;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod payment;
pub mod storage;
pub mod types;
pub mod verification;

// Re-exports
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{Error, Result};
pub use types::{AuditEntry, Severity, SubjectId, TrustLevel};
pub use verification::{
    IdentityClaim, ReviewDecision, ReviewMeta, StepUpContext, VerificationLedger,
    VerificationRecord, VerificationStatus,
};
