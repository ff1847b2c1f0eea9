//! Risk engine for the trust-and-safety platform
//!
//! Scores actions, detects fraud patterns, enforces tiered limits and runs
//! the flag / restrict / suspend / appeal ladder. Identity and payment
//! verification state comes from [`trust_ledger`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod limits;
pub mod metrics;
pub mod notify;
pub mod patterns;
pub mod scoring;
pub mod types;
pub mod velocity;

pub use config::RiskConfig;
pub use engine::{Evaluation, ReviewInput, RiskEngine};
pub use error::{Error, Result};
pub use escalation::{
    EscalationController, EscalationState, RestrictionPolicy, RestrictionState, SuspensionOutcome,
    SuspensionTrigger,
};
pub use limits::{DenialReason, LimitDecision, LimitEnforcer, LimitOverrides, OverrideMeta, Tier};
pub use metrics::RiskMetrics;
pub use notify::{LogNotifier, Notifier, RecordingNotifier, SubjectNotice};
pub use patterns::{ActivityEvent, PatternAnalysis, PatternDetector, PatternType};
pub use scoring::RiskScorer;
pub use types::*;
