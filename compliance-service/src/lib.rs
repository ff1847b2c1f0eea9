pub mod aggregator;
pub mod background;
pub mod config;
pub mod disputes;
pub mod error;
pub mod insurance;
pub mod requirements;
pub mod types;

pub use aggregator::ComplianceAggregator;
pub use background::BackgroundChecks;
pub use config::ComplianceConfig;
pub use disputes::{DisputeLedger, EvidenceSubmission};
pub use error::{ComplianceError, Result};
pub use insurance::InsuranceRegistry;
pub use requirements::requirements_for;
pub use types::{
    BackgroundCheckRecord, CheckCategory, CheckStatus, ComplianceVerdict, Dispute, DisputeStatus,
    DisputeType, InsurancePolicy, InsuranceType, PartnerType, PolicyClaim, ResolutionKind,
};
