use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use trust_ledger::expiry::within;
use trust_ledger::{SubjectId, TrustLevel};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    InProgress,
    Escalated,
    Resolved, // terminal
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::InProgress => "in_progress",
            DisputeStatus::Escalated => "escalated",
            DisputeStatus::Resolved => "resolved",
        }
    }

    /// Position in the forward-only progression
    pub(crate) fn rank(&self) -> u8 {
        match self {
            DisputeStatus::Open => 0,
            DisputeStatus::InProgress => 1,
            DisputeStatus::Escalated => 2,
            DisputeStatus::Resolved => 3,
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    Cancellation,
    Refund,
    PropertyCondition,
    HostBehavior,
    GuestBehavior,
    SafetyIssue,
    BillingError,
    Miscommunication,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Document,
    Message,
    Photo,
    Receipt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub id: Uuid,
    pub kind: EvidenceKind,
    pub description: String,
    pub file_url: Option<String>,
    pub submitted_by: SubjectId,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub status: DisputeStatus,
    pub note: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    Refund,
    Rebook,
    Credit,
    Cancelled,
    SplitSettlement,
    NoAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    pub decision: ResolutionKind,
    pub compensation: Option<Decimal>,
    pub note: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dispute {
    pub id: Uuid,
    pub complainant_id: SubjectId,
    pub respondent_id: SubjectId,
    pub dispute_type: DisputeType,
    pub description: String,
    pub status: DisputeStatus,
    pub timeline: Vec<TimelineEntry>,
    pub evidence: Vec<Evidence>,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
}

impl Dispute {
    pub fn is_open(&self) -> bool {
        self.status != DisputeStatus::Resolved
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Criminal,
    Identity,
    Address,
    Employment,
    Financial,
}

impl CheckCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::Criminal => "criminal",
            CheckCategory::Identity => "identity",
            CheckCategory::Address => "address",
            CheckCategory::Employment => "employment",
            CheckCategory::Financial => "financial",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    InProgress,
    Completed,
    Failed,
    Expired, // completed more than the validity period ago
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackgroundCheckRecord {
    pub id: Uuid,
    pub subject_id: SubjectId,
    pub category: CheckCategory,
    pub status: CheckStatus,
    pub clearance: Option<bool>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl BackgroundCheckRecord {
    pub fn is_cleared(&self) -> bool {
        self.status == CheckStatus::Completed && self.clearance == Some(true)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceType {
    Liability,
    Property,
    Professional,
    Cyber,
}

/// Policy as submitted, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyClaim {
    pub insurance_type: InsuranceType,
    pub provider: String,
    pub policy_number: String,
    pub coverage_amount: Decimal,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsurancePolicy {
    pub id: Uuid,
    pub subject_id: SubjectId,
    pub insurance_type: InsuranceType,
    pub provider: String,
    pub policy_number: String,
    pub coverage_amount: Decimal,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    pub registered_at: DateTime<Utc>,
}

impl InsurancePolicy {
    /// Verified and inside its cover period
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.verified && within(self.starts_at, self.expires_at, now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpiringPolicy {
    pub insurance_type: InsuranceType,
    pub provider: String,
    pub days_until_expiry: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InsuranceExpiryStatus {
    pub expiring: Vec<ExpiringPolicy>,
    pub expired: Vec<InsuranceType>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartnerType {
    Hotel,
    TourGuide,
    CarRental,
    Restaurant,
}

impl PartnerType {
    /// Unknown partner types get hotel requirements
    pub fn parse(value: &str) -> Self {
        match value {
            "tour_guide" => PartnerType::TourGuide,
            "car_rental" => PartnerType::CarRental,
            "restaurant" => PartnerType::Restaurant,
            _ => PartnerType::Hotel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnerRequirements {
    pub min_trust_level: TrustLevel,
    pub background_checks: Vec<CheckCategory>,
    pub insurance_types: Vec<InsuranceType>,
    pub minimum_coverage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceVerdict {
    pub subject_id: SubjectId,
    pub partner_type: PartnerType,
    pub verified: bool,
    pub trust_level: TrustLevel,
    pub background_check_passed: bool,
    pub insurance_active: bool,
    pub sufficient_coverage: bool,
    pub open_disputes: usize,
    pub compliant: bool,
    pub issues: Vec<String>,
}
