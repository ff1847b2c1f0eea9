//! Core types for risk engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use trust_ledger::{Severity, SubjectId};
use uuid::Uuid;

/// Risk score (0-100)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(u8);

impl RiskScore {
    /// Create new risk score (0-100)
    pub fn new(score: u8) -> Self {
        Self(score.min(100))
    }

    /// Create from an unbounded sum, capped at 100
    pub fn capped(sum: u32) -> Self {
        Self(sum.min(100) as u8)
    }

    /// Get raw score
    pub fn score(&self) -> u8 {
        self.0
    }

    /// Check if critical risk (>= 75)
    pub fn is_critical_risk(&self) -> bool {
        self.0 >= 75
    }

    /// Check if high risk (50-74)
    pub fn is_high_risk(&self) -> bool {
        (50..75).contains(&self.0)
    }

    /// Check if medium risk (20-49)
    pub fn is_medium_risk(&self) -> bool {
        (20..50).contains(&self.0)
    }

    /// Check if low risk (< 20)
    pub fn is_low_risk(&self) -> bool {
        self.0 < 20
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
    /// Critical risk
    Critical,
}

impl From<RiskScore> for RiskLevel {
    fn from(score: RiskScore) -> Self {
        if score.is_critical_risk() {
            RiskLevel::Critical
        } else if score.is_high_risk() {
            RiskLevel::High
        } else if score.is_medium_risk() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// What the caller should do with the action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Proceed
    Approve,
    /// Proceed, queue for human review
    Review,
    /// Require step-up verification first
    Challenge,
    /// Refuse
    Block,
}

impl From<RiskLevel> for RecommendedAction {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => RecommendedAction::Approve,
            RiskLevel::Medium => RecommendedAction::Review,
            RiskLevel::High => RecommendedAction::Challenge,
            RiskLevel::Critical => RecommendedAction::Block,
        }
    }
}

/// Behavioural signals observed for the current action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSignals {
    /// First time seen from this device
    pub new_device: bool,
    /// First time seen from this location
    pub new_location: bool,
    /// Outside the subject's usual hours
    pub unusual_time: bool,
    /// Several transactions in quick succession
    pub rapid_transactions: bool,
}

/// Risk assessment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Subject
    pub subject_id: SubjectId,

    /// Risk score
    pub risk_score: RiskScore,

    /// Risk level
    pub risk_level: RiskLevel,

    /// Recommended action
    pub recommended_action: RecommendedAction,

    /// Risk factors detected
    pub risk_factors: Vec<String>,

    /// Assessment timestamp
    pub assessed_at: DateTime<Utc>,
}

/// Why a subject was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    /// Many tiny payments probing a card
    CardTesting,
    /// Abnormal action rate
    VelocityAbuse,
    /// Stolen-card resale pattern
    Triangulation,
    /// Locations too far apart for the time between them
    GeographicImpossibility,
    /// Same booking repeated
    DuplicateBooking,
    /// Payment looks fraudulent
    SuspiciousPayment,
    /// Repeated chargebacks
    ChargebackPattern,
    /// Account takeover indicators
    AccountTakeover,
    /// Several accounts for one person
    MultiAccount,
    /// Fake or paid reviews
    ReviewFraud,
    /// Automated traffic
    BotActivity,
    /// Terms of service violation
    PolicyViolation,
    /// Raised by a human reviewer
    ManualReview,
}

impl FlagReason {
    /// Persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagReason::CardTesting => "card_testing",
            FlagReason::VelocityAbuse => "velocity_abuse",
            FlagReason::Triangulation => "triangulation",
            FlagReason::GeographicImpossibility => "geographic_impossibility",
            FlagReason::DuplicateBooking => "duplicate_booking",
            FlagReason::SuspiciousPayment => "suspicious_payment",
            FlagReason::ChargebackPattern => "chargeback_pattern",
            FlagReason::AccountTakeover => "account_takeover",
            FlagReason::MultiAccount => "multi_account",
            FlagReason::ReviewFraud => "review_fraud",
            FlagReason::BotActivity => "bot_activity",
            FlagReason::PolicyViolation => "policy_violation",
            FlagReason::ManualReview => "manual_review",
        }
    }
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incident reported against a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Reason
    pub reason: FlagReason,
    /// Free-text description
    pub description: String,
    /// Severity
    pub severity: Severity,
}

/// Append-only risk flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    /// Flag ID
    pub id: Uuid,
    /// Subject
    pub subject_id: SubjectId,
    /// Reason
    pub reason: FlagReason,
    /// Description
    pub description: String,
    /// Severity
    pub severity: Severity,
    /// Raised at
    pub flagged_at: DateTime<Utc>,
    /// Set for critical flags
    pub requires_immediate_action: bool,
    /// Security team was notified synchronously
    pub security_team_notified: bool,
}

/// Gated product feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Create a booking
    CreateBooking,
    /// Pay
    MakePayment,
    /// Ask for a refund
    RequestRefund,
    /// Message other users
    SendMessages,
    /// Post reviews
    PostReviews,
    /// Withdraw funds
    WithdrawFunds,
    /// See existing bookings
    ViewBookings,
    /// Reach support
    ContactSupport,
}

impl Feature {
    /// Persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::CreateBooking => "create_booking",
            Feature::MakePayment => "make_payment",
            Feature::RequestRefund => "request_refund",
            Feature::SendMessages => "send_messages",
            Feature::PostReviews => "post_reviews",
            Feature::WithdrawFunds => "withdraw_funds",
            Feature::ViewBookings => "view_bookings",
            Feature::ContactSupport => "contact_support",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of action submitted for a limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Payment
    Payment,
    /// New booking
    Booking,
    /// Refund request
    Refund,
    /// Payout
    Withdrawal,
    /// Message
    Message,
    /// Review
    Review,
    /// Any other API request
    Request,
}

impl ActionKind {
    /// Feature gated by this action, if any
    pub fn feature(&self) -> Option<Feature> {
        match self {
            ActionKind::Payment => Some(Feature::MakePayment),
            ActionKind::Booking => Some(Feature::CreateBooking),
            ActionKind::Refund => Some(Feature::RequestRefund),
            ActionKind::Withdrawal => Some(Feature::WithdrawFunds),
            ActionKind::Message => Some(Feature::SendMessages),
            ActionKind::Review => Some(Feature::PostReviews),
            ActionKind::Request => None,
        }
    }

    /// Whether the amount counts toward spend ceilings
    pub fn is_spend(&self) -> bool {
        matches!(
            self,
            ActionKind::Payment | ActionKind::Booking | ActionKind::Withdrawal
        )
    }
}

/// Candidate action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Kind
    pub kind: ActionKind,
    /// Amount, for monetary actions
    pub amount: Option<Decimal>,
}

impl Action {
    /// Payment of `amount`
    pub fn payment(amount: Decimal) -> Self {
        Self {
            kind: ActionKind::Payment,
            amount: Some(amount),
        }
    }

    /// Booking worth `amount`
    pub fn booking(amount: Decimal) -> Self {
        Self {
            kind: ActionKind::Booking,
            amount: Some(amount),
        }
    }

    /// Refund of `amount`
    pub fn refund(amount: Decimal) -> Self {
        Self {
            kind: ActionKind::Refund,
            amount: Some(amount),
        }
    }

    /// Action without an amount
    pub fn of(kind: ActionKind) -> Self {
        Self { kind, amount: None }
    }

    /// Plain API request
    pub fn request() -> Self {
        Self::of(ActionKind::Request)
    }
}
