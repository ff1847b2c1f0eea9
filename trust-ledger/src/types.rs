//! Core types shared by every trust & safety component
//!
//! All types are designed for:
//! - Stable serialized shapes (snake_case, read directly by collaborators)
//! - Closed enums instead of free-form strings
//! - UTC instants for every timestamp

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subject identifier (user or partner); the join key for every record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create new subject ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity trust level (0 unverified .. 3 fully verified)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrustLevel(u8);

impl TrustLevel {
    /// No verification of any kind
    pub const UNVERIFIED: TrustLevel = TrustLevel(0);
    /// Contact channel (email/phone) confirmed
    pub const CONTACT_VERIFIED: TrustLevel = TrustLevel(1);
    /// Identity document approved
    pub const IDENTITY_VERIFIED: TrustLevel = TrustLevel(2);
    /// Identity approved and a payment method verified
    pub const FULLY_VERIFIED: TrustLevel = TrustLevel(3);

    /// Create new trust level, clamped to 0..=3
    pub fn new(level: u8) -> Self {
        Self(level.min(3))
    }

    /// Get raw level
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Identity has been approved (level >= 2)
    pub fn is_identity_verified(&self) -> bool {
        *self >= Self::IDENTITY_VERIFIED
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity shared by flags, incidents and suspension triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
    /// Critical severity; requires immediate action
    Critical,
}

impl Severity {
    /// Lowercase name as persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit trail entry; appended on every mutation, never edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the mutation happened
    pub at: DateTime<Utc>,

    /// Who performed it (subject id, reviewer, or `system`)
    pub actor: String,

    /// Short action name (`submitted`, `approved`, ...)
    pub action: String,

    /// Structured detail
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl AuditEntry {
    /// Create audit entry with no detail
    pub fn new(at: DateTime<Utc>, actor: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            at,
            actor: actor.into(),
            action: action.into(),
            detail: serde_json::Value::Null,
        }
    }

    /// Attach structured detail
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_level_clamped() {
        assert_eq!(TrustLevel::new(7), TrustLevel::FULLY_VERIFIED);
        assert!(TrustLevel::new(2).is_identity_verified());
        assert!(!TrustLevel::CONTACT_VERIFIED.is_identity_verified());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn test_subject_id_serializes_as_string() {
        let id = SubjectId::new("user-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user-42\"");
    }
}
