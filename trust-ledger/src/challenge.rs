//! One-time-code challenges for contact and payment-link confirmation

use crate::expiry::{elapsed, Expiring};
use crate::types::SubjectId;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a successful answer confirms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ChallengePurpose {
    /// Email/phone ownership
    Contact,
    /// Ownership of a linked payment method
    PaymentLink(Uuid),
}

/// Delivery channel for the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeChannel {
    /// Text message
    Sms,
    /// Email
    Email,
}

/// Issued challenge; one active per subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationChallenge {
    /// Challenge ID
    pub id: Uuid,
    /// Subject being challenged
    pub subject_id: SubjectId,
    /// What the answer confirms
    pub purpose: ChallengePurpose,
    /// Delivery channel
    pub channel: ChallengeChannel,
    /// Six-digit code
    pub code: String,
    /// Issued at
    pub issued_at: DateTime<Utc>,
    /// Expires at
    pub expires_at: DateTime<Utc>,
    /// Wrong answers so far
    pub failed_attempts: u32,
    /// Set once the challenge lapses or is answered
    pub closed: bool,
}

impl VerificationChallenge {
    /// Whether the challenge can still be answered
    pub fn is_open(&self) -> bool {
        !self.closed
    }
}

impl Expiring for VerificationChallenge {
    fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.closed && elapsed(self.expires_at, now) {
            self.closed = true;
            return true;
        }
        false
    }
}

/// Random six-digit code
pub fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}
