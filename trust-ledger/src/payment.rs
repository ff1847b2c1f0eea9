//! Payment method links
//!
//! Card data is validated and masked at the boundary. The full number and
//! CVV live only inside [`PaymentClaim`], which is consumed by
//! `VerificationLedger::link_payment` and dropped after the Luhn check.

use crate::types::{AuditEntry, SubjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Card brand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    /// Visa
    Visa,
    /// Mastercard
    Mastercard,
    /// American Express
    Amex,
    /// Discover
    Discover,
}

/// How the link is confirmed as belonging to the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Small deposits the subject reports back
    MicroDeposit,
    /// One-time code
    Otp,
}

/// Payment link status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentLinkStatus {
    /// Linked, ownership not yet confirmed
    PendingVerification,
    /// Ownership confirmed
    Verified,
}

/// Card expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardExpiry {
    /// Month (1-12)
    pub month: u8,
    /// Four-digit year
    pub year: u16,
}

/// Raw card claim submitted during onboarding
#[derive(Clone)]
pub struct PaymentClaim {
    /// Card brand
    pub card_brand: CardBrand,
    /// Full card number (spaces and dashes allowed)
    pub card_number: String,
    /// Expiry
    pub expiry: CardExpiry,
    /// CVV; never stored
    pub cvv: String,
    /// Name on card
    pub billing_name: String,
    /// Requested confirmation method
    pub verification_method: VerificationMethod,
}

impl fmt::Debug for PaymentClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentClaim")
            .field("card_brand", &self.card_brand)
            .field("card_number", &mask_card_number(&self.card_number))
            .field("expiry", &self.expiry)
            .field("billing_name", &self.billing_name)
            .finish_non_exhaustive()
    }
}

/// Stored payment link; masked data only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    /// Link ID
    pub id: Uuid,
    /// Owner
    pub subject_id: SubjectId,
    /// Card brand
    pub card_brand: CardBrand,
    /// Last four digits
    pub last4: String,
    /// Expiry
    pub expiry: CardExpiry,
    /// Name on card
    pub billing_name: String,
    /// Confirmation method
    pub verification_method: VerificationMethod,
    /// Status
    pub status: PaymentLinkStatus,
    /// Audit trail
    pub audit_trail: Vec<AuditEntry>,
}

/// Digits of a card number, or `None` if it contains anything else
fn card_digits(card_number: &str) -> Option<Vec<u32>> {
    card_number
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .map(|c| c.to_digit(10))
        .collect()
}

/// Luhn checksum over a card number
pub fn luhn_valid(card_number: &str) -> bool {
    let digits = match card_digits(card_number) {
        Some(d) if (12..=19).contains(&d.len()) => d,
        _ => return false,
    };

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Last four digits of a card number
pub fn last4(card_number: &str) -> String {
    let digits: String = card_number.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(4);
    digits[start..].to_string()
}

/// `****1234` display form
pub fn mask_card_number(card_number: &str) -> String {
    format!("****{}", last4(card_number))
}
