//! Verification ledger
//!
//! Per-subject identity and payment-link records; the source of truth for
//! trust level.
//!
//! # Invariants
//!
//! - Records are never overwritten: a correction is a new submission
//! - Only `pending` records transition, and only to `approved` or `rejected`
//! - Trust level never decreases, whatever later reviews decide
//! - Every mutation appends to the record's audit trail

use crate::{
    challenge::{generate_code, ChallengeChannel, ChallengePurpose, VerificationChallenge},
    clock::SharedClock,
    config::LedgerConfig,
    expiry::{elapsed_opt, refresh, Expiring},
    payment::{last4, luhn_valid, PaymentClaim, PaymentLink, PaymentLinkStatus},
    storage::{SharedStore, SubjectLocks},
    types::{AuditEntry, SubjectId, TrustLevel},
    Error, Result,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Accepted identity document types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Passport
    Passport,
    /// Driver's license
    DriversLicense,
    /// National identity card
    NationalId,
    /// Visa
    Visa,
}

impl DocumentType {
    /// Persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Passport => "passport",
            DocumentType::DriversLicense => "drivers_license",
            DocumentType::NationalId => "national_id",
            DocumentType::Visa => "visa",
        }
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "passport" => Ok(DocumentType::Passport),
            "drivers_license" => Ok(DocumentType::DriversLicense),
            "national_id" => Ok(DocumentType::NationalId),
            "visa" => Ok(DocumentType::Visa),
            other => Err(Error::InvalidDocumentType(other.to_string())),
        }
    }
}

/// Verification status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Awaiting review
    Pending,
    /// Identity accepted
    Approved,
    /// Identity refused
    Rejected,
}

/// Already-extracted identity claim
#[derive(Debug, Clone)]
pub struct IdentityClaim {
    /// Document type as submitted by the onboarding flow
    pub document_type: String,
    /// Full document number; stored masked only
    pub document_number: String,
    /// Name on the document
    pub claimed_name: String,
}

/// Rejection shown to the subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Reason code
    pub reason: String,
    /// Message for the subject
    pub message: Option<String>,
}

/// Identity verification record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Record ID
    pub id: Uuid,
    /// Subject
    pub subject_id: SubjectId,
    /// Document type
    pub document_type: DocumentType,
    /// Masked document number
    pub document_number_masked: String,
    /// Claimed name
    pub claimed_name: String,
    /// Status
    pub status: VerificationStatus,
    /// Trust level after the last transition of this record
    pub trust_level: TrustLevel,
    /// Routed to a human reviewer
    pub requires_manual_review: bool,
    /// Submitted at
    pub submitted_at: DateTime<Utc>,
    /// Reviewed at
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer
    pub reviewed_by: Option<String>,
    /// Rejection details
    pub rejection: Option<Rejection>,
    /// Audit trail
    pub audit_trail: Vec<AuditEntry>,
}

/// Review outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Approve the identity
    Approve,
    /// Reject the identity
    Reject,
}

/// Reviewer metadata
#[derive(Debug, Clone, Default)]
pub struct ReviewMeta {
    /// Reviewer ID
    pub reviewed_by: String,
    /// Rejection reason (required for rejections)
    pub reason: Option<String>,
    /// Message for the subject
    pub message: Option<String>,
}

/// Per-subject verification profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    /// Subject
    pub subject_id: SubjectId,
    /// Contact channel confirmed
    pub contact_verified: bool,
    /// At least one identity record approved
    pub identity_approved: bool,
    /// At least one payment link verified
    pub payment_verified: bool,
    /// Name on the approved identity
    pub approved_name: Option<String>,
    /// High-water trust level
    pub trust_level: TrustLevel,
    /// Submissions so far
    pub submission_count: u32,
    /// Last submission
    pub last_submission_at: Option<DateTime<Utc>>,
    /// Resubmission blocked until
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl SubjectProfile {
    fn new(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            contact_verified: false,
            identity_approved: false,
            payment_verified: false,
            approved_name: None,
            trust_level: TrustLevel::UNVERIFIED,
            submission_count: 0,
            last_submission_at: None,
            cooldown_until: None,
        }
    }

    /// Level implied by the verification facts
    pub fn derived_level(&self) -> TrustLevel {
        if self.identity_approved && self.payment_verified {
            TrustLevel::FULLY_VERIFIED
        } else if self.identity_approved {
            TrustLevel::IDENTITY_VERIFIED
        } else if self.contact_verified {
            TrustLevel::CONTACT_VERIFIED
        } else {
            TrustLevel::UNVERIFIED
        }
    }

    fn raise_trust_level(&mut self) {
        self.trust_level = self.trust_level.max(self.derived_level());
    }
}

impl Expiring for SubjectProfile {
    fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if elapsed_opt(self.cooldown_until, now) {
            self.cooldown_until = None;
            return true;
        }
        false
    }
}

/// Context for the step-up decision
#[derive(Debug, Clone, Default)]
pub struct StepUpContext {
    /// Transaction amount, if any
    pub transaction_amount: Option<Decimal>,
    /// Activity classified as unusual upstream
    pub unusual_activity: bool,
    /// New location
    pub new_location: bool,
    /// New device
    pub new_device: bool,
    /// Outside the subject's usual hours
    pub unusual_time: bool,
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn mask_document_number(number: &str) -> String {
    let visible: String = number.chars().take(7).collect();
    format!("{}****", visible)
}

/// Verification ledger
pub struct VerificationLedger {
    config: LedgerConfig,
    clock: SharedClock,
    records: SharedStore<VerificationRecord>,
    links: SharedStore<PaymentLink>,
    profiles: SharedStore<SubjectProfile>,
    challenges: SharedStore<VerificationChallenge>,
    locks: SubjectLocks,
}

impl VerificationLedger {
    /// Create ledger over injected stores
    pub fn new(
        config: LedgerConfig,
        clock: SharedClock,
        records: SharedStore<VerificationRecord>,
        links: SharedStore<PaymentLink>,
        profiles: SharedStore<SubjectProfile>,
        challenges: SharedStore<VerificationChallenge>,
    ) -> Self {
        Self {
            config,
            clock,
            records,
            links,
            profiles,
            challenges,
            locks: SubjectLocks::new(),
        }
    }

    /// Create ledger over fresh in-memory stores
    pub fn in_memory(config: LedgerConfig, clock: SharedClock) -> Self {
        use crate::storage::memory_store;
        Self::new(
            config,
            clock,
            memory_store(),
            memory_store(),
            memory_store(),
            memory_store(),
        )
    }

    /// Ledger configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn load_profile(&self, subject: &SubjectId, now: DateTime<Utc>) -> Result<SubjectProfile> {
        let mut profile = self
            .profiles
            .get(subject.as_str())?
            .unwrap_or_else(|| SubjectProfile::new(subject.clone()));
        refresh(&mut profile, now);
        Ok(profile)
    }

    /// Submit an identity claim; creates a `pending` record
    pub fn submit_identity(
        &self,
        subject: &SubjectId,
        claim: IdentityClaim,
    ) -> Result<VerificationRecord> {
        let document_type: DocumentType = claim.document_type.parse()?;

        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut profile = self.load_profile(subject, now)?;

            if let Some(retry_at) = profile.cooldown_until {
                warn!(subject = %subject, %retry_at, "Identity resubmitted during cooldown");
                return Err(Error::CooldownActive { retry_at });
            }

            if let Some(approved) = &profile.approved_name {
                if normalize_name(approved) != normalize_name(&claim.claimed_name) {
                    warn!(subject = %subject, "Claimed name conflicts with approved identity");
                    return Err(Error::NameMismatch);
                }
            }

            let requires_manual_review = profile.submission_count
                >= self.config.manual_review_after_attempts
                || self.config.review_watchlist.contains(subject.as_str());

            let record = VerificationRecord {
                id: Uuid::now_v7(),
                subject_id: subject.clone(),
                document_type,
                document_number_masked: mask_document_number(&claim.document_number),
                claimed_name: claim.claimed_name,
                status: VerificationStatus::Pending,
                trust_level: profile.trust_level,
                requires_manual_review,
                submitted_at: now,
                reviewed_at: None,
                reviewed_by: None,
                rejection: None,
                audit_trail: vec![AuditEntry::new(now, subject.as_str(), "submitted")
                    .with_detail(json!({
                        "document_type": document_type.as_str(),
                        "prior_submissions": profile.submission_count,
                        "requires_manual_review": requires_manual_review,
                    }))],
            };
            self.records.put(&record.id.to_string(), record.clone())?;

            profile.submission_count += 1;
            profile.last_submission_at = Some(now);
            profile.cooldown_until =
                Some(now + Duration::seconds(self.config.resubmission_cooldown_secs));
            self.profiles.put(subject.as_str(), profile)?;

            info!(
                subject = %subject,
                record_id = %record.id,
                document_type = document_type.as_str(),
                requires_manual_review,
                "Identity submitted"
            );
            Ok(record)
        })
    }

    /// Approve or reject a pending record
    pub fn review_identity(
        &self,
        id: Uuid,
        decision: ReviewDecision,
        meta: ReviewMeta,
    ) -> Result<VerificationRecord> {
        let subject = self.record(id)?.subject_id;

        self.locks.with(&subject, || {
            let now = self.clock.now();
            let mut record = self.record(id)?;

            if record.status != VerificationStatus::Pending {
                return Err(Error::InvalidTransition(format!(
                    "verification {} is {:?}, only pending records can be reviewed",
                    id, record.status
                )));
            }

            let mut profile = self.load_profile(&subject, now)?;

            match decision {
                ReviewDecision::Approve => {
                    record.status = VerificationStatus::Approved;
                    profile.identity_approved = true;
                    profile.approved_name = Some(record.claimed_name.clone());
                    profile.raise_trust_level();
                }
                ReviewDecision::Reject => {
                    let reason = meta
                        .reason
                        .clone()
                        .filter(|r| !r.trim().is_empty())
                        .ok_or(Error::RejectionReasonRequired)?;
                    record.status = VerificationStatus::Rejected;
                    record.rejection = Some(Rejection {
                        reason,
                        message: meta.message.clone(),
                    });
                }
            }

            record.trust_level = record.trust_level.max(profile.trust_level);
            record.reviewed_at = Some(now);
            record.reviewed_by = Some(meta.reviewed_by.clone());
            record.audit_trail.push(
                AuditEntry::new(now, meta.reviewed_by.as_str(), match decision {
                    ReviewDecision::Approve => "approved",
                    ReviewDecision::Reject => "rejected",
                })
                .with_detail(json!({
                    "reason": meta.reason,
                    "trust_level": record.trust_level.value(),
                })),
            );

            self.records.put(&id.to_string(), record.clone())?;
            self.profiles.put(subject.as_str(), profile)?;

            info!(
                subject = %subject,
                record_id = %id,
                status = ?record.status,
                trust_level = %record.trust_level,
                reviewed_by = %meta.reviewed_by,
                "Identity reviewed"
            );
            Ok(record)
        })
    }

    /// Link a payment card; stores masked data only
    pub fn link_payment(&self, subject: &SubjectId, claim: PaymentClaim) -> Result<PaymentLink> {
        if !luhn_valid(&claim.card_number) {
            warn!(subject = %subject, "Card number failed Luhn check");
            return Err(Error::InvalidCardNumber);
        }

        self.locks.with(subject, || {
            let now = self.clock.now();
            let link = PaymentLink {
                id: Uuid::now_v7(),
                subject_id: subject.clone(),
                card_brand: claim.card_brand,
                last4: last4(&claim.card_number),
                expiry: claim.expiry,
                billing_name: claim.billing_name.clone(),
                verification_method: claim.verification_method,
                status: PaymentLinkStatus::PendingVerification,
                audit_trail: vec![AuditEntry::new(now, subject.as_str(), "linked").with_detail(
                    json!({ "verification_method": claim.verification_method }),
                )],
            };
            self.links.put(&link.id.to_string(), link.clone())?;

            info!(
                subject = %subject,
                link_id = %link.id,
                last4 = %link.last4,
                "Payment method linked"
            );
            Ok(link)
        })
    }

    /// Issue a one-time code; replaces any earlier challenge for the subject
    pub fn issue_challenge(
        &self,
        subject: &SubjectId,
        purpose: ChallengePurpose,
        channel: ChallengeChannel,
    ) -> Result<VerificationChallenge> {
        self.locks.with(subject, || {
            if let ChallengePurpose::PaymentLink(link_id) = purpose {
                let link = self.payment_link(link_id)?;
                if &link.subject_id != subject {
                    return Err(Error::PaymentLinkNotFound(link_id.to_string()));
                }
            }

            let now = self.clock.now();
            let challenge = VerificationChallenge {
                id: Uuid::now_v7(),
                subject_id: subject.clone(),
                purpose,
                channel,
                code: generate_code(),
                issued_at: now,
                expires_at: now + Duration::seconds(self.config.challenge.ttl_secs),
                failed_attempts: 0,
                closed: false,
            };
            self.challenges.put(subject.as_str(), challenge.clone())?;

            info!(subject = %subject, challenge_id = %challenge.id, ?purpose, "Challenge issued");
            Ok(challenge)
        })
    }

    /// Answer the active challenge. `Ok(false)` for a wrong, expired or spent code.
    pub fn answer_challenge(&self, subject: &SubjectId, code: &str) -> Result<bool> {
        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut challenge = self
                .challenges
                .get(subject.as_str())?
                .ok_or_else(|| Error::ChallengeNotFound(subject.to_string()))?;

            if refresh(&mut challenge, now) {
                self.challenges.put(subject.as_str(), challenge.clone())?;
            }
            if !challenge.is_open() {
                debug!(subject = %subject, "Answer for closed challenge");
                return Ok(false);
            }

            let max_attempts = self.config.challenge.max_failed_attempts;
            if challenge.failed_attempts >= max_attempts {
                return Err(Error::ChallengeLocked {
                    attempts: challenge.failed_attempts,
                });
            }

            if challenge.code != code {
                challenge.failed_attempts += 1;
                warn!(
                    subject = %subject,
                    failed_attempts = challenge.failed_attempts,
                    "Wrong challenge code"
                );
                self.challenges.put(subject.as_str(), challenge)?;
                return Ok(false);
            }

            challenge.closed = true;
            self.challenges.put(subject.as_str(), challenge.clone())?;

            let mut profile = self.load_profile(subject, now)?;
            match challenge.purpose {
                ChallengePurpose::Contact => {
                    profile.contact_verified = true;
                }
                ChallengePurpose::PaymentLink(link_id) => {
                    let mut link = self.payment_link(link_id)?;
                    link.status = PaymentLinkStatus::Verified;
                    link.audit_trail
                        .push(AuditEntry::new(now, subject.as_str(), "verified"));
                    self.links.put(&link_id.to_string(), link)?;
                    profile.payment_verified = true;
                }
            }
            profile.raise_trust_level();
            let level = profile.trust_level;
            self.profiles.put(subject.as_str(), profile)?;

            info!(subject = %subject, trust_level = %level, "Challenge answered");
            Ok(true)
        })
    }

    /// Current trust level (0 for unknown subjects)
    pub fn trust_level(&self, subject: &SubjectId) -> Result<TrustLevel> {
        Ok(self.load_profile(subject, self.clock.now())?.trust_level)
    }

    /// Whether any identity record has been approved
    pub fn is_verified(&self, subject: &SubjectId) -> Result<bool> {
        Ok(self.load_profile(subject, self.clock.now())?.identity_approved)
    }

    /// Subject profile, with lapsed cooldowns cleared
    pub fn profile(&self, subject: &SubjectId) -> Result<SubjectProfile> {
        self.load_profile(subject, self.clock.now())
    }

    /// Fetch a record
    pub fn record(&self, id: Uuid) -> Result<VerificationRecord> {
        self.records
            .get(&id.to_string())?
            .ok_or_else(|| Error::VerificationNotFound(id.to_string()))
    }

    /// All records for a subject, oldest first
    pub fn records_for(&self, subject: &SubjectId) -> Result<Vec<VerificationRecord>> {
        let mut records = self.records.scan(&|r| &r.subject_id == subject)?;
        records.sort_by_key(|r| (r.submitted_at, r.id));
        Ok(records)
    }

    /// Fetch a payment link
    pub fn payment_link(&self, id: Uuid) -> Result<PaymentLink> {
        self.links
            .get(&id.to_string())?
            .ok_or_else(|| Error::PaymentLinkNotFound(id.to_string()))
    }

    /// All payment links for a subject
    pub fn payment_links_for(&self, subject: &SubjectId) -> Result<Vec<PaymentLink>> {
        let mut links = self.links.scan(&|l| &l.subject_id == subject)?;
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    /// Whether the action needs additional verification before proceeding
    pub fn requires_step_up(&self, subject: &SubjectId, context: &StepUpContext) -> Result<bool> {
        let level = self.trust_level(subject)?;
        let step_up = &self.config.step_up;
        let amount = context.transaction_amount.unwrap_or(Decimal::ZERO);

        if amount >= Decimal::from(step_up.high_amount) {
            return Ok(true);
        }
        if context.unusual_activity
            || context.new_location
            || context.new_device
            || context.unusual_time
        {
            return Ok(true);
        }
        if !level.is_identity_verified() && amount > Decimal::from(step_up.low_trust_amount) {
            return Ok(true);
        }
        Ok(level == TrustLevel::UNVERIFIED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::payment::{CardBrand, CardExpiry, VerificationMethod};
    use std::sync::Arc;

    fn ledger() -> (VerificationLedger, ManualClock) {
        let clock = ManualClock::default();
        let ledger = VerificationLedger::in_memory(LedgerConfig::default(), Arc::new(clock.clone()));
        (ledger, clock)
    }

    fn passport(name: &str) -> IdentityClaim {
        IdentityClaim {
            document_type: "passport".to_string(),
            document_number: "P123456789".to_string(),
            claimed_name: name.to_string(),
        }
    }

    fn approve(ledger: &VerificationLedger, id: Uuid) -> VerificationRecord {
        ledger
            .review_identity(
                id,
                ReviewDecision::Approve,
                ReviewMeta {
                    reviewed_by: "reviewer-1".to_string(),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    #[test]
    fn test_submit_creates_pending_masked_record() {
        let (ledger, _) = ledger();
        let subject = SubjectId::new("user-1");
        let record = ledger.submit_identity(&subject, passport("Jane Doe")).unwrap();

        assert_eq!(record.status, VerificationStatus::Pending);
        assert_eq!(record.document_number_masked, "P123456****");
        assert_eq!(record.trust_level, TrustLevel::UNVERIFIED);
        assert_eq!(record.audit_trail.len(), 1);
        assert!(!record.requires_manual_review);
    }

    #[test]
    fn test_invalid_document_type() {
        let (ledger, _) = ledger();
        let mut claim = passport("Jane Doe");
        claim.document_type = "library_card".to_string();
        let err = ledger.submit_identity(&SubjectId::new("u"), claim).unwrap_err();
        assert_eq!(err, Error::InvalidDocumentType("library_card".to_string()));
    }

    #[test]
    fn test_cooldown_then_resubmission() {
        let (ledger, clock) = ledger();
        let subject = SubjectId::new("user-2");
        ledger.submit_identity(&subject, passport("Jane Doe")).unwrap();

        clock.advance(Duration::seconds(299));
        assert!(matches!(
            ledger.submit_identity(&subject, passport("Jane Doe")),
            Err(Error::CooldownActive { .. })
        ));

        clock.advance(Duration::seconds(1));
        assert!(ledger.submit_identity(&subject, passport("Jane Doe")).is_ok());
    }

    #[test]
    fn test_name_mismatch_against_approved_identity() {
        let (ledger, clock) = ledger();
        let subject = SubjectId::new("user-3");
        let record = ledger.submit_identity(&subject, passport("Jane Doe")).unwrap();
        approve(&ledger, record.id);

        clock.advance(Duration::minutes(10));
        assert_eq!(
            ledger.submit_identity(&subject, passport("John Smith")).unwrap_err(),
            Error::NameMismatch
        );

        // Case and spacing differences are the same name
        assert!(ledger.submit_identity(&subject, passport("  jane   DOE ")).is_ok());
    }

    #[test]
    fn test_approval_raises_trust_and_rejection_keeps_it() {
        let (ledger, clock) = ledger();
        let subject = SubjectId::new("user-4");
        let first = ledger.submit_identity(&subject, passport("Jane Doe")).unwrap();
        let approved = approve(&ledger, first.id);
        assert_eq!(approved.trust_level, TrustLevel::IDENTITY_VERIFIED);

        clock.advance(Duration::minutes(10));
        let second = ledger.submit_identity(&subject, passport("Jane Doe")).unwrap();
        let rejected = ledger
            .review_identity(
                second.id,
                ReviewDecision::Reject,
                ReviewMeta {
                    reviewed_by: "reviewer-2".to_string(),
                    reason: Some("document_expired".to_string()),
                    message: Some("Please upload a current passport".to_string()),
                },
            )
            .unwrap();

        assert_eq!(rejected.status, VerificationStatus::Rejected);
        assert_eq!(rejected.trust_level, TrustLevel::IDENTITY_VERIFIED);
        assert_eq!(ledger.trust_level(&subject).unwrap(), TrustLevel::IDENTITY_VERIFIED);
        assert!(ledger.is_verified(&subject).unwrap());

        // The first record is untouched
        assert_eq!(ledger.record(first.id).unwrap().status, VerificationStatus::Approved);
    }

    #[test]
    fn test_rejection_requires_reason() {
        let (ledger, _) = ledger();
        let record = ledger
            .submit_identity(&SubjectId::new("user-5"), passport("Jane Doe"))
            .unwrap();
        let err = ledger
            .review_identity(
                record.id,
                ReviewDecision::Reject,
                ReviewMeta {
                    reviewed_by: "reviewer".to_string(),
                    reason: Some("   ".to_string()),
                    message: None,
                },
            )
            .unwrap_err();
        assert_eq!(err, Error::RejectionReasonRequired);
        assert_eq!(ledger.record(record.id).unwrap().status, VerificationStatus::Pending);
    }

    #[test]
    fn test_reviewing_twice_is_invalid_transition() {
        let (ledger, _) = ledger();
        let record = ledger
            .submit_identity(&SubjectId::new("user-6"), passport("Jane Doe"))
            .unwrap();
        approve(&ledger, record.id);
        let err = ledger
            .review_identity(record.id, ReviewDecision::Approve, ReviewMeta::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[test]
    fn test_manual_review_from_watchlist_and_attempts() {
        let mut config = LedgerConfig::default();
        config.review_watchlist.insert("watched".to_string());
        config.manual_review_after_attempts = 2;
        config.resubmission_cooldown_secs = 0;
        let clock = ManualClock::default();
        let ledger = VerificationLedger::in_memory(config, Arc::new(clock.clone()));

        let watched = ledger
            .submit_identity(&SubjectId::new("watched"), passport("A B"))
            .unwrap();
        assert!(watched.requires_manual_review);

        let subject = SubjectId::new("repeat");
        assert!(!ledger.submit_identity(&subject, passport("A B")).unwrap().requires_manual_review);
        assert!(!ledger.submit_identity(&subject, passport("A B")).unwrap().requires_manual_review);
        assert!(ledger.submit_identity(&subject, passport("A B")).unwrap().requires_manual_review);
    }

    fn card(number: &str) -> PaymentClaim {
        PaymentClaim {
            card_brand: CardBrand::Visa,
            card_number: number.to_string(),
            expiry: CardExpiry { month: 8, year: 2031 },
            cvv: "999".to_string(),
            billing_name: "Jane Doe".to_string(),
            verification_method: VerificationMethod::Otp,
        }
    }

    #[test]
    fn test_link_payment_masks_and_validates() {
        let (ledger, _) = ledger();
        let subject = SubjectId::new("user-7");

        assert_eq!(
            ledger.link_payment(&subject, card("4532123456789012")).unwrap_err(),
            Error::InvalidCardNumber
        );

        let link = ledger.link_payment(&subject, card("4111 1111 1111 1111")).unwrap();
        assert_eq!(link.last4, "1111");
        assert_eq!(link.status, PaymentLinkStatus::PendingVerification);

        let stored = serde_json::to_string(&ledger.payment_link(link.id).unwrap()).unwrap();
        assert!(!stored.contains("4111111111111111"));
        assert!(!stored.contains("999"));

        ledger.link_payment(&subject, card("4242424242424242")).unwrap();
        assert_eq!(ledger.payment_links_for(&subject).unwrap().len(), 2);
    }

    #[test]
    fn test_challenge_verifies_payment_link_and_reaches_full_trust() {
        let (ledger, _) = ledger();
        let subject = SubjectId::new("user-8");
        let record = ledger.submit_identity(&subject, passport("Jane Doe")).unwrap();
        approve(&ledger, record.id);
        let link = ledger.link_payment(&subject, card("4111111111111111")).unwrap();

        let challenge = ledger
            .issue_challenge(&subject, ChallengePurpose::PaymentLink(link.id), ChallengeChannel::Sms)
            .unwrap();
        // Codes are drawn from 100000..1000000
        assert!(!ledger.answer_challenge(&subject, "000000").unwrap());
        assert!(ledger.answer_challenge(&subject, &challenge.code).unwrap());

        assert_eq!(ledger.payment_link(link.id).unwrap().status, PaymentLinkStatus::Verified);
        assert_eq!(ledger.trust_level(&subject).unwrap(), TrustLevel::FULLY_VERIFIED);

        // Spent challenge cannot be replayed
        assert!(!ledger.answer_challenge(&subject, &challenge.code).unwrap());
    }

    #[test]
    fn test_challenge_lockout_and_expiry() {
        let (ledger, clock) = ledger();
        let subject = SubjectId::new("user-9");
        let challenge = ledger
            .issue_challenge(&subject, ChallengePurpose::Contact, ChallengeChannel::Email)
            .unwrap();
        let wrong = if challenge.code == "111111" { "222222" } else { "111111" };

        for _ in 0..5 {
            assert!(!ledger.answer_challenge(&subject, wrong).unwrap());
        }
        assert_eq!(
            ledger.answer_challenge(&subject, &challenge.code).unwrap_err(),
            Error::ChallengeLocked { attempts: 5 }
        );

        let fresh = ledger
            .issue_challenge(&subject, ChallengePurpose::Contact, ChallengeChannel::Email)
            .unwrap();
        clock.advance(Duration::minutes(11));
        assert!(!ledger.answer_challenge(&subject, &fresh.code).unwrap());
        assert_eq!(ledger.trust_level(&subject).unwrap(), TrustLevel::UNVERIFIED);
    }

    #[test]
    fn test_contact_challenge_sets_level_one() {
        let (ledger, _) = ledger();
        let subject = SubjectId::new("user-10");
        let challenge = ledger
            .issue_challenge(&subject, ChallengePurpose::Contact, ChallengeChannel::Email)
            .unwrap();
        assert!(ledger.answer_challenge(&subject, &challenge.code).unwrap());
        assert_eq!(ledger.trust_level(&subject).unwrap(), TrustLevel::CONTACT_VERIFIED);
    }

    #[test]
    fn test_challenge_for_foreign_link_rejected() {
        let (ledger, _) = ledger();
        let link = ledger
            .link_payment(&SubjectId::new("owner"), card("4111111111111111"))
            .unwrap();
        let err = ledger
            .issue_challenge(
                &SubjectId::new("intruder"),
                ChallengePurpose::PaymentLink(link.id),
                ChallengeChannel::Sms,
            )
            .unwrap_err();
        assert!(matches!(err, Error::PaymentLinkNotFound(_)));
    }

    #[test]
    fn test_step_up_rules() {
        let (ledger, _) = ledger();
        let subject = SubjectId::new("user-11");
        let ctx = |amount: i64| StepUpContext {
            transaction_amount: Some(Decimal::from(amount)),
            ..Default::default()
        };

        // Level 0 always steps up
        assert!(ledger.requires_step_up(&subject, &ctx(10)).unwrap());

        let record = ledger.submit_identity(&subject, passport("Jane Doe")).unwrap();
        approve(&ledger, record.id);
        assert!(!ledger.requires_step_up(&subject, &ctx(500)).unwrap());
        assert!(ledger.requires_step_up(&subject, &ctx(10_000)).unwrap());

        let new_device = StepUpContext {
            new_device: true,
            ..Default::default()
        };
        assert!(ledger.requires_step_up(&subject, &new_device).unwrap());
    }
}
