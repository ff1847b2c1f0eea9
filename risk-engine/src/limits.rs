//! Tiered transaction and rate limits
//!
//! The tier is derived on every call from the verification ledger and the
//! escalation controller, never stored. Denials are values: a check that
//! fails returns `allowed: false` with a reason rather than an error.

use crate::{
    config::{LimitTable, LimitsConfig},
    escalation::{EscalationController, RestrictionKind, RestrictionState},
    metrics::RiskMetrics,
    types::{Action, ActionKind, Feature},
    velocity::RollingWindow,
    Error, Result,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trust_ledger::{
    expiry::{deadline_after_secs, elapsed_opt, refresh, Expiring},
    storage::{memory_store, SharedStore, SubjectLocks},
    SharedClock, SubjectId, VerificationLedger,
};

/// Limit tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Trust level below 2
    Unverified,
    /// Identity verified
    Verified,
    /// Active flags or restriction
    Flagged,
}

/// Partial limit table for a custom override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitOverrides {
    /// Per-transaction ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transaction_amount: Option<Decimal>,
    /// Rolling 24h spend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<Decimal>,
    /// Rolling 30 day spend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<Decimal>,
    /// Bookings per 24h
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bookings_per_day: Option<u32>,
    /// Open bookings at once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_bookings: Option<u32>,
    /// Refunds per 30 days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_refunds_per_month: Option<u32>,
    /// Requests per minute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
    /// Requests per hour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_hour: Option<u32>,
    /// Requests per day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_day: Option<u32>,
}

fn check_amount(field: &'static str, requested: Option<Decimal>, ceiling: Decimal) -> Result<()> {
    match requested {
        Some(requested) if requested > ceiling => Err(Error::CeilingExceeded {
            field,
            requested,
            ceiling,
        }),
        _ => Ok(()),
    }
}

fn check_count(field: &'static str, requested: Option<u32>, ceiling: u32) -> Result<()> {
    check_amount(field, requested.map(Decimal::from), Decimal::from(ceiling))
}

impl LimitOverrides {
    /// Fail on the first field above the hard ceiling
    pub fn check_ceiling(&self, ceiling: &LimitTable) -> Result<()> {
        check_amount(
            "max_transaction_amount",
            self.max_transaction_amount,
            ceiling.max_transaction_amount,
        )?;
        check_amount("daily_limit", self.daily_limit, ceiling.daily_limit)?;
        check_amount("monthly_limit", self.monthly_limit, ceiling.monthly_limit)?;
        check_count(
            "max_bookings_per_day",
            self.max_bookings_per_day,
            ceiling.max_bookings_per_day,
        )?;
        check_count(
            "max_concurrent_bookings",
            self.max_concurrent_bookings,
            ceiling.max_concurrent_bookings,
        )?;
        check_count(
            "max_refunds_per_month",
            self.max_refunds_per_month,
            ceiling.max_refunds_per_month,
        )?;
        check_count(
            "requests_per_minute",
            self.requests_per_minute,
            ceiling.requests_per_minute,
        )?;
        check_count("requests_per_hour", self.requests_per_hour, ceiling.requests_per_hour)?;
        check_count("requests_per_day", self.requests_per_day, ceiling.requests_per_day)?;
        Ok(())
    }

    /// Layer the overridden fields on top of a tier table
    pub fn apply(&self, base: &LimitTable) -> LimitTable {
        LimitTable {
            max_transaction_amount: self
                .max_transaction_amount
                .unwrap_or(base.max_transaction_amount),
            daily_limit: self.daily_limit.unwrap_or(base.daily_limit),
            monthly_limit: self.monthly_limit.unwrap_or(base.monthly_limit),
            max_bookings_per_day: self
                .max_bookings_per_day
                .unwrap_or(base.max_bookings_per_day),
            max_concurrent_bookings: self
                .max_concurrent_bookings
                .unwrap_or(base.max_concurrent_bookings),
            max_refunds_per_month: self
                .max_refunds_per_month
                .unwrap_or(base.max_refunds_per_month),
            requests_per_minute: self.requests_per_minute.unwrap_or(base.requests_per_minute),
            requests_per_hour: self.requests_per_hour.unwrap_or(base.requests_per_hour),
            requests_per_day: self.requests_per_day.unwrap_or(base.requests_per_day),
        }
    }
}

/// Who changes an override and why
#[derive(Debug, Clone, Default)]
pub struct OverrideMeta {
    /// Operator
    pub modified_by: String,
    /// Reason
    pub reason: String,
    /// Lifetime in seconds; permanent when `None`
    pub duration_secs: Option<i64>,
}

/// Installed override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOverride {
    /// Overridden fields
    pub limits: LimitOverrides,
    /// Lapses at; permanent when `None`
    pub expires_at: Option<DateTime<Utc>>,
    /// Operator
    pub modified_by: String,
    /// Reason
    pub reason: String,
    /// Installed at
    pub set_at: DateTime<Utc>,
}

/// Override history action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Installed
    Set,
    /// Removed by an operator
    Cleared,
    /// Lapsed
    Expired,
}

/// Override history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideChange {
    /// Action
    pub action: OverrideAction,
    /// When
    pub at: DateTime<Utc>,
    /// Operator (`system` for expiry)
    pub modified_by: String,
    /// Reason
    pub reason: String,
    /// Limits installed, for `set`
    pub limits: Option<LimitOverrides>,
}

/// Per-subject limit state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitProfile {
    /// Subject
    pub subject_id: SubjectId,
    /// Active override
    #[serde(rename = "override")]
    pub active_override: Option<LimitOverride>,
    /// Every override change
    pub override_history: Vec<OverrideChange>,
    /// Spend, last 24h
    pub rolling_window: RollingWindow,
    /// Spend, last 30 days
    pub monthly_window: RollingWindow,
    /// Bookings, last 24h
    pub bookings: RollingWindow,
    /// Refunds, last 30 days
    pub refunds: RollingWindow,
    /// Requests, last 24h
    pub requests: RollingWindow,
    /// Bookings not yet released
    pub open_bookings: u32,
}

impl LimitProfile {
    fn new(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            active_override: None,
            override_history: Vec::new(),
            rolling_window: RollingWindow::daily(),
            monthly_window: RollingWindow::monthly(),
            bookings: RollingWindow::daily(),
            refunds: RollingWindow::monthly(),
            requests: RollingWindow::daily(),
            open_bookings: 0,
        }
    }

    /// When the oldest spend in the 24h window drops out
    pub fn reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let span = self.rolling_window.span();
        self.rolling_window
            .oldest()
            .map_or(now + span, |oldest| oldest + span)
    }
}

impl Expiring for LimitProfile {
    fn expire(&mut self, now: DateTime<Utc>) -> bool {
        for window in [
            &mut self.rolling_window,
            &mut self.monthly_window,
            &mut self.bookings,
            &mut self.refunds,
            &mut self.requests,
        ] {
            window.cleanup(now);
        }

        let lapsed = self
            .active_override
            .as_ref()
            .map_or(false, |o| elapsed_opt(o.expires_at, now));
        if lapsed {
            if let Some(expired) = self.active_override.take() {
                self.override_history.push(OverrideChange {
                    action: OverrideAction::Expired,
                    at: now,
                    modified_by: "system".to_string(),
                    reason: expired.reason,
                    limits: None,
                });
            }
        }
        lapsed
    }
}

/// Limits in force for a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveLimits {
    /// Tier
    pub tier: Tier,
    /// Tier table with any override applied
    pub limits: LimitTable,
    /// Override expiry, when an override is active
    pub override_expires_at: Option<DateTime<Utc>>,
    /// Override active
    pub has_override: bool,
}

/// Why a check was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Amount is zero or negative
    NonPositiveAmount,
    /// Subject suspended
    Suspended,
    /// Feature restricted
    FeatureRestricted(Feature),
    /// Above per-transaction ceiling
    PerTransactionCeiling,
    /// Would exceed 24h spend
    DailyLimit,
    /// Would exceed 30 day spend
    MonthlyLimit,
    /// Too many bookings today
    BookingsPerDay,
    /// Too many open bookings
    ConcurrentBookings,
    /// Too many refunds this month
    RefundsPerMonth,
    /// Request rate, per minute
    RequestsPerMinute,
    /// Request rate, per hour
    RequestsPerHour,
    /// Request rate, per day
    RequestsPerDay,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NonPositiveAmount => f.write_str("Amount must be positive"),
            DenialReason::Suspended => f.write_str("Account suspended"),
            DenialReason::FeatureRestricted(feature) => {
                write!(f, "Feature {} is restricted", feature)
            }
            DenialReason::PerTransactionCeiling => {
                f.write_str("Amount exceeds per-transaction limit")
            }
            DenialReason::DailyLimit => f.write_str("Daily limit would be exceeded"),
            DenialReason::MonthlyLimit => f.write_str("Monthly limit would be exceeded"),
            DenialReason::BookingsPerDay => f.write_str("Too many booking attempts"),
            DenialReason::ConcurrentBookings => f.write_str("Too many open bookings"),
            DenialReason::RefundsPerMonth => f.write_str("Refund limit reached"),
            DenialReason::RequestsPerMinute
            | DenialReason::RequestsPerHour
            | DenialReason::RequestsPerDay => f.write_str("Request rate limit exceeded"),
        }
    }
}

/// Result of a limit check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitDecision {
    /// Whether the action may proceed
    pub allowed: bool,
    /// Denial reason
    pub reason: Option<DenialReason>,
    /// Tier applied
    pub tier: Tier,
    /// Spend in the last 24h (including this action when allowed)
    pub daily_spent: Decimal,
    /// Daily limit applied
    pub limit: Decimal,
    /// Daily headroom, never negative
    pub remaining: Decimal,
    /// When the oldest spend drops out of the window
    pub reset_at: DateTime<Utc>,
}

/// Limit enforcer
pub struct LimitEnforcer {
    config: LimitsConfig,
    clock: SharedClock,
    ledger: Arc<VerificationLedger>,
    escalation: Arc<EscalationController>,
    store: SharedStore<LimitProfile>,
    metrics: RiskMetrics,
    locks: SubjectLocks,
}

impl LimitEnforcer {
    /// Create enforcer over an injected store
    pub fn new(
        config: LimitsConfig,
        clock: SharedClock,
        ledger: Arc<VerificationLedger>,
        escalation: Arc<EscalationController>,
        store: SharedStore<LimitProfile>,
        metrics: RiskMetrics,
    ) -> Self {
        Self {
            config,
            clock,
            ledger,
            escalation,
            store,
            metrics,
            locks: SubjectLocks::new(),
        }
    }

    /// Create enforcer over a fresh in-memory store
    pub fn in_memory(
        config: LimitsConfig,
        clock: SharedClock,
        ledger: Arc<VerificationLedger>,
        escalation: Arc<EscalationController>,
        metrics: RiskMetrics,
    ) -> Self {
        Self::new(config, clock, ledger, escalation, memory_store(), metrics)
    }

    fn load(&self, subject: &SubjectId, now: DateTime<Utc>) -> Result<LimitProfile> {
        Ok(self.load_tracked(subject, now)?.0)
    }

    /// Load with expiry applied; the flag is set when expiry changed the profile
    fn load_tracked(
        &self,
        subject: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<(LimitProfile, bool)> {
        let mut profile = self
            .store
            .get(subject.as_str())?
            .unwrap_or_else(|| LimitProfile::new(subject.clone()));
        let changed = refresh(&mut profile, now);
        Ok((profile, changed))
    }

    /// Read path that persists lapsed state, so an expired override is logged once
    fn load_and_settle(&self, subject: &SubjectId) -> Result<LimitProfile> {
        self.locks.with(subject, || {
            let (profile, changed) = self.load_tracked(subject, self.clock.now())?;
            if changed {
                self.save(profile.clone())?;
            }
            Ok(profile)
        })
    }

    fn save(&self, profile: LimitProfile) -> Result<()> {
        let key = profile.subject_id.to_string();
        self.store.put(&key, profile)?;
        Ok(())
    }

    fn resolve_tier(&self, subject: &SubjectId, restriction: &RestrictionState) -> Result<Tier> {
        if restriction.kind != RestrictionKind::None
            || !self.escalation.active_flags(subject)?.is_empty()
        {
            return Ok(Tier::Flagged);
        }
        if self.ledger.trust_level(subject)?.is_identity_verified() {
            Ok(Tier::Verified)
        } else {
            Ok(Tier::Unverified)
        }
    }

    fn tier_table(&self, tier: Tier) -> &LimitTable {
        match tier {
            Tier::Unverified => &self.config.unverified,
            Tier::Verified => &self.config.verified,
            Tier::Flagged => &self.config.flagged,
        }
    }

    fn effective(&self, tier: Tier, profile: &LimitProfile) -> EffectiveLimits {
        let base = self.tier_table(tier);
        match &profile.active_override {
            Some(o) => EffectiveLimits {
                tier,
                limits: o.limits.apply(base),
                override_expires_at: o.expires_at,
                has_override: true,
            },
            None => EffectiveLimits {
                tier,
                limits: base.clone(),
                override_expires_at: None,
                has_override: false,
            },
        }
    }

    fn evaluate(
        profile: &LimitProfile,
        limits: &LimitTable,
        restriction: &RestrictionState,
        action: &Action,
        now: DateTime<Utc>,
    ) -> Option<DenialReason> {
        if action.amount.map_or(false, |amount| amount <= Decimal::ZERO) {
            return Some(DenialReason::NonPositiveAmount);
        }
        if restriction.is_suspended() {
            return Some(DenialReason::Suspended);
        }
        if let Some(feature) = action.kind.feature() {
            if !restriction.permits(feature) {
                return Some(DenialReason::FeatureRestricted(feature));
            }
        }

        let requests = &profile.requests;
        if requests.count_since(now - Duration::minutes(1)) >= limits.requests_per_minute as usize {
            return Some(DenialReason::RequestsPerMinute);
        }
        if requests.count_since(now - Duration::hours(1)) >= limits.requests_per_hour as usize {
            return Some(DenialReason::RequestsPerHour);
        }
        if requests.count() >= limits.requests_per_day as usize {
            return Some(DenialReason::RequestsPerDay);
        }

        if let (true, Some(amount)) = (action.kind.is_spend(), action.amount) {
            if amount > limits.max_transaction_amount {
                return Some(DenialReason::PerTransactionCeiling);
            }
            if profile.rolling_window.total() + amount > limits.daily_limit {
                return Some(DenialReason::DailyLimit);
            }
            if profile.monthly_window.total() + amount > limits.monthly_limit {
                return Some(DenialReason::MonthlyLimit);
            }
        }

        match action.kind {
            ActionKind::Booking => {
                if profile.bookings.count() >= limits.max_bookings_per_day as usize {
                    return Some(DenialReason::BookingsPerDay);
                }
                if profile.open_bookings >= limits.max_concurrent_bookings {
                    return Some(DenialReason::ConcurrentBookings);
                }
            }
            ActionKind::Refund => {
                if profile.refunds.count() >= limits.max_refunds_per_month as usize {
                    return Some(DenialReason::RefundsPerMonth);
                }
            }
            _ => {}
        }

        None
    }

    fn commit(profile: &mut LimitProfile, action: &Action, now: DateTime<Utc>) {
        profile.requests.add_event(now);
        if let (true, Some(amount)) = (action.kind.is_spend(), action.amount) {
            profile.rolling_window.add(amount, now);
            profile.monthly_window.add(amount, now);
        }
        match action.kind {
            ActionKind::Booking => {
                profile.bookings.add_event(now);
                profile.open_bookings += 1;
            }
            ActionKind::Refund => profile.refunds.add_event(now),
            _ => {}
        }
    }

    /// Gate an action; allowed actions are recorded in the windows
    pub fn check(&self, subject: &SubjectId, action: &Action) -> Result<LimitDecision> {
        let restriction = self.escalation.restriction(subject)?;
        let tier = self.resolve_tier(subject, &restriction)?;

        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut profile = self.load(subject, now)?;
            let limits = self.effective(tier, &profile).limits;

            let reason = Self::evaluate(&profile, &limits, &restriction, action, now);
            if reason.is_none() {
                Self::commit(&mut profile, action, now);
            }

            let daily_spent = profile.rolling_window.total();
            let decision = LimitDecision {
                allowed: reason.is_none(),
                reason,
                tier,
                daily_spent,
                limit: limits.daily_limit,
                remaining: (limits.daily_limit - daily_spent).max(Decimal::ZERO),
                reset_at: profile.reset_at(now),
            };
            self.save(profile)?;
            self.metrics.record_limit_decision(decision.allowed);

            match decision.reason {
                Some(reason) => warn!(
                    subject = %subject,
                    tier = ?tier,
                    action = ?action.kind,
                    amount = ?action.amount,
                    %reason,
                    "Limit check denied"
                ),
                None => debug!(
                    subject = %subject,
                    tier = ?tier,
                    action = ?action.kind,
                    daily_spent = %decision.daily_spent,
                    "Limit check allowed"
                ),
            }
            Ok(decision)
        })
    }

    /// Append a committed or historical transaction without gating
    pub fn record(&self, subject: &SubjectId, amount: Decimal, at: DateTime<Utc>) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "recorded amount must be positive, got {}",
                amount
            )));
        }
        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut profile = self.load(subject, now)?;
            profile.rolling_window.add(amount, at);
            profile.monthly_window.add(amount, at);
            refresh(&mut profile, now);
            self.save(profile)?;

            debug!(subject = %subject, %amount, %at, "Transaction recorded");
            Ok(())
        })
    }

    /// Install a custom override; fields above the hard ceiling are rejected
    pub fn set_override(
        &self,
        subject: &SubjectId,
        overrides: LimitOverrides,
        meta: OverrideMeta,
    ) -> Result<LimitOverride> {
        if let Err(err) = overrides.check_ceiling(&self.config.ceiling) {
            warn!(subject = %subject, modified_by = %meta.modified_by, %err, "Override rejected");
            return Err(err);
        }

        self.locks.with(subject, || {
            let now = self.clock.now();
            let expires_at = match meta.duration_secs {
                Some(secs) => Some(deadline_after_secs(now, secs).ok_or_else(|| {
                    Error::InvalidInput(format!("override duration {}s out of range", secs))
                })?),
                None => None,
            };
            let mut profile = self.load(subject, now)?;

            let installed = LimitOverride {
                limits: overrides.clone(),
                expires_at,
                modified_by: meta.modified_by.clone(),
                reason: meta.reason.clone(),
                set_at: now,
            };
            profile.override_history.push(OverrideChange {
                action: OverrideAction::Set,
                at: now,
                modified_by: meta.modified_by.clone(),
                reason: meta.reason.clone(),
                limits: Some(overrides),
            });
            profile.active_override = Some(installed.clone());
            self.save(profile)?;

            info!(
                subject = %subject,
                modified_by = %installed.modified_by,
                reason = %installed.reason,
                expires_at = ?installed.expires_at,
                "Limit override set"
            );
            Ok(installed)
        })
    }

    /// Remove the active override
    pub fn clear_override(
        &self,
        subject: &SubjectId,
        meta: OverrideMeta,
    ) -> Result<Option<LimitOverride>> {
        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut profile = self.load(subject, now)?;
            let removed = profile.active_override.take();
            if removed.is_some() {
                profile.override_history.push(OverrideChange {
                    action: OverrideAction::Cleared,
                    at: now,
                    modified_by: meta.modified_by.clone(),
                    reason: meta.reason.clone(),
                    limits: None,
                });
                info!(subject = %subject, modified_by = %meta.modified_by, "Limit override cleared");
            }
            self.save(profile)?;
            Ok(removed)
        })
    }

    /// Limits currently in force
    pub fn effective_limits(&self, subject: &SubjectId) -> Result<EffectiveLimits> {
        let restriction = self.escalation.restriction(subject)?;
        let tier = self.resolve_tier(subject, &restriction)?;
        let profile = self.load_and_settle(subject)?;
        Ok(self.effective(tier, &profile))
    }

    /// Close one open booking; returns the remaining open count
    pub fn release_booking(&self, subject: &SubjectId) -> Result<u32> {
        self.locks.with(subject, || {
            let mut profile = self.load(subject, self.clock.now())?;
            profile.open_bookings = profile.open_bookings.saturating_sub(1);
            let open = profile.open_bookings;
            self.save(profile)?;
            Ok(open)
        })
    }

    /// Current limit state, with windows pruned
    pub fn profile(&self, subject: &SubjectId) -> Result<LimitProfile> {
        self.load_and_settle(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EscalationConfig;
    use crate::escalation::{RestrictionPolicy, SuspensionTrigger};
    use crate::notify::LogNotifier;
    use crate::types::{FlagReason, Incident};
    use rust_decimal_macros::dec;
    use trust_ledger::{
        IdentityClaim, LedgerConfig, ManualClock, ReviewDecision, ReviewMeta, Severity,
    };

    struct Fixture {
        clock: ManualClock,
        ledger: Arc<VerificationLedger>,
        escalation: Arc<EscalationController>,
        limits: LimitEnforcer,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::default();
        let shared: SharedClock = Arc::new(clock.clone());
        let metrics = RiskMetrics::new().unwrap();
        let ledger = Arc::new(VerificationLedger::in_memory(LedgerConfig::default(), shared.clone()));
        let escalation = Arc::new(EscalationController::in_memory(
            EscalationConfig::default(),
            shared.clone(),
            Arc::new(LogNotifier),
            metrics.clone(),
        ));
        let limits = LimitEnforcer::in_memory(
            LimitsConfig::default(),
            shared,
            ledger.clone(),
            escalation.clone(),
            metrics,
        );
        Fixture {
            clock,
            ledger,
            escalation,
            limits,
        }
    }

    fn verify(f: &Fixture, subject: &SubjectId) {
        let record = f
            .ledger
            .submit_identity(
                subject,
                IdentityClaim {
                    document_type: "passport".to_string(),
                    document_number: "X1234567".to_string(),
                    claimed_name: "Lee Park".to_string(),
                },
            )
            .unwrap();
        f.ledger
            .review_identity(
                record.id,
                ReviewDecision::Approve,
                ReviewMeta {
                    reviewed_by: "ops".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    fn meta() -> OverrideMeta {
        OverrideMeta {
            modified_by: "ops-lead".to_string(),
            reason: "corporate account".to_string(),
            duration_secs: None,
        }
    }

    #[test]
    fn test_seeded_history_and_per_transaction_ceiling() {
        let f = fixture();
        let s = SubjectId::new("user456");
        let now = f.clock_now();
        f.limits.record(&s, dec!(1000), now).unwrap();
        f.limits.record(&s, dec!(2000), now - Duration::hours(1)).unwrap();
        f.limits.record(&s, dec!(8000), now - Duration::hours(2)).unwrap();

        let status = f.limits.check(&s, &Action::request()).unwrap();
        assert!(status.allowed);
        assert_eq!(status.daily_spent, dec!(11000));
        assert_eq!(status.remaining, Decimal::ZERO);
        assert_eq!(status.reset_at, now - Duration::hours(2) + Duration::hours(24));

        let denied = f.limits.check(&s, &Action::payment(dec!(100000))).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.reason, Some(DenialReason::PerTransactionCeiling));
        assert_eq!(denied.tier, Tier::Unverified);
        assert_eq!(denied.daily_spent, dec!(11000));
    }

    #[test]
    fn test_window_prunes_after_24h() {
        let f = fixture();
        let s = SubjectId::new("u-window");
        let first = f.limits.check(&s, &Action::payment(dec!(400))).unwrap();
        assert!(first.allowed);
        assert_eq!(first.remaining, dec!(600));

        f.clock.advance(Duration::hours(23));
        let second = f.limits.check(&s, &Action::payment(dec!(400))).unwrap();
        assert_eq!(second.daily_spent, dec!(800));

        let third = f.limits.check(&s, &Action::payment(dec!(400))).unwrap();
        assert_eq!(third.reason, Some(DenialReason::DailyLimit));

        f.clock.advance(Duration::hours(1));
        let fourth = f.limits.check(&s, &Action::payment(dec!(400))).unwrap();
        assert!(fourth.allowed);
        assert_eq!(fourth.daily_spent, dec!(800));
    }

    #[test]
    fn test_verified_tier_and_flagged_tier() {
        let f = fixture();
        let s = SubjectId::new("u-tier");
        verify(&f, &s);

        let big = f.limits.check(&s, &Action::payment(dec!(20000))).unwrap();
        assert!(big.allowed);
        assert_eq!(big.tier, Tier::Verified);

        f.escalation
            .flag(
                &s,
                Incident {
                    reason: FlagReason::SuspiciousPayment,
                    description: "mismatched billing".to_string(),
                    severity: Severity::Medium,
                },
            )
            .unwrap();
        let limited = f.limits.check(&s, &Action::payment(dec!(150))).unwrap();
        assert_eq!(limited.tier, Tier::Flagged);
        assert_eq!(limited.reason, Some(DenialReason::PerTransactionCeiling));
    }

    #[test]
    fn test_suspension_and_restriction_deny() {
        let f = fixture();
        let s = SubjectId::new("u-susp");
        f.escalation
            .restrict(
                &s,
                RestrictionPolicy {
                    restricted_features: vec![Feature::RequestRefund],
                    reason: "refund abuse".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        let refund = f.limits.check(&s, &Action::refund(dec!(20))).unwrap();
        assert_eq!(
            refund.reason,
            Some(DenialReason::FeatureRestricted(Feature::RequestRefund))
        );
        assert!(f.limits.check(&s, &Action::payment(dec!(20))).unwrap().allowed);

        f.escalation
            .suspend(
                &s,
                SuspensionTrigger {
                    severity: Severity::High,
                    reason: "fraud".to_string(),
                },
            )
            .unwrap();
        let any = f.limits.check(&s, &Action::request()).unwrap();
        assert_eq!(any.reason, Some(DenialReason::Suspended));
    }

    #[test]
    fn test_bookings_and_concurrency() {
        let f = fixture();
        let s = SubjectId::new("u-book");

        assert!(f.limits.check(&s, &Action::booking(dec!(50))).unwrap().allowed);
        assert!(f.limits.check(&s, &Action::booking(dec!(50))).unwrap().allowed);
        let third = f.limits.check(&s, &Action::booking(dec!(50))).unwrap();
        assert_eq!(third.reason, Some(DenialReason::ConcurrentBookings));

        assert_eq!(f.limits.release_booking(&s).unwrap(), 1);
        assert!(f.limits.check(&s, &Action::booking(dec!(50))).unwrap().allowed);
    }

    #[test]
    fn test_refunds_per_month() {
        let f = fixture();
        let s = SubjectId::new("u-refund");
        assert!(f.limits.check(&s, &Action::refund(dec!(900))).unwrap().allowed);
        let second = f.limits.check(&s, &Action::refund(dec!(10))).unwrap();
        assert_eq!(second.reason, Some(DenialReason::RefundsPerMonth));
        // Refund amounts are not spend
        assert_eq!(second.daily_spent, Decimal::ZERO);
    }

    #[test]
    fn test_request_rate_per_minute() {
        let f = fixture();
        let s = SubjectId::new("u-rate");
        for _ in 0..10 {
            assert!(f.limits.check(&s, &Action::request()).unwrap().allowed);
        }
        let eleventh = f.limits.check(&s, &Action::request()).unwrap();
        assert_eq!(eleventh.reason, Some(DenialReason::RequestsPerMinute));

        f.clock.advance(Duration::seconds(61));
        assert!(f.limits.check(&s, &Action::request()).unwrap().allowed);
    }

    #[test]
    fn test_override_above_ceiling_errors() {
        let f = fixture();
        let s = SubjectId::new("u-ceiling");
        let err = f
            .limits
            .set_override(
                &s,
                LimitOverrides {
                    max_transaction_amount: Some(dec!(999999999)),
                    ..Default::default()
                },
                meta(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CeilingExceeded {
                field: "max_transaction_amount",
                ..
            }
        ));
        assert!(!f.limits.effective_limits(&s).unwrap().has_override);
    }

    #[test]
    fn test_override_layers_and_expires() {
        let f = fixture();
        let s = SubjectId::new("u-override");
        f.limits
            .set_override(
                &s,
                LimitOverrides {
                    max_transaction_amount: Some(dec!(5000)),
                    daily_limit: Some(dec!(8000)),
                    ..Default::default()
                },
                OverrideMeta {
                    duration_secs: Some(3_600),
                    ..meta()
                },
            )
            .unwrap();

        let effective = f.limits.effective_limits(&s).unwrap();
        assert_eq!(effective.limits.max_transaction_amount, dec!(5000));
        assert_eq!(effective.limits.monthly_limit, dec!(2500));
        assert!(f.limits.check(&s, &Action::payment(dec!(2000))).unwrap().allowed);

        f.clock.advance(Duration::hours(1));
        let effective = f.limits.effective_limits(&s).unwrap();
        assert!(!effective.has_override);
        assert_eq!(effective.limits.max_transaction_amount, dec!(500));

        let denied = f.limits.check(&s, &Action::payment(dec!(2000))).unwrap();
        assert_eq!(denied.reason, Some(DenialReason::PerTransactionCeiling));

        let history = f.limits.profile(&s).unwrap().override_history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].action, OverrideAction::Expired);
    }

    #[test]
    fn test_clear_override() {
        let f = fixture();
        let s = SubjectId::new("u-clear");
        f.limits
            .set_override(
                &s,
                LimitOverrides {
                    requests_per_minute: Some(200),
                    ..Default::default()
                },
                meta(),
            )
            .unwrap();
        assert!(f.limits.clear_override(&s, meta()).unwrap().is_some());
        assert!(f.limits.clear_override(&s, meta()).unwrap().is_none());
        assert_eq!(
            f.limits.effective_limits(&s).unwrap().limits.requests_per_minute,
            10
        );
    }

    #[test]
    fn test_non_positive_amounts_never_offset_spend() {
        let f = fixture();
        let s = SubjectId::new("u-negative");

        let negative = f.limits.check(&s, &Action::payment(dec!(-100000))).unwrap();
        assert!(!negative.allowed);
        assert_eq!(negative.reason, Some(DenialReason::NonPositiveAmount));
        let zero = f.limits.check(&s, &Action::payment(Decimal::ZERO)).unwrap();
        assert_eq!(zero.reason, Some(DenialReason::NonPositiveAmount));
        assert_eq!(zero.daily_spent, Decimal::ZERO);

        let allowed = (0..5)
            .filter(|_| f.limits.check(&s, &Action::payment(dec!(500))).unwrap().allowed)
            .count();
        assert_eq!(allowed, 2);
        assert_eq!(f.limits.profile(&s).unwrap().rolling_window.total(), dec!(1000));

        let err = f.limits.record(&s, dec!(-50), f.clock_now()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(f.limits.profile(&s).unwrap().rolling_window.total(), dec!(1000));
    }

    #[test]
    fn test_override_duration_out_of_range() {
        let f = fixture();
        let s = SubjectId::new("u-forever");
        for secs in [i64::MAX, -1] {
            let err = f
                .limits
                .set_override(
                    &s,
                    LimitOverrides {
                        daily_limit: Some(dec!(5000)),
                        ..Default::default()
                    },
                    OverrideMeta {
                        duration_secs: Some(secs),
                        ..meta()
                    },
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
        assert!(!f.limits.effective_limits(&s).unwrap().has_override);
        assert!(f.limits.profile(&s).unwrap().override_history.is_empty());
    }

    #[test]
    fn test_expired_override_logged_once_across_reads() {
        let f = fixture();
        let s = SubjectId::new("u-reads");
        f.limits
            .set_override(
                &s,
                LimitOverrides {
                    daily_limit: Some(dec!(3000)),
                    ..Default::default()
                },
                OverrideMeta {
                    duration_secs: Some(60),
                    ..meta()
                },
            )
            .unwrap();

        f.clock.advance(Duration::minutes(5));
        let first_seen = f.clock_now();
        assert!(!f.limits.effective_limits(&s).unwrap().has_override);

        // Later reads see the stored expiry rather than deriving a new one
        f.clock.advance(Duration::minutes(10));
        f.limits.effective_limits(&s).unwrap();
        let history = f.limits.profile(&s).unwrap().override_history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].action, OverrideAction::Expired);
        assert_eq!(history[1].at, first_seen);
    }

    impl Fixture {
        fn clock_now(&self) -> DateTime<Utc> {
            use trust_ledger::Clock;
            self.clock.now()
        }
    }
}
