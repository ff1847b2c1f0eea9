//! Escalation ladder: flag, restrict, suspend, appeal
//!
//! # State machine
//!
//! ```text
//! clear -> flagged -> restricted -> suspended -> appealed
//!                                       ^            |
//!                                       +-- denied --+
//! ```
//!
//! Restrictions and suspensions lapse when `until` passes; this is applied
//! lazily on every read through [`refresh`]. A suspension is never
//! shortened by a later flag, restriction or suspension.

use crate::{
    config::EscalationConfig,
    metrics::RiskMetrics,
    notify::{Notifier, SubjectNotice},
    types::{Feature, Incident, RiskFlag},
    Error, Result,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use trust_ledger::{
    expiry::{deadline_after_secs, elapsed_opt, refresh, Expiring},
    storage::{memory_store, SharedStore, SubjectLocks},
    SharedClock, Severity, SubjectId,
};
use uuid::Uuid;

/// Restriction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    /// No restriction
    None,
    /// Some features blocked
    Restricted,
    /// Everything blocked
    Suspended,
}

/// Appeal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    /// Awaiting a decision
    Pending,
    /// Suspension lifted
    Granted,
    /// Suspension upheld
    Denied,
}

/// Appeal against a suspension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appeal {
    /// Subject's statement
    pub statement: String,
    /// Filed at
    pub filed_at: DateTime<Utc>,
    /// Status
    pub status: AppealStatus,
    /// Reviewer
    pub decided_by: Option<String>,
    /// Decided at
    pub decided_at: Option<DateTime<Utc>>,
}

/// Current restriction of a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionState {
    /// Subject
    pub subject_id: SubjectId,
    /// Kind
    pub kind: RestrictionKind,
    /// Blocked features (empty while restricted means everything not allowed)
    pub restricted_features: BTreeSet<Feature>,
    /// Features left open while restricted
    pub allowed_features: BTreeSet<Feature>,
    /// Reason
    pub reason: Option<String>,
    /// Lapses at
    pub until: Option<DateTime<Utc>>,
    /// Appeal deadline (suspensions only)
    pub appeal_deadline: Option<DateTime<Utc>>,
    /// Appeal, if one was filed
    pub appeal: Option<Appeal>,
}

impl RestrictionState {
    fn clear(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            kind: RestrictionKind::None,
            restricted_features: BTreeSet::new(),
            allowed_features: BTreeSet::new(),
            reason: None,
            until: None,
            appeal_deadline: None,
            appeal: None,
        }
    }

    /// Whether the feature may be used
    pub fn permits(&self, feature: Feature) -> bool {
        match self.kind {
            RestrictionKind::None => true,
            RestrictionKind::Suspended => false,
            RestrictionKind::Restricted => {
                if self.allowed_features.contains(&feature) {
                    true
                } else if self.restricted_features.is_empty() {
                    false
                } else {
                    !self.restricted_features.contains(&feature)
                }
            }
        }
    }

    /// Whether a suspension is active
    pub fn is_suspended(&self) -> bool {
        self.kind == RestrictionKind::Suspended
    }
}

/// Position on the escalation ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    /// Nothing on record
    Clear,
    /// Active flags
    Flagged,
    /// Features restricted
    Restricted,
    /// Suspended
    Suspended,
    /// Suspended with a pending appeal
    Appealed,
}

/// Restriction request
#[derive(Debug, Clone, Default)]
pub struct RestrictionPolicy {
    /// Features to block
    pub restricted_features: Vec<Feature>,
    /// Features to keep open (configured default when `None`)
    pub allowed_features: Option<Vec<Feature>>,
    /// Cooldown (configured default when `None`)
    pub cooldown_minutes: Option<i64>,
    /// Reason
    pub reason: String,
}

/// Suspension request
#[derive(Debug, Clone)]
pub struct SuspensionTrigger {
    /// Severity; drives the duration
    pub severity: Severity,
    /// Reason
    pub reason: String,
}

/// Suspension outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionOutcome {
    /// Whether a suspension is in force after the call
    pub suspended: bool,
    /// Reason
    pub reason: String,
    /// Duration requested by this trigger (hours)
    pub duration_hours: Option<i64>,
    /// Suspension end
    pub until: Option<DateTime<Utc>>,
    /// Appeal deadline
    pub appeal_deadline: Option<DateTime<Utc>>,
    /// Subject was notified
    pub subject_notified: bool,
}

/// Per-subject escalation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectEscalation {
    /// Subject
    pub subject_id: SubjectId,
    /// Every flag ever raised, oldest first
    pub flags: Vec<RiskFlag>,
    /// Current restriction
    pub restriction: RestrictionState,
}

impl SubjectEscalation {
    fn new(subject_id: SubjectId) -> Self {
        Self {
            restriction: RestrictionState::clear(subject_id.clone()),
            subject_id,
            flags: Vec::new(),
        }
    }
}

impl Expiring for SubjectEscalation {
    fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.restriction.kind != RestrictionKind::None
            && elapsed_opt(self.restriction.until, now)
        {
            self.restriction = RestrictionState::clear(self.subject_id.clone());
            return true;
        }
        false
    }
}

/// Escalation controller
pub struct EscalationController {
    config: EscalationConfig,
    clock: SharedClock,
    store: SharedStore<SubjectEscalation>,
    notifier: Arc<dyn Notifier>,
    metrics: RiskMetrics,
    locks: SubjectLocks,
}

impl EscalationController {
    /// Create controller over an injected store
    pub fn new(
        config: EscalationConfig,
        clock: SharedClock,
        store: SharedStore<SubjectEscalation>,
        notifier: Arc<dyn Notifier>,
        metrics: RiskMetrics,
    ) -> Self {
        Self {
            config,
            clock,
            store,
            notifier,
            metrics,
            locks: SubjectLocks::new(),
        }
    }

    /// Create controller over a fresh in-memory store
    pub fn in_memory(
        config: EscalationConfig,
        clock: SharedClock,
        notifier: Arc<dyn Notifier>,
        metrics: RiskMetrics,
    ) -> Self {
        Self::new(config, clock, memory_store(), notifier, metrics)
    }

    fn load(&self, subject: &SubjectId, now: DateTime<Utc>) -> Result<SubjectEscalation> {
        let mut record = self
            .store
            .get(subject.as_str())?
            .unwrap_or_else(|| SubjectEscalation::new(subject.clone()));
        refresh(&mut record, now);
        Ok(record)
    }

    fn save(&self, record: SubjectEscalation) -> Result<()> {
        let key = record.subject_id.to_string();
        self.store.put(&key, record)?;
        Ok(())
    }

    fn suspension_hours(&self, severity: Severity) -> Option<i64> {
        match severity {
            Severity::Low => None,
            Severity::Medium => Some(self.config.medium_suspension_hours),
            Severity::High => Some(self.config.high_suspension_hours),
            Severity::Critical => Some(self.config.critical_suspension_hours),
        }
    }

    /// Append a flag; the same reason twice in a row is rejected
    pub fn flag(&self, subject: &SubjectId, incident: Incident) -> Result<RiskFlag> {
        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut record = self.load(subject, now)?;

            if record.flags.last().map(|f| f.reason) == Some(incident.reason) {
                warn!(subject = %subject, reason = %incident.reason, "Duplicate consecutive flag");
                return Err(Error::DuplicateFlag(incident.reason));
            }

            let critical = incident.severity == Severity::Critical;
            let mut flag = RiskFlag {
                id: Uuid::now_v7(),
                subject_id: subject.clone(),
                reason: incident.reason,
                description: incident.description,
                severity: incident.severity,
                flagged_at: now,
                requires_immediate_action: critical,
                security_team_notified: false,
            };
            if critical {
                self.notifier.notify_security_team(&flag);
                flag.security_team_notified = true;
            }

            record.flags.push(flag.clone());
            self.save(record)?;
            self.metrics
                .flags
                .with_label_values(&[flag.severity.as_str()])
                .inc();

            warn!(
                subject = %subject,
                flag_id = %flag.id,
                reason = %flag.reason,
                severity = %flag.severity,
                "Subject flagged"
            );
            Ok(flag)
        })
    }

    /// Restrict features for a cooldown; never weakens a suspension
    pub fn restrict(
        &self,
        subject: &SubjectId,
        policy: RestrictionPolicy,
    ) -> Result<RestrictionState> {
        let cooldown = policy
            .cooldown_minutes
            .unwrap_or(self.config.default_cooldown_minutes);

        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut until = cooldown
                .checked_mul(60)
                .and_then(|secs| deadline_after_secs(now, secs))
                .ok_or_else(|| {
                    Error::InvalidInput(format!("cooldown of {} minutes out of range", cooldown))
                })?;
            let mut record = self.load(subject, now)?;

            if record.restriction.is_suspended() {
                warn!(subject = %subject, "Restriction ignored, suspension active");
                return Ok(record.restriction);
            }

            let mut restricted: BTreeSet<Feature> =
                policy.restricted_features.iter().copied().collect();

            let current = &record.restriction;
            if current.kind == RestrictionKind::Restricted {
                // An empty set blocks everything, so it absorbs any list
                if restricted.is_empty() || current.restricted_features.is_empty() {
                    restricted.clear();
                } else {
                    restricted.extend(current.restricted_features.iter().copied());
                }
                if let Some(existing) = current.until {
                    until = until.max(existing);
                }
            }

            let allowed: BTreeSet<Feature> = policy
                .allowed_features
                .unwrap_or_else(|| self.config.default_allowed_features.clone())
                .into_iter()
                .filter(|f| !restricted.contains(f))
                .collect();

            record.restriction = RestrictionState {
                subject_id: subject.clone(),
                kind: RestrictionKind::Restricted,
                restricted_features: restricted,
                allowed_features: allowed,
                reason: Some(policy.reason.clone()),
                until: Some(until),
                appeal_deadline: None,
                appeal: None,
            };
            let state = record.restriction.clone();
            self.save(record)?;

            self.notifier.notify_subject(
                subject,
                &SubjectNotice::Restricted {
                    reason: policy.reason,
                    until,
                    allowed_features: state.allowed_features.iter().copied().collect(),
                },
            );
            info!(subject = %subject, %until, cooldown_minutes = cooldown, "Subject restricted");
            Ok(state)
        })
    }

    /// Suspend for a severity-scaled duration; low severity is a no-op
    pub fn suspend(
        &self,
        subject: &SubjectId,
        trigger: SuspensionTrigger,
    ) -> Result<SuspensionOutcome> {
        let hours = match self.suspension_hours(trigger.severity) {
            Some(hours) => hours,
            None => {
                info!(subject = %subject, "Suspension skipped, severity too low");
                return Ok(SuspensionOutcome {
                    suspended: false,
                    reason: "Severity too low".to_string(),
                    duration_hours: None,
                    until: None,
                    appeal_deadline: None,
                    subject_notified: false,
                });
            }
        };

        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut record = self.load(subject, now)?;

            let mut until = now + Duration::hours(hours);
            let mut appeal_deadline = now + Duration::days(self.config.appeal_window_days);
            let mut appeal = None;
            let current = &record.restriction;
            if current.is_suspended() {
                until = until.max(current.until.unwrap_or(until));
                appeal_deadline = appeal_deadline.max(current.appeal_deadline.unwrap_or(appeal_deadline));
                appeal = current.appeal.clone();
            }

            record.restriction = RestrictionState {
                subject_id: subject.clone(),
                kind: RestrictionKind::Suspended,
                restricted_features: BTreeSet::new(),
                allowed_features: BTreeSet::new(),
                reason: Some(trigger.reason.clone()),
                until: Some(until),
                appeal_deadline: Some(appeal_deadline),
                appeal,
            };
            self.save(record)?;

            self.notifier.notify_subject(
                subject,
                &SubjectNotice::Suspended {
                    reason: trigger.reason.clone(),
                    until,
                    appeal_deadline,
                },
            );
            self.metrics.suspensions.inc();
            warn!(
                subject = %subject,
                severity = %trigger.severity,
                %until,
                "Subject suspended"
            );

            Ok(SuspensionOutcome {
                suspended: true,
                reason: trigger.reason,
                duration_hours: Some(hours),
                until: Some(until),
                appeal_deadline: Some(appeal_deadline),
                subject_notified: true,
            })
        })
    }

    /// File an appeal against an active suspension
    pub fn appeal(&self, subject: &SubjectId, statement: impl Into<String>) -> Result<Appeal> {
        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut record = self.load(subject, now)?;
            let restriction = &mut record.restriction;

            if !restriction.is_suspended() {
                return Err(Error::NotSuspended(subject.to_string()));
            }
            if elapsed_opt(restriction.appeal_deadline, now) {
                return Err(Error::AppealWindowClosed {
                    deadline: restriction.appeal_deadline.unwrap_or(now),
                });
            }
            if restriction.appeal.is_some() {
                return Err(Error::AppealAlreadyFiled(subject.to_string()));
            }

            let appeal = Appeal {
                statement: statement.into(),
                filed_at: now,
                status: AppealStatus::Pending,
                decided_by: None,
                decided_at: None,
            };
            restriction.appeal = Some(appeal.clone());
            self.save(record)?;

            info!(subject = %subject, "Appeal filed");
            Ok(appeal)
        })
    }

    /// Decide a pending appeal; granting lifts the suspension
    pub fn decide_appeal(
        &self,
        subject: &SubjectId,
        granted: bool,
        reviewer: &str,
    ) -> Result<RestrictionState> {
        self.locks.with(subject, || {
            let now = self.clock.now();
            let mut record = self.load(subject, now)?;

            let mut appeal = match &record.restriction.appeal {
                Some(appeal) if appeal.status == AppealStatus::Pending => appeal.clone(),
                _ => return Err(Error::NoPendingAppeal(subject.to_string())),
            };
            appeal.status = if granted {
                AppealStatus::Granted
            } else {
                AppealStatus::Denied
            };
            appeal.decided_by = Some(reviewer.to_string());
            appeal.decided_at = Some(now);

            if granted {
                let mut cleared = RestrictionState::clear(subject.clone());
                cleared.appeal = Some(appeal);
                record.restriction = cleared;
            } else {
                record.restriction.appeal = Some(appeal);
            }
            let state = record.restriction.clone();
            self.save(record)?;

            self.notifier
                .notify_subject(subject, &SubjectNotice::AppealDecided { granted });
            info!(subject = %subject, granted, reviewer, "Appeal decided");
            Ok(state)
        })
    }

    /// Current restriction, with lapsed state cleared
    pub fn restriction(&self, subject: &SubjectId) -> Result<RestrictionState> {
        Ok(self.load(subject, self.clock.now())?.restriction)
    }

    /// Flags within the retention window
    pub fn active_flags(&self, subject: &SubjectId) -> Result<Vec<RiskFlag>> {
        let now = self.clock.now();
        let since = now - Duration::days(self.config.flag_retention_days);
        Ok(self
            .load(subject, now)?
            .flags
            .into_iter()
            .filter(|f| f.flagged_at > since)
            .collect())
    }

    /// Every flag ever raised, optionally filtered by severity
    pub fn activity_log(
        &self,
        subject: &SubjectId,
        severity: Option<Severity>,
    ) -> Result<Vec<RiskFlag>> {
        Ok(self
            .load(subject, self.clock.now())?
            .flags
            .into_iter()
            .filter(|f| severity.map_or(true, |s| f.severity == s))
            .collect())
    }

    /// Position on the escalation ladder
    pub fn state(&self, subject: &SubjectId) -> Result<EscalationState> {
        let restriction = self.restriction(subject)?;
        let state = match restriction.kind {
            RestrictionKind::Suspended => match &restriction.appeal {
                Some(appeal) if appeal.status == AppealStatus::Pending => {
                    EscalationState::Appealed
                }
                _ => EscalationState::Suspended,
            },
            RestrictionKind::Restricted => EscalationState::Restricted,
            RestrictionKind::None if !self.active_flags(subject)?.is_empty() => {
                EscalationState::Flagged
            }
            RestrictionKind::None => EscalationState::Clear,
        };
        Ok(state)
    }
}
