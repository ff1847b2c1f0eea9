use crate::config::ComplianceConfig;
use crate::error::{ComplianceError, Result};
use crate::types::{BackgroundCheckRecord, CheckCategory, CheckStatus};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use trust_ledger::expiry::{elapsed_opt, refresh, Expiring};
use trust_ledger::storage::{memory_store, SharedStore, SubjectLocks};
use trust_ledger::{SharedClock, SubjectId};
use uuid::Uuid;

impl Expiring for BackgroundCheckRecord {
    fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == CheckStatus::Completed && elapsed_opt(self.valid_until, now) {
            self.status = CheckStatus::Expired;
            return true;
        }
        false
    }
}

/// BackgroundChecks records third-party screening results per subject
pub struct BackgroundChecks {
    config: ComplianceConfig,
    clock: SharedClock,
    store: SharedStore<BackgroundCheckRecord>,
    locks: SubjectLocks,
}

impl BackgroundChecks {
    pub fn new(
        config: ComplianceConfig,
        clock: SharedClock,
        store: SharedStore<BackgroundCheckRecord>,
    ) -> Self {
        Self {
            config,
            clock,
            store,
            locks: SubjectLocks::new(),
        }
    }

    pub fn in_memory(config: ComplianceConfig, clock: SharedClock) -> Self {
        Self::new(config, clock, memory_store())
    }

    pub fn initiate(
        &self,
        subject: &SubjectId,
        category: CheckCategory,
    ) -> Result<BackgroundCheckRecord> {
        self.locks.with(subject, || {
            let record = BackgroundCheckRecord {
                id: Uuid::now_v7(),
                subject_id: subject.clone(),
                category,
                status: CheckStatus::InProgress,
                clearance: None,
                initiated_at: self.clock.now(),
                completed_at: None,
                valid_until: None,
            };
            self.store.put(&record.id.to_string(), record.clone())?;

            info!(subject = %subject, category = category.as_str(), "Background check initiated");
            Ok(record)
        })
    }

    fn finish(
        &self,
        subject: &SubjectId,
        category: CheckCategory,
        status: CheckStatus,
        clearance: Option<bool>,
    ) -> Result<BackgroundCheckRecord> {
        self.locks.with(subject, || {
            let mut record = self
                .store
                .scan(&|r| {
                    &r.subject_id == subject
                        && r.category == category
                        && r.status == CheckStatus::InProgress
                })?
                .into_iter()
                .max_by_key(|r| (r.initiated_at, r.id))
                .ok_or_else(|| ComplianceError::CheckNotFound {
                    subject: subject.to_string(),
                    category: category.as_str().to_string(),
                })?;

            let now = self.clock.now();
            record.status = status;
            record.clearance = clearance;
            record.completed_at = Some(now);
            if status == CheckStatus::Completed {
                record.valid_until =
                    Some(now + Duration::days(self.config.background_check_validity_days));
            }
            self.store.put(&record.id.to_string(), record.clone())?;
            Ok(record)
        })
    }

    /// Record the provider's result for the subject's pending check
    pub fn complete(
        &self,
        subject: &SubjectId,
        category: CheckCategory,
        clearance: bool,
    ) -> Result<BackgroundCheckRecord> {
        let record = self.finish(subject, category, CheckStatus::Completed, Some(clearance))?;
        if clearance {
            info!(subject = %subject, category = category.as_str(), "Background check cleared");
        } else {
            warn!(subject = %subject, category = category.as_str(), "Background check not cleared");
        }
        Ok(record)
    }

    /// The provider could not run the check
    pub fn fail(&self, subject: &SubjectId, category: CheckCategory) -> Result<BackgroundCheckRecord> {
        let record = self.finish(subject, category, CheckStatus::Failed, None)?;
        warn!(subject = %subject, category = category.as_str(), "Background check failed");
        Ok(record)
    }

    /// Most recent check of a category, with expiry applied
    pub fn latest(
        &self,
        subject: &SubjectId,
        category: CheckCategory,
    ) -> Result<Option<BackgroundCheckRecord>> {
        let now = self.clock.now();
        let latest = self
            .store
            .scan(&|r| &r.subject_id == subject && r.category == category)?
            .into_iter()
            .max_by_key(|r| (r.initiated_at, r.id))
            .map(|mut r| {
                refresh(&mut r, now);
                r
            });
        Ok(latest)
    }

    pub fn checks_for(&self, subject: &SubjectId) -> Result<Vec<BackgroundCheckRecord>> {
        let now = self.clock.now();
        let mut checks = self.store.scan(&|r| &r.subject_id == subject)?;
        for check in &mut checks {
            refresh(check, now);
        }
        checks.sort_by_key(|r| (r.initiated_at, r.id));
        Ok(checks)
    }

    /// Every listed category has a current, cleared check
    pub fn passed(&self, subject: &SubjectId, categories: &[CheckCategory]) -> Result<bool> {
        for category in categories {
            match self.latest(subject, *category)? {
                Some(check) if check.is_cleared() => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}
