use crate::config::ComplianceConfig;
use crate::error::{ComplianceError, Result};
use crate::types::{
    ExpiringPolicy, InsuranceExpiryStatus, InsurancePolicy, InsuranceType, PolicyClaim,
};
use chrono::Duration;
use rust_decimal::Decimal;
use tracing::{info, warn};
use trust_ledger::expiry::elapsed;
use trust_ledger::storage::{memory_store, SharedStore};
use trust_ledger::{SharedClock, SubjectId};
use uuid::Uuid;

/// InsuranceRegistry validates and stores partner insurance policies
pub struct InsuranceRegistry {
    config: ComplianceConfig,
    clock: SharedClock,
    store: SharedStore<InsurancePolicy>,
}

impl InsuranceRegistry {
    pub fn new(
        config: ComplianceConfig,
        clock: SharedClock,
        store: SharedStore<InsurancePolicy>,
    ) -> Self {
        Self {
            config,
            clock,
            store,
        }
    }

    pub fn in_memory(config: ComplianceConfig, clock: SharedClock) -> Self {
        Self::new(config, clock, memory_store())
    }

    fn validate(&self, claim: &PolicyClaim) -> Result<()> {
        if claim.policy_number.trim().len() < self.config.min_policy_number_len {
            return Err(ComplianceError::InvalidInsurancePolicy(format!(
                "policy number must be at least {} characters",
                self.config.min_policy_number_len
            )));
        }
        if claim.starts_at >= claim.expires_at {
            return Err(ComplianceError::InvalidInsurancePolicy(
                "policy must start before it expires".to_string(),
            ));
        }
        if elapsed(claim.expires_at, self.clock.now()) {
            return Err(ComplianceError::InvalidInsurancePolicy(
                "policy has already expired".to_string(),
            ));
        }
        if claim.coverage_amount < self.config.min_policy_coverage {
            return Err(ComplianceError::InvalidInsurancePolicy(format!(
                "coverage below minimum of {}",
                self.config.min_policy_coverage
            )));
        }
        Ok(())
    }

    pub fn register(&self, subject: &SubjectId, claim: PolicyClaim) -> Result<InsurancePolicy> {
        if let Err(e) = self.validate(&claim) {
            warn!(subject = %subject, policy = %claim.policy_number, "Insurance rejected: {}", e);
            return Err(e);
        }

        let policy = InsurancePolicy {
            id: Uuid::now_v7(),
            subject_id: subject.clone(),
            insurance_type: claim.insurance_type,
            provider: claim.provider,
            policy_number: claim.policy_number,
            coverage_amount: claim.coverage_amount,
            starts_at: claim.starts_at,
            expires_at: claim.expires_at,
            verified: true,
            registered_at: self.clock.now(),
        };
        self.store.put(&policy.id.to_string(), policy.clone())?;

        info!(
            subject = %subject,
            insurance_type = ?policy.insurance_type,
            coverage = %policy.coverage_amount,
            expires_at = %policy.expires_at,
            "Insurance policy registered"
        );
        Ok(policy)
    }

    pub fn policies_for(&self, subject: &SubjectId) -> Result<Vec<InsurancePolicy>> {
        let mut policies = self.store.scan(&|p| &p.subject_id == subject)?;
        policies.sort_by_key(|p| (p.registered_at, p.id));
        Ok(policies)
    }

    /// Verified policies that have not expired
    pub fn active_policies(&self, subject: &SubjectId) -> Result<Vec<InsurancePolicy>> {
        let now = self.clock.now();
        Ok(self
            .policies_for(subject)?
            .into_iter()
            .filter(|p| p.is_active(now))
            .collect())
    }

    /// Some active policy covers at least `minimum`
    pub fn has_sufficient_coverage(&self, subject: &SubjectId, minimum: Decimal) -> Result<bool> {
        Ok(self
            .active_policies(subject)?
            .iter()
            .any(|p| p.coverage_amount >= minimum))
    }

    /// Required types with no active policy
    pub fn missing_types(
        &self,
        subject: &SubjectId,
        required: &[InsuranceType],
    ) -> Result<Vec<InsuranceType>> {
        let active = self.active_policies(subject)?;
        Ok(required
            .iter()
            .copied()
            .filter(|t| !active.iter().any(|p| p.insurance_type == *t))
            .collect())
    }

    /// Policies expiring within the warning window, and those already expired
    pub fn expiry_status(&self, subject: &SubjectId) -> Result<InsuranceExpiryStatus> {
        let now = self.clock.now();
        let horizon = now + Duration::days(self.config.expiry_warning_days);
        let mut status = InsuranceExpiryStatus::default();

        for policy in self.policies_for(subject)?.into_iter().filter(|p| p.verified) {
            if elapsed(policy.expires_at, now) {
                status.expired.push(policy.insurance_type);
            } else if elapsed(policy.expires_at, horizon) {
                let remaining = policy.expires_at - now;
                // Partial days round up
                let days = (remaining.num_seconds() + 86_399) / 86_400;
                status.expiring.push(ExpiringPolicy {
                    insurance_type: policy.insurance_type,
                    provider: policy.provider,
                    days_until_expiry: days,
                });
            }
        }
        Ok(status)
    }
}
