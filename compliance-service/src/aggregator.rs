use crate::background::BackgroundChecks;
use crate::disputes::DisputeLedger;
use crate::error::Result;
use crate::insurance::InsuranceRegistry;
use crate::requirements::requirements_for;
use crate::types::{ComplianceVerdict, PartnerType};
use std::sync::Arc;
use tracing::{debug, info};
use trust_ledger::{SubjectId, VerificationLedger};

/// ComplianceAggregator derives a partner's compliance verdict on demand
///
/// Nothing is cached: every call reads verification, background checks,
/// insurance and disputes afresh.
pub struct ComplianceAggregator {
    ledger: Arc<VerificationLedger>,
    checks: Arc<BackgroundChecks>,
    insurance: Arc<InsuranceRegistry>,
    disputes: Arc<DisputeLedger>,
}

impl ComplianceAggregator {
    pub fn new(
        ledger: Arc<VerificationLedger>,
        checks: Arc<BackgroundChecks>,
        insurance: Arc<InsuranceRegistry>,
        disputes: Arc<DisputeLedger>,
    ) -> Self {
        Self {
            ledger,
            checks,
            insurance,
            disputes,
        }
    }

    pub fn verdict(&self, subject: &SubjectId, partner_type: PartnerType) -> Result<ComplianceVerdict> {
        let requirements = requirements_for(partner_type);
        let mut issues = Vec::new();

        let verified = self.ledger.is_verified(subject)?;
        if !verified {
            issues.push("Identity not verified".to_string());
        }

        let trust_level = self.ledger.trust_level(subject)?;
        if trust_level < requirements.min_trust_level {
            issues.push(format!(
                "Trust level {} below required {}",
                trust_level, requirements.min_trust_level
            ));
        }

        let background_check_passed = self
            .checks
            .passed(subject, &requirements.background_checks)?;
        if !background_check_passed {
            let names: Vec<&str> = requirements
                .background_checks
                .iter()
                .map(|c| c.as_str())
                .collect();
            issues.push(format!("Background checks not cleared: {}", names.join(", ")));
        }

        let insurance_active = !self.insurance.active_policies(subject)?.is_empty();
        if !insurance_active {
            issues.push("No active insurance".to_string());
        }

        let missing = self
            .insurance
            .missing_types(subject, &requirements.insurance_types)?;
        if !missing.is_empty() {
            issues.push(format!("Missing insurance types: {:?}", missing));
        }
        let covered = self
            .insurance
            .has_sufficient_coverage(subject, requirements.minimum_coverage)?;
        if !covered {
            issues.push(format!(
                "Coverage below minimum of {}",
                requirements.minimum_coverage
            ));
        }
        let sufficient_coverage = covered && missing.is_empty();

        let open_disputes = self.disputes.open_disputes_against(subject)?.len();
        if open_disputes > 0 {
            issues.push(format!("{} open dispute(s)", open_disputes));
        }

        let compliant = verified
            && background_check_passed
            && insurance_active
            && open_disputes == 0
            && trust_level >= requirements.min_trust_level
            && sufficient_coverage;

        debug!(subject = %subject, ?partner_type, issues = issues.len(), "Compliance evaluated");
        if compliant {
            info!(subject = %subject, ?partner_type, "Partner compliant");
        }

        Ok(ComplianceVerdict {
            subject_id: subject.clone(),
            partner_type,
            verified,
            trust_level,
            background_check_passed,
            insurance_active,
            sufficient_coverage,
            open_disputes,
            compliant,
            issues,
        })
    }
}
