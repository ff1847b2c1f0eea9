//! Risk scoring engine
//!
//! Pure function of the active flags, the subject's trust level and the
//! behavioural signals of the current action. Never mutates state.

use crate::{
    config::ScoringWeights,
    types::{RecommendedAction, RiskAssessment, RiskFlag, RiskLevel, RiskScore, RiskSignals},
};
use chrono::{DateTime, Utc};
use trust_ledger::{Severity, SubjectId, TrustLevel};

/// Risk scorer
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    weights: ScoringWeights,
}

impl RiskScorer {
    /// Create new risk scorer
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    fn contributions(
        &self,
        flags: &[RiskFlag],
        trust_level: TrustLevel,
        signals: &RiskSignals,
    ) -> Vec<(u32, String)> {
        let w = &self.weights;
        let mut factors = Vec::new();

        if !flags.is_empty() {
            factors.push((
                w.per_flag * flags.len() as u32,
                format!("{} active flag(s)", flags.len()),
            ));
        }

        let critical = flags
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count() as u32;
        if critical > 0 {
            factors.push((
                w.critical_flag * critical,
                format!("{} critical flag(s)", critical),
            ));
        }

        if trust_level == TrustLevel::UNVERIFIED {
            factors.push((w.unverified, "Unverified subject".to_string()));
        }
        if signals.new_location {
            factors.push((w.new_location, "New location".to_string()));
        }
        if signals.new_device {
            factors.push((w.new_device, "New device".to_string()));
        }
        if signals.unusual_time {
            factors.push((w.unusual_time, "Unusual time of day".to_string()));
        }
        if signals.rapid_transactions {
            factors.push((w.rapid_transactions, "Rapid repeated transactions".to_string()));
        }

        factors
    }

    /// Score an action (0-100)
    pub fn score(
        &self,
        flags: &[RiskFlag],
        trust_level: TrustLevel,
        signals: &RiskSignals,
    ) -> RiskScore {
        let sum = self
            .contributions(flags, trust_level, signals)
            .iter()
            .map(|(points, _)| *points)
            .sum();
        RiskScore::capped(sum)
    }

    /// Score plus level, recommended action and factor list
    pub fn assess(
        &self,
        subject: &SubjectId,
        flags: &[RiskFlag],
        trust_level: TrustLevel,
        signals: &RiskSignals,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let contributions = self.contributions(flags, trust_level, signals);
        let risk_score = RiskScore::capped(contributions.iter().map(|(p, _)| *p).sum());
        let risk_level = RiskLevel::from(risk_score);

        tracing::debug!(
            subject = %subject,
            score = risk_score.score(),
            level = ?risk_level,
            "Risk assessed"
        );

        RiskAssessment {
            subject_id: subject.clone(),
            risk_score,
            risk_level,
            recommended_action: RecommendedAction::from(risk_level),
            risk_factors: contributions.into_iter().map(|(_, f)| f).collect(),
            assessed_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlagReason;
    use uuid::Uuid;

    fn flag(severity: Severity) -> RiskFlag {
        RiskFlag {
            id: Uuid::now_v7(),
            subject_id: SubjectId::new("s"),
            reason: FlagReason::SuspiciousPayment,
            description: "test".to_string(),
            severity,
            flagged_at: Utc::now(),
            requires_immediate_action: severity == Severity::Critical,
            security_team_notified: false,
        }
    }

    #[test]
    fn test_clean_verified_subject_scores_zero() {
        let scorer = RiskScorer::default();
        let score = scorer.score(&[], TrustLevel::IDENTITY_VERIFIED, &RiskSignals::default());
        assert_eq!(score.score(), 0);
    }

    #[test]
    fn test_signal_increments() {
        let scorer = RiskScorer::default();
        let signals = RiskSignals {
            new_device: true,
            new_location: true,
            unusual_time: true,
            rapid_transactions: true,
        };
        // 15 + 15 + 15 + 10 + 15
        assert_eq!(scorer.score(&[], TrustLevel::UNVERIFIED, &signals).score(), 70);
    }

    #[test]
    fn test_critical_flags_weighted_and_capped() {
        let scorer = RiskScorer::default();
        let one = scorer.score(&[flag(Severity::Medium)], TrustLevel::FULLY_VERIFIED, &RiskSignals::default());
        assert_eq!(one.score(), 36);

        let critical = scorer.score(&[flag(Severity::Critical)], TrustLevel::FULLY_VERIFIED, &RiskSignals::default());
        assert_eq!(critical.score(), 86);

        let many = vec![flag(Severity::Critical), flag(Severity::Critical)];
        assert_eq!(scorer.score(&many, TrustLevel::UNVERIFIED, &RiskSignals::default()).score(), 100);
    }

    #[test]
    fn test_assessment_level_and_action() {
        let scorer = RiskScorer::default();
        let assessment = scorer.assess(
            &SubjectId::new("s"),
            &[flag(Severity::High)],
            TrustLevel::UNVERIFIED,
            &RiskSignals::default(),
            Utc::now(),
        );

        assert_eq!(assessment.risk_score.score(), 51);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.recommended_action, RecommendedAction::Challenge);
        assert_eq!(assessment.risk_factors.len(), 2);
    }
}
