//! Risk engine facade
//!
//! Wires the verification ledger, limit enforcer, pattern detector, scorer
//! and escalation controller into a single evaluation path.

use crate::{
    config::RiskConfig,
    escalation::{EscalationController, SuspensionOutcome, SuspensionTrigger},
    limits::{LimitDecision, LimitEnforcer},
    metrics::RiskMetrics,
    notify::Notifier,
    patterns::{ActivityEvent, PatternAnalysis, PatternDetector},
    scoring::RiskScorer,
    types::{Action, Incident, RecommendedAction, RiskAssessment, RiskFlag, RiskSignals},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use trust_ledger::{LedgerConfig, Severity, SharedClock, SubjectId, VerificationLedger};

/// Context submitted alongside an action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewInput {
    /// Behavioural signals of the current action
    pub signals: RiskSignals,
    /// Recent activity to scan for patterns
    pub events: Vec<ActivityEvent>,
    /// Free-form caller indicators
    pub indicators: Vec<String>,
}

/// Outcome of a full evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Limit check
    pub limit: LimitDecision,
    /// Risk assessment after any new flag
    pub assessment: RiskAssessment,
    /// Pattern scan
    pub patterns: PatternAnalysis,
    /// Flag raised by this evaluation
    pub flag_raised: Option<RiskFlag>,
    /// Suspension applied by this evaluation
    pub suspension: Option<SuspensionOutcome>,
    /// Final verdict
    pub allowed: bool,
}

fn pattern_severity(score: u8) -> Severity {
    match score {
        75..=u8::MAX => Severity::High,
        40..=74 => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Risk engine
pub struct RiskEngine {
    config: RiskConfig,
    clock: SharedClock,
    ledger: Arc<VerificationLedger>,
    escalation: Arc<EscalationController>,
    limits: LimitEnforcer,
    scorer: RiskScorer,
    detector: PatternDetector,
    metrics: RiskMetrics,
}

impl RiskEngine {
    /// Create engine around an existing verification ledger
    pub fn new(
        config: RiskConfig,
        clock: SharedClock,
        ledger: Arc<VerificationLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let metrics = RiskMetrics::new()?;

        let escalation = Arc::new(EscalationController::in_memory(
            config.escalation.clone(),
            clock.clone(),
            notifier,
            metrics.clone(),
        ));
        let limits = LimitEnforcer::in_memory(
            config.limits.clone(),
            clock.clone(),
            ledger.clone(),
            escalation.clone(),
            metrics.clone(),
        );

        info!(
            auto_suspend_score = config.engine.auto_suspend_score,
            "Risk engine initialized"
        );

        Ok(Self {
            scorer: RiskScorer::new(config.scoring.clone()),
            detector: PatternDetector::new(config.patterns.clone()),
            config,
            clock,
            ledger,
            escalation,
            limits,
            metrics,
        })
    }

    /// Create engine with its own in-memory ledger
    pub fn in_memory(
        config: RiskConfig,
        clock: SharedClock,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let ledger = Arc::new(VerificationLedger::in_memory(
            LedgerConfig::default(),
            clock.clone(),
        ));
        Self::new(config, clock, ledger, notifier)
    }

    /// Configuration
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Verification ledger
    pub fn ledger(&self) -> &VerificationLedger {
        &self.ledger
    }

    /// Escalation controller
    pub fn escalation(&self) -> &EscalationController {
        &self.escalation
    }

    /// Limit enforcer
    pub fn limits(&self) -> &LimitEnforcer {
        &self.limits
    }

    /// Pattern detector
    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    /// Metrics
    pub fn metrics(&self) -> &RiskMetrics {
        &self.metrics
    }

    /// Score a subject without touching any state
    pub fn assess(&self, subject: &SubjectId, signals: &RiskSignals) -> Result<RiskAssessment> {
        let flags = self.escalation.active_flags(subject)?;
        let trust_level = self.ledger.trust_level(subject)?;
        Ok(self
            .scorer
            .assess(subject, &flags, trust_level, signals, self.clock.now()))
    }

    /// Pattern scan that flags the subject on a match
    pub fn scan(
        &self,
        subject: &SubjectId,
        events: &[ActivityEvent],
        indicators: &[String],
    ) -> Result<(PatternAnalysis, Option<RiskFlag>)> {
        let analysis = self.detector.analyze(subject, events, indicators);
        let pattern = match analysis.pattern_type {
            Some(pattern) if analysis.is_risk_pattern => pattern,
            _ => return Ok((analysis, None)),
        };

        for matched in &analysis.patterns {
            self.metrics
                .patterns_detected
                .with_label_values(&[matched.as_str()])
                .inc();
        }

        let description = analysis
            .reason
            .clone()
            .unwrap_or_else(|| format!("Pattern detected: {}", pattern));
        let incident = Incident {
            reason: pattern.into(),
            description,
            severity: pattern_severity(analysis.risk_score.score()),
        };
        match self.escalation.flag(subject, incident) {
            Ok(flag) => Ok((analysis, Some(flag))),
            // Already flagged for this pattern
            Err(Error::DuplicateFlag(_)) => Ok((analysis, None)),
            Err(e) => Err(e),
        }
    }

    /// Full evaluation: limits, patterns, scoring, auto-suspension
    ///
    /// The limit check runs first and records the action when it passes,
    /// even if a later stage turns the verdict into a denial.
    pub fn evaluate(
        &self,
        subject: &SubjectId,
        action: &Action,
        input: &ReviewInput,
    ) -> Result<Evaluation> {
        let limit = self.limits.check(subject, action)?;
        let (patterns, flag_raised) = self.scan(subject, &input.events, &input.indicators)?;
        let assessment = self.assess(subject, &input.signals)?;

        let suspension = if assessment.risk_score.score() >= self.config.engine.auto_suspend_score {
            let outcome = self.escalation.suspend(
                subject,
                SuspensionTrigger {
                    severity: Severity::High,
                    reason: format!("Risk score {}", assessment.risk_score),
                },
            )?;
            warn!(
                subject = %subject,
                score = assessment.risk_score.score(),
                until = ?outcome.until,
                "Subject auto-suspended"
            );
            Some(outcome)
        } else {
            None
        };

        let allowed = limit.allowed
            && assessment.recommended_action != RecommendedAction::Block
            && !suspension.as_ref().map_or(false, |s| s.suspended);

        info!(
            subject = %subject,
            action = ?action.kind,
            allowed,
            score = assessment.risk_score.score(),
            "Action evaluated"
        );

        Ok(Evaluation {
            limit,
            assessment,
            patterns,
            flag_raised,
            suspension,
            allowed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::patterns::PatternType;
    use crate::types::FlagReason;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use trust_ledger::{Clock, ManualClock};

    fn engine() -> (RiskEngine, ManualClock, Arc<RecordingNotifier>) {
        let clock = ManualClock::default();
        let notifier = Arc::new(RecordingNotifier::new());
        let engine =
            RiskEngine::in_memory(RiskConfig::default(), Arc::new(clock.clone()), notifier.clone())
                .unwrap();
        (engine, clock, notifier)
    }

    fn small_charges(clock: &ManualClock, n: i64) -> Vec<ActivityEvent> {
        (0..n)
            .map(|i| ActivityEvent {
                amount: dec!(1),
                location: None,
                kind: None,
                at: clock.now() - Duration::minutes(10 * (n - i)),
            })
            .collect()
    }

    #[test]
    fn test_clean_request_is_allowed() {
        let (engine, _, _) = engine();
        let evaluation = engine
            .evaluate(&SubjectId::new("u1"), &Action::payment(dec!(50)), &ReviewInput::default())
            .unwrap();

        assert!(evaluation.allowed);
        assert!(evaluation.flag_raised.is_none());
        // Unverified subject only
        assert_eq!(evaluation.assessment.risk_score.score(), 15);
    }

    #[test]
    fn test_pattern_match_raises_flag_once() {
        let (engine, clock, _) = engine();
        let s = SubjectId::new("u2");
        let input = ReviewInput {
            events: small_charges(&clock, 4),
            ..Default::default()
        };

        let first = engine.evaluate(&s, &Action::request(), &input).unwrap();
        let flag = first.flag_raised.unwrap();
        assert_eq!(flag.reason, FlagReason::CardTesting);
        assert_eq!(first.patterns.pattern_type, Some(PatternType::CardTesting));

        let second = engine.evaluate(&s, &Action::request(), &input).unwrap();
        assert!(second.flag_raised.is_none());
        assert_eq!(engine.escalation().active_flags(&s).unwrap().len(), 1);

        let text = engine.metrics().gather_text().unwrap();
        assert!(text.contains("risk_patterns_detected_total"));
    }

    #[test]
    fn test_ordinary_repeat_purchase_keeps_tier() {
        let (engine, clock, _) = engine();
        let s = SubjectId::new("u4");
        let spend = |amount, minutes_ago| ActivityEvent {
            amount,
            location: Some("Cape Town".to_string()),
            kind: None,
            at: clock.now() - Duration::minutes(minutes_ago),
        };
        let input = ReviewInput {
            events: vec![spend(dec!(120), 45), spend(dec!(80), 0)],
            ..Default::default()
        };

        let evaluation = engine.evaluate(&s, &Action::payment(dec!(80)), &input).unwrap();
        assert!(evaluation.allowed);
        assert!(!evaluation.patterns.is_risk_pattern);
        assert!(evaluation.flag_raised.is_none());

        let next = engine.limits().check(&s, &Action::payment(dec!(150))).unwrap();
        assert_eq!(next.tier, crate::limits::Tier::Unverified);
        assert!(next.allowed);
    }

    #[test]
    fn test_high_score_auto_suspends() {
        let (engine, _, notifier) = engine();
        let s = SubjectId::new("u3");
        engine
            .escalation()
            .flag(
                &s,
                Incident {
                    reason: FlagReason::AccountTakeover,
                    description: "credential stuffing".to_string(),
                    severity: Severity::Critical,
                },
            )
            .unwrap();

        // 36 + 50 + 15 (unverified) = 101, capped
        let evaluation = engine
            .evaluate(&s, &Action::request(), &ReviewInput::default())
            .unwrap();
        assert!(!evaluation.allowed);
        assert!(evaluation.suspension.unwrap().suspended);
        assert!(engine.escalation().restriction(&s).unwrap().is_suspended());
        assert_eq!(notifier.security_pages(), 1);
    }

    #[test]
    fn test_pattern_severity_bands() {
        assert_eq!(pattern_severity(100), Severity::High);
        assert_eq!(pattern_severity(75), Severity::High);
        assert_eq!(pattern_severity(40), Severity::Medium);
        assert_eq!(pattern_severity(15), Severity::Low);
    }
}
