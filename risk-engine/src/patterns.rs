//! Fraud pattern detection over ordered activity events
//!
//! Each signature is a rule evaluated independently; several can match the
//! same sequence and their contributions add up to a capped score.

use crate::{
    config::PatternThresholds,
    types::{FlagReason, RiskScore},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use trust_ledger::SubjectId;

/// What an activity event was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Booking made
    Booking,
    /// Payment captured
    Payment,
    /// Payment declined
    Decline,
    /// Refund issued
    Refund,
}

/// One observed activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Amount
    pub amount: Decimal,
    /// Where it happened
    #[serde(default)]
    pub location: Option<String>,
    /// Kind
    #[serde(default)]
    pub kind: Option<EventKind>,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Named pattern signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Card testing
    CardTesting,
    /// Velocity abuse
    VelocityAbuse,
    /// Triangulation
    Triangulation,
    /// Geographic impossibility
    GeographicImpossibility,
    /// Only caller indicators, no events
    GenericSuspicious,
}

impl PatternType {
    /// Persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::CardTesting => "card_testing",
            PatternType::VelocityAbuse => "velocity_abuse",
            PatternType::Triangulation => "triangulation",
            PatternType::GeographicImpossibility => "geographic_impossibility",
            PatternType::GenericSuspicious => "generic_suspicious",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PatternType> for FlagReason {
    fn from(pattern: PatternType) -> Self {
        match pattern {
            PatternType::CardTesting => FlagReason::CardTesting,
            PatternType::VelocityAbuse => FlagReason::VelocityAbuse,
            PatternType::Triangulation => FlagReason::Triangulation,
            PatternType::GeographicImpossibility => FlagReason::GeographicImpossibility,
            PatternType::GenericSuspicious => FlagReason::ManualReview,
        }
    }
}

/// Pattern analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    /// Subject
    pub subject_id: SubjectId,
    /// Any signature matched
    pub is_risk_pattern: bool,
    /// First matched signature
    pub pattern_type: Option<PatternType>,
    /// All matched signatures, in evaluation order
    pub patterns: Vec<PatternType>,
    /// Summed contributions, capped at 100
    pub risk_score: RiskScore,
    /// Human-readable reason, when one applies
    pub reason: Option<String>,
}

/// Pattern detector
#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    thresholds: PatternThresholds,
}

impl PatternDetector {
    /// Create new detector
    pub fn new(thresholds: PatternThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use
    pub fn thresholds(&self) -> &PatternThresholds {
        &self.thresholds
    }

    /// Analyze a sequence of events plus free-form indicators
    pub fn analyze(
        &self,
        subject: &SubjectId,
        events: &[ActivityEvent],
        indicators: &[String],
    ) -> PatternAnalysis {
        let t = &self.thresholds;

        if events.is_empty() {
            if indicators.is_empty() {
                return PatternAnalysis {
                    subject_id: subject.clone(),
                    is_risk_pattern: false,
                    pattern_type: None,
                    patterns: Vec::new(),
                    risk_score: RiskScore::default(),
                    reason: None,
                };
            }
            return PatternAnalysis {
                subject_id: subject.clone(),
                is_risk_pattern: true,
                pattern_type: Some(PatternType::GenericSuspicious),
                patterns: vec![PatternType::GenericSuspicious],
                risk_score: RiskScore::capped(t.indicator_score * indicators.len() as u32),
                reason: Some(indicators.join(", ")),
            };
        }

        let mut ordered: Vec<&ActivityEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.at);

        let mut patterns = Vec::new();
        let mut score = 0u32;
        let mut reason = None;

        if self.is_card_testing(&ordered) {
            patterns.push(PatternType::CardTesting);
            score += t.card_testing_score;
        }
        if self.is_velocity_abuse(&ordered) {
            patterns.push(PatternType::VelocityAbuse);
            score += t.velocity_score;
        }
        if self.is_triangulation(&ordered) {
            patterns.push(PatternType::Triangulation);
            score += t.triangulation_score;
        }
        if self.is_geographic_impossibility(&ordered) {
            patterns.push(PatternType::GeographicImpossibility);
            score += t.geographic_score;
            reason = Some("Impossible travel detected".to_string());
        }

        let analysis = PatternAnalysis {
            subject_id: subject.clone(),
            is_risk_pattern: !patterns.is_empty(),
            pattern_type: patterns.first().copied(),
            patterns,
            risk_score: RiskScore::capped(score),
            reason,
        };

        if analysis.is_risk_pattern {
            tracing::debug!(
                subject = %subject,
                patterns = ?analysis.patterns,
                score = analysis.risk_score.score(),
                "Risk pattern matched"
            );
        }
        analysis
    }

    fn is_card_testing(&self, events: &[&ActivityEvent]) -> bool {
        let small_charges = events
            .iter()
            .filter(|e| e.amount < self.thresholds.card_testing_amount)
            .count();
        small_charges >= self.thresholds.card_testing_min_count
    }

    fn is_velocity_abuse(&self, events: &[&ActivityEvent]) -> bool {
        let t = &self.thresholds;
        has_burst(events, t.velocity_min_events, t.velocity_window_secs)
            || has_burst(events, t.velocity_cluster_min_events, t.velocity_cluster_secs)
    }

    fn is_triangulation(&self, events: &[&ActivityEvent]) -> bool {
        let locations: BTreeSet<&str> = events
            .iter()
            .filter_map(|e| e.location.as_deref())
            .collect();
        if locations.len() >= self.thresholds.triangulation_min_locations {
            return true;
        }

        // booking -> decline -> high refund, in order, not necessarily adjacent
        let mut stage = 0;
        for event in events {
            stage = match (stage, event.kind) {
                (0, Some(EventKind::Booking)) => 1,
                (1, Some(EventKind::Decline)) => 2,
                (2, Some(EventKind::Refund))
                    if event.amount >= self.thresholds.high_refund_amount =>
                {
                    return true
                }
                (s, _) => s,
            };
        }
        false
    }

    fn is_geographic_impossibility(&self, events: &[&ActivityEvent]) -> bool {
        let min_transit = Duration::seconds(self.thresholds.min_transit_secs);
        events.windows(2).any(|pair| match (&pair[0].location, &pair[1].location) {
            (Some(from), Some(to)) if from != to => pair[1].at - pair[0].at < min_transit,
            _ => false,
        })
    }
}

/// Some run of `count` sorted events spans less than `window_secs`
fn has_burst(events: &[&ActivityEvent], count: usize, window_secs: i64) -> bool {
    let window = match Duration::try_seconds(window_secs) {
        Some(window) => window,
        None => return false,
    };
    count >= 2
        && events
            .windows(count)
            .any(|run| run[count - 1].at - run[0].at < window)
}
