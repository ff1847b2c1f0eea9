//! Metrics collection for observability
//!
//! Counters live on a private [`Registry`] owned by each engine instance so
//! several engines (and parallel tests) never collide on metric names.
//!
//! # Metrics
//!
//! - `risk_limit_decisions_total{outcome}` - Limit checks by outcome
//! - `risk_flags_total{severity}` - Flags raised by severity
//! - `risk_suspensions_total` - Suspensions applied
//! - `risk_patterns_detected_total{pattern}` - Pattern signatures matched

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct RiskMetrics {
    /// Limit decisions by outcome (`allowed`, `denied`)
    pub limit_decisions: IntCounterVec,

    /// Flags by severity
    pub flags: IntCounterVec,

    /// Suspensions applied
    pub suspensions: IntCounter,

    /// Patterns detected by signature
    pub patterns_detected: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl RiskMetrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let limit_decisions = IntCounterVec::new(
            Opts::new("risk_limit_decisions_total", "Limit checks by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(limit_decisions.clone()))?;

        let flags = IntCounterVec::new(
            Opts::new("risk_flags_total", "Flags raised by severity"),
            &["severity"],
        )?;
        registry.register(Box::new(flags.clone()))?;

        let suspensions = IntCounter::new("risk_suspensions_total", "Suspensions applied")?;
        registry.register(Box::new(suspensions.clone()))?;

        let patterns_detected = IntCounterVec::new(
            Opts::new("risk_patterns_detected_total", "Pattern signatures matched"),
            &["pattern"],
        )?;
        registry.register(Box::new(patterns_detected.clone()))?;

        Ok(Self {
            limit_decisions,
            flags,
            suspensions,
            patterns_detected,
            registry,
        })
    }

    /// Record a limit decision
    pub fn record_limit_decision(&self, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "denied" };
        self.limit_decisions.with_label_values(&[outcome]).inc();
    }

    /// Render in Prometheus text format
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for RiskMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = RiskMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_instances_do_not_collide() {
        let a = RiskMetrics::new().unwrap();
        let b = RiskMetrics::new().unwrap();
        a.record_limit_decision(false);

        assert_eq!(a.limit_decisions.with_label_values(&["denied"]).get(), 1);
        assert_eq!(b.limit_decisions.with_label_values(&["denied"]).get(), 0);
    }

    #[test]
    fn test_gather_text() {
        let metrics = RiskMetrics::new().unwrap();
        metrics.suspensions.inc();
        let output = metrics.gather_text().unwrap();
        assert!(output.contains("risk_suspensions_total 1"));
    }
}
