//! Property-based tests for risk engine invariants
//!
//! These tests use proptest to verify:
//! - Window accuracy: the 24h sum only covers entries younger than 24h
//! - Spend ceilings: an allowed action never pushes daily spend past the limit
//! - Flag dedup: the same reason twice in a row is always rejected
//! - Suspension: low severity never suspends, anything else sets a future deadline

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use risk_engine::{
    config::EscalationConfig, velocity::RollingWindow, Action, Error, EscalationController,
    FlagReason, Incident, LogNotifier, RiskConfig, RiskEngine, RiskMetrics, SuspensionTrigger,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use trust_ledger::{Clock, ManualClock, Severity, SubjectId};

const DAY_MS: i64 = 86_400_000;

fn base() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn reason_strategy() -> impl Strategy<Value = FlagReason> {
    prop_oneof![
        Just(FlagReason::CardTesting),
        Just(FlagReason::VelocityAbuse),
        Just(FlagReason::SuspiciousPayment),
        Just(FlagReason::ChargebackPattern),
        Just(FlagReason::BotActivity),
        Just(FlagReason::ManualReview),
    ]
}

fn controller(clock: &ManualClock) -> EscalationController {
    EscalationController::in_memory(
        EscalationConfig::default(),
        Arc::new(clock.clone()),
        Arc::new(LogNotifier),
        RiskMetrics::new().unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: window total equals the sum of entries with now - at < 24h
    #[test]
    fn prop_rolling_window_sum(entries in prop::collection::vec((0i64..2 * DAY_MS, 1u32..10_000), 0..50)) {
        let now = base();
        let mut window = RollingWindow::daily();
        for (age_ms, amount) in &entries {
            window.add(Decimal::from(*amount), now - Duration::milliseconds(*age_ms));
        }
        window.cleanup(now);

        let expected: Decimal = entries
            .iter()
            .filter(|(age_ms, _)| *age_ms < DAY_MS)
            .map(|(_, amount)| Decimal::from(*amount))
            .sum();
        prop_assert_eq!(window.total(), expected);
        prop_assert!(window.entries().all(|e| now - e.at < Duration::milliseconds(DAY_MS)));
    }

    /// Property: allowed payments never exceed the daily limit
    #[test]
    fn prop_daily_spend_never_exceeds_limit(
        steps in prop::collection::vec((1u32..600, 1i64..240), 1..30)
    ) {
        let clock = ManualClock::new(base());
        let engine = RiskEngine::in_memory(
            RiskConfig::default(),
            Arc::new(clock.clone()),
            Arc::new(LogNotifier),
        ).unwrap();
        let subject = SubjectId::new("prop-spender");

        for (amount, advance_minutes) in steps {
            clock.advance(Duration::minutes(advance_minutes));
            let decision = engine
                .limits()
                .check(&subject, &Action::payment(Decimal::from(amount)))
                .unwrap();
            prop_assert!(decision.daily_spent <= decision.limit);
            prop_assert!(decision.remaining >= Decimal::ZERO);
            if Decimal::from(amount) > Decimal::from(500) {
                prop_assert!(!decision.allowed);
            }
        }
    }

    /// Property: the same reason twice in a row is rejected
    #[test]
    fn prop_duplicate_consecutive_flag_rejected(
        reason in reason_strategy(),
        severity in severity_strategy(),
    ) {
        let clock = ManualClock::new(base());
        let escalation = controller(&clock);
        let subject = SubjectId::new("prop-flagged");
        let incident = Incident {
            reason,
            description: "observed".to_string(),
            severity,
        };

        prop_assert!(escalation.flag(&subject, incident.clone()).is_ok());
        let second = escalation.flag(&subject, incident);
        prop_assert!(matches!(second, Err(Error::DuplicateFlag(r)) if r == reason));
        prop_assert_eq!(escalation.activity_log(&subject, None).unwrap().len(), 1);
    }

    /// Property: low severity never suspends; others set a future appeal deadline
    #[test]
    fn prop_suspension_by_severity(severity in severity_strategy()) {
        let clock = ManualClock::new(base());
        let escalation = controller(&clock);
        let subject = SubjectId::new("prop-suspended");

        let outcome = escalation
            .suspend(&subject, SuspensionTrigger { severity, reason: "review".to_string() })
            .unwrap();

        if severity == Severity::Low {
            prop_assert!(!outcome.suspended);
            prop_assert!(!escalation.restriction(&subject).unwrap().is_suspended());
        } else {
            prop_assert!(outcome.suspended);
            let deadline = outcome.appeal_deadline.unwrap();
            prop_assert!(deadline > clock.now());
            prop_assert!(outcome.until.unwrap() > clock.now());
        }
    }
}

#[tokio::test]
async fn test_concurrent_checks_respect_daily_limit() {
    let clock = ManualClock::new(base());
    let engine = Arc::new(
        RiskEngine::in_memory(
            RiskConfig::default(),
            Arc::new(clock.clone()),
            Arc::new(LogNotifier),
        )
        .unwrap(),
    );
    let subject = SubjectId::new("concurrent-spender");

    // Lift the request rate so only the daily limit binds
    engine
        .limits()
        .set_override(
            &subject,
            risk_engine::LimitOverrides {
                requests_per_minute: Some(300),
                ..Default::default()
            },
            risk_engine::OverrideMeta {
                modified_by: "test".to_string(),
                reason: "load".to_string(),
                duration_secs: None,
            },
        )
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        let subject = subject.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            engine
                .limits()
                .check(&subject, &Action::payment(Decimal::from(100)))
                .unwrap()
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().allowed {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 10);
    let profile = engine.limits().profile(&subject).unwrap();
    assert_eq!(profile.rolling_window.total(), Decimal::from(1_000));
}
