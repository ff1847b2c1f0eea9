//! Notification seam
//!
//! Delivery (email, SMS, pager) lives outside the engine. The escalation
//! controller only calls [`Notifier`]; [`LogNotifier`] writes structured
//! log lines and [`RecordingNotifier`] keeps everything in memory.

use crate::types::{Feature, RiskFlag};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trust_ledger::SubjectId;

/// Notice sent to a subject about their own account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "notice")]
pub enum SubjectNotice {
    /// Account suspended
    Suspended {
        /// Reason shown to the subject
        reason: String,
        /// Suspension end
        until: DateTime<Utc>,
        /// Last moment to appeal
        appeal_deadline: DateTime<Utc>,
    },
    /// Features restricted
    Restricted {
        /// Reason shown to the subject
        reason: String,
        /// Restriction end
        until: DateTime<Utc>,
        /// Features still available
        allowed_features: Vec<Feature>,
    },
    /// Appeal decided
    AppealDecided {
        /// Whether the suspension was lifted
        granted: bool,
    },
}

/// Outbound notifications
pub trait Notifier: Send + Sync {
    /// Page the security team about a critical flag
    fn notify_security_team(&self, flag: &RiskFlag);

    /// Tell a subject what happened to their account
    fn notify_subject(&self, subject: &SubjectId, notice: &SubjectNotice);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_security_team(&self, flag: &RiskFlag) {
        tracing::warn!(
            subject = %flag.subject_id,
            flag_id = %flag.id,
            reason = %flag.reason,
            severity = %flag.severity,
            "Security team notified"
        );
    }

    fn notify_subject(&self, subject: &SubjectId, notice: &SubjectNotice) {
        tracing::info!(subject = %subject, ?notice, "Subject notified");
    }
}

/// Delivered notification
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Security team page
    SecurityTeam(RiskFlag),
    /// Subject notice
    Subject(SubjectId, SubjectNotice),
}

/// Notifier that keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Notices sent to one subject
    pub fn notices_for(&self, subject: &SubjectId) -> Vec<SubjectNotice> {
        self.sent
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Subject(s, notice) if s == subject => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    /// Security pages sent so far
    pub fn security_pages(&self) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|n| matches!(n, Notification::SecurityTeam(_)))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_security_team(&self, flag: &RiskFlag) {
        self.sent.lock().push(Notification::SecurityTeam(flag.clone()));
    }

    fn notify_subject(&self, subject: &SubjectId, notice: &SubjectNotice) {
        self.sent
            .lock()
            .push(Notification::Subject(subject.clone(), notice.clone()));
    }
}
