//! Rolling windows for spend and rate tracking

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Entry in a rolling window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    /// Amount (zero for count-only windows)
    pub amount: Decimal,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Time-bounded, ordered list of entries
///
/// An entry is inside the window while `now - at < span`. Entries are kept
/// sorted by `at` so imported history may arrive out of order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    span_ms: i64,
    entries: VecDeque<WindowEntry>,
}

impl RollingWindow {
    /// Create empty window
    pub fn new(span: Duration) -> Self {
        Self {
            span_ms: span.num_milliseconds(),
            entries: VecDeque::new(),
        }
    }

    /// 24 hour window
    pub fn daily() -> Self {
        Self::new(Duration::hours(24))
    }

    /// 30 day window
    pub fn monthly() -> Self {
        Self::new(Duration::days(30))
    }

    /// Window span
    pub fn span(&self) -> Duration {
        Duration::milliseconds(self.span_ms)
    }

    /// Clean up entries outside the window
    pub fn cleanup(&mut self, now: DateTime<Utc>) {
        let window_start = now - self.span();
        while let Some(front) = self.entries.front() {
            if front.at > window_start {
                break;
            }
            self.entries.pop_front();
        }
    }

    /// Add entry, keeping order by time
    pub fn add(&mut self, amount: Decimal, at: DateTime<Utc>) {
        let position = self.entries.partition_point(|e| e.at <= at);
        self.entries.insert(position, WindowEntry { amount, at });
    }

    /// Add count-only entry
    pub fn add_event(&mut self, at: DateTime<Utc>) {
        self.add(Decimal::ZERO, at);
    }

    /// Entries in window
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Entries at or after `since`
    pub fn count_since(&self, since: DateTime<Utc>) -> usize {
        self.entries.len() - self.entries.partition_point(|e| e.at < since)
    }

    /// Total amount in window
    pub fn total(&self) -> Decimal {
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// Oldest entry still in window
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.entries.front().map(|e| e.at)
    }

    /// Iterate entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }
}
