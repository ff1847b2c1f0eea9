//! Configuration for the risk engine

use crate::types::Feature;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Risk engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Risk scorer weights
    pub scoring: ScoringWeights,

    /// Pattern detector thresholds
    pub patterns: PatternThresholds,

    /// Tier limit tables
    pub limits: LimitsConfig,

    /// Escalation ladder
    pub escalation: EscalationConfig,

    /// Engine facade
    pub engine: EngineConfig,
}

/// Fixed increments used by the risk scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Per active flag
    pub per_flag: u32,
    /// Extra per critical flag
    pub critical_flag: u32,
    /// Trust level 0
    pub unverified: u32,
    /// New location
    pub new_location: u32,
    /// New device
    pub new_device: u32,
    /// Unusual hour
    pub unusual_time: u32,
    /// Rapid repeated transactions
    pub rapid_transactions: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            per_flag: 36,
            critical_flag: 50,
            unverified: 15,
            new_location: 15,
            new_device: 15,
            unusual_time: 10,
            rapid_transactions: 15,
        }
    }
}

/// Pattern signature thresholds and score contributions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    /// Amounts strictly below this count as card-testing charges
    pub card_testing_amount: Decimal,
    /// Small charges needed for card testing
    pub card_testing_min_count: usize,
    /// Events inside one velocity window that count as abuse
    pub velocity_min_events: usize,
    /// Sliding velocity window (seconds)
    pub velocity_window_secs: i64,
    /// Events inside one cluster window that count as abuse
    pub velocity_cluster_min_events: usize,
    /// Tight cluster window (seconds)
    pub velocity_cluster_secs: i64,
    /// Distinct locations for triangulation
    pub triangulation_min_locations: usize,
    /// Refund at or above this completes a booking/decline/refund sequence
    pub high_refund_amount: Decimal,
    /// Minimum plausible transit time between locations (seconds)
    pub min_transit_secs: i64,
    /// Card testing score
    pub card_testing_score: u32,
    /// Velocity abuse score
    pub velocity_score: u32,
    /// Triangulation score
    pub triangulation_score: u32,
    /// Geographic impossibility score
    pub geographic_score: u32,
    /// Score per caller-supplied indicator
    pub indicator_score: u32,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            card_testing_amount: Decimal::from(10),
            card_testing_min_count: 4,
            velocity_min_events: 5,
            velocity_window_secs: 3_600, // 1 hour
            velocity_cluster_min_events: 3,
            velocity_cluster_secs: 600, // 10 minutes
            triangulation_min_locations: 3,
            high_refund_amount: Decimal::from(500),
            min_transit_secs: 7_200, // 2 hours
            card_testing_score: 40,
            velocity_score: 35,
            triangulation_score: 50,
            geographic_score: 60,
            indicator_score: 15,
        }
    }
}

/// One row set of the limit table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitTable {
    /// Per-transaction ceiling
    pub max_transaction_amount: Decimal,
    /// Rolling 24h spend
    pub daily_limit: Decimal,
    /// Rolling 30 day spend
    pub monthly_limit: Decimal,
    /// Bookings per 24h
    pub max_bookings_per_day: u32,
    /// Open bookings at once
    pub max_concurrent_bookings: u32,
    /// Refunds per 30 days
    pub max_refunds_per_month: u32,
    /// Requests per minute
    pub requests_per_minute: u32,
    /// Requests per hour
    pub requests_per_hour: u32,
    /// Requests per day
    pub requests_per_day: u32,
}

impl LimitTable {
    /// Default table for unverified subjects
    pub fn unverified() -> Self {
        Self {
            max_transaction_amount: Decimal::from(500),
            daily_limit: Decimal::from(1_000),
            monthly_limit: Decimal::from(2_500),
            max_bookings_per_day: 5,
            max_concurrent_bookings: 2,
            max_refunds_per_month: 1,
            requests_per_minute: 10,
            requests_per_hour: 100,
            requests_per_day: 500,
        }
    }

    /// Default table for identity-verified subjects
    pub fn verified() -> Self {
        Self {
            max_transaction_amount: Decimal::from(50_000),
            daily_limit: Decimal::from(100_000),
            monthly_limit: Decimal::from(250_000),
            max_bookings_per_day: 50,
            max_concurrent_bookings: 10,
            max_refunds_per_month: 5,
            requests_per_minute: 100,
            requests_per_hour: 1_000,
            requests_per_day: 5_000,
        }
    }

    /// Default table for flagged or restricted subjects
    pub fn flagged() -> Self {
        Self {
            max_transaction_amount: Decimal::from(100),
            daily_limit: Decimal::from(200),
            monthly_limit: Decimal::from(500),
            max_bookings_per_day: 1,
            max_concurrent_bookings: 1,
            max_refunds_per_month: 0,
            requests_per_minute: 5,
            requests_per_hour: 20,
            requests_per_day: 50,
        }
    }

    /// Hard ceilings no override may exceed
    pub fn hard_ceiling() -> Self {
        Self {
            max_transaction_amount: Decimal::from(100_000),
            daily_limit: Decimal::from(250_000),
            monthly_limit: Decimal::from(1_000_000),
            max_bookings_per_day: 100,
            max_concurrent_bookings: 25,
            max_refunds_per_month: 10,
            requests_per_minute: 300,
            requests_per_hour: 5_000,
            requests_per_day: 20_000,
        }
    }
}

/// Tier limit tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Unverified tier
    pub unverified: LimitTable,
    /// Verified tier
    pub verified: LimitTable,
    /// Flagged tier
    pub flagged: LimitTable,
    /// Hard ceilings for overrides
    pub ceiling: LimitTable,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            unverified: LimitTable::unverified(),
            verified: LimitTable::verified(),
            flagged: LimitTable::flagged(),
            ceiling: LimitTable::hard_ceiling(),
        }
    }
}

/// Escalation ladder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Flags older than this stop counting as active (days)
    pub flag_retention_days: i64,
    /// Default restriction cooldown (minutes)
    pub default_cooldown_minutes: i64,
    /// Features left open by a restriction unless the policy says otherwise
    pub default_allowed_features: Vec<Feature>,
    /// Suspension length for medium severity (hours)
    pub medium_suspension_hours: i64,
    /// Suspension length for high severity (hours)
    pub high_suspension_hours: i64,
    /// Suspension length for critical severity (hours)
    pub critical_suspension_hours: i64,
    /// Time to appeal a suspension (days)
    pub appeal_window_days: i64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            flag_retention_days: 90,
            default_cooldown_minutes: 1_440, // 24 hours
            default_allowed_features: vec![Feature::ViewBookings, Feature::ContactSupport],
            medium_suspension_hours: 24,
            high_suspension_hours: 72,
            critical_suspension_hours: 168, // 7 days
            appeal_window_days: 7,
        }
    }
}

/// Engine facade configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Risk score at or above which the subject is suspended
    pub auto_suspend_score: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_suspend_score: 90,
        }
    }
}

impl RiskConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to read config: {}", e)))?;
        let config: RiskConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `RISK_ENGINE_CONFIG` if set, defaults otherwise
    pub fn from_env() -> crate::Result<Self> {
        match std::env::var("RISK_ENGINE_CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(RiskConfig::default()),
        }
    }

    /// Reject tier tables above the hard ceiling
    pub fn validate(&self) -> crate::Result<()> {
        let ceiling = &self.limits.ceiling;
        for (tier, table) in [
            ("unverified", &self.limits.unverified),
            ("verified", &self.limits.verified),
            ("flagged", &self.limits.flagged),
        ] {
            if table.max_transaction_amount > ceiling.max_transaction_amount
                || table.daily_limit > ceiling.daily_limit
                || table.monthly_limit > ceiling.monthly_limit
            {
                return Err(crate::Error::InvalidConfig(format!(
                    "{} tier exceeds hard ceiling",
                    tier
                )));
            }
        }
        let p = &self.patterns;
        if p.velocity_min_events < 2
            || p.velocity_cluster_min_events < 2
            || p.velocity_window_secs <= 0
            || p.velocity_cluster_secs <= 0
        {
            return Err(crate::Error::InvalidConfig(
                "velocity thresholds need at least 2 events and a positive window".to_string(),
            ));
        }
        if self.engine.auto_suspend_score > 100 {
            return Err(crate::Error::InvalidConfig(
                "auto_suspend_score must be 0-100".to_string(),
            ));
        }
        Ok(())
    }
}
