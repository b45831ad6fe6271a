//! Engine configuration.
//!
//! Every rate and threshold the engine uses lives here with its default.
//! Configuration is loaded from JSON; missing sections or fields fall
//! back to the defaults.
//!
//! ```
//! use brokerage_ledger::config::EngineConfig;
//! use rust_decimal_macros::dec;
//!
//! let config = EngineConfig::from_json_str(r#"{ "brokerage": { "tds_rate": "0.02" } }"#).unwrap();
//! assert_eq!(config.brokerage.tds_rate, dec!(0.02));
//! assert_eq!(config.brokerage.discount_rate, dec!(0.10));
//! assert_eq!(config.priority.critical_overdue_days, 30);
//! ```

use crate::brokerage::calculator::BrokeragePolicy;
use crate::core::money::Money;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Discount and TDS fractions applied to gross brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerageConfig {
    pub discount_rate: Decimal,
    pub tds_rate: Decimal,
}

impl Default for BrokerageConfig {
    fn default() -> Self {
        Self {
            discount_rate: dec!(0.10),
            tds_rate: dec!(0.05),
        }
    }
}

impl BrokerageConfig {
    pub fn policy(&self) -> BrokeragePolicy {
        BrokeragePolicy::new(self.discount_rate, self.tds_rate)
    }
}

/// Age and amount thresholds for priority levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub critical_overdue_days: i64,
    pub high_overdue_days: i64,
    pub medium_due_within_days: i64,
    /// Amounts strictly above this escalate one level.
    pub escalation_amount: Money,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            critical_overdue_days: 30,
            high_overdue_days: 7,
            medium_due_within_days: 3,
            escalation_amount: dec!(100000),
        }
    }
}

/// One health-score penalty: `min(count * weight, cap)` points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penalty {
    pub weight: Decimal,
    pub cap: Decimal,
}

impl Penalty {
    pub fn new(weight: Decimal, cap: Decimal) -> Self {
        Self { weight, cap }
    }

    pub fn apply(&self, count: usize) -> Decimal {
        Decimal::from(count).saturating_mul(self.weight).min(self.cap)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub overdue: Penalty,
    pub critical: Penalty,
    pub high: Penalty,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            overdue: Penalty::new(dec!(5), dec!(40)),
            critical: Penalty::new(dec!(10), dec!(30)),
            high: Penalty::new(dec!(2), dec!(20)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
}

/// Longest trend series accepted, about ten years of daily buckets.
pub const MAX_TREND_BUCKETS: u32 = 3660;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Week-over-week changes within +/- this many percent are `Stable`.
    pub flat_tolerance_percent: Decimal,
    pub granularity: Granularity,
    /// Length of the trend series, in buckets.
    pub buckets: u32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            flat_tolerance_percent: dec!(5),
            granularity: Granularity::Daily,
            buckets: 30,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub brokerage: BrokerageConfig,
    pub priority: PriorityConfig,
    pub health: HealthConfig,
    pub trend: TrendConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.brokerage;
        for (field, rate) in [
            ("brokerage.discount_rate", b.discount_rate),
            ("brokerage.tds_rate", b.tds_rate),
        ] {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(invalid(field, format!("{rate} is outside [0, 1]")));
            }
        }
        if b.discount_rate + b.tds_rate > Decimal::ONE {
            return Err(invalid("brokerage", "discount and TDS together exceed 100%"));
        }

        let p = &self.priority;
        if p.critical_overdue_days < 0 || p.high_overdue_days < 0 || p.medium_due_within_days < 0 {
            return Err(invalid("priority", "day thresholds must not be negative"));
        }
        if p.high_overdue_days > p.critical_overdue_days {
            return Err(invalid(
                "priority.high_overdue_days",
                "must not exceed critical_overdue_days",
            ));
        }
        if p.escalation_amount < Decimal::ZERO {
            return Err(invalid("priority.escalation_amount", "must not be negative"));
        }

        let h = &self.health;
        for (field, penalty) in [
            ("health.overdue", h.overdue),
            ("health.critical", h.critical),
            ("health.high", h.high),
        ] {
            if penalty.weight < Decimal::ZERO || penalty.cap < Decimal::ZERO {
                return Err(invalid(field, "weight and cap must not be negative"));
            }
        }

        if self.trend.flat_tolerance_percent < Decimal::ZERO {
            return Err(invalid("trend.flat_tolerance_percent", "must not be negative"));
        }
        if self.trend.buckets == 0 || self.trend.buckets > MAX_TREND_BUCKETS {
            return Err(invalid(
                "trend.buckets",
                format!("{} is outside [1, {MAX_TREND_BUCKETS}]", self.trend.buckets),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_section_override() {
        let config = EngineConfig::from_json_str(
            r#"{ "priority": { "escalation_amount": "50000" }, "trend": { "granularity": "weekly" } }"#,
        )
        .unwrap();
        assert_eq!(config.priority.escalation_amount, dec!(50000));
        assert_eq!(config.priority.high_overdue_days, 7);
        assert_eq!(config.trend.granularity, Granularity::Weekly);
    }

    #[test]
    fn test_rates_out_of_range_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "brokerage": { "tds_rate": "1.5" } }"#);
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));

        let err = EngineConfig::from_json_str(
            r#"{ "brokerage": { "discount_rate": "0.6", "tds_rate": "0.5" } }"#,
        );
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.priority.high_overdue_days = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trend_buckets_bounded() {
        let err = EngineConfig::from_json_str(r#"{ "trend": { "buckets": 4000000000 } }"#);
        assert!(matches!(err, Err(ConfigError::Invalid { field: "trend.buckets", .. })));
        let err = EngineConfig::from_json_str(r#"{ "trend": { "buckets": 0 } }"#);
        assert!(matches!(err, Err(ConfigError::Invalid { field: "trend.buckets", .. })));
        let ok = EngineConfig::from_json_str(r#"{ "trend": { "buckets": 3660 } }"#).unwrap();
        assert_eq!(ok.trend.buckets, MAX_TREND_BUCKETS);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::from_json_file("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_penalty_caps() {
        let p = Penalty::new(dec!(5), dec!(40));
        assert_eq!(p.apply(3), dec!(15));
        assert_eq!(p.apply(100), dec!(40));
    }
}
