use crate::config::PriorityConfig;
use crate::core::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Escalation tier, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 4] = [
        PriorityLevel::Low,
        PriorityLevel::Medium,
        PriorityLevel::High,
        PriorityLevel::Critical,
    ];

    /// One step up for large amounts; `High` and `Critical` stay put.
    pub fn escalated(self) -> Self {
        match self {
            PriorityLevel::Low => PriorityLevel::Medium,
            PriorityLevel::Medium => PriorityLevel::High,
            other => other,
        }
    }

    /// Levels that raise an alert on entry.
    pub fn is_alerting(self) -> bool {
        self >= PriorityLevel::High
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Low => "LOW",
            PriorityLevel::Medium => "MEDIUM",
            PriorityLevel::High => "HIGH",
            PriorityLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority from age, then amount.
///
/// The age-based level is computed first and the amount escalation is
/// applied on top of it; swapping the two steps gives different results
/// near the thresholds. `days_until_due` is `None` when there is no due
/// date, in which case the due-within rule cannot fire.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::alerting::priority::{compute_priority, PriorityLevel};
/// use brokerage_ledger::config::PriorityConfig;
/// use rust_decimal_macros::dec;
///
/// let config = PriorityConfig::default();
/// assert_eq!(
///     compute_priority(35, Some(0), dec!(150000), &config),
///     PriorityLevel::Critical,
/// );
/// assert_eq!(
///     compute_priority(0, Some(20), dec!(150000), &config),
///     PriorityLevel::Medium,
/// );
/// ```
pub fn compute_priority(
    days_overdue: i64,
    days_until_due: Option<i64>,
    total_amount: Money,
    config: &PriorityConfig,
) -> PriorityLevel {
    let base = if days_overdue > config.critical_overdue_days {
        PriorityLevel::Critical
    } else if days_overdue > config.high_overdue_days {
        PriorityLevel::High
    } else if days_until_due.is_some_and(|d| d <= config.medium_due_within_days) {
        PriorityLevel::Medium
    } else {
        PriorityLevel::Low
    };

    if total_amount > config.escalation_amount {
        base.escalated()
    } else {
        base
    }
}
