use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed whole-day distance from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Days past the due date, zero if not yet due.
pub fn days_overdue(due: NaiveDate, today: NaiveDate) -> i64 {
    days_between(due, today).max(0)
}

/// Days remaining until the due date, zero once it has passed.
pub fn days_until_due(due: NaiveDate, today: NaiveDate) -> i64 {
    days_between(today, due).max(0)
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// A broker-scoped accounting period.
///
/// Obligations are tallied and aggregates built per financial year.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::core::dates::FinancialYear;
/// use chrono::NaiveDate;
///
/// let fy = FinancialYear::april_to_march(2025).unwrap();
/// assert_eq!(fy.id(), "2025-26");
/// assert!(fy.contains(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
/// assert!(!fy.contains(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FinancialYear {
    id: String,
    start: NaiveDate,
    end: NaiveDate,
}

impl FinancialYear {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if end < start {
            return None;
        }
        Some(Self {
            id: id.into(),
            start,
            end,
        })
    }

    /// April 1st of `start_year` through March 31st of the following year.
    pub fn april_to_march(start_year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(start_year, 4, 1)?;
        let end = NaiveDate::from_ymd_opt(start_year + 1, 3, 31)?;
        let id = format!("{}-{:02}", start_year, (start_year + 1).rem_euclid(100));
        Self::new(id, start, end)
    }

    /// The April-March year that contains `date`.
    pub fn containing(date: NaiveDate) -> Option<Self> {
        let start_year = if date.month() >= 4 {
            date.year()
        } else {
            date.year() - 1
        };
        Self::april_to_march(start_year)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY {}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_days_between_signed() {
        assert_eq!(days_between(d(2025, 1, 1), d(2025, 1, 11)), 10);
        assert_eq!(days_between(d(2025, 1, 11), d(2025, 1, 1)), -10);
    }

    #[test]
    fn test_overdue_and_until_due_clamp() {
        let due = d(2025, 6, 10);
        assert_eq!(days_overdue(due, d(2025, 6, 15)), 5);
        assert_eq!(days_overdue(due, d(2025, 6, 5)), 0);
        assert_eq!(days_until_due(due, d(2025, 6, 5)), 5);
        assert_eq!(days_until_due(due, d(2025, 6, 15)), 0);
    }

    #[test]
    fn test_financial_year_containing() {
        let fy = FinancialYear::containing(d(2026, 2, 14)).unwrap();
        assert_eq!(fy.id(), "2025-26");
        let fy = FinancialYear::containing(d(2026, 4, 1)).unwrap();
        assert_eq!(fy.id(), "2026-27");
    }

    #[test]
    fn test_financial_year_rejects_inverted_range() {
        assert!(FinancialYear::new("bad", d(2025, 5, 1), d(2025, 4, 1)).is_none());
    }
}
