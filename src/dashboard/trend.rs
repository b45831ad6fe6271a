use crate::config::{Granularity, TrendConfig, MAX_TREND_BUCKETS};
use crate::core::money::{percent_change, Money};
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    /// Classify a percentage change against a symmetric tolerance band.
    pub fn classify(change_percent: Decimal, tolerance_percent: Decimal) -> Self {
        if change_percent > tolerance_percent {
            TrendDirection::Increasing
        } else if change_percent < -tolerance_percent {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendDirection::Increasing => "INCREASING",
            TrendDirection::Decreasing => "DECREASING",
            TrendDirection::Stable => "STABLE",
        })
    }
}

/// Payments received in one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// First day of the bucket; a Monday for weekly buckets.
    pub period_start: NaiveDate,
    pub amount: Money,
    pub payment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub granularity: Granularity,
    /// Oldest bucket first, empty buckets included.
    pub points: Vec<TrendPoint>,
    /// Payments in the 7 days ending today.
    pub this_week: Money,
    /// Payments in the 7 days before that.
    pub last_week: Money,
    pub week_over_week_percent: Decimal,
    pub direction: TrendDirection,
}

impl TrendSeries {
    pub fn total(&self) -> Money {
        self.points
            .iter()
            .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.amount))
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_signed(Duration::days(i64::from(date.weekday().num_days_from_monday())))
        .unwrap_or(date)
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_signed(Duration::days(days)).unwrap_or(NaiveDate::MIN)
}

/// Bucket `(payment_date, amount)` pairs into a series ending at `today`.
///
/// Payments dated outside the series, or after `today`, are ignored.
pub fn build_trend<I>(payments: I, today: NaiveDate, config: &TrendConfig) -> TrendSeries
where
    I: IntoIterator<Item = (NaiveDate, Money)>,
{
    let buckets = i64::from(config.buckets.clamp(1, MAX_TREND_BUCKETS));
    let (end, step) = match config.granularity {
        Granularity::Daily => (today, 1),
        Granularity::Weekly => (week_start(today), 7),
    };
    // Too close to the calendar's lower edge: a single bucket.
    let (first, buckets) = match end.checked_sub_signed(Duration::days((buckets - 1) * step)) {
        Some(first) => (first, buckets),
        None => (end, 1),
    };
    let mut points: Vec<TrendPoint> = (0..buckets)
        .map(|i| TrendPoint {
            period_start: first + Duration::days(i * step),
            amount: Decimal::ZERO,
            payment_count: 0,
        })
        .collect();

    let this_week_from = days_before(today, 6);
    let last_week_from = days_before(today, 13);
    let mut this_week = Decimal::ZERO;
    let mut last_week = Decimal::ZERO;

    for (date, amount) in payments {
        if date > today {
            continue;
        }
        if date >= this_week_from {
            this_week = this_week.saturating_add(amount);
        } else if date >= last_week_from {
            last_week = last_week.saturating_add(amount);
        }
        if date >= first {
            let index = ((date - first).num_days() / step) as usize;
            if let Some(point) = points.get_mut(index) {
                point.amount = point.amount.saturating_add(amount);
                point.payment_count += 1;
            }
        }
    }

    let week_over_week_percent = percent_change(last_week, this_week);
    TrendSeries {
        granularity: config.granularity,
        points,
        this_week,
        last_week,
        week_over_week_percent,
        direction: TrendDirection::classify(week_over_week_percent, config.flat_tolerance_percent),
    }
}
