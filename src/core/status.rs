use crate::core::money::Money;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days before the due date during which an unpaid obligation is `DueSoon`.
pub const DUE_SOON_WINDOW_DAYS: i64 = 7;

/// Payment status derived from paid/total amounts and the due date.
///
/// Always computed by [`resolve_status`]; entities cache the result of the
/// last mutation but never accept a status from callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    PartialPaid,
    Paid,
    DueSoon,
    Overdue,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::PartialPaid,
        PaymentStatus::Paid,
        PaymentStatus::DueSoon,
        PaymentStatus::Overdue,
    ];

    pub fn is_settled(self) -> bool {
        self == PaymentStatus::Paid
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::PartialPaid => "PARTIAL_PAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::DueSoon => "DUE_SOON",
            PaymentStatus::Overdue => "OVERDUE",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the payment status.
///
/// Precedence is fixed: paid, then overdue, then due-soon, then partial,
/// then pending. A partially paid obligation past its due date is
/// `Overdue`; inside the due-soon window it stays `PartialPaid`.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::core::status::{resolve_status, PaymentStatus};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
/// let yesterday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
/// assert_eq!(
///     resolve_status(dec!(50), dec!(100), Some(yesterday), today),
///     PaymentStatus::Overdue,
/// );
/// ```
pub fn resolve_status(
    paid: Money,
    total: Money,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> PaymentStatus {
    if total <= Decimal::ZERO || paid >= total {
        return PaymentStatus::Paid;
    }
    let has_paid = paid > Decimal::ZERO;
    if let Some(due) = due_date {
        if today > due {
            return PaymentStatus::Overdue;
        }
        if today + Duration::days(DUE_SOON_WINDOW_DAYS) >= due {
            return if has_paid {
                PaymentStatus::PartialPaid
            } else {
                PaymentStatus::DueSoon
            };
        }
    }
    if has_paid {
        PaymentStatus::PartialPaid
    } else {
        PaymentStatus::Pending
    }
}
