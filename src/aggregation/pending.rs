use crate::alerting::priority::PriorityLevel;
use crate::core::ids::{MerchantId, TransactionId};
use crate::core::money::{percentage, Money};
use crate::core::status::PaymentStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything one buyer still owes across their purchases.
///
/// Holds transaction ids, not copies; the transactions themselves live in
/// the snapshot's arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAggregate {
    pub buyer: MerchantId,
    /// Ordered by trade date, then id.
    pub transaction_ids: Vec<TransactionId>,
    pub transaction_count: usize,
    pub total_amount: Money,
    pub paid_amount: Money,
    /// Sum of the transactions' pending amounts.
    pub total_pending_amount: Money,
    pub oldest_transaction_date: Option<NaiveDate>,
    pub days_since_oldest: i64,
    pub due_date: Option<NaiveDate>,
    pub days_overdue: i64,
    pub status: PaymentStatus,
    pub priority: PriorityLevel,
}

impl PendingAggregate {
    pub fn completion_percentage(&self) -> Decimal {
        percentage(self.paid_amount, self.total_amount)
    }
}
