use crate::alerting::priority::PriorityLevel;
use crate::core::ids::{MerchantId, TransactionId};
use crate::core::money::{percentage, Money};
use crate::core::status::PaymentStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What one buyer owes a given seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwedBy {
    pub buyer: MerchantId,
    pub total_owed: Money,
    pub transaction_ids: Vec<TransactionId>,
}

/// Everything a seller is still owed, bucketed by owing buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableAggregate {
    pub seller: MerchantId,
    /// One bucket per buyer, ordered by buyer id.
    pub owed_by: Vec<OwedBy>,
    pub transaction_count: usize,
    pub total_amount: Money,
    pub paid_amount: Money,
    /// Sum of `owed_by[..].total_owed`.
    pub total_receivable_amount: Money,
    pub oldest_transaction_date: Option<NaiveDate>,
    pub days_since_oldest: i64,
    pub due_date: Option<NaiveDate>,
    pub days_overdue: i64,
    pub status: PaymentStatus,
    pub priority: PriorityLevel,
}

impl ReceivableAggregate {
    pub fn owed_by(&self, buyer: &MerchantId) -> Option<&OwedBy> {
        self.owed_by.iter().find(|o| &o.buyer == buyer)
    }

    pub fn completion_percentage(&self) -> Decimal {
        percentage(self.paid_amount, self.total_amount)
    }
}
