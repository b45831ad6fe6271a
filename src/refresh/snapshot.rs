use crate::aggregation::aggregator::SkippedGroup;
use crate::aggregation::pending::PendingAggregate;
use crate::aggregation::receivable::ReceivableAggregate;
use crate::core::ids::{MerchantId, TransactionId};
use crate::core::transaction::TradeTransaction;
use crate::dashboard::summary::DashboardSummary;
use crate::dashboard::trend::TrendSeries;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One published generation of derived views.
///
/// Built off to the side and swapped in whole; never mutated after
/// publication. Aggregates refer to transactions by id and resolve them
/// through the `transactions` arena captured in the same pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateSnapshot {
    pub generation: u64,
    /// `None` only for the empty generation 0.
    pub built_on: Option<NaiveDate>,
    pub financial_year: Option<String>,
    pub transactions: HashMap<TransactionId, TradeTransaction>,
    pub pending: BTreeMap<MerchantId, PendingAggregate>,
    pub receivable: BTreeMap<MerchantId, ReceivableAggregate>,
    pub dashboard: Option<DashboardSummary>,
    pub trend: Option<TrendSeries>,
    pub skipped: Vec<SkippedGroup>,
}

impl AggregateSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&TradeTransaction> {
        self.transactions.get(&id)
    }

    pub fn pending_for(&self, buyer: &MerchantId) -> Option<&PendingAggregate> {
        self.pending.get(buyer)
    }

    pub fn receivable_for(&self, seller: &MerchantId) -> Option<&ReceivableAggregate> {
        self.receivable.get(seller)
    }

    /// Resolve an id list against the arena, in list order.
    pub fn resolve<'a>(
        &'a self,
        ids: &'a [TransactionId],
    ) -> impl Iterator<Item = &'a TradeTransaction> + 'a {
        ids.iter().filter_map(move |id| self.transactions.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TradeRecord;
    use rust_decimal_macros::dec;

    #[test]
    fn test_resolve_keeps_order_and_skips_unknown() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let a = TradeTransaction::new(TradeRecord::new("S", "B", "RICE", dec!(1), dec!(1), today), today)
            .unwrap();
        let b = TradeTransaction::new(TradeRecord::new("S", "B", "RICE", dec!(2), dec!(1), today), today)
            .unwrap();
        let ids = vec![b.id(), TransactionId::new(), a.id()];

        let mut snapshot = AggregateSnapshot::empty();
        snapshot.transactions.insert(a.id(), a.clone());
        snapshot.transactions.insert(b.id(), b.clone());

        let resolved: Vec<_> = snapshot.resolve(&ids).map(|t| t.id()).collect();
        assert_eq!(resolved, vec![b.id(), a.id()]);
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.pending_for(&MerchantId::new("B")).is_none());
    }
}
