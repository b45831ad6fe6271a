use crate::aggregation::pending::PendingAggregate;
use crate::aggregation::receivable::{OwedBy, ReceivableAggregate};
use crate::alerting::priority::{compute_priority, PriorityLevel};
use crate::config::PriorityConfig;
use crate::core::dates::{days_between, days_overdue, days_until_due, FinancialYear};
use crate::core::ids::{MerchantId, TransactionId};
use crate::core::money::{add_checked, subtract_floor, Money};
use crate::core::status::{resolve_status, PaymentStatus};
use crate::core::transaction::TradeTransaction;
use crate::error::LedgerError;
use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared with a running aggregation.
///
/// Checked between counterparty groups, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A counterparty group left out of an aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedGroup {
    pub counterparty: MerchantId,
    pub reason: String,
}

/// Aggregates built in one pass plus the groups that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationOutcome<T> {
    pub aggregates: Vec<T>,
    pub skipped: Vec<SkippedGroup>,
}

/// Totals shared by the buyer-side and seller-side views.
struct GroupTotals {
    ids: Vec<TransactionId>,
    total: Money,
    paid: Money,
    pending: Money,
    oldest: Option<NaiveDate>,
    due: Option<NaiveDate>,
}

impl GroupTotals {
    /// Fails on the first transaction whose own invariants do not hold, or
    /// when the group's sums overflow.
    fn of(transactions: &[&TradeTransaction]) -> Result<Self, LedgerError> {
        let mut totals = GroupTotals {
            ids: Vec::with_capacity(transactions.len()),
            total: Decimal::ZERO,
            paid: Decimal::ZERO,
            pending: Decimal::ZERO,
            oldest: None,
            due: None,
        };
        let mut earliest_open_due: Option<NaiveDate> = None;
        let mut earliest_any_due: Option<NaiveDate> = None;

        for t in transactions {
            t.check_invariants()?;
            // Recomputed rather than trusted, so a torn read cannot go negative.
            let pending = subtract_floor(t.total_amount(), t.paid_amount());
            totals.ids.push(t.id());
            totals.total = add_checked("group total", totals.total, t.total_amount())?;
            totals.paid = add_checked("group paid", totals.paid, t.total_amount() - pending)?;
            totals.pending = add_checked("group pending", totals.pending, pending)?;
            totals.oldest = min_date(totals.oldest, Some(t.trade_date()));
            earliest_any_due = min_date(earliest_any_due, t.due_date());
            if pending > Decimal::ZERO {
                earliest_open_due = min_date(earliest_open_due, t.due_date());
            }
        }
        totals.due = earliest_open_due.or(earliest_any_due);
        Ok(totals)
    }

    fn status(&self, today: NaiveDate) -> PaymentStatus {
        resolve_status(self.paid, self.total, self.due, today)
    }

    fn days_overdue(&self, today: NaiveDate) -> i64 {
        self.due.map(|d| days_overdue(d, today)).unwrap_or(0)
    }

    fn priority(&self, status: PaymentStatus, today: NaiveDate, config: &PriorityConfig) -> PriorityLevel {
        if status.is_settled() {
            return PriorityLevel::Low;
        }
        compute_priority(
            self.days_overdue(today),
            self.due.map(|d| days_until_due(d, today)),
            self.pending,
            config,
        )
    }

    fn days_since_oldest(&self, today: NaiveDate) -> i64 {
        self.oldest.map(|d| days_between(d, today).max(0)).unwrap_or(0)
    }
}

fn min_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// True when the transaction belongs to the window; no window means all.
pub fn in_window(transaction: &TradeTransaction, window: Option<&FinancialYear>) -> bool {
    window.map_or(true, |fy| transaction.in_financial_year(fy))
}

/// Builds buyer-side and seller-side views from a transaction snapshot.
///
/// Aggregates are always rebuilt from scratch, so running the aggregator
/// twice over the same snapshot gives identical results. A group whose
/// transactions fail their consistency check is skipped and reported;
/// its siblings are unaffected.
#[derive(Debug, Clone, Default)]
pub struct TransactionAggregator {
    config: PriorityConfig,
}

impl TransactionAggregator {
    pub fn new(config: PriorityConfig) -> Self {
        Self { config }
    }

    /// One [`PendingAggregate`] per buyer, ordered by buyer id.
    pub fn pending_by_buyer(
        &self,
        transactions: &[TradeTransaction],
        window: Option<&FinancialYear>,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<AggregationOutcome<PendingAggregate>, LedgerError> {
        let mut groups: BTreeMap<&MerchantId, Vec<&TradeTransaction>> = BTreeMap::new();
        for t in transactions.iter().filter(|t| in_window(t, window)) {
            groups.entry(t.buyer()).or_default().push(t);
        }

        let mut outcome = AggregationOutcome {
            aggregates: Vec::with_capacity(groups.len()),
            skipped: Vec::new(),
        };
        for (completed, (buyer, mut group)) in groups.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(LedgerError::Aborted {
                    completed_groups: completed,
                });
            }
            sort_group(&mut group);
            match GroupTotals::of(&group) {
                Ok(totals) => {
                    let status = totals.status(today);
                    outcome.aggregates.push(PendingAggregate {
                        buyer: buyer.clone(),
                        transaction_count: totals.ids.len(),
                        total_amount: totals.total,
                        paid_amount: totals.paid,
                        total_pending_amount: totals.pending,
                        oldest_transaction_date: totals.oldest,
                        days_since_oldest: totals.days_since_oldest(today),
                        due_date: totals.due,
                        days_overdue: totals.days_overdue(today),
                        status,
                        priority: totals.priority(status, today, &self.config),
                        transaction_ids: totals.ids,
                    });
                }
                Err(e) => {
                    warn!("skipping pending group for buyer {buyer}: {e}");
                    outcome.skipped.push(SkippedGroup {
                        counterparty: buyer.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!(
            "built {} pending aggregates, skipped {}",
            outcome.aggregates.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// One [`ReceivableAggregate`] per seller, bucketed by owing buyer.
    pub fn receivable_by_seller(
        &self,
        transactions: &[TradeTransaction],
        window: Option<&FinancialYear>,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<AggregationOutcome<ReceivableAggregate>, LedgerError> {
        let mut groups: BTreeMap<&MerchantId, BTreeMap<&MerchantId, Vec<&TradeTransaction>>> =
            BTreeMap::new();
        for t in transactions.iter().filter(|t| in_window(t, window)) {
            groups
                .entry(t.seller())
                .or_default()
                .entry(t.buyer())
                .or_default()
                .push(t);
        }

        let mut outcome = AggregationOutcome {
            aggregates: Vec::with_capacity(groups.len()),
            skipped: Vec::new(),
        };
        for (completed, (seller, buckets)) in groups.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(LedgerError::Aborted {
                    completed_groups: completed,
                });
            }
            match self.build_receivable(seller, buckets, today) {
                Ok(aggregate) => outcome.aggregates.push(aggregate),
                Err(e) => {
                    warn!("skipping receivable group for seller {seller}: {e}");
                    outcome.skipped.push(SkippedGroup {
                        counterparty: seller.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!(
            "built {} receivable aggregates, skipped {}",
            outcome.aggregates.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    fn build_receivable(
        &self,
        seller: &MerchantId,
        buckets: BTreeMap<&MerchantId, Vec<&TradeTransaction>>,
        today: NaiveDate,
    ) -> Result<ReceivableAggregate, LedgerError> {
        let mut owed_by = Vec::with_capacity(buckets.len());
        let mut all: Vec<&TradeTransaction> = Vec::new();
        for (buyer, mut group) in buckets {
            sort_group(&mut group);
            let totals = GroupTotals::of(&group)?;
            owed_by.push(OwedBy {
                buyer: buyer.clone(),
                total_owed: totals.pending,
                transaction_ids: totals.ids,
            });
            all.extend(group);
        }
        sort_group(&mut all);
        let totals = GroupTotals::of(&all)?;

        let bucket_sum: Money = owed_by.iter().map(|o| o.total_owed).sum();
        if bucket_sum != totals.pending {
            return Err(LedgerError::Consistency(format!(
                "receivables of {seller}: buckets sum to {bucket_sum}, total is {}",
                totals.pending
            )));
        }

        let status = totals.status(today);
        Ok(ReceivableAggregate {
            seller: seller.clone(),
            owed_by,
            transaction_count: totals.ids.len(),
            total_amount: totals.total,
            paid_amount: totals.paid,
            total_receivable_amount: totals.pending,
            oldest_transaction_date: totals.oldest,
            days_since_oldest: totals.days_since_oldest(today),
            due_date: totals.due,
            days_overdue: totals.days_overdue(today),
            status,
            priority: totals.priority(status, today, &self.config),
        })
    }
}

fn sort_group(group: &mut [&TradeTransaction]) {
    group.sort_by(|a, b| {
        a.trade_date()
            .cmp(&b.trade_date())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payment::{PaymentMethod, PaymentRequest};
    use crate::core::transaction::TradeRecord;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    fn trade(seller: &str, buyer: &str, amount: Decimal, days_ago: i64) -> TradeTransaction {
        TradeTransaction::new(
            TradeRecord::new(seller, buyer, "WHEAT", dec!(1), amount, today() - Duration::days(days_ago)),
            today(),
        )
        .unwrap()
    }

    fn pay(t: &mut TradeTransaction, amount: Decimal) {
        t.apply_payment(PaymentRequest::new(amount, today(), PaymentMethod::Cash), today())
            .unwrap();
    }

    fn aggregator() -> TransactionAggregator {
        TransactionAggregator::new(PriorityConfig::default())
    }

    /// Same transaction with a stored pending amount that no longer
    /// matches its payments.
    fn corrupted(t: &TradeTransaction) -> TradeTransaction {
        let mut value = serde_json::to_value(t).unwrap();
        value["pending_amount"] = serde_json::Value::String("1".into());
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_pending_sums_outstanding_per_buyer() {
        let first = trade("Y", "X", dec!(5000), 10);
        let mut second = trade("Y", "X", dec!(3000), 5);
        pay(&mut second, dec!(1000));
        let txs = vec![first, second];

        let outcome = aggregator()
            .pending_by_buyer(&txs, None, today(), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.aggregates.len(), 1);
        let x = &outcome.aggregates[0];
        assert_eq!(x.total_pending_amount, dec!(7000));
        assert_eq!(x.transaction_count, 2);
        assert_eq!(x.paid_amount, dec!(1000));
        assert_eq!(x.status, PaymentStatus::PartialPaid);
        assert_eq!(x.days_since_oldest, 10);
        assert_eq!(x.transaction_ids[0], txs[0].id());
    }

    #[test]
    fn test_fully_paid_transaction_still_counted() {
        let mut paid = trade("Y", "X", dec!(400), 3);
        pay(&mut paid, dec!(400));
        let txs = vec![paid, trade("Y", "X", dec!(600), 1)];
        let outcome = aggregator()
            .pending_by_buyer(&txs, None, today(), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.aggregates[0].transaction_count, 2);
        assert_eq!(outcome.aggregates[0].total_pending_amount, dec!(600));
    }

    #[test]
    fn test_receivable_two_level_grouping() {
        let txs = vec![
            trade("S", "B1", dec!(100), 1),
            trade("S", "B2", dec!(250), 2),
            trade("S", "B1", dec!(50), 3),
            trade("T", "B1", dec!(70), 1),
        ];
        let outcome = aggregator()
            .receivable_by_seller(&txs, None, today(), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.aggregates.len(), 2);
        let s = &outcome.aggregates[0];
        assert_eq!(s.seller.as_str(), "S");
        assert_eq!(s.owed_by.len(), 2);
        assert_eq!(s.owed_by(&MerchantId::new("B1")).unwrap().total_owed, dec!(150));
        assert_eq!(s.owed_by(&MerchantId::new("B2")).unwrap().total_owed, dec!(250));
        assert_eq!(s.total_receivable_amount, dec!(400));
        assert_eq!(s.transaction_count, 3);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let txs: Vec<_> = (0..6)
            .map(|i| trade(["S1", "S2"][i % 2], ["B1", "B2", "B3"][i % 3], dec!(100) * Decimal::from(i + 1), i as i64))
            .collect();
        let agg = aggregator();
        let token = CancellationToken::new();
        let a = agg.pending_by_buyer(&txs, None, today(), &token).unwrap();
        let b = agg.pending_by_buyer(&txs, None, today(), &token).unwrap();
        assert_eq!(a, b);
        let a = agg.receivable_by_seller(&txs, None, today(), &token).unwrap();
        let b = agg.receivable_by_seller(&txs, None, today(), &token).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_financial_year_window() {
        let fy = FinancialYear::april_to_march(2025).unwrap();
        let old = TradeTransaction::new(
            TradeRecord::new("Y", "X", "WHEAT", dec!(1), dec!(999), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()),
            today(),
        )
        .unwrap();
        let tagged = TradeTransaction::new(
            TradeRecord::new("Y", "X", "WHEAT", dec!(1), dec!(5), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
                .with_financial_year("2025-26"),
            today(),
        )
        .unwrap();
        let txs = vec![old, tagged, trade("Y", "X", dec!(10), 1)];
        let outcome = aggregator()
            .pending_by_buyer(&txs, Some(&fy), today(), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.aggregates[0].total_pending_amount, dec!(15));
    }

    #[test]
    fn test_overdue_large_group_is_critical() {
        let t = TradeTransaction::new(
            TradeRecord::new("Y", "X", "WHEAT", dec!(100), dec!(1500), today() - Duration::days(60))
                .with_due_date(today() - Duration::days(35)),
            today(),
        )
        .unwrap();
        let outcome = aggregator()
            .pending_by_buyer(&[t], None, today(), &CancellationToken::new())
            .unwrap();
        let x = &outcome.aggregates[0];
        assert_eq!(x.status, PaymentStatus::Overdue);
        assert_eq!(x.days_overdue, 35);
        assert_eq!(x.priority, PriorityLevel::Critical);
    }

    #[test]
    fn test_due_date_ignores_settled_transactions() {
        let mut settled = TradeTransaction::new(
            TradeRecord::new("Y", "X", "WHEAT", dec!(1), dec!(10), today())
                .with_due_date(today() - Duration::days(3)),
            today(),
        )
        .unwrap();
        pay(&mut settled, dec!(10));
        let open = TradeTransaction::new(
            TradeRecord::new("Y", "X", "WHEAT", dec!(1), dec!(10), today())
                .with_due_date(today() + Duration::days(20)),
            today(),
        )
        .unwrap();
        let outcome = aggregator()
            .pending_by_buyer(&[settled, open], None, today(), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.aggregates[0].due_date, Some(today() + Duration::days(20)));
        assert_eq!(outcome.aggregates[0].status, PaymentStatus::PartialPaid);
    }

    #[test]
    fn test_cancelled_before_first_group() {
        let token = CancellationToken::new();
        token.cancel();
        let err = aggregator()
            .pending_by_buyer(&[trade("Y", "X", dec!(1), 0)], None, today(), &token)
            .unwrap_err();
        assert_eq!(err, LedgerError::Aborted { completed_groups: 0 });
    }

    #[test]
    fn test_inconsistent_group_is_skipped_and_siblings_kept() {
        let healthy = vec![trade("Y", "X", dec!(500), 2), trade("T", "W", dec!(80), 1)];
        let token = CancellationToken::new();
        let baseline_pending = aggregator().pending_by_buyer(&healthy, None, today(), &token).unwrap();
        let baseline_receivable = aggregator()
            .receivable_by_seller(&healthy, None, today(), &token)
            .unwrap();

        let mut txs = healthy.clone();
        txs.push(corrupted(&trade("Y", "Z", dec!(300), 1)));

        let pending = aggregator().pending_by_buyer(&txs, None, today(), &token).unwrap();
        assert_eq!(pending.aggregates, baseline_pending.aggregates);
        assert_eq!(pending.skipped.len(), 1);
        assert_eq!(pending.skipped[0].counterparty.as_str(), "Z");
        assert!(pending.skipped[0].reason.contains("pending"));

        // Seller Y owns the broken trade; seller T is untouched.
        let receivable = aggregator().receivable_by_seller(&txs, None, today(), &token).unwrap();
        assert_eq!(receivable.skipped.len(), 1);
        assert_eq!(receivable.skipped[0].counterparty.as_str(), "Y");
        assert_eq!(receivable.aggregates.len(), 1);
        assert_eq!(receivable.aggregates[0], baseline_receivable.aggregates[0]);
    }

    #[test]
    fn test_overflowing_group_is_skipped() {
        let txs = vec![
            trade("Y", "X", Decimal::MAX, 3),
            trade("Y", "X", Decimal::MAX, 2),
            trade("T", "W", dec!(80), 1),
        ];
        let outcome = aggregator()
            .pending_by_buyer(&txs, None, today(), &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.aggregates.len(), 1);
        assert_eq!(outcome.aggregates[0].buyer.as_str(), "W");
        assert_eq!(outcome.skipped[0].counterparty.as_str(), "X");
        assert!(outcome.skipped[0].reason.contains("overflows"));
    }

    #[test]
    fn test_empty_input() {
        let outcome = aggregator()
            .receivable_by_seller(&[], None, today(), &CancellationToken::new())
            .unwrap();
        assert!(outcome.aggregates.is_empty());
        assert!(outcome.skipped.is_empty());
    }
}
