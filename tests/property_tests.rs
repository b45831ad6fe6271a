use brokerage_ledger::aggregation::aggregator::{CancellationToken, TransactionAggregator};
use brokerage_ledger::alerting::priority::{compute_priority, PriorityLevel};
use brokerage_ledger::brokerage::calculator::{calculate, BrokeragePolicy};
use brokerage_ledger::config::{HealthConfig, PriorityConfig};
use brokerage_ledger::core::dates::FinancialYear;
use brokerage_ledger::core::ids::{BrokerId, MerchantId};
use brokerage_ledger::core::money::subtract_floor;
use brokerage_ledger::core::obligation::BrokerageObligation;
use brokerage_ledger::core::payment::{PaymentMethod, PaymentRequest};
use brokerage_ledger::core::status::{resolve_status, PaymentStatus};
use brokerage_ledger::core::transaction::{TradeRecord, TradeTransaction};
use brokerage_ledger::dashboard::summary::health_score;
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
}

/// Amount in paise, 0.01 to 1,000,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|p| Decimal::new(p, 2))
}

/// Merchant from a small pool, so groups have several members.
fn arb_merchant() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["A", "B", "C", "D", "E"])
}

/// A trade between distinct merchants with up to three part payments.
fn arb_transaction() -> impl Strategy<Value = TradeTransaction> {
    (
        arb_merchant(),
        arb_merchant(),
        1u32..500,
        arb_amount(),
        0i64..90,
        prop::option::of(-40i64..40),
        prop::collection::vec(arb_amount(), 0..3),
    )
        .prop_filter_map(
            "seller must differ from buyer",
            |(seller, buyer, bags, rate, age, due_offset, payments)| {
                if seller == buyer {
                    return None;
                }
                let mut record =
                    TradeRecord::new(seller, buyer, "WHEAT", Decimal::from(bags), rate, today() - Duration::days(age));
                if let Some(offset) = due_offset {
                    record = record.with_due_date(today() + Duration::days(offset));
                }
                let mut t = TradeTransaction::new(record, today()).ok()?;
                for amount in payments {
                    t.apply_payment(PaymentRequest::new(amount, today(), PaymentMethod::Cash), today())
                        .ok()?;
                }
                Some(t)
            },
        )
}

fn arb_book() -> impl Strategy<Value = Vec<TradeTransaction>> {
    prop::collection::vec(arb_transaction(), 0..40)
}

fn arb_status_inputs() -> impl Strategy<Value = (Decimal, Decimal, Option<NaiveDate>)> {
    (arb_amount(), arb_amount(), prop::option::of(-60i64..60))
        .prop_map(|(paid, total, due)| (paid, total, due.map(|d| today() + Duration::days(d))))
}

proptest! {
    // ===================================================================
    // INVARIANT 1: pending = max(net - paid, 0) and paid = sum(payments).
    //
    // Holds after every accepted payment, including overpayments.
    // ===================================================================
    #[test]
    fn obligation_pending_matches_payments(
        sold in 0u32..10_000,
        bought in 0u32..10_000,
        payments in prop::collection::vec(arb_amount(), 1..10),
    ) {
        let mut ob = BrokerageObligation::new(
            MerchantId::new("M"),
            BrokerId::new("BRK"),
            FinancialYear::april_to_march(2025).unwrap(),
            Decimal::from(sold),
            Decimal::from(bought),
            Decimal::from(10),
            &BrokeragePolicy::new(Decimal::new(10, 2), Decimal::new(5, 2)),
            None,
            today(),
        )
        .unwrap();
        for amount in &payments {
            ob.apply_payment(PaymentRequest::new(*amount, today(), PaymentMethod::Cash), today())
                .unwrap();
            let sum: Decimal = ob.payments().iter().map(|p| p.amount()).sum();
            prop_assert_eq!(ob.paid_amount(), sum);
            prop_assert_eq!(ob.pending_amount(), subtract_floor(ob.net_brokerage(), ob.paid_amount()));
            prop_assert!(ob.pending_amount() >= Decimal::ZERO);
            prop_assert!(ob.check_invariants().is_ok());
        }
    }

    // ===================================================================
    // INVARIANT 2: Aggregate pending = sum of constituent pending.
    //
    // Per buyer, and per seller with buckets summing to the total.
    // ===================================================================
    #[test]
    fn aggregates_sum_constituents(book in arb_book()) {
        let aggregator = TransactionAggregator::new(PriorityConfig::default());
        let token = CancellationToken::new();

        let pending = aggregator.pending_by_buyer(&book, None, today(), &token).unwrap();
        prop_assert!(pending.skipped.is_empty());
        for agg in &pending.aggregates {
            let expected: Decimal = book
                .iter()
                .filter(|t| t.buyer() == &agg.buyer)
                .map(|t| t.pending_amount())
                .sum();
            prop_assert_eq!(agg.total_pending_amount, expected);
            prop_assert_eq!(agg.transaction_count, agg.transaction_ids.len());
        }
        let counted: usize = pending.aggregates.iter().map(|a| a.transaction_count).sum();
        prop_assert_eq!(counted, book.len());

        let receivable = aggregator.receivable_by_seller(&book, None, today(), &token).unwrap();
        for agg in &receivable.aggregates {
            let buckets: Decimal = agg.owed_by.iter().map(|o| o.total_owed).sum();
            prop_assert_eq!(agg.total_receivable_amount, buckets);
        }
    }

    // ===================================================================
    // INVARIANT 3: Re-aggregation is idempotent.
    // ===================================================================
    #[test]
    fn aggregation_is_idempotent(book in arb_book()) {
        let aggregator = TransactionAggregator::new(PriorityConfig::default());
        let token = CancellationToken::new();
        let first = aggregator.pending_by_buyer(&book, None, today(), &token).unwrap();
        let second = aggregator.pending_by_buyer(&book, None, today(), &token).unwrap();
        prop_assert_eq!(first, second);

        let first = aggregator.receivable_by_seller(&book, None, today(), &token).unwrap();
        let second = aggregator.receivable_by_seller(&book, None, today(), &token).unwrap();
        prop_assert_eq!(first, second);
    }

    // ===================================================================
    // INVARIANT 4: Status precedence.
    //
    // Fully paid is always PAID; otherwise a past due date is always
    // OVERDUE, whatever was paid.
    // ===================================================================
    #[test]
    fn status_precedence((paid, total, due) in arb_status_inputs()) {
        let status = resolve_status(paid, total, due, today());
        if paid >= total {
            prop_assert_eq!(status, PaymentStatus::Paid);
        } else if due.is_some_and(|d| d < today()) {
            prop_assert_eq!(status, PaymentStatus::Overdue);
        } else {
            prop_assert_ne!(status, PaymentStatus::Overdue);
            prop_assert_ne!(status, PaymentStatus::Paid);
        }
    }

    // ===================================================================
    // INVARIANT 5: Priority never decreases with age or amount.
    // ===================================================================
    #[test]
    fn priority_is_monotonic(
        overdue in 0i64..100,
        extra_days in 0i64..30,
        amount in arb_amount(),
        extra_amount in arb_amount(),
    ) {
        let config = PriorityConfig::default();
        let base = compute_priority(overdue, Some(0), amount, &config);
        prop_assert!(compute_priority(overdue + extra_days, Some(0), amount, &config) >= base);
        prop_assert!(compute_priority(overdue, Some(0), amount + extra_amount, &config) >= base);
        if overdue > config.critical_overdue_days {
            prop_assert_eq!(base, PriorityLevel::Critical);
        }
    }

    // ===================================================================
    // INVARIANT 6: Health score stays within [0, 100].
    // ===================================================================
    #[test]
    fn health_score_is_bounded(overdue in 0usize..1000, critical in 0usize..1000, high in 0usize..1000) {
        let score = health_score(overdue, critical, high, &HealthConfig::default());
        prop_assert!(score >= Decimal::ZERO);
        prop_assert!(score <= Decimal::ONE_HUNDRED);
    }

    // ===================================================================
    // INVARIANT 7: Net brokerage is never negative and never above gross.
    // ===================================================================
    #[test]
    fn net_brokerage_bounded(
        sold in 0u32..100_000,
        bought in 0u32..100_000,
        rate in arb_amount(),
        discount in 0i64..=100,
        tds in 0i64..=100,
    ) {
        let policy = BrokeragePolicy::new(Decimal::new(discount, 2), Decimal::new(tds, 2));
        let b = calculate(Decimal::from(sold), Decimal::from(bought), rate, &policy).unwrap();
        prop_assert!(b.net_brokerage >= Decimal::ZERO);
        prop_assert!(b.net_brokerage <= b.gross_brokerage);
        prop_assert_eq!(b.gross_brokerage, b.total_bags * rate);
    }
}
