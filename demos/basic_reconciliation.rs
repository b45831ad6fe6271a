//! Basic brokerage and trade-debt reconciliation example.
//!
//! Tallies a merchant's brokerage, records part payments against it and
//! shows how pending amount and status move with each payment.

use brokerage_ledger::brokerage::calculator::BrokeragePolicy;
use brokerage_ledger::core::dates::FinancialYear;
use brokerage_ledger::core::ids::{BrokerId, MerchantId};
use brokerage_ledger::core::obligation::BrokerageObligation;
use brokerage_ledger::core::payment::{BankDetails, PaymentMethod, PaymentRequest};
use brokerage_ledger::core::transaction::TradeRecord;
use brokerage_ledger::ledger::payments::PaymentLedger;
use brokerage_ledger::ledger::store::{InMemoryRepository, Repository};
use chrono::{Duration, NaiveDate};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn main() {
    println!("╔════════════════════════════════════════════════╗");
    println!("║  brokerage-ledger: Basic Reconciliation Demo   ║");
    println!("╚════════════════════════════════════════════════╝\n");

    let today = NaiveDate::from_ymd_opt(2025, 6, 10).expect("valid date");
    let fy = FinancialYear::april_to_march(2025).expect("valid financial year");
    let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let ledger = PaymentLedger::new(Arc::clone(&repo));

    // --- Scenario 1: Trades and what the buyer owes ---
    println!("━━━ Scenario 1: Trades ━━━\n");

    let krishna = "M-KRISHNA-TRADERS";
    let balaji = "M-BALAJI-AGRO";
    let wheat = ledger
        .record_trade(
            TradeRecord::new(krishna, balaji, "WHEAT", dec!(100), dec!(2150), today - Duration::days(20))
                .with_quality("Lokwan")
                .with_due_date(today + Duration::days(10)),
            today,
        )
        .expect("trade accepted");
    ledger
        .record_trade(
            TradeRecord::new(balaji, krishna, "CHANA", dec!(50), dec!(5200), today - Duration::days(4)),
            today,
        )
        .expect("trade accepted");

    let receipt = ledger
        .apply_transaction_payment(
            wheat,
            PaymentRequest::new(dec!(100000), today, PaymentMethod::Rtgs).with_reference("RTGS-55102"),
            today,
        )
        .expect("payment accepted");
    println!(
        "{} paid {} of the wheat trade: pending {} ({}, {}%)\n",
        balaji, receipt.paid_amount, receipt.pending_amount, receipt.status, receipt.completion_percentage
    );

    // --- Scenario 2: Brokerage for the year ---
    println!("━━━ Scenario 2: Brokerage ━━━\n");

    let trades = repo.transactions();
    let obligation = BrokerageObligation::from_trades(
        MerchantId::new(balaji),
        BrokerId::new("BRK-01"),
        fy.clone(),
        &trades,
        dec!(10),
        &BrokeragePolicy::new(dec!(0.10), dec!(0.05)),
        Some(today + Duration::days(5)),
        today,
    )
    .expect("valid tally");
    let b = *obligation.breakdown();
    println!("  Bags:     {} sold + {} bought = {}", b.sold_bags, b.bought_bags, b.total_bags);
    println!("  Gross:    {}", b.gross_brokerage);
    println!("  Discount: {}", b.discount);
    println!("  TDS:      {}", b.tds);
    println!("  Net:      {}  [{}]\n", b.net_brokerage, obligation.status());

    let id = ledger.open_obligation(obligation).expect("new obligation");

    // --- Scenario 3: Part payments ---
    println!("━━━ Scenario 3: Part Payments ━━━\n");

    let payments = [
        PaymentRequest::new(dec!(500), today - Duration::days(2), PaymentMethod::Cash),
        PaymentRequest::new(dec!(600), today - Duration::days(1), PaymentMethod::Upi),
        PaymentRequest::new(dec!(600), today, PaymentMethod::Upi).with_reference("UTR-99817"),
        PaymentRequest::new(dec!(175), today, PaymentMethod::Cheque)
            .with_reference("CHQ-000412")
            .with_bank_details(BankDetails::new("Bank of Baroda").with_account_hint("xx4821")),
    ];
    for request in payments {
        let method = request.method;
        match ledger.apply_obligation_payment(id, request, today) {
            Ok(r) => println!(
                "  {:<14} paid {:>8}  pending {:>8}  {:<12} v{}",
                method.as_str(),
                r.paid_amount,
                r.pending_amount,
                r.status.as_str(),
                r.version
            ),
            Err(e) => println!("  {:<14} rejected: {}", method.as_str(), e),
        }
    }

    let summary = ledger.obligation_summary(id, today).expect("obligation exists");
    println!(
        "\n{} for {}: {} of {} paid across {} payments",
        summary.merchant, summary.financial_year, summary.paid_amount, summary.net_brokerage, summary.payment_count
    );
}
