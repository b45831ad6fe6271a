//! Scheduled dashboard refresh over a generated trade book.
//!
//! Generates a season of trades, pays some of them down, then runs two
//! refresh passes to show snapshot generations, the dashboard and the
//! alerts raised only on the first pass.

use brokerage_ledger::aggregation::aggregator::CancellationToken;
use brokerage_ledger::alerting::alerts::MemoryAlertSink;
use brokerage_ledger::config::EngineConfig;
use brokerage_ledger::core::dates::FinancialYear;
use brokerage_ledger::core::payment::{PaymentMethod, PaymentRequest};
use brokerage_ledger::ledger::payments::PaymentLedger;
use brokerage_ledger::ledger::store::{InMemoryRepository, Repository};
use brokerage_ledger::refresh::service::RefreshService;
use brokerage_ledger::simulation::generator::{generate_trades, TradeGenConfig};
use rust_decimal::Decimal;
use std::sync::Arc;

fn main() {
    println!("╔════════════════════════════════════════════╗");
    println!("║  brokerage-ledger: Dashboard Refresh Demo  ║");
    println!("╚════════════════════════════════════════════╝\n");

    let config = TradeGenConfig {
        merchant_count: 8,
        trade_count: 60,
        seed: Some(2025),
        ..Default::default()
    };
    let today = config.end_date;
    let fy = FinancialYear::containing(today).expect("valid financial year");

    let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let ledger = PaymentLedger::new(Arc::clone(&repo));
    for (i, record) in generate_trades(&config).into_iter().enumerate() {
        let total = record.bags * record.rate_per_bag;
        let id = ledger.record_trade(record, today).expect("generated trade is valid");
        // Every third trade is settled, every other one half paid.
        let paid = match i % 3 {
            0 => total,
            1 => total / Decimal::TWO,
            _ => Decimal::ZERO,
        };
        if paid > Decimal::ZERO {
            ledger
                .apply_transaction_payment(id, PaymentRequest::new(paid, today, PaymentMethod::Cash), today)
                .expect("payment accepted");
        }
    }

    let sink = Arc::new(MemoryAlertSink::new());
    let service = RefreshService::new(repo, EngineConfig::default(), sink.clone());

    for pass in 1..=2 {
        let report = service
            .refresh_all(today, Some(&fy), &CancellationToken::new())
            .expect("refresh completes");
        println!(
            "━━━ Pass {}: generation {}, {} pending groups, {} receivable groups, {} new alerts ━━━\n",
            pass, report.generation, report.pending_groups, report.receivable_groups, report.alerts_raised
        );
    }

    if let Some(dashboard) = service.dashboard() {
        println!("{}\n", dashboard);
    }

    println!("━━━ Alerts ━━━\n");
    for alert in sink.alerts() {
        println!("  [{:<8}] {}", alert.severity.as_str(), alert.message);
    }

    println!("\n━━━ Largest Pending Buyers ━━━\n");
    let snapshot = service.snapshot();
    let mut pending: Vec<_> = snapshot.pending.values().collect();
    pending.sort_by(|a, b| b.total_pending_amount.cmp(&a.total_pending_amount));
    for agg in pending.iter().take(5) {
        println!(
            "  {:<14} {:>14}  {:<12} {:<8} ({} trades)",
            agg.buyer,
            agg.total_pending_amount.round_dp(2),
            agg.status.as_str(),
            agg.priority.as_str(),
            agg.transaction_count
        );
    }
}
