//! brokerage-ledger CLI
//!
//! Reconcile brokerage and trade debts from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Pending and receivable aggregates from a JSON trade file
//! brokerage-ledger aggregate --input trades.json
//!
//! # Brokerage breakdown for a bag tally
//! brokerage-ledger brokerage --sold 100 --bought 50 --rate 10
//!
//! # Full refresh: dashboard, trends and alerts
//! brokerage-ledger dashboard --input trades.json --format json
//!
//! # Generate a random trade book for testing
//! brokerage-ledger generate --merchants 10 --trades 30
//! ```

use brokerage_ledger::aggregation::aggregator::{CancellationToken, TransactionAggregator};
use brokerage_ledger::alerting::alerts::MemoryAlertSink;
use brokerage_ledger::brokerage::calculator::calculate;
use brokerage_ledger::config::EngineConfig;
use brokerage_ledger::core::dates::FinancialYear;
use brokerage_ledger::core::ids::{BrokerId, MerchantId};
use brokerage_ledger::core::obligation::BrokerageObligation;
use brokerage_ledger::core::payment::{BankDetails, PaymentMethod, PaymentRequest};
use brokerage_ledger::core::status::resolve_status;
use brokerage_ledger::core::transaction::{TradeRecord, TradeTransaction};
use brokerage_ledger::ledger::payments::PaymentLedger;
use brokerage_ledger::ledger::store::{InMemoryRepository, Repository};
use brokerage_ledger::refresh::service::RefreshService;
use brokerage_ledger::simulation::generator::{generate_trades, TradeGenConfig};
use chrono::NaiveDate;
use log::info;
use rust_decimal::Decimal;
use std::fs;
use std::process;
use std::sync::Arc;

fn print_usage() {
    eprintln!(
        r#"brokerage-ledger — brokerage and trade-debt reconciliation

USAGE:
    brokerage-ledger <COMMAND> [OPTIONS]

COMMANDS:
    aggregate   Build pending (buyer) and receivable (seller) aggregates
    brokerage   Compute a brokerage breakdown from a bag tally
    status      Resolve a payment status
    dashboard   Run a full refresh and print the dashboard and alerts
    generate    Generate a random trade book (for testing)
    help        Show this message

OPTIONS (aggregate, dashboard):
    --input <FILE>      Path to JSON trade file
    --fy <YEAR>         Restrict to the April-March year starting in YEAR
    --today <DATE>      Evaluation date, YYYY-MM-DD (default: today)
    --config <FILE>     Engine configuration JSON (dashboard only)
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (brokerage):
    --sold <N> --bought <N> --rate <R> [--config <FILE>] [--format <FORMAT>]

OPTIONS (status):
    --paid <P> --total <T> [--due <DATE>] [--today <DATE>]

OPTIONS (generate):
    --merchants <N>     Number of merchants (default: 10)
    --trades <N>        Number of trades (default: 30)
    --seed <N>          Seed for a reproducible book
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    brokerage-ledger aggregate --input trades.json --fy 2025
    brokerage-ledger brokerage --sold 100 --bought 50 --rate 10
    brokerage-ledger status --paid 50 --total 100 --due 2025-06-09 --today 2025-06-10
    brokerage-ledger dashboard --input trades.json --config engine.json
    brokerage-ledger generate --merchants 5 --trades 40 --output trades.json"#
    );
}

/// JSON schema for the trade file.
#[derive(serde::Deserialize, serde::Serialize)]
struct TradeFile {
    #[serde(default)]
    broker: Option<String>,
    trades: Vec<TradeEntry>,
    #[serde(default)]
    obligations: Vec<ObligationEntry>,
}

#[derive(serde::Deserialize, serde::Serialize)]
struct TradeEntry {
    #[serde(flatten)]
    record: TradeRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    payments: Vec<PaymentEntry>,
}

#[derive(serde::Deserialize, serde::Serialize)]
struct PaymentEntry {
    amount: Decimal,
    date: NaiveDate,
    method: PaymentMethod,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    bank: Option<String>,
}

/// A merchant whose brokerage is tallied from the trades in the file.
#[derive(serde::Deserialize, serde::Serialize)]
struct ObligationEntry {
    merchant: String,
    financial_year: i32,
    rate_per_bag: Decimal,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    payments: Vec<PaymentEntry>,
}

impl PaymentEntry {
    fn request(&self) -> PaymentRequest {
        let mut request = PaymentRequest::new(self.amount, self.date, self.method);
        if let Some(reference) = &self.reference {
            request = request.with_reference(reference.as_str());
        }
        if let Some(bank) = &self.bank {
            request = request.with_bank_details(BankDetails::new(bank.as_str()));
        }
        request
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn load_trade_file(path: &str) -> TradeFile {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("cannot read file '{}': {}", path, e)));

    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "trades": [
    {{ "seller": "M-001", "buyer": "M-002", "product": "WHEAT", "bags": "50",
       "rate_per_bag": "2150.00", "trade_date": "2025-05-02", "due_date": "2025-06-01",
       "payments": [ {{ "amount": "50000", "date": "2025-05-20", "method": "UPI", "reference": "UTR123" }} ] }}
  ],
  "obligations": [
    {{ "merchant": "M-001", "financial_year": 2025, "rate_per_bag": "10", "due_date": "2026-04-30" }}
  ]
}}"#
        );
        process::exit(1);
    })
}

fn load_config(path: Option<&str>) -> EngineConfig {
    match path {
        Some(path) => EngineConfig::from_json_file(path).unwrap_or_else(|e| fail(e)),
        None => EngineConfig::default(),
    }
}

fn parse_date(flag: &str, value: Option<&String>) -> NaiveDate {
    value
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or_else(|| fail(format!("{} requires a date in YYYY-MM-DD form", flag)))
}

fn parse_decimal(flag: &str, value: Option<&String>) -> Decimal {
    value
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| fail(format!("{} requires a decimal number", flag)))
}

fn required<T>(flag: &str, value: Option<T>) -> T {
    value.unwrap_or_else(|| fail(format!("{} is required", flag)))
}

fn financial_year(start_year: Option<i32>) -> Option<FinancialYear> {
    start_year.map(|y| {
        FinancialYear::april_to_march(y)
            .unwrap_or_else(|| fail(format!("invalid financial year {}", y)))
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}

/// Options shared by `aggregate` and `dashboard`.
struct BookOptions {
    input: String,
    fy: Option<i32>,
    today: NaiveDate,
    config: Option<String>,
    format: String,
}

fn parse_book_options(args: &[String]) -> BookOptions {
    let mut input = None;
    let mut fy = None;
    let mut today = chrono::Local::now().date_naive();
    let mut config = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input = Some(args.get(i).cloned().unwrap_or_else(|| fail("--input requires a file path")));
            }
            "--fy" => {
                i += 1;
                fy = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(|| fail("--fy requires a year, e.g. 2025")),
                );
            }
            "--today" => {
                i += 1;
                today = parse_date("--today", args.get(i));
            }
            "--config" => {
                i += 1;
                config = Some(args.get(i).cloned().unwrap_or_else(|| fail("--config requires a file path")));
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| fail("--format requires 'text' or 'json'"));
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }
    BookOptions {
        input: required("--input <FILE>", input),
        fy,
        today,
        config,
        format,
    }
}

fn cmd_aggregate(args: &[String]) {
    let opts = parse_book_options(args);
    let config = load_config(opts.config.as_deref());
    let file = load_trade_file(&opts.input);
    let window = financial_year(opts.fy);

    let mut transactions = Vec::with_capacity(file.trades.len());
    for entry in file.trades {
        let mut transaction = TradeTransaction::new(entry.record, opts.today).unwrap_or_else(|e| fail(e));
        for payment in &entry.payments {
            transaction
                .apply_payment(payment.request(), opts.today)
                .unwrap_or_else(|e| fail(e));
        }
        transactions.push(transaction);
    }

    let aggregator = TransactionAggregator::new(config.priority);
    let token = CancellationToken::new();
    let pending = aggregator
        .pending_by_buyer(&transactions, window.as_ref(), opts.today, &token)
        .unwrap_or_else(|e| fail(e));
    let receivable = aggregator
        .receivable_by_seller(&transactions, window.as_ref(), opts.today, &token)
        .unwrap_or_else(|e| fail(e));

    if opts.format == "json" {
        #[derive(serde::Serialize)]
        struct AggregateOutput<'a> {
            pending: &'a [brokerage_ledger::aggregation::pending::PendingAggregate],
            receivable: &'a [brokerage_ledger::aggregation::receivable::ReceivableAggregate],
        }
        print_json(&AggregateOutput {
            pending: &pending.aggregates,
            receivable: &receivable.aggregates,
        });
        return;
    }

    println!("=== Pending (by buyer) ===");
    for agg in &pending.aggregates {
        println!(
            "  {:<16} {:>3} trades  pending {:>14}  {:<12} {:<8} oldest {} ({} days)",
            agg.buyer,
            agg.transaction_count,
            agg.total_pending_amount,
            agg.status,
            agg.priority,
            agg.oldest_transaction_date.map(|d| d.to_string()).unwrap_or_default(),
            agg.days_since_oldest
        );
    }
    println!("\n=== Receivable (by seller) ===");
    for agg in &receivable.aggregates {
        println!(
            "  {:<16} {:>3} trades  receivable {:>14}  {:<12} {:<8}",
            agg.seller, agg.transaction_count, agg.total_receivable_amount, agg.status, agg.priority
        );
        for owed in &agg.owed_by {
            println!("      owed by {:<16} {:>14}", owed.buyer, owed.total_owed);
        }
    }
    for skipped in pending.skipped.iter().chain(&receivable.skipped) {
        println!("\nSkipped {}: {}", skipped.counterparty, skipped.reason);
    }
}

fn cmd_brokerage(args: &[String]) {
    let mut sold = None;
    let mut bought = Decimal::ZERO;
    let mut rate = None;
    let mut config_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--sold" => {
                i += 1;
                sold = Some(parse_decimal("--sold", args.get(i)));
            }
            "--bought" => {
                i += 1;
                bought = parse_decimal("--bought", args.get(i));
            }
            "--rate" => {
                i += 1;
                rate = Some(parse_decimal("--rate", args.get(i)));
            }
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).cloned().unwrap_or_else(|| fail("--config requires a file path")));
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| fail("--format requires 'text' or 'json'"));
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    let config = load_config(config_path.as_deref());
    let breakdown = calculate(
        required("--sold <N>", sold),
        bought,
        required("--rate <R>", rate),
        &config.brokerage.policy(),
    )
    .unwrap_or_else(|e| fail(e));

    if format == "json" {
        print_json(&breakdown);
    } else {
        println!("=== Brokerage ===");
        println!("Bags:     {} sold + {} bought = {}", breakdown.sold_bags, breakdown.bought_bags, breakdown.total_bags);
        println!("Rate:     {}", breakdown.brokerage_rate);
        println!("Gross:    {}", breakdown.gross_brokerage);
        println!("Discount: {}", breakdown.discount);
        println!("TDS:      {}", breakdown.tds);
        println!("Net:      {}", breakdown.net_brokerage);
    }
}

fn cmd_status(args: &[String]) {
    let mut paid = Decimal::ZERO;
    let mut total = None;
    let mut due = None;
    let mut today = chrono::Local::now().date_naive();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--paid" => {
                i += 1;
                paid = parse_decimal("--paid", args.get(i));
            }
            "--total" => {
                i += 1;
                total = Some(parse_decimal("--total", args.get(i)));
            }
            "--due" => {
                i += 1;
                due = Some(parse_date("--due", args.get(i)));
            }
            "--today" => {
                i += 1;
                today = parse_date("--today", args.get(i));
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }
    println!("{}", resolve_status(paid, required("--total <T>", total), due, today));
}

fn cmd_dashboard(args: &[String]) {
    let opts = parse_book_options(args);
    let config = load_config(opts.config.as_deref());
    let file = load_trade_file(&opts.input);
    let window = financial_year(opts.fy);

    let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let ledger = PaymentLedger::new(Arc::clone(&repo));
    for entry in file.trades {
        let id = ledger.record_trade(entry.record, opts.today).unwrap_or_else(|e| fail(e));
        for payment in &entry.payments {
            ledger
                .apply_transaction_payment(id, payment.request(), opts.today)
                .unwrap_or_else(|e| fail(e));
        }
    }

    let broker = BrokerId::new(file.broker.unwrap_or_else(|| "BROKER".to_string()));
    let transactions = repo.transactions();
    for entry in &file.obligations {
        let fy = financial_year(Some(entry.financial_year)).unwrap_or_else(|| fail("missing financial year"));
        let obligation = BrokerageObligation::from_trades(
            MerchantId::new(entry.merchant.as_str()),
            broker.clone(),
            fy,
            &transactions,
            entry.rate_per_bag,
            &config.brokerage.policy(),
            entry.due_date,
            opts.today,
        )
        .unwrap_or_else(|e| fail(e));
        let id = ledger.open_obligation(obligation).unwrap_or_else(|e| fail(e));
        for payment in &entry.payments {
            ledger
                .apply_obligation_payment(id, payment.request(), opts.today)
                .unwrap_or_else(|e| fail(e));
        }
    }

    let sink = Arc::new(MemoryAlertSink::new());
    let service = RefreshService::new(repo, config, sink.clone());
    let report = service
        .refresh_all(opts.today, window.as_ref(), &CancellationToken::new())
        .unwrap_or_else(|e| fail(e));
    info!("refresh generation {} done", report.generation);

    let snapshot = service.snapshot();
    let alerts = sink.alerts();
    if opts.format == "json" {
        #[derive(serde::Serialize)]
        struct DashboardOutput<'a> {
            report: &'a brokerage_ledger::refresh::service::RefreshReport,
            dashboard: &'a Option<brokerage_ledger::dashboard::summary::DashboardSummary>,
            trend: &'a Option<brokerage_ledger::dashboard::trend::TrendSeries>,
            alerts: &'a [brokerage_ledger::alerting::alerts::Alert],
        }
        print_json(&DashboardOutput {
            report: &report,
            dashboard: &snapshot.dashboard,
            trend: &snapshot.trend,
            alerts: &alerts,
        });
        return;
    }

    if let Some(dashboard) = &snapshot.dashboard {
        println!("{}", dashboard);
    }
    if let Some(trend) = &snapshot.trend {
        println!(
            "\nPayments this week {} vs last week {}: {}% ({})",
            trend.this_week, trend.last_week, trend.week_over_week_percent, trend.direction
        );
    }
    if alerts.is_empty() {
        println!("\nNo alerts.");
    } else {
        println!("\nAlerts:");
        for alert in &alerts {
            println!("  [{}] {}", alert.severity, alert.message);
        }
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = TradeGenConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--merchants" => {
                i += 1;
                config.merchant_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| fail("--merchants requires a number"));
            }
            "--trades" => {
                i += 1;
                config.trade_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| fail("--trades requires a number"));
            }
            "--seed" => {
                i += 1;
                config.seed = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(|| fail("--seed requires a number")),
                );
            }
            "--output" => {
                i += 1;
                output_path = Some(args.get(i).cloned().unwrap_or_else(|| fail("--output requires a file path")));
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    let trades = generate_trades(&config);
    let file = TradeFile {
        broker: None,
        trades: trades
            .into_iter()
            .map(|record| TradeEntry {
                record,
                payments: Vec::new(),
            })
            .collect(),
        obligations: Vec::new(),
    };
    let json = serde_json::to_string_pretty(&file).unwrap_or_else(|e| fail(e));

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| fail(format!("cannot write '{}': {}", path, e)));
        eprintln!(
            "Generated {} trades across {} merchants → {}",
            file.trades.len(),
            config.merchant_count,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "aggregate" => cmd_aggregate(rest),
        "brokerage" => cmd_brokerage(rest),
        "status" => cmd_status(rest),
        "dashboard" => cmd_dashboard(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
