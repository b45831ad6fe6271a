//! Random trade generation for benchmarks, demos and the `generate` command.

use crate::core::transaction::TradeRecord;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Shape of a generated trade book.
#[derive(Debug, Clone)]
pub struct TradeGenConfig {
    pub merchant_count: usize,
    pub trade_count: usize,
    pub products: Vec<String>,
    pub min_bags: u32,
    pub max_bags: u32,
    /// Rate bounds in paise (1/100 of a rupee).
    pub min_rate_paise: i64,
    pub max_rate_paise: i64,
    /// Trades are spread over `days_span` days ending on `end_date`.
    pub end_date: NaiveDate,
    pub days_span: i64,
    /// Due date offset from the trade date; `None` leaves trades undated.
    pub credit_days: Option<i64>,
    /// Fixed seed for reproducible books.
    pub seed: Option<u64>,
}

impl Default for TradeGenConfig {
    fn default() -> Self {
        Self {
            merchant_count: 10,
            trade_count: 30,
            products: vec!["WHEAT".into(), "RICE".into(), "CHANA".into()],
            min_bags: 10,
            max_bags: 500,
            min_rate_paise: 150_000,
            max_rate_paise: 450_000,
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap_or_default(),
            days_span: 60,
            credit_days: Some(30),
            seed: None,
        }
    }
}

pub fn merchant_name(index: usize) -> String {
    format!("MERCHANT-{:03}", index)
}

/// Generate random trades between distinct merchants.
///
/// Returns an empty book when fewer than two merchants are configured.
pub fn generate_trades(config: &TradeGenConfig) -> Vec<TradeRecord> {
    match config.seed {
        Some(seed) => generate_with(config, &mut StdRng::seed_from_u64(seed)),
        None => generate_with(config, &mut rand::thread_rng()),
    }
}

fn generate_with<R: Rng>(config: &TradeGenConfig, rng: &mut R) -> Vec<TradeRecord> {
    if config.merchant_count < 2 {
        return Vec::new();
    }
    let merchants: Vec<String> = (0..config.merchant_count).map(merchant_name).collect();
    let products: Vec<String> = if config.products.is_empty() {
        vec!["GENERAL".to_string()]
    } else {
        config.products.clone()
    };
    let min_bags = config.min_bags.min(config.max_bags);
    let min_rate = config.min_rate_paise.min(config.max_rate_paise);
    let span = config.days_span.max(1);

    (0..config.trade_count)
        .map(|_| {
            let seller = rng.gen_range(0..merchants.len());
            let mut buyer = rng.gen_range(0..merchants.len());
            while buyer == seller {
                buyer = rng.gen_range(0..merchants.len());
            }
            let product = &products[rng.gen_range(0..products.len())];
            let bags = Decimal::from(rng.gen_range(min_bags..=config.max_bags));
            let rate = Decimal::new(rng.gen_range(min_rate..=config.max_rate_paise), 2);
            let trade_date = config.end_date - Duration::days(rng.gen_range(0..span));

            let record = TradeRecord::new(
                merchants[seller].as_str(),
                merchants[buyer].as_str(),
                product.as_str(),
                bags,
                rate,
                trade_date,
            );
            match config.credit_days {
                Some(days) => record.with_due_date(trade_date + Duration::days(days)),
                None => record,
            }
        })
        .collect()
}
