//! Buyer-side (pending) and seller-side (receivable) views over trades.

pub mod aggregator;
pub mod pending;
pub mod receivable;
