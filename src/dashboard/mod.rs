//! Broker-wide summaries and payment trends.

pub mod summary;
pub mod trend;
