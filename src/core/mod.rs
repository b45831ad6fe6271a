//! Domain types: money, dates, identifiers, payments, obligations, trades.

pub mod dates;
pub mod ids;
pub mod money;
pub mod obligation;
pub mod payment;
pub mod status;
pub mod transaction;
