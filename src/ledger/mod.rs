//! Partial-payment ledger and its persistence collaborator.

pub mod payments;
pub mod store;
