//! # brokerage-ledger
//!
//! Brokerage and trade-debt reconciliation engine.
//!
//! Tracks what merchants owe a broker in brokerage, what buyers owe
//! sellers for their trades, and every part payment made against either.
//! Payment status and priority are derived, never stored independently,
//! and broker-wide views are rebuilt in batch and published as
//! immutable snapshots.
//!
//! ## Architecture
//!
//! - **core** — Money, dates, ids, payment records, obligations, trades and the status resolver
//! - **brokerage** — Gross/discount/TDS/net brokerage calculation
//! - **ledger** — Repository contract and the payment ledger
//! - **aggregation** — Buyer-side pending and seller-side receivable views
//! - **alerting** — Priority levels and alert generation
//! - **dashboard** — Broker-wide summary, health score and payment trends
//! - **refresh** — Snapshot-publishing batch refresh
//! - **simulation** — Random trade books for testing

pub mod aggregation;
pub mod alerting;
pub mod brokerage;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod refresh;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::aggregation::aggregator::{CancellationToken, TransactionAggregator};
    pub use crate::aggregation::pending::PendingAggregate;
    pub use crate::aggregation::receivable::{OwedBy, ReceivableAggregate};
    pub use crate::alerting::alerts::{Alert, AlertSink, MemoryAlertSink};
    pub use crate::alerting::priority::{compute_priority, PriorityLevel};
    pub use crate::brokerage::calculator::{BrokerageBreakdown, BrokeragePolicy};
    pub use crate::config::EngineConfig;
    pub use crate::core::dates::FinancialYear;
    pub use crate::core::ids::{BrokerId, MerchantId, ObligationId, TransactionId};
    pub use crate::core::money::Money;
    pub use crate::core::obligation::BrokerageObligation;
    pub use crate::core::payment::{BankDetails, PaymentMethod, PaymentRequest};
    pub use crate::core::status::{resolve_status, PaymentStatus};
    pub use crate::core::transaction::{TradeRecord, TradeTransaction};
    pub use crate::dashboard::summary::DashboardSummary;
    pub use crate::error::{LedgerError, ValidationError};
    pub use crate::ledger::payments::{PaymentLedger, PaymentReceipt};
    pub use crate::ledger::store::{InMemoryRepository, Repository};
    pub use crate::refresh::service::RefreshService;
}
