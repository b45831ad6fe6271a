use crate::core::payment::PaymentMethod;
use thiserror::Error;

/// Rejections raised before any state is touched.
///
/// These are always surfaced to the caller and never silently corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payment amount must be positive")]
    NonPositiveAmount,
    #[error("payment date {date} is after today ({today})")]
    FutureDate {
        date: chrono::NaiveDate,
        today: chrono::NaiveDate,
    },
    #[error("{0} payments require a transaction reference")]
    MissingReference(PaymentMethod),
    #[error("{0} payments require bank details")]
    MissingBankDetails(PaymentMethod),
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("payment {0} is already verified")]
    AlreadyVerified(String),
}

/// Kind of entity named in not-found and conflict errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Obligation,
    Transaction,
    Payment,
    PendingAggregate,
    ReceivableAggregate,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Obligation => "obligation",
            EntityKind::Transaction => "transaction",
            EntityKind::Payment => "payment",
            EntityKind::PendingAggregate => "pending aggregate",
            EntityKind::ReceivableAggregate => "receivable aggregate",
        };
        f.write_str(name)
    }
}

/// Errors produced by the ledger, aggregation and refresh layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("consistency check failed: {0}")]
    Consistency(String),
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {found})")]
    ConcurrentModification {
        entity: EntityKind,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("aggregation aborted after {completed_groups} groups")]
    Aborted { completed_groups: usize },
}

impl LedgerError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::Validation(ValidationError::InvalidInput {
            field,
            reason: reason.into(),
        })
    }

    /// True for errors a caller may retry with freshly loaded state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrentModification { .. })
    }
}
