use crate::core::dates::DateRange;
use crate::core::ids::{MerchantId, ObligationId, TransactionId};
use crate::core::obligation::BrokerageObligation;
use crate::core::status::PaymentStatus;
use crate::core::transaction::TradeTransaction;
use crate::error::{EntityKind, LedgerError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Persistence collaborator.
///
/// `save_*` is a compare-and-set on the entity's `version`: it succeeds
/// only if the stored row still has the version the caller loaded, and
/// bumps it. Two writers racing on the same row cannot both win.
pub trait Repository: Send + Sync {
    fn insert_obligation(&self, obligation: BrokerageObligation) -> Result<ObligationId, LedgerError>;
    fn load_obligation(&self, id: ObligationId) -> Result<BrokerageObligation, LedgerError>;
    /// Returns the new version.
    fn save_obligation(&self, obligation: BrokerageObligation) -> Result<u64, LedgerError>;
    fn obligations(&self) -> Vec<BrokerageObligation>;
    /// Obligations whose status on `today` is one of `statuses`.
    fn obligations_with_status(
        &self,
        statuses: &[PaymentStatus],
        today: NaiveDate,
    ) -> Vec<BrokerageObligation>;

    fn insert_transaction(&self, transaction: TradeTransaction) -> Result<TransactionId, LedgerError>;
    fn load_transaction(&self, id: TransactionId) -> Result<TradeTransaction, LedgerError>;
    fn save_transaction(&self, transaction: TradeTransaction) -> Result<u64, LedgerError>;
    fn transactions(&self) -> Vec<TradeTransaction>;
    fn transactions_for_buyer(&self, buyer: &MerchantId, range: DateRange) -> Vec<TradeTransaction>;
    fn transactions_for_seller(&self, seller: &MerchantId, range: DateRange)
        -> Vec<TradeTransaction>;
}

type Rows<K, V> = RwLock<HashMap<K, Arc<Mutex<V>>>>;

/// In-memory repository where every row is its own lock.
///
/// The outer `RwLock` only guards the id -> row map and is write-locked
/// solely for inserts. Saves take the read lock plus the single row's
/// mutex, so writes to different rows never contend.
#[derive(Default)]
pub struct InMemoryRepository {
    obligations: Rows<ObligationId, BrokerageObligation>,
    transactions: Rows<TransactionId, TradeTransaction>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn obligation_row(&self, id: ObligationId) -> Result<Arc<Mutex<BrokerageObligation>>, LedgerError> {
        self.obligations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(EntityKind::Obligation, id))
    }

    fn transaction_row(&self, id: TransactionId) -> Result<Arc<Mutex<TradeTransaction>>, LedgerError> {
        self.transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(EntityKind::Transaction, id))
    }

    /// Copy every row out, locking one row at a time.
    fn snapshot<K, V: Clone>(rows: &Rows<K, V>) -> Vec<V> {
        let handles: Vec<Arc<Mutex<V>>> = rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        handles
            .iter()
            .map(|row| row.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    pub fn obligation_count(&self) -> usize {
        self.obligations.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Repository for InMemoryRepository {
    fn insert_obligation(&self, mut obligation: BrokerageObligation) -> Result<ObligationId, LedgerError> {
        let id = obligation.id();
        let mut rows = self.obligations.write().unwrap_or_else(PoisonError::into_inner);
        if rows.contains_key(&id) {
            return Err(LedgerError::Consistency(format!("obligation {id} already exists")));
        }
        obligation.set_version(1);
        rows.insert(id, Arc::new(Mutex::new(obligation)));
        Ok(id)
    }

    fn load_obligation(&self, id: ObligationId) -> Result<BrokerageObligation, LedgerError> {
        let row = self.obligation_row(id)?;
        let guard = row.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn save_obligation(&self, mut obligation: BrokerageObligation) -> Result<u64, LedgerError> {
        let id = obligation.id();
        let row = self.obligation_row(id)?;
        let mut stored = row.lock().unwrap_or_else(PoisonError::into_inner);
        if stored.version() != obligation.version() {
            return Err(LedgerError::ConcurrentModification {
                entity: EntityKind::Obligation,
                id: id.to_string(),
                expected: obligation.version(),
                found: stored.version(),
            });
        }
        let next = stored.version() + 1;
        obligation.set_version(next);
        *stored = obligation;
        Ok(next)
    }

    fn obligations(&self) -> Vec<BrokerageObligation> {
        Self::snapshot(&self.obligations)
    }

    fn obligations_with_status(
        &self,
        statuses: &[PaymentStatus],
        today: NaiveDate,
    ) -> Vec<BrokerageObligation> {
        self.obligations()
            .into_iter()
            .filter(|ob| statuses.contains(&ob.status_on(today)))
            .collect()
    }

    fn insert_transaction(&self, mut transaction: TradeTransaction) -> Result<TransactionId, LedgerError> {
        let id = transaction.id();
        let mut rows = self.transactions.write().unwrap_or_else(PoisonError::into_inner);
        if rows.contains_key(&id) {
            return Err(LedgerError::Consistency(format!("transaction {id} already exists")));
        }
        transaction.set_version(1);
        rows.insert(id, Arc::new(Mutex::new(transaction)));
        Ok(id)
    }

    fn load_transaction(&self, id: TransactionId) -> Result<TradeTransaction, LedgerError> {
        let row = self.transaction_row(id)?;
        let guard = row.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn save_transaction(&self, mut transaction: TradeTransaction) -> Result<u64, LedgerError> {
        let id = transaction.id();
        let row = self.transaction_row(id)?;
        let mut stored = row.lock().unwrap_or_else(PoisonError::into_inner);
        if stored.version() != transaction.version() {
            return Err(LedgerError::ConcurrentModification {
                entity: EntityKind::Transaction,
                id: id.to_string(),
                expected: transaction.version(),
                found: stored.version(),
            });
        }
        let next = stored.version() + 1;
        transaction.set_version(next);
        *stored = transaction;
        Ok(next)
    }

    fn transactions(&self) -> Vec<TradeTransaction> {
        Self::snapshot(&self.transactions)
    }

    fn transactions_for_buyer(&self, buyer: &MerchantId, range: DateRange) -> Vec<TradeTransaction> {
        self.transactions()
            .into_iter()
            .filter(|t| t.buyer() == buyer && range.contains(t.trade_date()))
            .collect()
    }

    fn transactions_for_seller(
        &self,
        seller: &MerchantId,
        range: DateRange,
    ) -> Vec<TradeTransaction> {
        self.transactions()
            .into_iter()
            .filter(|t| t.seller() == seller && range.contains(t.trade_date()))
            .collect()
    }
}
