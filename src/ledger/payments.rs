use crate::core::dates::{days_overdue, days_until_due};
use crate::core::ids::{MerchantId, ObligationId, PaymentId, TransactionId};
use crate::core::money::Money;
use crate::core::obligation::BrokerageObligation;
use crate::core::payment::PaymentRequest;
use crate::core::status::PaymentStatus;
use crate::core::transaction::{TradeRecord, TradeTransaction};
use crate::ledger::store::Repository;
use crate::error::LedgerError;
use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub status: PaymentStatus,
    pub completion_percentage: Decimal,
    /// Row version after the write.
    pub version: u64,
}

/// Read-only view of a brokerage obligation as of a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationSummary {
    pub id: ObligationId,
    pub merchant: MerchantId,
    pub financial_year: String,
    pub total_bags: Decimal,
    pub gross_brokerage: Money,
    pub discount: Money,
    pub tds: Money,
    pub net_brokerage: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub completion_percentage: Decimal,
    pub status: PaymentStatus,
    pub due_date: Option<NaiveDate>,
    pub days_overdue: i64,
    pub days_until_due: Option<i64>,
    pub payment_count: usize,
    pub verified_payment_count: usize,
    pub last_payment_date: Option<NaiveDate>,
}

impl ObligationSummary {
    pub fn of(ob: &BrokerageObligation, today: NaiveDate) -> Self {
        let b = ob.breakdown();
        Self {
            id: ob.id(),
            merchant: ob.merchant().clone(),
            financial_year: ob.financial_year().id().to_string(),
            total_bags: b.total_bags,
            gross_brokerage: b.gross_brokerage,
            discount: b.discount,
            tds: b.tds,
            net_brokerage: b.net_brokerage,
            paid_amount: ob.paid_amount(),
            pending_amount: ob.pending_amount(),
            completion_percentage: ob.completion_percentage(),
            status: ob.status_on(today),
            due_date: ob.due_date(),
            days_overdue: ob.due_date().map(|d| days_overdue(d, today)).unwrap_or(0),
            days_until_due: ob.due_date().map(|d| days_until_due(d, today)),
            payment_count: ob.payments().len(),
            verified_payment_count: ob.payments().iter().filter(|p| p.is_verified()).count(),
            last_payment_date: ob.last_payment_date(),
        }
    }
}

/// Read-only view of a trade transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: TransactionId,
    pub seller: MerchantId,
    pub buyer: MerchantId,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub completion_percentage: Decimal,
    pub status: PaymentStatus,
    pub trade_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub payment_count: usize,
}

impl TransactionSummary {
    pub fn of(t: &TradeTransaction, today: NaiveDate) -> Self {
        Self {
            id: t.id(),
            seller: t.seller().clone(),
            buyer: t.buyer().clone(),
            total_amount: t.total_amount(),
            paid_amount: t.paid_amount(),
            pending_amount: t.pending_amount(),
            completion_percentage: t.completion_percentage(),
            status: t.status_on(today),
            trade_date: t.trade_date(),
            due_date: t.due_date(),
            payment_count: t.payments().len(),
        }
    }
}

/// Applies payments to obligations and trade transactions.
///
/// Each call is load, mutate a private copy, check invariants, then a
/// version-checked save. A rejected or inconsistent mutation never reaches
/// the repository, and a concurrent writer on the same row surfaces as
/// [`LedgerError::ConcurrentModification`]. The ledger never retries on
/// its own, so a payment is never applied twice.
#[derive(Clone)]
pub struct PaymentLedger {
    repo: Arc<dyn Repository>,
}

impl PaymentLedger {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// Register a trade delivered by the trade-record source.
    pub fn record_trade(&self, record: TradeRecord, today: NaiveDate) -> Result<TransactionId, LedgerError> {
        let transaction = TradeTransaction::new(record, today)?;
        debug!(
            "recording trade {} {} -> {} for {}",
            transaction.id(),
            transaction.seller(),
            transaction.buyer(),
            transaction.total_amount()
        );
        self.repo.insert_transaction(transaction)
    }

    pub fn open_obligation(&self, obligation: BrokerageObligation) -> Result<ObligationId, LedgerError> {
        debug!(
            "opening obligation {} for {} ({}), net {}",
            obligation.id(),
            obligation.merchant(),
            obligation.financial_year(),
            obligation.net_brokerage()
        );
        self.repo.insert_obligation(obligation)
    }

    pub fn apply_obligation_payment(
        &self,
        id: ObligationId,
        request: PaymentRequest,
        today: NaiveDate,
    ) -> Result<PaymentReceipt, LedgerError> {
        let mut obligation = self.repo.load_obligation(id)?;
        let payment_id = obligation
            .apply_payment(request, today)
            .map_err(|e| {
                warn!("payment on obligation {id} rejected: {e}");
                e
            })?;
        let version = self.repo.save_obligation(obligation.clone()).map_err(|e| {
            warn!("payment on obligation {id} not saved: {e}");
            e
        })?;
        debug!(
            "obligation {id}: paid {} pending {} status {}",
            obligation.paid_amount(),
            obligation.pending_amount(),
            obligation.status()
        );
        Ok(PaymentReceipt {
            payment_id,
            paid_amount: obligation.paid_amount(),
            pending_amount: obligation.pending_amount(),
            status: obligation.status(),
            completion_percentage: obligation.completion_percentage(),
            version,
        })
    }

    pub fn apply_transaction_payment(
        &self,
        id: TransactionId,
        request: PaymentRequest,
        today: NaiveDate,
    ) -> Result<PaymentReceipt, LedgerError> {
        let mut transaction = self.repo.load_transaction(id)?;
        let payment_id = transaction
            .apply_payment(request, today)
            .map_err(|e| {
                warn!("payment on transaction {id} rejected: {e}");
                e
            })?;
        let version = self.repo.save_transaction(transaction.clone()).map_err(|e| {
            warn!("payment on transaction {id} not saved: {e}");
            e
        })?;
        debug!(
            "transaction {id}: paid {} pending {} status {}",
            transaction.paid_amount(),
            transaction.pending_amount(),
            transaction.status()
        );
        Ok(PaymentReceipt {
            payment_id,
            paid_amount: transaction.paid_amount(),
            pending_amount: transaction.pending_amount(),
            status: transaction.status(),
            completion_percentage: transaction.completion_percentage(),
            version,
        })
    }

    /// Returns the new row version.
    pub fn verify_obligation_payment(
        &self,
        id: ObligationId,
        payment_id: PaymentId,
        verifier: &str,
        today: NaiveDate,
    ) -> Result<u64, LedgerError> {
        let mut obligation = self.repo.load_obligation(id)?;
        obligation.verify_payment(payment_id, verifier, today)?;
        self.repo.save_obligation(obligation)
    }

    pub fn verify_transaction_payment(
        &self,
        id: TransactionId,
        payment_id: PaymentId,
        verifier: &str,
        today: NaiveDate,
    ) -> Result<u64, LedgerError> {
        let mut transaction = self.repo.load_transaction(id)?;
        transaction.verify_payment(payment_id, verifier, today)?;
        self.repo.save_transaction(transaction)
    }

    pub fn obligation_summary(&self, id: ObligationId, today: NaiveDate) -> Result<ObligationSummary, LedgerError> {
        let obligation = self.repo.load_obligation(id)?;
        Ok(ObligationSummary::of(&obligation, today))
    }

    pub fn transaction_summary(
        &self,
        id: TransactionId,
        today: NaiveDate,
    ) -> Result<TransactionSummary, LedgerError> {
        let transaction = self.repo.load_transaction(id)?;
        Ok(TransactionSummary::of(&transaction, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brokerage::calculator::BrokeragePolicy;
    use crate::core::dates::FinancialYear;
    use crate::core::ids::BrokerId;
    use crate::core::payment::{BankDetails, PaymentMethod};
    use crate::error::{EntityKind, ValidationError};
    use crate::ledger::store::InMemoryRepository;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    fn ledger_with_obligation(due: Option<NaiveDate>) -> (PaymentLedger, ObligationId) {
        let ledger = PaymentLedger::new(Arc::new(InMemoryRepository::new()));
        let ob = BrokerageObligation::new(
            MerchantId::new("M-001"),
            BrokerId::new("B-01"),
            FinancialYear::april_to_march(2025).unwrap(),
            dec!(100),
            dec!(50),
            dec!(10),
            &BrokeragePolicy::new(dec!(0.10), dec!(0.05)),
            due,
            today(),
        )
        .unwrap();
        let id = ledger.open_obligation(ob).unwrap();
        (ledger, id)
    }

    #[test]
    fn test_full_payment_receipt() {
        let (ledger, id) = ledger_with_obligation(Some(today() + Duration::days(20)));
        let receipt = ledger
            .apply_obligation_payment(
                id,
                PaymentRequest::new(dec!(1275), today(), PaymentMethod::Neft).with_reference("N-1"),
                today(),
            )
            .unwrap();
        assert_eq!(receipt.status, PaymentStatus::Paid);
        assert_eq!(receipt.pending_amount, Decimal::ZERO);
        assert_eq!(receipt.completion_percentage, dec!(100));
        assert_eq!(receipt.version, 2);
    }

    #[test]
    fn test_rejected_payment_leaves_row_unchanged() {
        let (ledger, id) = ledger_with_obligation(None);
        let tomorrow = today() + Duration::days(1);
        let err = ledger
            .apply_obligation_payment(
                id,
                PaymentRequest::new(dec!(100), tomorrow, PaymentMethod::Cash),
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::FutureDate { .. })));
        let summary = ledger.obligation_summary(id, today()).unwrap();
        assert_eq!(summary.paid_amount, Decimal::ZERO);
        assert_eq!(summary.payment_count, 0);
    }

    #[test]
    fn test_unknown_obligation() {
        let (ledger, _) = ledger_with_obligation(None);
        let err = ledger
            .apply_obligation_payment(
                ObligationId::new(),
                PaymentRequest::new(dec!(1), today(), PaymentMethod::Cash),
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: EntityKind::Obligation, .. }));
    }

    #[test]
    fn test_verify_payment_bumps_version() {
        let (ledger, id) = ledger_with_obligation(None);
        let receipt = ledger
            .apply_obligation_payment(
                id,
                PaymentRequest::new(dec!(500), today(), PaymentMethod::Cheque)
                    .with_reference("CHQ-77")
                    .with_bank_details(BankDetails::new("Canara Bank")),
                today(),
            )
            .unwrap();
        let version = ledger
            .verify_obligation_payment(id, receipt.payment_id, "auditor", today())
            .unwrap();
        assert_eq!(version, receipt.version + 1);
        let summary = ledger.obligation_summary(id, today()).unwrap();
        assert_eq!(summary.verified_payment_count, 1);

        let again = ledger.verify_obligation_payment(id, receipt.payment_id, "auditor", today());
        assert!(matches!(
            again,
            Err(LedgerError::Validation(ValidationError::AlreadyVerified(_)))
        ));
    }

    #[test]
    fn test_summary_reports_days_overdue() {
        let (ledger, id) = ledger_with_obligation(Some(today() - Duration::days(12)));
        let summary = ledger.obligation_summary(id, today()).unwrap();
        assert_eq!(summary.status, PaymentStatus::Overdue);
        assert_eq!(summary.days_overdue, 12);
        assert_eq!(summary.days_until_due, Some(0));
    }

    #[test]
    fn test_transaction_payment() {
        let ledger = PaymentLedger::new(Arc::new(InMemoryRepository::new()));
        let id = ledger
            .record_trade(
                TradeRecord::new("Y", "X", "WHEAT", dec!(30), dec!(100), today()),
                today(),
            )
            .unwrap();
        let receipt = ledger
            .apply_transaction_payment(
                id,
                PaymentRequest::new(dec!(1000), today(), PaymentMethod::Cash),
                today(),
            )
            .unwrap();
        assert_eq!(receipt.pending_amount, dec!(2000));
        assert_eq!(receipt.status, PaymentStatus::PartialPaid);
        let summary = ledger.transaction_summary(id, today()).unwrap();
        assert_eq!(summary.payment_count, 1);
    }
}
