use crate::core::dates::FinancialYear;
use crate::core::ids::{MerchantId, PaymentId, ProductId, TransactionId};
use crate::core::money::{mul_checked, percentage, subtract_floor, Money};
use crate::core::payment::{PartPayment, PaymentRequest, PaymentTrail};
use crate::core::status::{resolve_status, PaymentStatus};
use crate::error::{EntityKind, LedgerError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trade as delivered by the external trade-record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub seller: MerchantId,
    pub buyer: MerchantId,
    pub product: ProductId,
    #[serde(default)]
    pub quality: Option<String>,
    pub bags: Decimal,
    pub rate_per_bag: Money,
    pub trade_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub financial_year: Option<String>,
}

impl TradeRecord {
    pub fn new(
        seller: impl Into<String>,
        buyer: impl Into<String>,
        product: impl Into<String>,
        bags: Decimal,
        rate_per_bag: Money,
        trade_date: NaiveDate,
    ) -> Self {
        Self {
            seller: MerchantId::new(seller),
            buyer: MerchantId::new(buyer),
            product: ProductId::new(product),
            quality: None,
            bags,
            rate_per_bag,
            trade_date,
            due_date: None,
            financial_year: None,
        }
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_financial_year(mut self, id: impl Into<String>) -> Self {
        self.financial_year = Some(id.into());
        self
    }
}

/// One buyer/seller/product trade and the payments made against it.
///
/// The buyer owes the seller `total_amount = bags * rate_per_bag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTransaction {
    id: TransactionId,
    seller: MerchantId,
    buyer: MerchantId,
    product: ProductId,
    quality: Option<String>,
    bags: Decimal,
    rate_per_bag: Money,
    total_amount: Money,
    pending_amount: Money,
    trade_date: NaiveDate,
    due_date: Option<NaiveDate>,
    financial_year: Option<String>,
    status: PaymentStatus,
    trail: PaymentTrail,
    version: u64,
}

impl TradeTransaction {
    /// # Errors
    ///
    /// Validation error when bags or rate is negative, when the total
    /// does not fit in a `Decimal`, or when seller and buyer are the same
    /// merchant.
    pub fn new(record: TradeRecord, today: NaiveDate) -> Result<Self, LedgerError> {
        if record.bags < Decimal::ZERO {
            return Err(LedgerError::invalid_input("bags", format!("{} is negative", record.bags)));
        }
        if record.rate_per_bag < Decimal::ZERO {
            return Err(LedgerError::invalid_input(
                "rate_per_bag",
                format!("{} is negative", record.rate_per_bag),
            ));
        }
        if record.seller == record.buyer {
            return Err(LedgerError::invalid_input(
                "buyer",
                format!("{} cannot trade with itself", record.seller),
            ));
        }
        let total_amount = mul_checked("total_amount", record.bags, record.rate_per_bag)?;
        Ok(Self {
            id: TransactionId::new(),
            seller: record.seller,
            buyer: record.buyer,
            product: record.product,
            quality: record.quality,
            bags: record.bags,
            rate_per_bag: record.rate_per_bag,
            total_amount,
            pending_amount: total_amount,
            trade_date: record.trade_date,
            due_date: record.due_date,
            financial_year: record.financial_year,
            status: resolve_status(Decimal::ZERO, total_amount, record.due_date, today),
            trail: PaymentTrail::new(),
            version: 0,
        })
    }

    /// Record a payment from the buyer; all-or-nothing.
    pub fn apply_payment(
        &mut self,
        request: PaymentRequest,
        today: NaiveDate,
    ) -> Result<PaymentId, LedgerError> {
        let mut next = self.clone();
        let payment_id = next.trail.record(request, today)?;
        next.pending_amount = subtract_floor(next.total_amount, next.paid_amount());
        next.status = next.status_on(today);
        next.check_invariants()?;
        *self = next;
        Ok(payment_id)
    }

    pub fn verify_payment(
        &mut self,
        payment_id: PaymentId,
        verifier: &str,
        today: NaiveDate,
    ) -> Result<(), LedgerError> {
        if self.trail.verify(payment_id, verifier, today)? {
            Ok(())
        } else {
            Err(LedgerError::not_found(EntityKind::Payment, payment_id))
        }
    }

    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let fail = |detail: String| {
            LedgerError::Consistency(format!("transaction {}: {}", self.id, detail))
        };
        if self.bags.checked_mul(self.rate_per_bag) != Some(self.total_amount) {
            return Err(fail(format!(
                "total {} != {} bags x {}",
                self.total_amount, self.bags, self.rate_per_bag
            )));
        }
        if let Some(problem) = self.trail.check() {
            return Err(fail(problem));
        }
        let expected = subtract_floor(self.total_amount, self.paid_amount());
        if self.pending_amount != expected {
            return Err(fail(format!("pending {} != {}", self.pending_amount, expected)));
        }
        Ok(())
    }

    pub fn status_on(&self, today: NaiveDate) -> PaymentStatus {
        resolve_status(self.paid_amount(), self.total_amount, self.due_date, today)
    }

    pub fn completion_percentage(&self) -> Decimal {
        percentage(self.paid_amount(), self.total_amount)
    }

    /// An explicit financial-year tag wins over the trade date.
    pub fn in_financial_year(&self, fy: &FinancialYear) -> bool {
        match &self.financial_year {
            Some(tag) => tag == fy.id(),
            None => fy.contains(self.trade_date),
        }
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    // --- Accessors ---

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn seller(&self) -> &MerchantId {
        &self.seller
    }

    pub fn buyer(&self) -> &MerchantId {
        &self.buyer
    }

    pub fn product(&self) -> &ProductId {
        &self.product
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }

    pub fn bags(&self) -> Decimal {
        self.bags
    }

    pub fn rate_per_bag(&self) -> Money {
        self.rate_per_bag
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Money {
        self.trail.paid_amount()
    }

    pub fn pending_amount(&self) -> Money {
        self.pending_amount
    }

    pub fn trade_date(&self) -> NaiveDate {
        self.trade_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn financial_year(&self) -> Option<&str> {
        self.financial_year.as_deref()
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn payments(&self) -> &[PartPayment] {
        self.trail.payments()
    }

    pub fn last_payment_date(&self) -> Option<NaiveDate> {
        self.trail.last_payment_date()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payment::PaymentMethod;
    use crate::error::ValidationError;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    fn trade(bags: Decimal, rate: Decimal) -> TradeTransaction {
        TradeTransaction::new(TradeRecord::new("Y", "X", "RICE", bags, rate, today()), today())
            .unwrap()
    }

    #[test]
    fn test_total_is_bags_times_rate() {
        let t = trade(dec!(50), dec!(60));
        assert_eq!(t.total_amount(), dec!(3000));
        assert_eq!(t.pending_amount(), dec!(3000));
        assert_eq!(t.status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_payment_updates_pending() {
        let mut t = trade(dec!(50), dec!(60));
        t.apply_payment(PaymentRequest::new(dec!(1000), today(), PaymentMethod::Cash), today())
            .unwrap();
        assert_eq!(t.paid_amount(), dec!(1000));
        assert_eq!(t.pending_amount(), dec!(2000));
        assert_eq!(t.status(), PaymentStatus::PartialPaid);
        assert_eq!(t.completion_percentage(), dec!(33.33));
    }

    #[test]
    fn test_self_trade_rejected() {
        let result = TradeTransaction::new(
            TradeRecord::new("X", "X", "RICE", dec!(1), dec!(1), today()),
            today(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_bags_rejected() {
        let result = TradeTransaction::new(
            TradeRecord::new("Y", "X", "RICE", dec!(-1), dec!(1), today()),
            today(),
        );
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_total_overflow_rejected() {
        let result = TradeTransaction::new(
            TradeRecord::new("Y", "X", "RICE", dec!(2), Decimal::MAX, today()),
            today(),
        );
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::InvalidInput { field: "total_amount", .. }))
        ));
    }

    #[test]
    fn test_record_deserializes_from_json() {
        let json = r#"{
            "seller": "Y", "buyer": "X", "product": "RICE",
            "bags": "50", "rate_per_bag": "60.50", "trade_date": "2025-06-01"
        }"#;
        let record: TradeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.rate_per_bag, dec!(60.50));
        assert!(record.due_date.is_none());
    }
}
