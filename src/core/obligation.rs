use crate::alerting::priority::{compute_priority, PriorityLevel};
use crate::brokerage::calculator::{calculate, BrokerageBreakdown, BrokeragePolicy};
use crate::config::PriorityConfig;
use crate::core::dates::{days_overdue, days_until_due, FinancialYear};
use crate::core::ids::{BrokerId, MerchantId, ObligationId, PaymentId};
use crate::core::money::{add_checked, percentage, subtract_floor, Money};
use crate::core::payment::{PartPayment, PaymentRequest, PaymentTrail};
use crate::core::status::{resolve_status, PaymentStatus};
use crate::core::transaction::TradeTransaction;
use crate::error::{EntityKind, LedgerError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A merchant's brokerage debt to a broker for one financial year.
///
/// Gross, discount, TDS and net amounts are fixed at creation from the
/// bag tally. Each part payment moves `paid_amount` up, and pending
/// amount and status are recomputed in the same step. Obligations are
/// never deleted; a new financial year gets a new obligation.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::brokerage::calculator::BrokeragePolicy;
/// use brokerage_ledger::core::dates::FinancialYear;
/// use brokerage_ledger::core::ids::{BrokerId, MerchantId};
/// use brokerage_ledger::core::obligation::BrokerageObligation;
/// use brokerage_ledger::core::status::PaymentStatus;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
/// let obligation = BrokerageObligation::new(
///     MerchantId::new("M-001"),
///     BrokerId::new("B-01"),
///     FinancialYear::april_to_march(2025).unwrap(),
///     dec!(100),
///     dec!(50),
///     dec!(10),
///     &BrokeragePolicy::new(dec!(0.10), dec!(0.05)),
///     None,
///     today,
/// )
/// .unwrap();
///
/// assert_eq!(obligation.net_brokerage(), dec!(1275));
/// assert_eq!(obligation.status(), PaymentStatus::Pending);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerageObligation {
    id: ObligationId,
    merchant: MerchantId,
    broker: BrokerId,
    financial_year: FinancialYear,
    breakdown: BrokerageBreakdown,
    pending_amount: Money,
    due_date: Option<NaiveDate>,
    /// Cached result of the resolver as of the last mutation.
    status: PaymentStatus,
    trail: PaymentTrail,
    created_at: DateTime<Utc>,
    /// Optimistic-lock version, owned by the repository.
    version: u64,
}

impl BrokerageObligation {
    /// Tally a new obligation.
    ///
    /// # Errors
    ///
    /// Fails with a validation error on negative bags or rate.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        merchant: MerchantId,
        broker: BrokerId,
        financial_year: FinancialYear,
        sold_bags: Decimal,
        bought_bags: Decimal,
        brokerage_rate: Money,
        policy: &BrokeragePolicy,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, LedgerError> {
        let breakdown = calculate(sold_bags, bought_bags, brokerage_rate, policy)?;
        let pending_amount = breakdown.net_brokerage;
        Ok(Self {
            id: ObligationId::new(),
            merchant,
            broker,
            financial_year,
            breakdown,
            pending_amount,
            due_date,
            status: resolve_status(Decimal::ZERO, breakdown.net_brokerage, due_date, today),
            trail: PaymentTrail::new(),
            created_at: Utc::now(),
            version: 0,
        })
    }

    /// Tally an obligation directly from the merchant's trades in the year.
    #[allow(clippy::too_many_arguments)]
    pub fn from_trades<'a>(
        merchant: MerchantId,
        broker: BrokerId,
        financial_year: FinancialYear,
        trades: impl IntoIterator<Item = &'a TradeTransaction>,
        brokerage_rate: Money,
        policy: &BrokeragePolicy,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, LedgerError> {
        let (sold, bought) = tally_bags(&merchant, trades, &financial_year)?;
        Self::new(
            merchant,
            broker,
            financial_year,
            sold,
            bought,
            brokerage_rate,
            policy,
            due_date,
            today,
        )
    }

    /// Record a part payment and recompute pending amount and status.
    ///
    /// Either the whole transition is applied or `self` is left untouched.
    pub fn apply_payment(
        &mut self,
        request: PaymentRequest,
        today: NaiveDate,
    ) -> Result<PaymentId, LedgerError> {
        let mut next = self.clone();
        let payment_id = next.trail.record(request, today)?;
        next.recompute(today);
        next.check_invariants()?;
        *self = next;
        Ok(payment_id)
    }

    /// Mark one of the recorded payments as verified.
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

    fn recompute(&mut self, today: NaiveDate) {
        self.pending_amount = subtract_floor(self.net_brokerage(), self.paid_amount());
        self.status = self.status_on(today);
    }

    /// Verify every stored invariant of the obligation.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let b = &self.breakdown;
        if b.sold_bags.checked_add(b.bought_bags) != Some(b.total_bags) {
            return Err(self.inconsistent(format!(
                "total bags {} != sold {} + bought {}",
                b.total_bags, b.sold_bags, b.bought_bags
            )));
        }
        if b.total_bags.checked_mul(b.brokerage_rate) != Some(b.gross_brokerage) {
            return Err(self.inconsistent("gross brokerage does not match bags x rate".into()));
        }
        let deductions = b.discount.checked_add(b.tds);
        if deductions.map(|d| subtract_floor(b.gross_brokerage, d)) != Some(b.net_brokerage) {
            return Err(self.inconsistent("net brokerage does not match deductions".into()));
        }
        if let Some(problem) = self.trail.check() {
            return Err(self.inconsistent(problem));
        }
        let expected = subtract_floor(b.net_brokerage, self.paid_amount());
        if self.pending_amount != expected {
            return Err(self.inconsistent(format!(
                "pending amount {} != {}",
                self.pending_amount, expected
            )));
        }
        Ok(())
    }

    fn inconsistent(&self, detail: String) -> LedgerError {
        LedgerError::Consistency(format!("obligation {}: {}", self.id, detail))
    }

    /// Status as of `today` without mutating the cached value.
    pub fn status_on(&self, today: NaiveDate) -> PaymentStatus {
        resolve_status(self.paid_amount(), self.net_brokerage(), self.due_date, today)
    }

    pub fn completion_percentage(&self) -> Decimal {
        percentage(self.paid_amount(), self.net_brokerage())
    }

    /// Priority as of `today`; a settled obligation is always `Low`.
    pub fn priority_on(&self, today: NaiveDate, config: &PriorityConfig) -> PriorityLevel {
        if self.status_on(today).is_settled() {
            return PriorityLevel::Low;
        }
        compute_priority(
            self.due_date.map(|d| days_overdue(d, today)).unwrap_or(0),
            self.due_date.map(|d| days_until_due(d, today)),
            self.pending_amount,
            config,
        )
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    // --- Accessors ---

    pub fn id(&self) -> ObligationId {
        self.id
    }

    pub fn merchant(&self) -> &MerchantId {
        &self.merchant
    }

    pub fn broker(&self) -> &BrokerId {
        &self.broker
    }

    pub fn financial_year(&self) -> &FinancialYear {
        &self.financial_year
    }

    pub fn breakdown(&self) -> &BrokerageBreakdown {
        &self.breakdown
    }

    pub fn sold_bags(&self) -> Decimal {
        self.breakdown.sold_bags
    }

    pub fn bought_bags(&self) -> Decimal {
        self.breakdown.bought_bags
    }

    pub fn total_bags(&self) -> Decimal {
        self.breakdown.total_bags
    }

    pub fn gross_brokerage(&self) -> Money {
        self.breakdown.gross_brokerage
    }

    pub fn net_brokerage(&self) -> Money {
        self.breakdown.net_brokerage
    }

    pub fn paid_amount(&self) -> Money {
        self.trail.paid_amount()
    }

    pub fn pending_amount(&self) -> Money {
        self.pending_amount
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
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

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Sum a merchant's sold and bought bags over trades inside the year.
///
/// Fails with an invalid-input error if either sum overflows.
pub fn tally_bags<'a>(
    merchant: &MerchantId,
    trades: impl IntoIterator<Item = &'a TradeTransaction>,
    financial_year: &FinancialYear,
) -> Result<(Decimal, Decimal), LedgerError> {
    let mut sold = Decimal::ZERO;
    let mut bought = Decimal::ZERO;
    for trade in trades {
        if !trade.in_financial_year(financial_year) {
            continue;
        }
        if trade.seller() == merchant {
            sold = add_checked("sold_bags", sold, trade.bags())?;
        }
        if trade.buyer() == merchant {
            bought = add_checked("bought_bags", bought, trade.bags())?;
        }
    }
    Ok((sold, bought))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payment::PaymentMethod;
    use crate::core::transaction::TradeRecord;
    use crate::error::ValidationError;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    fn sample(due_in: Option<i64>) -> BrokerageObligation {
        BrokerageObligation::new(
            MerchantId::new("M-001"),
            BrokerId::new("B-01"),
            FinancialYear::april_to_march(2025).unwrap(),
            dec!(100),
            dec!(50),
            dec!(10),
            &BrokeragePolicy::new(dec!(0.10), dec!(0.05)),
            due_in.map(|d| today() + Duration::days(d)),
            today(),
        )
        .unwrap()
    }

    fn cash(amount: Decimal) -> PaymentRequest {
        PaymentRequest::new(amount, today(), PaymentMethod::Cash)
    }

    #[test]
    fn test_full_payment_settles() {
        let mut ob = sample(Some(30));
        assert_eq!(ob.pending_amount(), dec!(1275));
        ob.apply_payment(cash(dec!(1275)), today()).unwrap();
        assert_eq!(ob.pending_amount(), Decimal::ZERO);
        assert_eq!(ob.status(), PaymentStatus::Paid);
        assert_eq!(ob.completion_percentage(), dec!(100));
    }

    #[test]
    fn test_partial_then_overpay_floors_pending() {
        let mut ob = sample(Some(30));
        ob.apply_payment(cash(dec!(275)), today()).unwrap();
        assert_eq!(ob.pending_amount(), dec!(1000));
        assert_eq!(ob.status(), PaymentStatus::PartialPaid);
        ob.apply_payment(cash(dec!(1500)), today()).unwrap();
        assert_eq!(ob.pending_amount(), Decimal::ZERO);
        assert_eq!(ob.paid_amount(), dec!(1775));
        assert_eq!(ob.status(), PaymentStatus::Paid);
        assert!(ob.check_invariants().is_ok());
    }

    #[test]
    fn test_future_payment_leaves_state_untouched() {
        let mut ob = sample(Some(30));
        let before = ob.clone();
        let tomorrow = today() + Duration::days(1);
        let err = ob
            .apply_payment(PaymentRequest::new(dec!(10), tomorrow, PaymentMethod::Cash), today())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::FutureDate { .. })
        ));
        assert_eq!(ob, before);
    }

    #[test]
    fn test_status_at_creation_follows_due_date() {
        assert_eq!(sample(Some(3)).status(), PaymentStatus::DueSoon);
        assert_eq!(sample(Some(10)).status(), PaymentStatus::Pending);
        assert_eq!(sample(Some(-1)).status(), PaymentStatus::Overdue);
    }

    #[test]
    fn test_status_on_moves_with_time() {
        let ob = sample(Some(10));
        assert_eq!(ob.status_on(today() + Duration::days(5)), PaymentStatus::DueSoon);
        assert_eq!(ob.status_on(today() + Duration::days(11)), PaymentStatus::Overdue);
        assert_eq!(ob.status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_verify_payment() {
        let mut ob = sample(None);
        let id = ob.apply_payment(cash(dec!(100)), today()).unwrap();
        ob.verify_payment(id, "accountant", today()).unwrap();
        assert!(ob.payments()[0].is_verified());
        assert!(matches!(
            ob.verify_payment(PaymentId::new(), "accountant", today()),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tally_from_trades() {
        let m = MerchantId::new("M-001");
        let fy = FinancialYear::april_to_march(2025).unwrap();
        let record = |seller: &str, buyer: &str, bags: Decimal, date: NaiveDate| {
            TradeTransaction::new(
                TradeRecord::new(seller, buyer, "WHEAT", bags, dec!(2000), date),
                today(),
            )
            .unwrap()
        };
        let trades = vec![
            record("M-001", "M-002", dec!(100), today()),
            record("M-003", "M-001", dec!(50), today()),
            record("M-004", "M-005", dec!(70), today()),
            // previous financial year
            record("M-001", "M-002", dec!(999), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()),
        ];
        assert_eq!(tally_bags(&m, &trades, &fy), Ok((dec!(100), dec!(50))));

        let ob = BrokerageObligation::from_trades(
            m,
            BrokerId::new("B-01"),
            fy,
            &trades,
            dec!(10),
            &BrokeragePolicy::new(dec!(0.10), dec!(0.05)),
            None,
            today(),
        )
        .unwrap();
        assert_eq!(ob.net_brokerage(), dec!(1275));
    }
}
