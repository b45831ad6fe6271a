use crate::core::ids::PaymentId;
use crate::core::money::Money;
use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a part payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Cheque,
    Upi,
    Neft,
    Rtgs,
    Online,
    Other,
}

/// Evidence each payment method must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRules {
    pub requires_reference: bool,
    pub requires_bank_details: bool,
    pub is_electronic: bool,
}

const fn rules(requires_reference: bool, requires_bank_details: bool, is_electronic: bool) -> MethodRules {
    MethodRules {
        requires_reference,
        requires_bank_details,
        is_electronic,
    }
}

/// Indexed by `PaymentMethod as usize`.
const METHOD_RULES: [MethodRules; 8] = [
    rules(false, false, false), // Cash
    rules(true, false, true),   // BankTransfer
    rules(true, true, false),   // Cheque
    rules(true, false, true),   // Upi
    rules(true, false, true),   // Neft
    rules(true, false, true),   // Rtgs
    rules(false, false, true),  // Online
    rules(false, false, false), // Other
];

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 8] = [
        PaymentMethod::Cash,
        PaymentMethod::BankTransfer,
        PaymentMethod::Cheque,
        PaymentMethod::Upi,
        PaymentMethod::Neft,
        PaymentMethod::Rtgs,
        PaymentMethod::Online,
        PaymentMethod::Other,
    ];

    pub fn rules(self) -> MethodRules {
        METHOD_RULES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Cheque => "CHEQUE",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Neft => "NEFT",
            PaymentMethod::Rtgs => "RTGS",
            PaymentMethod::Online => "ONLINE",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown payment method: {s}"))
    }
}

/// Bank the payment was drawn on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_name: String,
    /// Masked account number or branch, free-form.
    pub account_hint: Option<String>,
}

impl BankDetails {
    pub fn new(bank_name: impl Into<String>) -> Self {
        Self {
            bank_name: bank_name.into(),
            account_hint: None,
        }
    }

    pub fn with_account_hint(mut self, hint: impl Into<String>) -> Self {
        self.account_hint = Some(hint.into());
        self
    }
}

/// A payment as submitted by the caller, before validation.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::core::payment::{PaymentMethod, PaymentRequest};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
/// let request = PaymentRequest::new(dec!(500), date, PaymentMethod::Upi)
///     .with_reference("UPI-88231");
/// assert!(request.validate(date).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub bank_details: Option<BankDetails>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PaymentRequest {
    pub fn new(amount: Money, date: NaiveDate, method: PaymentMethod) -> Self {
        Self {
            amount,
            date,
            method,
            reference: None,
            bank_details: None,
            notes: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_bank_details(mut self, bank: BankDetails) -> Self {
        self.bank_details = Some(bank);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check amount, date and method evidence against `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.date > today {
            return Err(ValidationError::FutureDate {
                date: self.date,
                today,
            });
        }
        let rules = self.method.rules();
        let has_reference = self
            .reference
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if rules.requires_reference && !has_reference {
            return Err(ValidationError::MissingReference(self.method));
        }
        let has_bank = self
            .bank_details
            .as_ref()
            .is_some_and(|b| !b.bank_name.trim().is_empty());
        if rules.requires_bank_details && !has_bank {
            return Err(ValidationError::MissingBankDetails(self.method));
        }
        Ok(())
    }
}

/// A recorded part payment.
///
/// Immutable once created except for the verification fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartPayment {
    id: PaymentId,
    amount: Money,
    payment_date: NaiveDate,
    method: PaymentMethod,
    reference: Option<String>,
    bank_details: Option<BankDetails>,
    notes: Option<String>,
    recorded_at: DateTime<Utc>,
    verified: bool,
    verified_by: Option<String>,
    verified_on: Option<NaiveDate>,
}

impl PartPayment {
    /// Build a record from an already validated request.
    pub(crate) fn from_request(request: PaymentRequest) -> Self {
        Self {
            id: PaymentId::new(),
            amount: request.amount,
            payment_date: request.date,
            method: request.method,
            reference: request.reference,
            bank_details: request.bank_details,
            notes: request.notes,
            recorded_at: Utc::now(),
            verified: false,
            verified_by: None,
            verified_on: None,
        }
    }

    pub(crate) fn mark_verified(
        &mut self,
        verifier: impl Into<String>,
        on: NaiveDate,
    ) -> Result<(), ValidationError> {
        if self.verified {
            return Err(ValidationError::AlreadyVerified(self.id.to_string()));
        }
        self.verified = true;
        self.verified_by = Some(verifier.into());
        self.verified_on = Some(on);
        Ok(())
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn payment_date(&self) -> NaiveDate {
        self.payment_date
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn bank_details(&self) -> Option<&BankDetails> {
        self.bank_details.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn verified_by(&self) -> Option<&str> {
        self.verified_by.as_deref()
    }

    pub fn verified_on(&self) -> Option<NaiveDate> {
        self.verified_on
    }
}

/// Ordered part payments plus their running total.
///
/// Shared by obligations and trade transactions. `paid_amount` always
/// equals the sum of the recorded amounts; [`PaymentTrail::check`]
/// verifies that after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTrail {
    payments: Vec<PartPayment>,
    paid_amount: Money,
    last_payment_date: Option<NaiveDate>,
}

impl PaymentTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a payment, returning the new record's id.
    pub(crate) fn record(
        &mut self,
        request: PaymentRequest,
        today: NaiveDate,
    ) -> Result<PaymentId, ValidationError> {
        request.validate(today)?;
        let paid_amount = self.paid_amount.checked_add(request.amount).ok_or_else(|| {
            ValidationError::InvalidInput {
                field: "amount",
                reason: format!("{} on top of {} overflows", request.amount, self.paid_amount),
            }
        })?;
        let payment = PartPayment::from_request(request);
        let id = payment.id();
        self.paid_amount = paid_amount;
        self.last_payment_date = Some(payment.payment_date());
        self.payments.push(payment);
        Ok(id)
    }

    pub(crate) fn verify(
        &mut self,
        payment_id: PaymentId,
        verifier: &str,
        today: NaiveDate,
    ) -> Result<bool, ValidationError> {
        match self.payments.iter_mut().find(|p| p.id() == payment_id) {
            Some(payment) => payment.mark_verified(verifier, today).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn payments(&self) -> &[PartPayment] {
        &self.payments
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    pub fn last_payment_date(&self) -> Option<NaiveDate> {
        self.last_payment_date
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }

    /// Sum of the individual payment amounts, `None` on overflow.
    pub fn sum(&self) -> Option<Money> {
        self.payments
            .iter()
            .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.amount()))
    }

    /// Returns a description of the first broken invariant, if any.
    pub fn check(&self) -> Option<String> {
        if self.paid_amount < Decimal::ZERO {
            return Some(format!("paid amount {} is negative", self.paid_amount));
        }
        let Some(sum) = self.sum() else {
            return Some("part payments overflow when summed".to_string());
        };
        if sum != self.paid_amount {
            return Some(format!(
                "part payments sum to {} but paid amount is {}",
                sum, self.paid_amount
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[test]
    fn test_rules_table_covers_every_method() {
        for method in PaymentMethod::ALL {
            let rules = method.rules();
            let needs_ref = matches!(
                method,
                PaymentMethod::BankTransfer
                    | PaymentMethod::Neft
                    | PaymentMethod::Rtgs
                    | PaymentMethod::Upi
                    | PaymentMethod::Cheque
            );
            assert_eq!(rules.requires_reference, needs_ref, "{method}");
        }
        assert!(PaymentMethod::Cheque.rules().requires_bank_details);
        assert!(PaymentMethod::Online.rules().is_electronic);
        assert!(!PaymentMethod::Cash.rules().is_electronic);
    }

    #[test]
    fn test_every_method_validates_with_full_evidence() {
        for method in PaymentMethod::ALL {
            let request = PaymentRequest::new(dec!(10), today(), method)
                .with_reference("REF-1")
                .with_bank_details(BankDetails::new("State Bank"));
            assert!(request.validate(today()).is_ok(), "{method}");
        }
    }

    #[test]
    fn test_reference_optional_for_cash_online_other() {
        for method in [PaymentMethod::Cash, PaymentMethod::Online, PaymentMethod::Other] {
            assert!(PaymentRequest::new(dec!(10), today(), method)
                .validate(today())
                .is_ok());
        }
    }

    #[test]
    fn test_missing_reference_rejected() {
        let err = PaymentRequest::new(dec!(10), today(), PaymentMethod::Neft)
            .validate(today())
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingReference(PaymentMethod::Neft));

        let err = PaymentRequest::new(dec!(10), today(), PaymentMethod::Rtgs)
            .with_reference("   ")
            .validate(today())
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingReference(PaymentMethod::Rtgs));
    }

    #[test]
    fn test_cheque_needs_bank() {
        let err = PaymentRequest::new(dec!(10), today(), PaymentMethod::Cheque)
            .with_reference("CHQ-004512")
            .validate(today())
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingBankDetails(PaymentMethod::Cheque));
    }

    #[test]
    fn test_amount_and_date_rejections() {
        let zero = PaymentRequest::new(Decimal::ZERO, today(), PaymentMethod::Cash);
        assert_eq!(zero.validate(today()), Err(ValidationError::NonPositiveAmount));

        let tomorrow = today().succ_opt().unwrap();
        let future = PaymentRequest::new(dec!(5), tomorrow, PaymentMethod::Cash);
        assert!(matches!(
            future.validate(today()),
            Err(ValidationError::FutureDate { .. })
        ));
    }

    #[test]
    fn test_verify_once() {
        let mut payment =
            PartPayment::from_request(PaymentRequest::new(dec!(10), today(), PaymentMethod::Cash));
        payment.mark_verified("accounts", today()).unwrap();
        assert!(payment.is_verified());
        assert_eq!(payment.verified_by(), Some("accounts"));
        assert!(payment.mark_verified("accounts", today()).is_err());
    }

    #[test]
    fn test_trail_tracks_sum_and_last_date() {
        let mut trail = PaymentTrail::new();
        let early = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        trail
            .record(PaymentRequest::new(dec!(40), today(), PaymentMethod::Cash), today())
            .unwrap();
        trail
            .record(PaymentRequest::new(dec!(60), early, PaymentMethod::Cash), today())
            .unwrap();
        assert_eq!(trail.paid_amount(), dec!(100));
        // A backdated payment still becomes the last one recorded.
        assert_eq!(trail.last_payment_date(), Some(early));
        assert_eq!(trail.len(), 2);
        assert!(trail.check().is_none());
    }

    #[test]
    fn test_trail_rejects_without_mutation() {
        let mut trail = PaymentTrail::new();
        let result = trail.record(
            PaymentRequest::new(dec!(-1), today(), PaymentMethod::Cash),
            today(),
        );
        assert!(result.is_err());
        assert!(trail.is_empty());
        assert_eq!(trail.paid_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_trail_rejects_overflowing_amount() {
        let mut trail = PaymentTrail::new();
        trail
            .record(PaymentRequest::new(Decimal::MAX, today(), PaymentMethod::Cash), today())
            .unwrap();
        let err = trail
            .record(PaymentRequest::new(dec!(1), today(), PaymentMethod::Cash), today())
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidInput { field: "amount", .. }));
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.paid_amount(), Decimal::MAX);
    }

    #[test]
    fn test_trail_verify_unknown_payment() {
        let mut trail = PaymentTrail::new();
        assert_eq!(trail.verify(PaymentId::new(), "ops", today()), Ok(false));
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("neft".parse::<PaymentMethod>(), Ok(PaymentMethod::Neft));
        assert_eq!("BANK_TRANSFER".parse::<PaymentMethod>(), Ok(PaymentMethod::BankTransfer));
        assert!("wire".parse::<PaymentMethod>().is_err());
    }
}
