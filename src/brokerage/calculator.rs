use crate::core::money::{add_checked, mul_checked, subtract_floor, Money};
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deduction fractions applied to gross brokerage.
///
/// Supplied by the caller (usually from [`crate::config::BrokerageConfig`]);
/// the calculator itself hardcodes no rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokeragePolicy {
    /// Fraction of gross waived as discount, e.g. `0.10`.
    pub discount_rate: Decimal,
    /// Fraction of gross withheld as tax deducted at source, e.g. `0.05`.
    pub tds_rate: Decimal,
}

impl BrokeragePolicy {
    pub fn new(discount_rate: Decimal, tds_rate: Decimal) -> Self {
        Self {
            discount_rate,
            tds_rate,
        }
    }

    /// No discount, no TDS.
    pub fn gross_only() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }
}

/// Output of [`calculate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerageBreakdown {
    pub sold_bags: Decimal,
    pub bought_bags: Decimal,
    pub total_bags: Decimal,
    pub brokerage_rate: Money,
    pub gross_brokerage: Money,
    pub discount: Money,
    pub tds: Money,
    pub net_brokerage: Money,
}

/// Compute gross and net brokerage for one merchant.
///
/// Brokerage is charged per bag on both sides of the merchant's trading:
/// `gross = (sold + bought) * rate`. Discount and TDS are fractions of
/// gross; net is floored at zero.
///
/// # Errors
///
/// [`LedgerError::Validation`] when the rate, either bag count or a
/// policy fraction is negative.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::brokerage::calculator::{calculate, BrokeragePolicy};
/// use rust_decimal_macros::dec;
///
/// let policy = BrokeragePolicy::new(dec!(0.10), dec!(0.05));
/// let b = calculate(dec!(100), dec!(50), dec!(10), &policy).unwrap();
/// assert_eq!(b.gross_brokerage, dec!(1500));
/// assert_eq!(b.net_brokerage, dec!(1275));
/// ```
pub fn calculate(
    sold_bags: Decimal,
    bought_bags: Decimal,
    brokerage_rate: Money,
    policy: &BrokeragePolicy,
) -> Result<BrokerageBreakdown, LedgerError> {
    if sold_bags < Decimal::ZERO {
        return Err(LedgerError::invalid_input("sold_bags", format!("{sold_bags} is negative")));
    }
    if bought_bags < Decimal::ZERO {
        return Err(LedgerError::invalid_input(
            "bought_bags",
            format!("{bought_bags} is negative"),
        ));
    }
    if brokerage_rate < Decimal::ZERO {
        return Err(LedgerError::invalid_input(
            "brokerage_rate",
            format!("{brokerage_rate} is negative"),
        ));
    }
    if policy.discount_rate < Decimal::ZERO || policy.tds_rate < Decimal::ZERO {
        return Err(LedgerError::invalid_input(
            "policy",
            "discount and TDS rates must not be negative",
        ));
    }

    let total_bags = add_checked("total_bags", sold_bags, bought_bags)?;
    let gross_brokerage = mul_checked("gross_brokerage", total_bags, brokerage_rate)?;
    let discount = mul_checked("discount", gross_brokerage, policy.discount_rate)?;
    let tds = mul_checked("tds", gross_brokerage, policy.tds_rate)?;
    let net_brokerage = subtract_floor(gross_brokerage, add_checked("deductions", discount, tds)?);

    Ok(BrokerageBreakdown {
        sold_bags,
        bought_bags,
        total_bags,
        brokerage_rate,
        gross_brokerage,
        discount,
        tds,
        net_brokerage,
    })
}
