use crate::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amount. Always exact decimal, never floating point.
///
/// With the `serde-with-str` feature enabled, every `Money` crossing a
/// serialization boundary is written as an exact decimal string.
pub type Money = Decimal;

/// Decimal places kept for display and percentage fields.
pub const DISPLAY_SCALE: u32 = 2;

/// `max(a - b, 0)`.
///
/// Every pending amount in the crate goes through this, so over-payment
/// or an inconsistent read can never produce a negative balance.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::core::money::subtract_floor;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(subtract_floor(dec!(100), dec!(40)), dec!(60));
/// assert_eq!(subtract_floor(dec!(100), dec!(140)), dec!(0));
/// ```
pub fn subtract_floor(a: Money, b: Money) -> Money {
    (a - b).max(Decimal::ZERO)
}

/// `a + b`, or an invalid-input error on `field` when the sum overflows.
pub fn add_checked(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::invalid_input(field, format!("{a} + {b} overflows")))
}

/// `a * b`, or an invalid-input error on `field` when the product overflows.
pub fn mul_checked(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_mul(b)
        .ok_or_else(|| LedgerError::invalid_input(field, format!("{a} x {b} overflows")))
}

/// Half-up rounding to two decimal places.
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `part / whole * 100`, rounded half-up to two places.
///
/// Returns zero when `whole` is not positive. A ratio too large to
/// represent saturates at `Decimal::MAX`.
///
/// # Examples
///
/// ```
/// use brokerage_ledger::core::money::percentage;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(percentage(dec!(1), dec!(3)), dec!(33.33));
/// assert_eq!(percentage(dec!(5), dec!(0)), dec!(0));
/// ```
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::MAX, round_display)
}

/// Relative change from `previous` to `current` in percent.
///
/// A move away from zero counts as +100%; zero to zero is no change.
/// Changes too large to represent saturate in their own direction.
pub fn percent_change(previous: Decimal, current: Decimal) -> Decimal {
    if previous == Decimal::ZERO {
        return if current > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
    }
    let rising = current > previous;
    current
        .checked_sub(previous)
        .and_then(|delta| delta.checked_div(previous.abs()))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(if rising { Decimal::MAX } else { Decimal::MIN }, round_display)
}
