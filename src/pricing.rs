//! Pricing
//!
//! Money helpers shared by every calculation in the crate. Amounts are held as
//! [`Money`] in minor units; decimal intermediates are quantized back to the
//! currency's minor unit rounding half-up (away from zero on the midpoint).

use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

/// Errors that can occur while doing money arithmetic.
#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    /// A decimal intermediate could not be represented in minor units.
    #[error("amount overflowed the minor unit range")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Zero in the given currency.
pub fn zero_money(currency: &Currency) -> Money<'_, Currency> {
    Money::from_minor(0, currency)
}

/// Number of minor units in one major unit of the currency.
fn minor_scale(currency: &Currency) -> Result<Decimal, PriceError> {
    10_i64
        .checked_pow(currency.exponent)
        .and_then(Decimal::from_i64)
        .ok_or(PriceError::Overflow)
}

/// Round a decimal number of minor units half-up to a whole minor unit.
pub(crate) fn round_minor(minor: Decimal) -> Result<i64, PriceError> {
    minor
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PriceError::Overflow)
}

/// Quantize a major-unit amount (e.g. `12.345`) to the currency's minor unit.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if the amount does not fit in minor units.
pub fn quantize_price(
    amount: Decimal,
    currency: &Currency,
) -> Result<Money<'_, Currency>, PriceError> {
    let minor = amount
        .checked_mul(minor_scale(currency)?)
        .ok_or(PriceError::Overflow)?;

    Ok(Money::from_minor(round_minor(minor)?, currency))
}

/// Express a money value in major units (e.g. `1250` GBP minor units becomes `12.50`).
pub fn to_major(money: &Money<'_, Currency>) -> Decimal {
    Decimal::new(money.to_minor_units(), money.currency().exponent)
}

/// Multiply a price by a quantity.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if the product does not fit in minor units.
pub fn multiply<'a>(
    price: &Money<'a, Currency>,
    quantity: u32,
) -> Result<Money<'a, Currency>, PriceError> {
    let minor = price
        .to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(PriceError::Overflow)?;

    Ok(Money::from_minor(minor, price.currency()))
}

/// Divide a price by a quantity, rounding half-up. Division by zero yields zero.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if the quotient cannot be represented.
pub fn divide_half_up<'a>(
    price: &Money<'a, Currency>,
    quantity: u32,
) -> Result<Money<'a, Currency>, PriceError> {
    if quantity == 0 {
        return Ok(zero_money(price.currency()));
    }

    let minor = Decimal::from(price.to_minor_units())
        .checked_div(Decimal::from(quantity))
        .ok_or(PriceError::Overflow)?;

    Ok(Money::from_minor(round_minor(minor)?, price.currency()))
}

/// The share of `amount` that `part` represents of `whole`, quantized half-up.
///
/// A zero `whole` always produces a zero share.
///
/// # Errors
///
/// Returns an error on currency mismatch or if the share overflows.
pub fn proportional_share<'a>(
    amount: &Money<'a, Currency>,
    part: &Money<'a, Currency>,
    whole: &Money<'a, Currency>,
) -> Result<Money<'a, Currency>, PriceError> {
    ensure_same_currency(amount, part)?;
    ensure_same_currency(amount, whole)?;

    let whole_minor = whole.to_minor_units();

    if whole_minor == 0 {
        return Ok(zero_money(amount.currency()));
    }

    let share = Decimal::from(amount.to_minor_units())
        .checked_mul(Decimal::from(part.to_minor_units()))
        .and_then(|value| value.checked_div(Decimal::from(whole_minor)))
        .ok_or(PriceError::Overflow)?;

    Ok(Money::from_minor(round_minor(share)?, amount.currency()))
}

/// Clamp a money value so it never drops below zero.
pub fn floor_at_zero<'a>(money: Money<'a, Currency>) -> Money<'a, Currency> {
    if money.to_minor_units() < 0 {
        zero_money(money.currency())
    } else {
        money
    }
}

/// Sum an iterator of money values, starting from zero in `currency`.
///
/// # Errors
///
/// Returns [`PriceError::Money`] if any value has a different currency.
pub fn total_price<'a>(
    currency: &'a Currency,
    prices: impl IntoIterator<Item = Money<'a, Currency>>,
) -> Result<Money<'a, Currency>, PriceError> {
    let total = prices
        .into_iter()
        .try_fold(zero_money(currency), |acc, price| acc.add(price))?;

    Ok(total)
}

fn ensure_same_currency(
    expected: &Money<'_, Currency>,
    actual: &Money<'_, Currency>,
) -> Result<(), PriceError> {
    if expected.currency() == actual.currency() {
        Ok(())
    } else {
        Err(PriceError::Money(MoneyError::CurrencyMismatch {
            expected: expected.currency().iso_alpha_code,
            actual: actual.currency().iso_alpha_code,
        }))
    }
}
