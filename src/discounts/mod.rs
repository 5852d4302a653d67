//! Discounts
//!
//! Discount values, discount kinds, and how a `(value, value type)` pair
//! reduces a price. Everything here is pure; persistence of applied discounts
//! lives in [`records`] and [`store`].

use std::fmt;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::Deserialize;
use thiserror::Error;

use crate::pricing::{PriceError, floor_at_zero, quantize_price, round_minor, zero_money};

pub mod records;
pub mod store;

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money helper error.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Reasons a rule or voucher does not apply in the current context.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotApplicable {
    /// The rule or voucher is not available in the channel.
    #[error("this offer is not available in this channel")]
    ChannelNotAvailable,

    /// The order value is below the voucher's minimum spend.
    #[error("this offer is only valid for orders over {0}")]
    MinSpent(String),

    /// The checkout holds fewer items than the voucher requires.
    #[error("this offer is only valid for orders with a minimum of {0} quantity")]
    MinCheckoutItemsQuantity(u32),

    /// The customer has already used the voucher.
    #[error("this offer is only valid once per customer")]
    OncePerCustomer,

    /// The voucher is reserved for staff members.
    #[error("this offer is valid only for staff customers")]
    OnlyForStaff,

    /// The voucher code reached its usage limit.
    #[error("this offer has reached its usage limit")]
    UsageLimitReached,
}

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountValueType {
    /// The value is an amount of money in the price's currency.
    Fixed,

    /// The value is a percentage (`10` means 10%).
    Percentage,
}

impl DiscountValueType {
    /// Short lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountValueType::Fixed => "fixed",
            DiscountValueType::Percentage => "percentage",
        }
    }
}

/// Where an applied discount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Catalogue promotion applied to a line.
    Promotion,

    /// Order promotion applied to the whole checkout or order.
    OrderPromotion,

    /// Voucher discount.
    Voucher,

    /// Discount entered by a staff member.
    Manual,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiscountType::Promotion => "promotion",
            DiscountType::OrderPromotion => "order_promotion",
            DiscountType::Voucher => "voucher",
            DiscountType::Manual => "manual",
        };

        f.write_str(label)
    }
}

/// A discount value together with how to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountValue {
    /// Amount (major units) or percentage points.
    pub value: Decimal,

    /// How `value` is interpreted.
    pub value_type: DiscountValueType,
}

impl DiscountValue {
    /// Create a new discount value.
    pub fn new(value: Decimal, value_type: DiscountValueType) -> Self {
        Self { value, value_type }
    }

    /// A fixed amount off, in major units.
    pub fn fixed(value: Decimal) -> Self {
        Self::new(value, DiscountValueType::Fixed)
    }

    /// A percentage off (`10` means 10%).
    pub fn percentage(value: Decimal) -> Self {
        Self::new(value, DiscountValueType::Percentage)
    }

    /// Return the discounted price.
    ///
    /// # Errors
    ///
    /// See [`apply_discount_to_value`].
    pub fn apply<'a>(
        &self,
        price: Money<'a, Currency>,
    ) -> Result<Money<'a, Currency>, DiscountError> {
        apply_discount_to_value(self.value, self.value_type, price.currency(), price)
    }

    /// Return how much this discount takes off `price`.
    ///
    /// # Errors
    ///
    /// See [`apply_discount_to_value`].
    pub fn amount_off<'a>(
        &self,
        price: Money<'a, Currency>,
    ) -> Result<Money<'a, Currency>, DiscountError> {
        Ok(price.sub(self.apply(price)?)?)
    }
}

/// Denormalized order-level discount shown on a checkout or order.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountSummary<'a> {
    /// Discount amount.
    pub amount: Money<'a, Currency>,

    /// Display name.
    pub name: Option<String>,

    /// Translated display name.
    pub translated_name: Option<String>,
}

impl<'a> DiscountSummary<'a> {
    /// No discount.
    pub fn none(currency: &'a Currency) -> Self {
        Self {
            amount: zero_money(currency),
            name: None,
            translated_name: None,
        }
    }

    /// Whether this summary shows no discount.
    pub fn is_none(&self) -> bool {
        self.amount.to_minor_units() == 0 && self.name.is_none() && self.translated_name.is_none()
    }
}

/// Calculate the price after applying a discount value.
///
/// - `Fixed`: subtracts `value` (in `currency`) from the price, never below zero.
/// - `Percentage`: multiplies the price by `1 - value / 100`, rounding half-up
///   to the minor unit, never below zero.
///
/// # Errors
///
/// Returns an error if:
/// - the fixed amount does not fit in minor units (`DiscountError::Price`).
/// - the percentage calculation overflows (`DiscountError::PercentConversion`).
/// - `currency` differs from the price's currency (`DiscountError::Money`).
pub fn apply_discount_to_value<'a>(
    value: Decimal,
    value_type: DiscountValueType,
    currency: &'a Currency,
    price_to_discount: Money<'a, Currency>,
) -> Result<Money<'a, Currency>, DiscountError> {
    match value_type {
        DiscountValueType::Fixed => {
            let discount = quantize_price(value, currency)?;

            Ok(floor_at_zero(price_to_discount.sub(discount)?))
        }
        DiscountValueType::Percentage => {
            if price_to_discount.currency() != currency {
                return Err(DiscountError::Money(MoneyError::CurrencyMismatch {
                    expected: currency.iso_alpha_code,
                    actual: price_to_discount.currency().iso_alpha_code,
                }));
            }

            let remaining = Decimal::ONE_HUNDRED
                .checked_sub(value)
                .and_then(|points| points.checked_div(Decimal::ONE_HUNDRED))
                .ok_or(DiscountError::PercentConversion)?;

            let minor = percent_of_minor(
                &Percentage::from(remaining),
                price_to_discount.to_minor_units(),
            )?;

            Ok(floor_at_zero(Money::from_minor(minor, currency)))
        }
    }
}

/// Calculate a percentage of a minor unit amount, rounding half-up.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    let applied = ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the inner Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?;

    round_minor(applied).map_err(|_overflow| DiscountError::PercentConversion)
}

/// Convert a fractional percentage (e.g. `0.25`) into percent points (`25`).
pub fn percent_points(percent: Percentage) -> Decimal {
    ((percent * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}
