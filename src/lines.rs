//! Lines
//!
//! A line is one variant at some quantity in a checkout or order. It carries
//! the prices reconciliation reads and writes, the discount records attached to
//! it, and the catalogue rules it currently qualifies for.

use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::{
    catalogue::VariantKey,
    discounts::records::DiscountRecord,
    pricing::{PriceError, divide_half_up, floor_at_zero, multiply},
    promotions::PromotionRuleKey,
};

new_key_type! {
    /// Line Key
    pub struct LineKey;
}

/// A catalogue rule a line qualifies for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineRule<'a> {
    /// The qualifying rule.
    pub rule: PromotionRuleKey,

    /// Per-unit discount this rule gives on the variant's listing, if known.
    pub unit_discount: Option<Money<'a, Currency>>,
}

/// A checkout or order line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<'a> {
    key: LineKey,
    variant: VariantKey,
    quantity: u32,
    undiscounted_unit_price: Money<'a, Currency>,
    discounted_unit_price: Money<'a, Currency>,
    base_unit_price: Money<'a, Currency>,
    unit_price: Money<'a, Currency>,
    unit_discount: Money<'a, Currency>,
    total_price: Money<'a, Currency>,
    undiscounted_total_price: Money<'a, Currency>,
    discounts: Vec<DiscountRecord<'a>>,
    rules: SmallVec<[LineRule<'a>; 2]>,
}

impl<'a> Line<'a> {
    /// Create an undiscounted line.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the line total does not fit in minor units.
    pub fn new(
        key: LineKey,
        variant: VariantKey,
        quantity: u32,
        unit_price: Money<'a, Currency>,
    ) -> Result<Self, PriceError> {
        let total = multiply(&unit_price, quantity)?;

        Ok(Self {
            key,
            variant,
            quantity,
            undiscounted_unit_price: unit_price,
            discounted_unit_price: unit_price,
            base_unit_price: unit_price,
            unit_price,
            unit_discount: Money::from_minor(0, unit_price.currency()),
            total_price: total,
            undiscounted_total_price: total,
            discounts: Vec::new(),
            rules: SmallVec::new(),
        })
    }

    /// Set the catalogue-discounted unit price, resetting the line's base,
    /// unit and total prices to match.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or overflow.
    pub fn set_discounted_unit_price(
        &mut self,
        price: Money<'a, Currency>,
    ) -> Result<(), PriceError> {
        let price = floor_at_zero(price);

        self.unit_discount = self.undiscounted_unit_price.sub(price)?;
        self.discounted_unit_price = price;
        self.base_unit_price = price;
        self.unit_price = price;
        self.total_price = multiply(&price, self.quantity)?;

        Ok(())
    }

    /// Return the line key.
    pub fn key(&self) -> LineKey {
        self.key
    }

    /// Return the variant.
    pub fn variant(&self) -> VariantKey {
        self.variant
    }

    /// Return the quantity.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Return the currency of the line's prices.
    pub fn currency(&self) -> &'a Currency {
        self.undiscounted_unit_price.currency()
    }

    /// Listing price per unit, before any discount.
    pub fn undiscounted_unit_price(&self) -> Money<'a, Currency> {
        self.undiscounted_unit_price
    }

    /// Listing price per unit after catalogue promotions.
    pub fn discounted_unit_price(&self) -> Money<'a, Currency> {
        self.discounted_unit_price
    }

    /// Pre-tax unit price including every discount applied to the line so far.
    pub fn base_unit_price(&self) -> Money<'a, Currency> {
        self.base_unit_price
    }

    /// Unit price.
    pub fn unit_price(&self) -> Money<'a, Currency> {
        self.unit_price
    }

    /// Discount per unit.
    pub fn unit_discount(&self) -> Money<'a, Currency> {
        self.unit_discount
    }

    /// Line total.
    pub fn total_price(&self) -> Money<'a, Currency> {
        self.total_price
    }

    /// Line total before any discount.
    pub fn undiscounted_total_price(&self) -> Money<'a, Currency> {
        self.undiscounted_total_price
    }

    /// `base_unit_price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the total does not fit in minor units.
    pub fn base_total(&self) -> Result<Money<'a, Currency>, PriceError> {
        multiply(&self.base_unit_price, self.quantity)
    }

    /// Catalogue discount on the whole line:
    /// `(undiscounted_unit_price - discounted_unit_price) * quantity`.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or overflow.
    pub fn catalogue_discount_amount(&self) -> Result<Money<'a, Currency>, PriceError> {
        let unit_discount = self
            .undiscounted_unit_price
            .sub(self.discounted_unit_price)?;

        multiply(&unit_discount, self.quantity)
    }

    /// Discount records attached to the line.
    pub fn discounts(&self) -> &[DiscountRecord<'a>] {
        &self.discounts
    }

    /// Discount records attached to the line, mutably.
    pub fn discounts_mut(&mut self) -> &mut Vec<DiscountRecord<'a>> {
        &mut self.discounts
    }

    /// Catalogue rules the line qualifies for.
    pub fn rules(&self) -> &[LineRule<'a>] {
        &self.rules
    }

    /// Replace the catalogue rules the line qualifies for.
    pub fn set_rules(&mut self, rules: impl IntoIterator<Item = LineRule<'a>>) {
        self.rules = rules.into_iter().collect();
    }

    /// Take `line_discount` off the line total and recompute unit prices.
    ///
    /// The total never drops below zero; unit values are rounded half-up.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or overflow.
    pub fn apply_discount(&mut self, line_discount: Money<'a, Currency>) -> Result<(), PriceError> {
        let total = floor_at_zero(self.total_price.sub(line_discount)?);
        let unit_price = divide_half_up(&total, self.quantity)?;

        self.total_price = total;
        self.base_unit_price = unit_price;
        self.unit_price = unit_price;
        self.unit_discount = divide_half_up(&line_discount, self.quantity)?;

        Ok(())
    }
}
