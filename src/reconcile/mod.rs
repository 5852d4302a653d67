//! Reconciliation
//!
//! Keeps persisted discount records in step with the rules that currently
//! apply to a checkout or order. Checkouts and orders are handled through the
//! [`Discountable`] trait so the same passes run on both.

use jiff::Timestamp;
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::{
    channels::{Channel, ChannelKey},
    checkout::{Checkout, base_checkout_delivery_price, base_checkout_subtotal},
    discounts::{
        DiscountError, DiscountSummary, records::DiscountRecord, store::DiscountStore,
        store::StoreError,
    },
    lines::{Line, LineKey},
    order::{Order, base_calculations::base_order_subtotal},
    pricing::PriceError,
    promotions::{PromotionError, PromotionRuleKey, predicates::BasePrices, store::PromotionStore},
    vouchers::VoucherError,
};

pub use catalogue::{LineDiscountChanges, create_discount_objects_for_catalogue_promotions};
pub use order_promotion::create_discount_objects_for_order_promotions;

pub mod catalogue;
pub mod order_promotion;

/// Errors raised while reconciling discount records.
#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    /// Wrapped discount calculation error.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Wrapped money helper error.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapped persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Wrapped promotion registry error.
    #[error(transparent)]
    Promotion(#[from] PromotionError),

    /// Wrapped voucher error.
    #[error(transparent)]
    Voucher(#[from] VoucherError),
}

/// A checkout or order whose discounts can be reconciled.
pub trait Discountable<'a> {
    /// Channel the target belongs to.
    fn channel(&self) -> ChannelKey;

    /// Target currency.
    fn currency(&self) -> &'a Currency;

    /// Lines.
    fn lines(&self) -> &[Line<'a>];

    /// Lines, mutably.
    fn lines_mut(&mut self) -> &mut [Line<'a>];

    /// Voucher code set on the target, if any.
    fn voucher_code(&self) -> Option<&str>;

    /// Language used for translated discount names.
    fn language_code(&self) -> Option<&str>;

    /// Calculate base prices (catalogue discounts only, no vouchers).
    ///
    /// # Errors
    ///
    /// Returns an error if a price cannot be calculated.
    fn compute_base_prices(&self, channel: &Channel<'a>) -> Result<BasePrices<'a>, ReconcileError>;

    /// Stored base prices.
    fn base_prices(&self) -> BasePrices<'a>;

    /// Store base prices.
    fn set_base_prices(&mut self, prices: BasePrices<'a>);

    /// Target-level discount records.
    fn discounts(&self) -> &[DiscountRecord<'a>];

    /// Target-level discount records, mutably.
    fn discounts_mut(&mut self) -> &mut Vec<DiscountRecord<'a>>;

    /// Denormalized order-level discount, mutably.
    fn discount_summary_mut(&mut self) -> &mut DiscountSummary<'a>;

    /// Take `amount` off the line with key `line`. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or overflow.
    fn apply_discount(
        &mut self,
        line: LineKey,
        amount: Money<'a, Currency>,
    ) -> Result<(), PriceError> {
        match self.lines_mut().iter_mut().find(|candidate| candidate.key() == line) {
            Some(line) => line.apply_discount(amount),
            None => Ok(()),
        }
    }
}

impl<'a> Discountable<'a> for Checkout<'a> {
    fn channel(&self) -> ChannelKey {
        Checkout::channel(self)
    }

    fn currency(&self) -> &'a Currency {
        Checkout::currency(self)
    }

    fn lines(&self) -> &[Line<'a>] {
        Checkout::lines(self)
    }

    fn lines_mut(&mut self) -> &mut [Line<'a>] {
        Checkout::lines_mut(self)
    }

    fn voucher_code(&self) -> Option<&str> {
        self.voucher_code.as_deref()
    }

    fn language_code(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    fn compute_base_prices(&self, channel: &Channel<'a>) -> Result<BasePrices<'a>, ReconcileError> {
        let subtotal = base_checkout_subtotal(self.lines(), self.currency(), false)?;
        let delivery = base_checkout_delivery_price(self, channel, None)?;

        Ok(BasePrices {
            subtotal,
            total: subtotal.add(delivery)?,
        })
    }

    fn base_prices(&self) -> BasePrices<'a> {
        BasePrices {
            subtotal: self.base_subtotal,
            total: self.base_total,
        }
    }

    fn set_base_prices(&mut self, prices: BasePrices<'a>) {
        self.base_subtotal = prices.subtotal;
        self.base_total = prices.total;
    }

    fn discounts(&self) -> &[DiscountRecord<'a>] {
        &self.discounts
    }

    fn discounts_mut(&mut self) -> &mut Vec<DiscountRecord<'a>> {
        &mut self.discounts
    }

    fn discount_summary_mut(&mut self) -> &mut DiscountSummary<'a> {
        &mut self.discount
    }
}

impl<'a> Discountable<'a> for Order<'a> {
    fn channel(&self) -> ChannelKey {
        Order::channel(self)
    }

    fn currency(&self) -> &'a Currency {
        Order::currency(self)
    }

    fn lines(&self) -> &[Line<'a>] {
        Order::lines(self)
    }

    fn lines_mut(&mut self) -> &mut [Line<'a>] {
        Order::lines_mut(self)
    }

    fn voucher_code(&self) -> Option<&str> {
        self.voucher_code.as_deref()
    }

    fn language_code(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    fn compute_base_prices(
        &self,
        _channel: &Channel<'a>,
    ) -> Result<BasePrices<'a>, ReconcileError> {
        let subtotal = base_order_subtotal(self)?;

        Ok(BasePrices {
            subtotal,
            total: subtotal.add(self.base_shipping_price)?,
        })
    }

    fn base_prices(&self) -> BasePrices<'a> {
        BasePrices {
            subtotal: self.base_subtotal,
            total: self.base_total,
        }
    }

    fn set_base_prices(&mut self, prices: BasePrices<'a>) {
        self.base_subtotal = prices.subtotal;
        self.base_total = prices.total;
    }

    fn discounts(&self) -> &[DiscountRecord<'a>] {
        &self.discounts
    }

    fn discounts_mut(&mut self) -> &mut Vec<DiscountRecord<'a>> {
        &mut self.discounts
    }

    fn discount_summary_mut(&mut self) -> &mut DiscountSummary<'a> {
        &mut self.discount
    }
}

/// What a full reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Line-level record changes.
    pub lines: LineDiscountChanges,

    /// Winning order rule, if an order promotion applies.
    pub order_rule: Option<PromotionRuleKey>,
}

/// Sync line-level catalogue discount records, then the order promotion record.
///
/// # Errors
///
/// Returns an error if a calculation or a store operation fails.
pub fn create_or_update_discount_objects_from_promotion<'a, T, S>(
    target: &mut T,
    channel: &Channel<'a>,
    promotions: &PromotionStore,
    store: &mut S,
    now: Timestamp,
) -> Result<ReconcileReport, ReconcileError>
where
    T: Discountable<'a> + ?Sized,
    S: DiscountStore<'a> + ?Sized,
{
    let lines = create_discount_objects_for_catalogue_promotions(target, promotions, store)?;
    let order_rule =
        create_discount_objects_for_order_promotions(target, channel, promotions, store, now)?;

    Ok(ReconcileReport { lines, order_rule })
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use crate::catalogue::VariantKey;

    use super::*;

    #[test]
    fn apply_discount_targets_line_by_key() -> TestResult {
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let mut keys = slotmap::SlotMap::<LineKey, ()>::with_key();
        let first = keys.insert(());
        let second = keys.insert(());

        let mut order = Order::new(&channel)
            .with_line(Line::new(first, VariantKey::default(), 1, Money::from_minor(1000, GBP))?)
            .with_line(Line::new(second, VariantKey::default(), 1, Money::from_minor(1000, GBP))?);

        Discountable::apply_discount(&mut order, second, Money::from_minor(250, GBP))?;

        let totals: Vec<i64> = order
            .lines()
            .iter()
            .map(|line| line.total_price().to_minor_units())
            .collect();

        assert_eq!(totals, vec![1000, 750]);

        Ok(())
    }

    #[test]
    fn order_base_prices_include_shipping() -> TestResult {
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let order = Order::new(&channel)
            .with_line(Line::new(
                LineKey::default(),
                VariantKey::default(),
                2,
                Money::from_minor(1500, GBP),
            )?)
            .with_shipping_price(Money::from_minor(500, GBP));

        let prices = order.compute_base_prices(&channel)?;

        assert_eq!(prices.subtotal, Money::from_minor(3000, GBP));
        assert_eq!(prices.total, Money::from_minor(3500, GBP));

        Ok(())
    }
}
