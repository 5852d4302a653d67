//! Orders

use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::{
    channels::{Channel, ChannelKey},
    discounts::{DiscountError, DiscountSummary, records::DiscountRecord, store::StoreError},
    lines::Line,
    pricing::{PriceError, zero_money},
    vouchers::{VoucherKey, validation::Customer},
};

pub mod base_calculations;

/// Errors raised while pricing an order.
#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
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
}

/// A placed or draft order.
#[derive(Debug, Clone)]
pub struct Order<'a> {
    channel: ChannelKey,
    currency: &'a Currency,
    lines: Vec<Line<'a>>,

    /// Voucher applied to the order.
    pub voucher: Option<VoucherKey>,

    /// Code the voucher was applied with.
    pub voucher_code: Option<String>,

    /// Guest email.
    pub email: Option<String>,

    /// Customer who placed the order.
    pub customer: Option<Customer>,

    /// Language used for translated discount names.
    pub language_code: Option<String>,

    /// Shipping price before order-level discounts.
    pub base_shipping_price: Money<'a, Currency>,

    /// Shipping price after order-level discounts.
    pub shipping_price: Money<'a, Currency>,

    /// Subtotal after order-level discounts.
    pub subtotal: Money<'a, Currency>,

    /// Subtotal plus shipping after order-level discounts.
    pub total: Money<'a, Currency>,

    /// Subtotal with catalogue discounts only.
    pub base_subtotal: Money<'a, Currency>,

    /// Base subtotal plus base shipping.
    pub base_total: Money<'a, Currency>,

    /// Order-level discount shown on the order.
    pub discount: DiscountSummary<'a>,

    /// Order-level discount records.
    pub discounts: Vec<DiscountRecord<'a>>,
}

impl<'a> Order<'a> {
    /// An empty order in `channel` with free shipping.
    pub fn new(channel: &Channel<'a>) -> Self {
        let currency = channel.currency();

        Self {
            channel: channel.key(),
            currency,
            lines: Vec::new(),
            voucher: None,
            voucher_code: None,
            email: None,
            customer: None,
            language_code: None,
            base_shipping_price: zero_money(currency),
            shipping_price: zero_money(currency),
            subtotal: zero_money(currency),
            total: zero_money(currency),
            base_subtotal: zero_money(currency),
            base_total: zero_money(currency),
            discount: DiscountSummary::none(currency),
            discounts: Vec::new(),
        }
    }

    /// Add a line.
    #[must_use]
    pub fn with_line(mut self, line: Line<'a>) -> Self {
        self.lines.push(line);
        self
    }

    /// Set the shipping price.
    #[must_use]
    pub fn with_shipping_price(mut self, price: Money<'a, Currency>) -> Self {
        self.base_shipping_price = price;
        self.shipping_price = price;
        self
    }

    /// Channel the order belongs to.
    pub fn channel(&self) -> ChannelKey {
        self.channel
    }

    /// Order currency.
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Lines.
    pub fn lines(&self) -> &[Line<'a>] {
        &self.lines
    }

    /// Lines, mutably.
    pub fn lines_mut(&mut self) -> &mut [Line<'a>] {
        &mut self.lines
    }

    /// Total number of items.
    pub fn quantity(&self) -> u32 {
        self.lines.iter().map(Line::quantity).sum()
    }

    /// Customer email, falling back to the guest email.
    pub fn customer_email(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .map(|customer| customer.email.as_str())
            .or(self.email.as_deref())
    }
}
