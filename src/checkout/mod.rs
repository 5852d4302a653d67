//! Checkouts

use rusty_money::{Money, iso::Currency};

use crate::{
    channels::{Channel, ChannelKey, ShippingMethodKey},
    discounts::{DiscountSummary, records::DiscountRecord},
    lines::Line,
    pricing::zero_money,
    vouchers::{VoucherKey, validation::Customer},
};

pub use base_calculations::{base_checkout_delivery_price, base_checkout_subtotal};

pub mod base_calculations;

/// A checkout in progress.
#[derive(Debug, Clone)]
pub struct Checkout<'a> {
    channel: ChannelKey,
    currency: &'a Currency,
    lines: Vec<Line<'a>>,

    /// Voucher applied with `voucher_code`.
    pub voucher: Option<VoucherKey>,

    /// Code the customer entered.
    pub voucher_code: Option<String>,

    /// Selected shipping method.
    pub shipping_method: Option<ShippingMethodKey>,

    /// Whether any line needs shipping.
    pub is_shipping_required: bool,

    /// Guest email.
    pub email: Option<String>,

    /// Signed-in customer.
    pub customer: Option<Customer>,

    /// Language used for translated discount names.
    pub language_code: Option<String>,

    /// Subtotal with catalogue discounts only.
    pub base_subtotal: Money<'a, Currency>,

    /// Subtotal plus delivery, with catalogue discounts only.
    pub base_total: Money<'a, Currency>,

    /// Order-level discount shown on the checkout.
    pub discount: DiscountSummary<'a>,

    /// Checkout-level discount records.
    pub discounts: Vec<DiscountRecord<'a>>,
}

impl<'a> Checkout<'a> {
    /// An empty checkout in `channel`.
    pub fn new(channel: &Channel<'a>) -> Self {
        let currency = channel.currency();

        Self {
            channel: channel.key(),
            currency,
            lines: Vec::new(),
            voucher: None,
            voucher_code: None,
            shipping_method: None,
            is_shipping_required: true,
            email: None,
            customer: None,
            language_code: None,
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

    /// Channel the checkout belongs to.
    pub fn channel(&self) -> ChannelKey {
        self.channel
    }

    /// Checkout currency.
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
