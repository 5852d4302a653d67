//! Checkout and Order Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    channels::{Channel, ChannelKey},
    checkout::Checkout,
    discounts::{
        DiscountType, DiscountValue, DiscountValueType,
        records::{DiscountScope, NewDiscount},
        store::DiscountStore,
    },
    fixtures::{Fixture, FixtureError, parse_decimal},
    lines::Line,
    order::Order,
    pricing::zero_money,
    vouchers::{VoucherError, VoucherKey, store::VoucherStore, validation::Customer},
};

/// Wrapper for checkouts and orders in YAML
#[derive(Debug, Deserialize)]
pub struct OrdersFixture {
    /// Map of checkout key -> checkout fixture
    #[serde(default)]
    pub checkouts: FxHashMap<String, CheckoutFixture>,

    /// Map of order key -> order fixture
    #[serde(default)]
    pub orders: FxHashMap<String, OrderFixture>,
}

/// Line Fixture
#[derive(Debug, Deserialize)]
pub struct LineFixture {
    /// Variant key
    pub variant: String,

    /// Quantity
    pub quantity: u32,
}

/// Customer Fixture
#[derive(Debug, Deserialize)]
pub struct CustomerFixture {
    /// Email
    pub email: String,

    /// Staff member
    #[serde(default)]
    pub staff: bool,
}

/// Checkout Fixture
#[derive(Debug, Deserialize)]
pub struct CheckoutFixture {
    /// Channel key
    pub channel: String,

    /// Guest email
    pub email: Option<String>,

    /// Signed-in customer
    pub customer: Option<CustomerFixture>,

    /// Language for translated discount names
    pub language: Option<String>,

    /// Shipping method key
    pub shipping_method: Option<String>,

    /// Entered voucher code
    pub voucher_code: Option<String>,

    /// Lines
    pub lines: Vec<LineFixture>,
}

/// Staff-applied order discount
#[derive(Debug, Deserialize)]
pub struct ManualDiscountFixture {
    /// How `value` is interpreted
    pub value_type: DiscountValueType,

    /// Amount (major units) or percentage points
    pub value: String,

    /// Reason shown to staff
    pub reason: Option<String>,
}

/// Order Fixture
#[derive(Debug, Deserialize)]
pub struct OrderFixture {
    /// Channel key
    pub channel: String,

    /// Guest email
    pub email: Option<String>,

    /// Customer who placed the order
    pub customer: Option<CustomerFixture>,

    /// Language for translated discount names
    pub language: Option<String>,

    /// Shipping method key
    pub shipping_method: Option<String>,

    /// Voucher code the order was placed with
    pub voucher_code: Option<String>,

    /// Staff-applied discount
    pub manual_discount: Option<ManualDiscountFixture>,

    /// Lines
    pub lines: Vec<LineFixture>,
}

impl From<CustomerFixture> for Customer {
    fn from(fixture: CustomerFixture) -> Self {
        if fixture.staff {
            Customer::staff(fixture.email)
        } else {
            Customer::new(fixture.email)
        }
    }
}

impl Fixture {
    /// Load checkouts and orders from a YAML fixture file. Both are kept in
    /// key order.
    ///
    /// Order vouchers and manual discounts become order-level discount
    /// records with a zero amount, filled in when the order's discounts are
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// referenced channel, shipping method, variant or voucher code doesn't
    /// exist.
    pub fn load_orders(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: OrdersFixture = self.read("orders", name)?;

        let mut checkouts: Vec<(String, CheckoutFixture)> = fixture.checkouts.into_iter().collect();
        let mut orders: Vec<(String, OrderFixture)> = fixture.orders.into_iter().collect();

        checkouts.sort_by(|(a, _), (b, _)| a.cmp(b));
        orders.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (key, checkout_fixture) in checkouts {
            let checkout = self.build_checkout(checkout_fixture)?;

            self.scenario.checkouts.push((key, checkout));
        }

        for (key, order_fixture) in orders {
            let order = self.build_order(order_fixture)?;

            self.scenario.orders.push((key, order));
        }

        Ok(self)
    }

    fn build_checkout(
        &mut self,
        fixture: CheckoutFixture,
    ) -> Result<Checkout<'static>, FixtureError> {
        let channel = self.channel(&fixture.channel)?;
        let mut checkout = Checkout::new(&channel);

        for line in &fixture.lines {
            checkout = checkout.with_line(self.build_line(&channel, &fixture.channel, line)?);
        }

        checkout.email = fixture.email;
        checkout.customer = fixture.customer.map(Customer::from);
        checkout.language_code = fixture.language;
        checkout.shipping_method = fixture
            .shipping_method
            .map(|method| {
                self.shipping_method_keys
                    .get(&method)
                    .copied()
                    .ok_or(FixtureError::ShippingMethodNotFound(method))
            })
            .transpose()?;

        if let Some(code) = fixture.voucher_code {
            checkout.voucher = Some(self.voucher_for_code(&code)?);
            checkout.voucher_code = Some(code);
        }

        Ok(checkout)
    }

    fn build_order(&mut self, fixture: OrderFixture) -> Result<Order<'static>, FixtureError> {
        let channel = self.channel(&fixture.channel)?;
        let mut order = Order::new(&channel);

        for line in &fixture.lines {
            order = order.with_line(self.build_line(&channel, &fixture.channel, line)?);
        }

        if let Some(method) = fixture.shipping_method {
            let method_key = self
                .shipping_method_keys
                .get(&method)
                .copied()
                .ok_or_else(|| FixtureError::ShippingMethodNotFound(method.clone()))?;

            let price = channel
                .shipping_price(method_key)
                .ok_or(FixtureError::ShippingMethodNotFound(method))?;

            order = order.with_shipping_price(price);
        }

        order.email = fixture.email;
        order.customer = fixture.customer.map(Customer::from);
        order.language_code = fixture.language;

        let mut new_discounts = Vec::new();
        let zero = zero_money(channel.currency());

        if let Some(code) = fixture.voucher_code {
            let voucher_key = self.voucher_for_code(&code)?;
            let value = self
                .scenario
                .vouchers
                .voucher(voucher_key)
                .ok_or(VoucherError::VoucherNotFound(voucher_key))?
                .discount(channel.key())
                .map_err(VoucherError::from)?;

            new_discounts.push(
                NewDiscount::new(DiscountScope::Order, DiscountType::Voucher, value, zero)
                    .with_voucher(voucher_key, code.clone()),
            );

            order.voucher = Some(voucher_key);
            order.voucher_code = Some(code);
        }

        if let Some(manual) = fixture.manual_discount {
            let value = DiscountValue::new(parse_decimal(&manual.value)?, manual.value_type);
            let mut discount =
                NewDiscount::new(DiscountScope::Order, DiscountType::Manual, value, zero)
                    .with_name("Manual discount");

            if let Some(reason) = manual.reason {
                discount = discount.with_reason(reason);
            }

            new_discounts.push(discount);
        }

        if !new_discounts.is_empty() {
            order.discounts = self.scenario.discounts.bulk_create(new_discounts)?;
        }

        Ok(order)
    }

    fn channel(&self, key: &str) -> Result<Channel<'static>, FixtureError> {
        let channel_key: ChannelKey = self.channel_key(key)?;

        self.scenario
            .channels
            .get(channel_key)
            .cloned()
            .ok_or_else(|| FixtureError::ChannelNotFound(key.to_string()))
    }

    fn build_line(
        &mut self,
        channel: &Channel<'static>,
        channel_name: &str,
        fixture: &LineFixture,
    ) -> Result<Line<'static>, FixtureError> {
        let variant = self.variant_key(&fixture.variant)?;

        let price = self
            .scenario
            .catalogue
            .variant(variant)
            .and_then(|listed| listed.price(channel.key()))
            .ok_or_else(|| FixtureError::MissingPrice {
                variant: fixture.variant.clone(),
                channel: channel_name.to_string(),
            })?;

        let key = self.scenario.line_keys.insert(());

        Ok(Line::new(key, variant, fixture.quantity, price)?)
    }

    fn voucher_for_code(&self, code: &str) -> Result<VoucherKey, FixtureError> {
        self.scenario
            .vouchers
            .find_code(code)
            .and_then(|code_key| self.scenario.vouchers.code(code_key))
            .map(|voucher_code| voucher_code.voucher)
            .ok_or_else(|| FixtureError::VoucherCodeNotFound(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::{Money, iso::GBP};
    use tempfile::TempDir;
    use testresult::TestResult;

    use crate::fixtures::tests::write_fixture;

    use super::*;

    fn shop(dir: &TempDir, orders: &str) -> TestResult {
        write_fixture(
            dir.path(),
            "channels",
            "shop",
            "channels:\n  uk:\n    currency: GBP\n    shipping_methods:\n      standard: 4.99 GBP\n",
        )?;
        write_fixture(
            dir.path(),
            "catalogue",
            "shop",
            "products:\n  hat:\n    name: Hat\n    variants:\n      hat-one:\n        name: One size\n        \
             prices:\n          uk: 15.00 GBP\n",
        )?;
        write_fixture(
            dir.path(),
            "vouchers",
            "shop",
            "vouchers:\n  ship:\n    type: shipping\n    discount_value_type: percentage\n    \
             start: 2026-01-01T00:00:00Z\n    channels:\n      uk:\n        discount_value: \"100\"\n    \
             codes: [FREESHIP]\n",
        )?;
        write_fixture(dir.path(), "orders", "shop", orders)?;

        Ok(())
    }

    fn load(dir: &TempDir) -> Result<Fixture, FixtureError> {
        let mut fixture = Fixture::with_base_path(dir.path());

        fixture
            .load_channels("shop")?
            .load_catalogue("shop")?
            .load_vouchers("shop")?
            .load_orders("shop")?;

        Ok(fixture)
    }

    #[test]
    fn checkouts_are_loaded_in_key_order() -> TestResult {
        let dir = TempDir::new()?;

        shop(
            &dir,
            "checkouts:\n  b:\n    channel: uk\n    lines:\n      - variant: hat-one\n        quantity: 1\n  \
             a:\n    channel: uk\n    shipping_method: standard\n    voucher_code: FREESHIP\n    \
             customer:\n      email: ada@example.com\n    lines:\n      - variant: hat-one\n        quantity: 2\n",
        )?;

        let fixture = load(&dir)?;
        let checkouts = &fixture.scenario().checkouts;
        let names: Vec<&str> = checkouts.iter().map(|(name, _)| name.as_str()).collect();

        assert_eq!(names, vec!["a", "b"]);

        let (_, first) = checkouts.first().ok_or("missing checkout")?;

        assert_eq!(first.voucher, Some(fixture.voucher_key("ship")?));
        assert_eq!(first.voucher_code.as_deref(), Some("FREESHIP"));
        assert_eq!(first.customer_email(), Some("ada@example.com"));
        assert_eq!(first.quantity(), 2);
        assert!(first.shipping_method.is_some());

        Ok(())
    }

    #[test]
    fn order_discounts_become_records() -> TestResult {
        let dir = TempDir::new()?;

        shop(
            &dir,
            "orders:\n  phone:\n    channel: uk\n    shipping_method: standard\n    voucher_code: FREESHIP\n    \
             manual_discount:\n      value_type: fixed\n      value: \"2.50\"\n      reason: Loyal customer\n    \
             lines:\n      - variant: hat-one\n        quantity: 1\n",
        )?;

        let fixture = load(&dir)?;
        let (_, order) = fixture.scenario().orders.first().ok_or("missing order")?;

        assert_eq!(order.base_shipping_price, Money::from_minor(499, GBP));

        let kinds: Vec<DiscountType> = order
            .discounts
            .iter()
            .map(|record| record.discount_type)
            .collect();

        assert_eq!(kinds, vec![DiscountType::Voucher, DiscountType::Manual]);

        let manual = order.discounts.last().ok_or("missing manual discount")?;

        assert_eq!(manual.value, Decimal::new(250, 2));
        assert_eq!(manual.reason.as_deref(), Some("Loyal customer"));
        assert_eq!(fixture.scenario().discounts.len(), 2);

        Ok(())
    }

    #[test]
    fn unlisted_variant_is_rejected() -> TestResult {
        let dir = TempDir::new()?;

        write_fixture(
            dir.path(),
            "channels",
            "shop",
            "channels:\n  uk:\n    currency: GBP\n  us:\n    currency: USD\n",
        )?;
        write_fixture(
            dir.path(),
            "catalogue",
            "shop",
            "products:\n  hat:\n    name: Hat\n    variants:\n      hat-one:\n        name: One size\n        \
             prices:\n          uk: 15.00 GBP\n",
        )?;
        write_fixture(
            dir.path(),
            "orders",
            "shop",
            "checkouts:\n  c:\n    channel: us\n    lines:\n      - variant: hat-one\n        quantity: 1\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());

        fixture.load_channels("shop")?.load_catalogue("shop")?;

        let result = fixture.load_orders("shop");

        assert!(matches!(result, Err(FixtureError::MissingPrice { .. })));

        Ok(())
    }

    #[test]
    fn unknown_voucher_code_is_rejected() -> TestResult {
        let dir = TempDir::new()?;

        shop(
            &dir,
            "checkouts:\n  c:\n    channel: uk\n    voucher_code: NOPE\n    lines: []\n",
        )?;

        let result = load(&dir);

        assert!(matches!(result, Err(FixtureError::VoucherCodeNotFound(_))));

        Ok(())
    }
}
