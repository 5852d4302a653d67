//! Voucher Fixtures

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    discounts::DiscountValueType,
    fixtures::{Fixture, FixtureError, parse_decimal, parse_price},
    vouchers::{Voucher, VoucherType},
};

/// Wrapper for vouchers in YAML
#[derive(Debug, Deserialize)]
pub struct VouchersFixture {
    /// Map of voucher key -> voucher fixture
    pub vouchers: FxHashMap<String, VoucherFixture>,
}

/// Voucher Fixture
#[derive(Debug, Deserialize)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "mirrors the voucher's independent redemption flags"
)]
pub struct VoucherFixture {
    /// Display name
    pub name: Option<String>,

    /// What the voucher discounts
    #[serde(rename = "type")]
    pub voucher_type: VoucherType,

    /// How channel discount values are interpreted
    pub discount_value_type: DiscountValueType,

    /// Start of the active window
    pub start: Timestamp,

    /// End of the active window
    pub end: Option<Timestamp>,

    /// Maximum uses per code
    pub usage_limit: Option<u32>,

    /// Codes are deactivated after their first use
    #[serde(default)]
    pub single_use: bool,

    /// A customer may use the voucher only once
    #[serde(default)]
    pub apply_once_per_customer: bool,

    /// Only the cheapest qualifying item is discounted
    #[serde(default)]
    pub apply_once_per_order: bool,

    /// Only staff customers may use the voucher
    #[serde(default)]
    pub only_for_staff: bool,

    /// Minimum number of items in the checkout
    pub min_checkout_items_quantity: Option<u32>,

    /// Channel key -> listing
    pub channels: FxHashMap<String, VoucherListingFixture>,

    /// Redeemable codes
    pub codes: Vec<String>,
}

/// Voucher Channel Listing Fixture
#[derive(Debug, Deserialize)]
pub struct VoucherListingFixture {
    /// Discount amount (major units) or percentage points
    pub discount_value: String,

    /// Minimum spend (e.g., "20.00 GBP")
    pub min_spent: Option<String>,
}

impl Fixture {
    /// Load vouchers and their codes from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if a listing
    /// refers to an unknown channel, or if a code is already taken.
    pub fn load_vouchers(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: VouchersFixture = self.read("vouchers", name)?;

        for (key, voucher_fixture) in fixture.vouchers {
            let mut voucher = Voucher::new(
                voucher_fixture.voucher_type,
                voucher_fixture.discount_value_type,
                voucher_fixture.start,
            );

            voucher.name = voucher_fixture.name;
            voucher.end_date = voucher_fixture.end;
            voucher.usage_limit = voucher_fixture.usage_limit;
            voucher.single_use = voucher_fixture.single_use;
            voucher.apply_once_per_customer = voucher_fixture.apply_once_per_customer;
            voucher.apply_once_per_order = voucher_fixture.apply_once_per_order;
            voucher.only_for_staff = voucher_fixture.only_for_staff;
            voucher.min_checkout_items_quantity = voucher_fixture.min_checkout_items_quantity;

            for (channel, listing) in voucher_fixture.channels {
                let min_spent = listing.min_spent.as_deref().map(parse_price).transpose()?;

                voucher = voucher.with_channel_listing(
                    self.channel_key(&channel)?,
                    parse_decimal(&listing.discount_value)?,
                    min_spent,
                );
            }

            let voucher_key = self.scenario.vouchers.add_voucher(voucher);

            for code in voucher_fixture.codes {
                self.scenario.vouchers.add_code(voucher_key, code)?;
            }

            self.voucher_keys.insert(key, voucher_key);
        }

        Ok(self)
    }
}
