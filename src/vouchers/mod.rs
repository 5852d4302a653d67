//! Vouchers
//!
//! Merchant-issued discount codes. A [`Voucher`] holds the rules (type,
//! usage limits, per-channel value and minimum spend); each [`VoucherCode`]
//! under it tracks its own usage counter and active flag.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use slotmap::new_key_type;
use thiserror::Error;

use crate::{
    channels::ChannelKey,
    discounts::{DiscountError, DiscountValue, DiscountValueType, NotApplicable},
    pricing::{PriceError, to_major},
};

pub mod store;
pub mod usage;
pub mod validation;

new_key_type! {
    /// Voucher Key
    pub struct VoucherKey;
}

new_key_type! {
    /// Voucher Code Key
    pub struct VoucherCodeKey;
}

/// Errors raised while looking up, validating or redeeming vouchers.
#[derive(Debug, Error, PartialEq)]
pub enum VoucherError {
    /// The voucher does not apply in the current context.
    #[error(transparent)]
    NotApplicable(#[from] NotApplicable),

    /// The code does not exist, is inactive, or its voucher is not active in the channel.
    #[error("promo code is invalid")]
    InvalidPromoCode,

    /// A code with the same text already exists.
    #[error("voucher code {0:?} already exists")]
    DuplicateCode(String),

    /// Voucher key not found in the store.
    #[error("voucher {0:?} not found")]
    VoucherNotFound(VoucherKey),

    /// Voucher code key not found in the store.
    #[error("voucher code {0:?} not found")]
    CodeNotFound(VoucherCodeKey),

    /// Wrapped discount calculation error.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Wrapped money helper error.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// What part of a checkout or order a voucher discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    /// The whole subtotal.
    EntireOrder,

    /// The shipping price.
    Shipping,

    /// Line prices of qualifying products.
    SpecificProduct,
}

/// Voucher settings for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherChannelListing<'a> {
    /// Amount (major units) or percentage points, depending on the voucher's value type.
    pub discount_value: Decimal,

    /// Minimum order value the voucher requires, if any.
    pub min_spent: Option<Money<'a, Currency>>,
}

/// A voucher and its redemption rules.
#[derive(Debug, Clone)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "each flag is an independent redemption rule"
)]
pub struct Voucher<'a> {
    /// Display name.
    pub name: Option<String>,

    /// What the voucher discounts.
    pub voucher_type: VoucherType,

    /// How the channel listing's discount value is interpreted.
    pub discount_value_type: DiscountValueType,

    /// Maximum uses per code, if limited.
    pub usage_limit: Option<u32>,

    /// Codes are deactivated after their first use.
    pub single_use: bool,

    /// A customer may use the voucher only once.
    pub apply_once_per_customer: bool,

    /// Specific-product vouchers discount only the cheapest qualifying item.
    pub apply_once_per_order: bool,

    /// Only staff customers may use the voucher.
    pub only_for_staff: bool,

    /// Minimum number of items the checkout must hold.
    pub min_checkout_items_quantity: Option<u32>,

    /// Start of the active window.
    pub start_date: Timestamp,

    /// End of the active window; open-ended when `None`.
    pub end_date: Option<Timestamp>,

    /// Per-channel settings. The voucher is only available in listed channels.
    pub channel_listings: FxHashMap<ChannelKey, VoucherChannelListing<'a>>,
}

impl<'a> Voucher<'a> {
    /// A voucher of the given type, active from `start_date`, with no limits and no channels.
    pub fn new(
        voucher_type: VoucherType,
        discount_value_type: DiscountValueType,
        start_date: Timestamp,
    ) -> Self {
        Self {
            name: None,
            voucher_type,
            discount_value_type,
            usage_limit: None,
            single_use: false,
            apply_once_per_customer: false,
            apply_once_per_order: false,
            only_for_staff: false,
            min_checkout_items_quantity: None,
            start_date,
            end_date: None,
            channel_listings: FxHashMap::default(),
        }
    }

    /// List the voucher in a channel.
    #[must_use]
    pub fn with_channel_listing(
        mut self,
        channel: ChannelKey,
        discount_value: Decimal,
        min_spent: Option<Money<'a, Currency>>,
    ) -> Self {
        self.channel_listings.insert(
            channel,
            VoucherChannelListing {
                discount_value,
                min_spent,
            },
        );

        self
    }

    /// Whether the voucher is listed in `channel` and `now` falls inside its active window.
    pub fn is_active_in_channel(&self, channel: ChannelKey, now: Timestamp) -> bool {
        self.start_date <= now
            && self.end_date.is_none_or(|end| end >= now)
            && self.channel_listings.contains_key(&channel)
    }

    /// The discount this voucher gives in `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`NotApplicable::ChannelNotAvailable`] if the voucher is not listed in the channel.
    pub fn discount(&self, channel: ChannelKey) -> Result<DiscountValue, NotApplicable> {
        self.channel_listings
            .get(&channel)
            .map(|listing| DiscountValue::new(listing.discount_value, self.discount_value_type))
            .ok_or(NotApplicable::ChannelNotAvailable)
    }

    /// How much the voucher takes off `price` in `channel`; never more than the price.
    ///
    /// # Errors
    ///
    /// Returns an error if the voucher is not listed in the channel or the
    /// calculation fails.
    pub fn discount_amount_for(
        &self,
        price: Money<'a, Currency>,
        channel: ChannelKey,
    ) -> Result<Money<'a, Currency>, VoucherError> {
        Ok(self.discount(channel)?.amount_off(price)?)
    }

    /// Reject totals below the channel's minimum spend.
    ///
    /// # Errors
    ///
    /// Returns [`NotApplicable::MinSpent`] when `total` is below the minimum, or
    /// [`NotApplicable::ChannelNotAvailable`] if the voucher is not listed in the channel.
    pub fn validate_min_spent(
        &self,
        total: Money<'a, Currency>,
        channel: ChannelKey,
    ) -> Result<(), NotApplicable> {
        let listing = self
            .channel_listings
            .get(&channel)
            .ok_or(NotApplicable::ChannelNotAvailable)?;

        match listing.min_spent {
            Some(min_spent)
                if min_spent.currency() == total.currency()
                    && total.to_minor_units() < min_spent.to_minor_units() =>
            {
                Err(NotApplicable::MinSpent(format!(
                    "{} {}",
                    to_major(&min_spent),
                    min_spent.currency().iso_alpha_code
                )))
            }
            _ => Ok(()),
        }
    }

    /// Reject checkouts holding fewer items than required.
    ///
    /// # Errors
    ///
    /// Returns [`NotApplicable::MinCheckoutItemsQuantity`] when `quantity` is too low.
    pub fn validate_min_checkout_items_quantity(&self, quantity: u32) -> Result<(), NotApplicable> {
        match self.min_checkout_items_quantity {
            Some(minimum) if quantity < minimum => {
                Err(NotApplicable::MinCheckoutItemsQuantity(minimum))
            }
            _ => Ok(()),
        }
    }
}

/// One redeemable code under a voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherCode {
    /// Owning voucher.
    pub voucher: VoucherKey,

    /// The code customers enter.
    pub code: String,

    /// Number of times the code has been used.
    pub used: u32,

    /// Whether the code can still be redeemed.
    pub is_active: bool,
}

impl VoucherCode {
    /// A fresh, active, unused code.
    pub fn new(voucher: VoucherKey, code: impl Into<String>) -> Self {
        Self {
            voucher,
            code: code.into(),
            used: 0,
            is_active: true,
        }
    }
}
