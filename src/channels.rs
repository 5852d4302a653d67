//! Channels

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;

new_key_type! {
    /// Channel Key
    pub struct ChannelKey;
}

new_key_type! {
    /// Shipping Method Key
    pub struct ShippingMethodKey;
}

/// A sales channel with its own currency and shipping prices.
#[derive(Debug, Clone)]
pub struct Channel<'a> {
    key: ChannelKey,
    slug: String,
    currency: &'a Currency,
    shipping_method_listings: FxHashMap<ShippingMethodKey, Money<'a, Currency>>,
}

impl<'a> Channel<'a> {
    /// Create a channel with no shipping methods.
    pub fn new(key: ChannelKey, slug: impl Into<String>, currency: &'a Currency) -> Self {
        Self {
            key,
            slug: slug.into(),
            currency,
            shipping_method_listings: FxHashMap::default(),
        }
    }

    /// List a shipping method in this channel at the given price.
    #[must_use]
    pub fn with_shipping_method(
        mut self,
        method: ShippingMethodKey,
        price: Money<'a, Currency>,
    ) -> Self {
        self.shipping_method_listings.insert(method, price);
        self
    }

    /// Return the channel key.
    pub fn key(&self) -> ChannelKey {
        self.key
    }

    /// Return the channel slug.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Return the channel currency.
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Price of a shipping method, if it is listed in this channel.
    pub fn shipping_price(&self, method: ShippingMethodKey) -> Option<Money<'a, Currency>> {
        self.shipping_method_listings.get(&method).copied()
    }
}
