//! Fixtures
//!
//! YAML scenario sets under `<base>/<kind>/<set>.yml`, one file per kind:
//! `channels`, `catalogue`, `promotions`, `vouchers` and `orders`. Later kinds
//! refer to earlier ones by their YAML keys.

use std::{fs, path::PathBuf, str::FromStr};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, JPY, USD},
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    catalogue::{CategoryKey, CollectionKey, ProductKey, VariantKey},
    channels::{ChannelKey, ShippingMethodKey},
    discounts::store::StoreError,
    pricing::{PriceError, quantize_price},
    promotions::{PromotionError, PromotionKey},
    scenario::Scenario,
    vouchers::{VoucherError, VoucherKey},
};

pub mod catalogue;
pub mod channels;
pub mod orders;
pub mod promotions;
pub mod vouchers;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid decimal value
    #[error("Invalid decimal value: {0}")]
    InvalidDecimal(String),

    /// Invalid promotion id
    #[error("Invalid promotion id: {0}")]
    InvalidId(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Channel not found
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Shipping method not found
    #[error("Shipping method not found: {0}")]
    ShippingMethodNotFound(String),

    /// Category not found
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Collection not found
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant not found
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    /// Variant has no price in the channel
    #[error("Variant {variant} is not listed in channel {channel}")]
    MissingPrice {
        /// Variant key in the fixture
        variant: String,
        /// Channel key in the fixture
        channel: String,
    },

    /// Promotion not found
    #[error("Promotion not found: {0}")]
    PromotionNotFound(String),

    /// Voucher not found
    #[error("Voucher not found: {0}")]
    VoucherNotFound(String),

    /// Voucher code not found
    #[error("Voucher code not found: {0}")]
    VoucherCodeNotFound(String),

    /// Currency mismatch between a price and its channel
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// Wrapped money helper error
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Wrapped promotion registry error
    #[error(transparent)]
    Promotion(#[from] PromotionError),

    /// Wrapped voucher error
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// Wrapped discount store error
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Everything loaded so far
    scenario: Scenario,

    /// YAML key -> `SlotMap` key mappings for lookups
    channel_keys: FxHashMap<String, ChannelKey>,
    shipping_method_keys: FxHashMap<String, ShippingMethodKey>,
    category_keys: FxHashMap<String, CategoryKey>,
    collection_keys: FxHashMap<String, CollectionKey>,
    product_keys: FxHashMap<String, ProductKey>,
    variant_keys: FxHashMap<String, VariantKey>,
    promotion_keys: FxHashMap<String, PromotionKey>,
    voucher_keys: FxHashMap<String, VoucherKey>,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            scenario: Scenario::default(),
            channel_keys: FxHashMap::default(),
            shipping_method_keys: FxHashMap::default(),
            category_keys: FxHashMap::default(),
            collection_keys: FxHashMap::default(),
            product_keys: FxHashMap::default(),
            variant_keys: FxHashMap::default(),
            promotion_keys: FxHashMap::default(),
            voucher_keys: FxHashMap::default(),
        }
    }

    /// Load a complete fixture set (every kind with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::with_base_path("./fixtures").load_set(name)
    }

    /// Load every kind of the named set from this fixture's base path
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn load_set(mut self, name: &str) -> Result<Self, FixtureError> {
        self.load_channels(name)?
            .load_catalogue(name)?
            .load_promotions(name)?
            .load_vouchers(name)?
            .load_orders(name)?;

        Ok(self)
    }

    /// Loaded state.
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Hand over the loaded state.
    pub fn into_scenario(self) -> Scenario {
        self.scenario
    }

    /// Get a channel key by its YAML key
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is not found.
    pub fn channel_key(&self, key: &str) -> Result<ChannelKey, FixtureError> {
        self.channel_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::ChannelNotFound(key.to_string()))
    }

    /// Get a variant key by its YAML key
    ///
    /// # Errors
    ///
    /// Returns an error if the variant is not found.
    pub fn variant_key(&self, key: &str) -> Result<VariantKey, FixtureError> {
        self.variant_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::VariantNotFound(key.to_string()))
    }

    /// Get a promotion key by its YAML key
    ///
    /// # Errors
    ///
    /// Returns an error if the promotion is not found.
    pub fn promotion_key(&self, key: &str) -> Result<PromotionKey, FixtureError> {
        self.promotion_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::PromotionNotFound(key.to_string()))
    }

    /// Get a voucher key by its YAML key
    ///
    /// # Errors
    ///
    /// Returns an error if the voucher is not found.
    pub fn voucher_key(&self, key: &str) -> Result<VoucherKey, FixtureError> {
        self.voucher_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::VoucherNotFound(key.to_string()))
    }

    fn read<T: DeserializeOwned>(&self, kind: &str, name: &str) -> Result<T, FixtureError> {
        let file_path = self.base_path.join(kind).join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;

        Ok(serde_norway::from_str(&contents)?)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse price string (e.g., "2.99 GBP") into money, rounding half-up to the
/// currency's minor unit
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY", if
/// the amount is not a decimal number, or if the currency code is not
/// recognized.
pub fn parse_price(s: &str) -> Result<Money<'static, Currency>, FixtureError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(currency_code), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount =
        Decimal::from_str(amount).map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    Ok(quantize_price(amount, parse_currency(currency_code)?)?)
}

/// Parse a currency code.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownCurrency`] for unsupported codes.
pub fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    match code {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        "JPY" => Ok(JPY),
        other => Err(FixtureError::UnknownCurrency(other.to_string())),
    }
}

/// Parse a decimal string (e.g. `"12.50"` or `"10"`).
///
/// # Errors
///
/// Returns [`FixtureError::InvalidDecimal`] if the string is not a decimal number.
pub fn parse_decimal(s: &str) -> Result<Decimal, FixtureError> {
    Decimal::from_str(s.trim()).map_err(|_err| FixtureError::InvalidDecimal(s.to_string()))
}
