//! Scenario
//!
//! Everything a fixture set loads, and the reconciliation pass the binary runs
//! over it. Checkouts get catalogue prices, voucher validation and promotion
//! records; orders additionally get their order-level discounts applied.

use std::iter;

use jiff::Timestamp;
use rusty_money::{Money, MoneyError, iso::Currency};
use slotmap::SlotMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    catalogue::Catalogue,
    channels::{Channel, ChannelKey, ShippingMethodKey},
    checkout::{Checkout, base_checkout_delivery_price},
    discounts::{
        DiscountError, DiscountSummary, DiscountType,
        store::InMemoryDiscountStore,
    },
    lines::LineKey,
    order::{Order, OrderError, base_calculations::apply_order_discounts},
    pricing::PriceError,
    promotions::{listings::apply_catalogue_promotions, store::PromotionStore},
    reconcile::{ReconcileError, ReconcileReport, create_or_update_discount_objects_from_promotion},
    vouchers::{
        Voucher, VoucherError, VoucherType,
        store::{InMemoryVoucherStore, VoucherStore},
        usage::get_voucher_code_instance,
        validation::{
            get_products_voucher_discount, validate_voucher_for_checkout, validate_voucher_in_order,
        },
    },
};

/// Errors raised while reconciling a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A checkout or order refers to a channel that was never loaded.
    #[error("channel {0:?} not found")]
    UnknownChannel(ChannelKey),

    /// Wrapped reconciliation error.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Wrapped order calculation error.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Wrapped discount calculation error.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Wrapped voucher error.
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// Wrapped money helper error.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Loaded channels, catalogue, stores, checkouts and orders.
#[derive(Debug, Default)]
pub struct Scenario {
    /// Sales channels.
    pub channels: SlotMap<ChannelKey, Channel<'static>>,

    /// Shipping method names.
    pub shipping_methods: SlotMap<ShippingMethodKey, String>,

    /// Products and variants.
    pub catalogue: Catalogue<'static>,

    /// Promotions and their rules.
    pub promotions: PromotionStore,

    /// Vouchers, codes and usage.
    pub vouchers: InMemoryVoucherStore<'static>,

    /// Persisted discount records.
    pub discounts: InMemoryDiscountStore<'static>,

    /// Allocated line keys.
    pub line_keys: SlotMap<LineKey, ()>,

    /// Named checkouts.
    pub checkouts: Vec<(String, Checkout<'static>)>,

    /// Named orders.
    pub orders: Vec<(String, Order<'static>)>,
}

impl Scenario {
    /// Reconcile every checkout and order at `now`.
    ///
    /// Checkout vouchers whose code is invalid or whose rules no longer hold
    /// are removed with a warning. Order vouchers are kept; a failed rule is
    /// only reported.
    ///
    /// # Errors
    ///
    /// Returns an error if a calculation or a store operation fails.
    #[tracing::instrument(
        name = "scenario.reconcile",
        skip(self),
        fields(checkouts = self.checkouts.len(), orders = self.orders.len()),
        err
    )]
    pub fn reconcile(&mut self, now: Timestamp) -> Result<(), ScenarioError> {
        for (name, checkout) in &mut self.checkouts {
            let channel = self
                .channels
                .get(checkout.channel())
                .ok_or(ScenarioError::UnknownChannel(checkout.channel()))?;

            let report = reconcile_checkout(
                checkout,
                channel,
                &self.promotions,
                &self.vouchers,
                &mut self.discounts,
                now,
            )?;

            info!(
                checkout = %name,
                created = report.lines.created,
                updated = report.lines.updated,
                deleted = report.lines.deleted,
                discount = checkout.discount.amount.to_minor_units(),
                "reconciled checkout"
            );
        }

        for (name, order) in &mut self.orders {
            let channel = self
                .channels
                .get(order.channel())
                .ok_or(ScenarioError::UnknownChannel(order.channel()))?;

            let report = reconcile_order(
                order,
                channel,
                &self.promotions,
                &self.vouchers,
                &mut self.discounts,
                now,
            )?;

            info!(
                order = %name,
                created = report.lines.created,
                updated = report.lines.updated,
                deleted = report.lines.deleted,
                total = order.total.to_minor_units(),
                "reconciled order"
            );
        }

        Ok(())
    }

    /// Look up a checkout by name.
    pub fn checkout(&self, name: &str) -> Option<&Checkout<'static>> {
        self.checkouts
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, checkout)| checkout)
    }

    /// Look up an order by name.
    pub fn order(&self, name: &str) -> Option<&Order<'static>> {
        self.orders
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, order)| order)
    }
}

fn reconcile_checkout<'a>(
    checkout: &mut Checkout<'a>,
    channel: &Channel<'a>,
    promotions: &PromotionStore,
    vouchers: &InMemoryVoucherStore<'a>,
    discounts: &mut InMemoryDiscountStore<'a>,
    now: Timestamp,
) -> Result<ReconcileReport, ScenarioError> {
    apply_catalogue_promotions(promotions, checkout.lines_mut(), channel.key(), now)?;
    drop_invalid_voucher(checkout, vouchers, now)?;

    let report = create_or_update_discount_objects_from_promotion(
        checkout,
        channel,
        promotions,
        discounts,
        now,
    )?;

    if let Some(key) = checkout.voucher {
        let voucher = vouchers.voucher(key).ok_or(VoucherError::VoucherNotFound(key))?;

        checkout.discount = DiscountSummary {
            amount: checkout_voucher_amount(checkout, channel, voucher)?,
            name: voucher.name.clone(),
            translated_name: None,
        };
    }

    Ok(report)
}

fn drop_invalid_voucher<'a>(
    checkout: &mut Checkout<'a>,
    vouchers: &InMemoryVoucherStore<'a>,
    now: Timestamp,
) -> Result<(), VoucherError> {
    let Some(code) = checkout.voucher_code.as_deref() else {
        return Ok(());
    };

    let result = get_voucher_code_instance(vouchers, code, checkout.channel(), now)
        .and_then(|_code| validate_voucher_for_checkout(vouchers, checkout));

    match result {
        Ok(()) => Ok(()),
        Err(error @ (VoucherError::InvalidPromoCode | VoucherError::NotApplicable(_))) => {
            warn!(code, %error, "removing voucher from checkout");

            checkout.voucher = None;
            checkout.voucher_code = None;

            Ok(())
        }
        Err(error) => Err(error),
    }
}

fn checkout_voucher_amount<'a>(
    checkout: &Checkout<'a>,
    channel: &Channel<'a>,
    voucher: &Voucher<'a>,
) -> Result<Money<'a, Currency>, VoucherError> {
    match voucher.voucher_type {
        VoucherType::EntireOrder => {
            voucher.discount_amount_for(checkout.base_subtotal, channel.key())
        }
        VoucherType::Shipping => {
            let full = base_checkout_delivery_price(checkout, channel, None)?;
            let discounted = base_checkout_delivery_price(checkout, channel, Some(voucher))?;

            Ok(full.sub(discounted).map_err(PriceError::from)?)
        }
        VoucherType::SpecificProduct => {
            let unit_prices: Vec<Money<'a, Currency>> = checkout
                .lines()
                .iter()
                .flat_map(|line| {
                    iter::repeat_n(
                        line.base_unit_price(),
                        usize::try_from(line.quantity()).unwrap_or_default(),
                    )
                })
                .collect();

            get_products_voucher_discount(voucher, &unit_prices, channel.key(), checkout.currency())
        }
    }
}

fn reconcile_order<'a>(
    order: &mut Order<'a>,
    channel: &Channel<'a>,
    promotions: &PromotionStore,
    vouchers: &InMemoryVoucherStore<'a>,
    discounts: &mut InMemoryDiscountStore<'a>,
    now: Timestamp,
) -> Result<ReconcileReport, ScenarioError> {
    apply_catalogue_promotions(promotions, order.lines_mut(), channel.key(), now)?;

    let report = create_or_update_discount_objects_from_promotion(
        order,
        channel,
        promotions,
        discounts,
        now,
    )?;

    apply_order_discounts(order, discounts, vouchers, true)?;

    match validate_voucher_in_order(vouchers, order) {
        Ok(()) => {}
        Err(VoucherError::NotApplicable(reason)) => {
            warn!(code = order.voucher_code.as_deref(), %reason, "order voucher no longer applies");
        }
        Err(error) => return Err(error.into()),
    }

    let voucher_summary = order
        .discounts
        .iter()
        .find(|record| record.discount_type == DiscountType::Voucher)
        .map(|record| DiscountSummary {
            amount: record.amount,
            name: record
                .voucher
                .and_then(|key| vouchers.voucher(key))
                .and_then(|voucher| voucher.name.clone()),
            translated_name: None,
        });

    if let Some(summary) = voucher_summary {
        order.discount = summary;
    }

    Ok(report)
}
