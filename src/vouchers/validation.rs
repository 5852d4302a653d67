//! Voucher validation and product voucher discounts.

use rusty_money::{Money, iso::Currency};

use crate::{
    channels::ChannelKey,
    checkout::{Checkout, base_checkout_subtotal},
    discounts::NotApplicable,
    order::Order,
    pricing::{total_price, zero_money},
    vouchers::{Voucher, VoucherError, VoucherKey, store::VoucherStore},
};

/// The customer placing a checkout or order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    /// Email address.
    pub email: String,

    /// Whether the customer is a staff member.
    pub is_staff: bool,
}

impl Customer {
    /// A non-staff customer.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_staff: false,
        }
    }

    /// A staff customer.
    pub fn staff(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_staff: true,
        }
    }
}

/// Check every redemption rule of `voucher` against a checkout or order.
///
/// # Errors
///
/// Returns [`VoucherError::NotApplicable`] naming the first rule that fails,
/// or [`VoucherError::VoucherNotFound`].
pub fn validate_voucher<'a, S>(
    store: &S,
    voucher: VoucherKey,
    total: Money<'a, Currency>,
    quantity: u32,
    customer_email: Option<&str>,
    channel: ChannelKey,
    customer: Option<&Customer>,
) -> Result<(), VoucherError>
where
    S: VoucherStore<'a> + ?Sized,
{
    let details = store
        .voucher(voucher)
        .ok_or(VoucherError::VoucherNotFound(voucher))?;

    details.validate_min_spent(total, channel)?;
    details.validate_min_checkout_items_quantity(quantity)?;

    if details.apply_once_per_customer
        && customer_email.is_some_and(|email| store.customer_has_used_voucher(voucher, email))
    {
        return Err(NotApplicable::OncePerCustomer.into());
    }

    if details.only_for_staff && !customer.is_some_and(|customer| customer.is_staff) {
        return Err(NotApplicable::OnlyForStaff.into());
    }

    Ok(())
}

/// Validate the checkout's voucher against its base subtotal and item count.
/// A checkout without a voucher is always valid.
///
/// # Errors
///
/// See [`validate_voucher`].
pub fn validate_voucher_for_checkout<'a, S>(
    store: &S,
    checkout: &Checkout<'a>,
) -> Result<(), VoucherError>
where
    S: VoucherStore<'a> + ?Sized,
{
    let Some(voucher) = checkout.voucher else {
        return Ok(());
    };

    let subtotal = base_checkout_subtotal(checkout.lines(), checkout.currency(), true)?;

    validate_voucher(
        store,
        voucher,
        subtotal,
        checkout.quantity(),
        checkout.customer_email(),
        checkout.channel(),
        checkout.customer.as_ref(),
    )
}

/// Validate the order's voucher against its subtotal and item count.
/// An order without a voucher is always valid.
///
/// # Errors
///
/// See [`validate_voucher`].
pub fn validate_voucher_in_order<'a, S>(store: &S, order: &Order<'a>) -> Result<(), VoucherError>
where
    S: VoucherStore<'a> + ?Sized,
{
    let Some(voucher) = order.voucher else {
        return Ok(());
    };

    validate_voucher(
        store,
        voucher,
        order.subtotal,
        order.quantity(),
        order.customer_email(),
        order.channel(),
        order.customer.as_ref(),
    )
}

/// Discount a specific-product voucher gives on the qualifying unit prices.
///
/// With `apply_once_per_order` only the cheapest price is discounted;
/// otherwise every price is discounted and the amounts are summed.
///
/// # Errors
///
/// Returns an error if the voucher is not listed in the channel or the
/// calculation fails.
pub fn get_products_voucher_discount<'a>(
    voucher: &Voucher<'a>,
    prices: &[Money<'a, Currency>],
    channel: ChannelKey,
    currency: &'a Currency,
) -> Result<Money<'a, Currency>, VoucherError> {
    if voucher.apply_once_per_order {
        return match prices.iter().min_by_key(|price| price.to_minor_units()) {
            Some(cheapest) => voucher.discount_amount_for(*cheapest, channel),
            None => Ok(zero_money(currency)),
        };
    }

    let discounts = prices
        .iter()
        .map(|price| voucher.discount_amount_for(*price, channel))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(total_price(currency, discounts)?)
}
