//! Voucher usage tracking: redeeming and releasing codes, and code lookup.

use jiff::Timestamp;
use tracing::{Span, debug, field};

use crate::{
    channels::ChannelKey,
    discounts::NotApplicable,
    vouchers::{VoucherCodeKey, VoucherError, VoucherKey, store::VoucherStore},
};

/// Record one use of `code`.
///
/// - With a usage limit, the code's counter is increased (refused once the limit is met).
/// - With `apply_once_per_customer` and `track_customer`, a usage row is added
///   for `customer_email`; an existing row fails with
///   [`NotApplicable::OncePerCustomer`] and the counter increase is undone.
/// - A single-use code is deactivated.
///
/// # Errors
///
/// Returns [`VoucherError::NotApplicable`] when the limit is reached or the
/// customer already used the code, and lookup errors for unknown keys.
#[tracing::instrument(
    name = "vouchers.increase_usage",
    skip(store, customer_email),
    fields(used = field::Empty),
    err
)]
pub fn increase_voucher_usage<'a, S>(
    store: &mut S,
    voucher: VoucherKey,
    code: VoucherCodeKey,
    customer_email: &str,
    track_customer: bool,
) -> Result<(), VoucherError>
where
    S: VoucherStore<'a> + ?Sized,
{
    let (usage_limit, once_per_customer, single_use) = store
        .voucher(voucher)
        .map(|voucher| {
            (
                voucher.usage_limit,
                voucher.apply_once_per_customer,
                voucher.single_use,
            )
        })
        .ok_or(VoucherError::VoucherNotFound(voucher))?;

    let incremented = match usage_limit {
        Some(limit) if limit > 0 => {
            let used = store.increment_code_usage(code, Some(limit))?;

            Span::current().record("used", used);

            true
        }
        _ => false,
    };

    if once_per_customer && track_customer && !store.add_customer_usage(code, customer_email)? {
        if incremented {
            store.decrement_code_usage(code)?;
        }

        return Err(NotApplicable::OncePerCustomer.into());
    }

    if single_use {
        store.set_code_active(code, false)?;
    }

    debug!("voucher usage increased");

    Ok(())
}

/// Undo [`increase_voucher_usage`]. Does nothing when `code` is `None`.
///
/// # Errors
///
/// Returns lookup errors for unknown keys.
#[tracing::instrument(name = "vouchers.release_usage", skip(store, customer_email), err)]
pub fn release_voucher_code_usage<'a, S>(
    store: &mut S,
    code: Option<VoucherCodeKey>,
    voucher: Option<VoucherKey>,
    customer_email: Option<&str>,
) -> Result<(), VoucherError>
where
    S: VoucherStore<'a> + ?Sized,
{
    let Some(code) = code else {
        return Ok(());
    };

    let flags = voucher
        .map(|key| {
            store
                .voucher(key)
                .map(|voucher| (voucher.usage_limit, voucher.single_use))
                .ok_or(VoucherError::VoucherNotFound(key))
        })
        .transpose()?;

    if let Some((usage_limit, single_use)) = flags {
        if usage_limit.is_some_and(|limit| limit > 0) {
            store.decrement_code_usage(code)?;
        }

        if single_use {
            store.set_code_active(code, true)?;
        }
    }

    if let Some(email) = customer_email {
        store.remove_customer_usage(code, email);
    }

    debug!("voucher usage released");

    Ok(())
}

/// Resolve a code entered by a customer.
///
/// The code must exist and be active, and its voucher must be active in
/// `channel` at `now`.
///
/// # Errors
///
/// Returns [`VoucherError::InvalidPromoCode`] otherwise.
pub fn get_voucher_code_instance<'a, S>(
    store: &S,
    code: &str,
    channel: ChannelKey,
    now: Timestamp,
) -> Result<VoucherCodeKey, VoucherError>
where
    S: VoucherStore<'a> + ?Sized,
{
    store
        .find_code(code)
        .filter(|key| {
            store.code(*key).is_some_and(|code| {
                code.is_active
                    && store
                        .voucher(code.voucher)
                        .is_some_and(|voucher| voucher.is_active_in_channel(channel, now))
            })
        })
        .ok_or(VoucherError::InvalidPromoCode)
}
