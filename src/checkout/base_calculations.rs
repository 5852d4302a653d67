//! Checkout base calculations.
//!
//! Base prices are pre-tax and include catalogue discounts; voucher
//! discounts are included only when asked for.

use rusty_money::{Money, iso::Currency};

use crate::{
    channels::Channel,
    checkout::Checkout,
    discounts::DiscountType,
    lines::Line,
    pricing::{PriceError, floor_at_zero, total_price, zero_money},
    vouchers::{Voucher, VoucherError, VoucherType},
};

/// Sum of line totals at their base unit price.
///
/// With `include_voucher`, voucher discounts recorded on each line are
/// taken off that line's total (never below zero).
///
/// # Errors
///
/// Returns an error on currency mismatch or overflow.
pub fn base_checkout_subtotal<'a>(
    lines: &[Line<'a>],
    currency: &'a Currency,
    include_voucher: bool,
) -> Result<Money<'a, Currency>, PriceError> {
    let line_totals = lines
        .iter()
        .map(|line| base_line_total(line, currency, include_voucher))
        .collect::<Result<Vec<_>, _>>()?;

    total_price(currency, line_totals)
}

fn base_line_total<'a>(
    line: &Line<'a>,
    currency: &'a Currency,
    include_voucher: bool,
) -> Result<Money<'a, Currency>, PriceError> {
    let total = line.base_total()?;

    if !include_voucher {
        return Ok(total);
    }

    let voucher_discount = total_price(
        currency,
        line.discounts()
            .iter()
            .filter(|discount| discount.discount_type == DiscountType::Voucher)
            .map(|discount| discount.amount),
    )?;

    Ok(floor_at_zero(total.sub(voucher_discount)?))
}

/// Price of the selected shipping method in the checkout's channel, or zero
/// when nothing needs shipping or no listed method is selected.
///
/// A shipping voucher passed as `voucher` is taken off the price.
///
/// # Errors
///
/// Returns an error if the voucher is not listed in the channel or the
/// calculation fails.
pub fn base_checkout_delivery_price<'a>(
    checkout: &Checkout<'a>,
    channel: &Channel<'a>,
    voucher: Option<&Voucher<'a>>,
) -> Result<Money<'a, Currency>, VoucherError> {
    let currency = checkout.currency();

    if !checkout.is_shipping_required {
        return Ok(zero_money(currency));
    }

    let price = checkout
        .shipping_method
        .and_then(|method| channel.shipping_price(method))
        .unwrap_or_else(|| zero_money(currency));

    match voucher {
        Some(voucher) if voucher.voucher_type == VoucherType::Shipping => {
            let discount = voucher.discount_amount_for(price, checkout.channel())?;

            Ok(price.sub(discount).map_err(PriceError::from)?)
        }
        _ => Ok(price),
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use rusty_money::iso::GBP;
    use slotmap::SlotMap;
    use testresult::TestResult;

    use crate::{
        catalogue::VariantKey,
        channels::{ChannelKey, ShippingMethodKey},
        discounts::{
            DiscountValue, DiscountValueType,
            records::{DiscountKey, DiscountScope, NewDiscount},
        },
        lines::LineKey,
    };

    use super::*;

    fn line<'a>(quantity: u32, unit_minor: i64) -> Result<Line<'a>, PriceError> {
        Line::new(
            LineKey::default(),
            VariantKey::default(),
            quantity,
            Money::from_minor(unit_minor, GBP),
        )
    }

    #[test]
    fn subtotal_optionally_includes_line_voucher_discounts() -> TestResult {
        let mut discounted = line(2, 1000)?;
        let key = discounted.key();

        discounted.discounts_mut().push(
            NewDiscount::new(
                DiscountScope::Line(key),
                DiscountType::Voucher,
                DiscountValue::fixed(Decimal::from(3)),
                Money::from_minor(300, GBP),
            )
            .into_record(DiscountKey::default()),
        );

        let lines = [discounted, line(1, 500)?];

        assert_eq!(
            base_checkout_subtotal(&lines, GBP, false)?,
            Money::from_minor(2500, GBP)
        );
        assert_eq!(
            base_checkout_subtotal(&lines, GBP, true)?,
            Money::from_minor(2200, GBP)
        );

        Ok(())
    }

    #[test]
    fn delivery_price_uses_channel_listing_and_shipping_voucher() -> TestResult {
        let mut methods = SlotMap::<ShippingMethodKey, ()>::with_key();
        let standard = methods.insert(());
        let channel_key = SlotMap::<ChannelKey, ()>::with_key().insert(());
        let channel = Channel::new(channel_key, "uk", GBP)
            .with_shipping_method(standard, Money::from_minor(500, GBP));

        let mut checkout = Checkout::new(&channel);

        assert_eq!(
            base_checkout_delivery_price(&checkout, &channel, None)?,
            Money::from_minor(0, GBP)
        );

        checkout.shipping_method = Some(standard);

        assert_eq!(
            base_checkout_delivery_price(&checkout, &channel, None)?,
            Money::from_minor(500, GBP)
        );

        let voucher = Voucher::new(
            VoucherType::Shipping,
            DiscountValueType::Percentage,
            Timestamp::UNIX_EPOCH,
        )
        .with_channel_listing(channel_key, Decimal::from(100), None);

        assert_eq!(
            base_checkout_delivery_price(&checkout, &channel, Some(&voucher))?,
            Money::from_minor(0, GBP)
        );

        checkout.is_shipping_required = false;

        assert_eq!(
            base_checkout_delivery_price(&checkout, &channel, None)?,
            Money::from_minor(0, GBP)
        );

        Ok(())
    }
}
