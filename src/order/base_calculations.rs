//! Order base calculations.
//!
//! Base prices are pre-tax. Specific-product vouchers and catalogue
//! promotions are already part of each line's base unit price; entire-order
//! and shipping vouchers and manual discounts are applied here.

use rusty_money::{Money, iso::Currency};
use tracing::{Span, debug, field};

use crate::{
    discounts::{
        DiscountType, DiscountValueType, apply_discount_to_value,
        records::{DiscountField, UpdatedFields},
        store::DiscountStore,
    },
    lines::Line,
    order::{Order, OrderError},
    pricing::{PriceError, multiply, proportional_share, total_price, zero_money},
    vouchers::{VoucherType, store::VoucherStore},
};

/// Undiscounted and discounted totals of one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLineTotals<'a> {
    /// `undiscounted_unit_price * quantity`.
    pub undiscounted_price: Money<'a, Currency>,

    /// `base_unit_price * quantity`.
    pub price_with_discounts: Money<'a, Currency>,
}

/// Subtotal and shipping after order-level discounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderPrices<'a> {
    /// Subtotal.
    pub subtotal: Money<'a, Currency>,

    /// Shipping price.
    pub shipping_price: Money<'a, Currency>,
}

/// Shipping price before order-level discounts.
pub fn base_order_shipping<'a>(order: &Order<'a>) -> Money<'a, Currency> {
    order.base_shipping_price
}

/// Sum of `base_unit_price * quantity` over every line.
///
/// # Errors
///
/// Returns an error on currency mismatch or overflow.
pub fn base_order_subtotal<'a>(order: &Order<'a>) -> Result<Money<'a, Currency>, PriceError> {
    let line_totals = order
        .lines()
        .iter()
        .map(Line::base_total)
        .collect::<Result<Vec<_>, _>>()?;

    total_price(order.currency(), line_totals)
}

/// Base subtotal plus the current shipping price.
///
/// # Errors
///
/// Returns an error on currency mismatch or overflow.
pub fn base_order_total<'a>(order: &Order<'a>) -> Result<Money<'a, Currency>, PriceError> {
    Ok(base_order_subtotal(order)?.add(order.shipping_price)?)
}

/// Undiscounted and discounted totals of `line`.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if a total does not fit in minor units.
pub fn base_order_line_total<'a>(line: &Line<'a>) -> Result<OrderLineTotals<'a>, PriceError> {
    Ok(OrderLineTotals {
        undiscounted_price: multiply(&line.undiscounted_unit_price(), line.quantity())?,
        price_with_discounts: line.base_total()?,
    })
}

/// Apply the order's promotion, voucher and manual discounts to its subtotal
/// and shipping, in record order.
///
/// - Order promotions and entire-order vouchers discount the subtotal;
///   shipping vouchers discount shipping.
/// - Manual percentage discounts apply to subtotal and shipping separately.
/// - Manual fixed discounts apply to subtotal plus shipping, and the resulting
///   discount is split between them in proportion to their share. A zero
///   combined total gets no discount.
///
/// Records whose amount changed are written with one bulk update. Line-level
/// promotion records are left alone. With `override_prices`, the order's
/// shipping, subtotal and total are replaced and the subtotal discount is
/// spread across the lines.
///
/// # Errors
///
/// Returns an error if a calculation or the bulk update fails.
#[tracing::instrument(
    name = "order.apply_order_discounts",
    skip(order, discount_store, vouchers),
    fields(updated = field::Empty),
    err
)]
pub fn apply_order_discounts<'a, D, V>(
    order: &mut Order<'a>,
    discount_store: &mut D,
    vouchers: &V,
    override_prices: bool,
) -> Result<OrderPrices<'a>, OrderError>
where
    D: DiscountStore<'a> + ?Sized,
    V: VoucherStore<'a> + ?Sized,
{
    let currency = order.currency();
    let undiscounted_subtotal = base_order_subtotal(order)?;
    let mut subtotal = undiscounted_subtotal;
    let mut shipping_price = order.base_shipping_price;
    let mut to_update = Vec::new();

    for discount in &mut order.discounts {
        let subtotal_before = subtotal;
        let shipping_before = shipping_price;

        match discount.discount_type {
            DiscountType::Promotion => continue,
            DiscountType::OrderPromotion => {
                subtotal = apply_discount_to_value(
                    discount.value,
                    discount.value_type,
                    currency,
                    subtotal,
                )?;
            }
            DiscountType::Voucher => {
                let voucher_type = discount
                    .voucher
                    .and_then(|voucher| vouchers.voucher(voucher))
                    .map(|voucher| voucher.voucher_type);

                match voucher_type {
                    Some(VoucherType::EntireOrder) => {
                        subtotal = apply_discount_to_value(
                            discount.value,
                            discount.value_type,
                            currency,
                            subtotal,
                        )?;
                    }
                    Some(VoucherType::Shipping) => {
                        shipping_price = apply_discount_to_value(
                            discount.value,
                            discount.value_type,
                            currency,
                            shipping_price,
                        )?;
                    }
                    Some(VoucherType::SpecificProduct) | None => {}
                }
            }
            DiscountType::Manual => match discount.value_type {
                DiscountValueType::Percentage => {
                    subtotal = apply_discount_to_value(
                        discount.value,
                        discount.value_type,
                        currency,
                        subtotal,
                    )?;
                    shipping_price = apply_discount_to_value(
                        discount.value,
                        discount.value_type,
                        currency,
                        shipping_price,
                    )?;
                }
                DiscountValueType::Fixed => {
                    let combined = subtotal.add(shipping_price)?;

                    if combined.to_minor_units() > 0 {
                        let discounted = apply_discount_to_value(
                            discount.value,
                            discount.value_type,
                            currency,
                            combined,
                        )?;
                        let total_discount = combined.sub(discounted)?;
                        let subtotal_discount =
                            proportional_share(&total_discount, &subtotal, &combined)?;
                        let shipping_discount = total_discount.sub(subtotal_discount)?;

                        subtotal = subtotal.sub(subtotal_discount)?;
                        shipping_price = shipping_price.sub(shipping_discount)?;
                    }
                }
            },
        }

        let amount = shipping_before
            .sub(shipping_price)?
            .add(subtotal_before.sub(subtotal)?)?;

        if discount.amount != amount {
            discount.amount = amount;
            to_update.push(discount.clone());
        }
    }

    if !to_update.is_empty() {
        let fields: UpdatedFields = [DiscountField::Amount].into_iter().collect();

        discount_store.bulk_update(&to_update, &fields)?;
    }

    Span::current().record("updated", to_update.len());

    if override_prices {
        order.shipping_price = shipping_price;
        order.subtotal = subtotal;
        order.total = subtotal.add(shipping_price)?;

        let subtotal_discount = undiscounted_subtotal.sub(subtotal)?;

        apply_subtotal_discount_to_order_lines(
            order.lines_mut(),
            undiscounted_subtotal,
            subtotal_discount,
        )?;
    }

    debug!(
        subtotal = subtotal.to_minor_units(),
        shipping = shipping_price.to_minor_units(),
        "applied order discounts"
    );

    Ok(OrderPrices {
        subtotal,
        shipping_price,
    })
}

/// Spread `subtotal_discount` across `lines`, returning each line's share.
///
/// Every line but the last gets `line.total_price / undiscounted_subtotal` of
/// the discount, rounded half-up to the minor unit. The last line gets what
/// is left, so the shares always sum to `subtotal_discount` exactly.
///
/// # Errors
///
/// Returns an error on currency mismatch or overflow.
pub fn apply_subtotal_discount_to_order_lines<'a>(
    lines: &mut [Line<'a>],
    undiscounted_subtotal: Money<'a, Currency>,
    subtotal_discount: Money<'a, Currency>,
) -> Result<Vec<Money<'a, Currency>>, PriceError> {
    let Some((last, others)) = lines.split_last_mut() else {
        return Ok(Vec::new());
    };

    let mut shares = Vec::with_capacity(others.len() + 1);
    let mut assigned = zero_money(subtotal_discount.currency());

    for line in others {
        let share =
            proportional_share(&subtotal_discount, &line.total_price(), &undiscounted_subtotal)?;

        line.apply_discount(share)?;
        assigned = assigned.add(share)?;
        shares.push(share);
    }

    let remainder = subtotal_discount.sub(assigned)?;

    last.apply_discount(remainder)?;
    shares.push(remainder);

    Ok(shares)
}
