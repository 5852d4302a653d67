//! Order promotion sync.

use jiff::Timestamp;
use rusty_money::{Money, iso::Currency};
use tracing::{Span, debug, field};

use crate::{
    channels::Channel,
    discounts::{
        DiscountError, DiscountSummary, DiscountType,
        records::{DiscountKey, DiscountScope, NewDiscount, PromotionDiscount, UpdatedFields},
        store::{DiscountStore, StoreError},
    },
    pricing::zero_money,
    promotions::{
        PromotionError, PromotionRuleKey, RewardType,
        matcher::{PromotionRuleInfo, fetch_promotion_rules_for_target},
        naming::{
            get_discount_name, get_discount_translated_name, get_rule_translations, get_sale_id,
            prepare_promotion_discount_reason,
        },
        store::PromotionStore,
    },
    reconcile::{Discountable, ReconcileError},
};

/// Apply the best qualifying order promotion to `target`.
///
/// Base prices are recalculated and stored first since order predicates are
/// evaluated against them. A target with a voucher code never gets an order
/// promotion. Otherwise the rule giving the largest discount on the base
/// subtotal wins and is kept as the single order promotion record, with the
/// target's discount summary set to match.
///
/// Returns the winning rule, if any.
///
/// # Errors
///
/// Returns an error if a price cannot be calculated or a store operation fails.
#[tracing::instrument(
    name = "reconcile.order_promotions",
    skip_all,
    fields(rule = field::Empty, amount = field::Empty),
    err
)]
pub fn create_discount_objects_for_order_promotions<'a, T, S>(
    target: &mut T,
    channel: &Channel<'a>,
    promotions: &PromotionStore,
    store: &mut S,
    now: Timestamp,
) -> Result<Option<PromotionRuleKey>, ReconcileError>
where
    T: Discountable<'a> + ?Sized,
    S: DiscountStore<'a> + ?Sized,
{
    let prices = target.compute_base_prices(channel)?;

    target.set_base_prices(prices);

    if target.voucher_code().is_some() {
        debug!("voucher code set, skipping order promotions");
        clear_order_promotion(target, store)?;

        return Ok(None);
    }

    let rules = fetch_promotion_rules_for_target(promotions, target.channel(), &prices, now);

    let Some((best, amount)) = best_order_rule(&rules, prices.subtotal, target.currency())? else {
        clear_order_promotion(target, store)?;

        return Ok(None);
    };

    let promotion = promotions
        .promotion(best.rule.promotion)
        .ok_or(PromotionError::PromotionNotFound(best.rule.promotion))?;

    let (promotion_translation, rule_translation) =
        get_rule_translations(promotion, best.rule, target.language_code());

    let discount = PromotionDiscount {
        rule: best.key,
        value: best.rule.discount(),
        amount,
        name: get_discount_name(best.rule, promotion),
        translated_name: get_discount_translated_name(promotion_translation, rule_translation),
        reason: Some(prepare_promotion_discount_reason(
            promotion,
            &get_sale_id(promotion),
        )),
    };

    let mut existing = target
        .discounts()
        .iter()
        .filter(|record| record.discount_type == DiscountType::OrderPromotion)
        .map(|record| record.key);

    let current = existing.next();
    let extras: Vec<DiscountKey> = existing.collect();

    if !extras.is_empty() {
        store.bulk_delete(&extras)?;
        target
            .discounts_mut()
            .retain(|record| !extras.contains(&record.key));
    }

    let summary = DiscountSummary {
        amount,
        name: discount.name.clone(),
        translated_name: discount.translated_name.clone(),
    };

    match current {
        Some(key) => {
            let mut updated_fields = UpdatedFields::new();
            let record = target
                .discounts_mut()
                .iter_mut()
                .find(|record| record.key == key)
                .ok_or(StoreError::NotFound(key))?;

            record.sync_with_promotion(&discount, &mut updated_fields);

            if !updated_fields.is_empty() {
                store.bulk_update(std::slice::from_ref(record), &updated_fields)?;
            }
        }
        None => {
            let created = store.bulk_create(vec![NewDiscount::from_promotion(
                DiscountScope::Order,
                DiscountType::OrderPromotion,
                discount,
            )])?;

            target.discounts_mut().extend(created);
        }
    }

    *target.discount_summary_mut() = summary;

    let span = Span::current();

    span.record("rule", field::debug(best.key));
    span.record("amount", amount.to_minor_units());

    Ok(Some(best.key))
}

/// The rule with the largest discount on `subtotal`. Rules that do not reward
/// a subtotal discount are worth zero. Ties keep the first rule.
fn best_order_rule<'r, 'a>(
    rules: &'r [PromotionRuleInfo<'r>],
    subtotal: Money<'a, Currency>,
    currency: &'a Currency,
) -> Result<Option<(&'r PromotionRuleInfo<'r>, Money<'a, Currency>)>, DiscountError> {
    let mut best: Option<(&PromotionRuleInfo<'_>, Money<'a, Currency>)> = None;

    for info in rules {
        let price = match info.rule.reward_type {
            Some(RewardType::SubtotalDiscount) => subtotal,
            _ => zero_money(currency),
        };

        let amount = info.rule.discount().amount_off(price)?;

        let is_better = best
            .as_ref()
            .is_none_or(|(_, best_amount)| amount.to_minor_units() > best_amount.to_minor_units());

        if is_better {
            best = Some((info, amount));
        }
    }

    Ok(best)
}

/// Drop every order promotion record from `target` and the store. The
/// discount summary is reset unless a voucher code is set.
fn clear_order_promotion<'a, T, S>(target: &mut T, store: &mut S) -> Result<(), ReconcileError>
where
    T: Discountable<'a> + ?Sized,
    S: DiscountStore<'a> + ?Sized,
{
    let keys: Vec<DiscountKey> = target
        .discounts()
        .iter()
        .filter(|record| record.discount_type == DiscountType::OrderPromotion)
        .map(|record| record.key)
        .collect();

    if !keys.is_empty() {
        store.bulk_delete(&keys)?;
        target
            .discounts_mut()
            .retain(|record| record.discount_type != DiscountType::OrderPromotion);
    }

    if target.voucher_code().is_none() {
        let currency = target.currency();
        let summary = target.discount_summary_mut();

        if !summary.is_none() {
            *summary = DiscountSummary::none(currency);
        }
    }

    Ok(())
}
