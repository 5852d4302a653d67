//! Rule Matcher
//!
//! Resolves which rules apply to a variant or a checkout/order in a channel,
//! and picks the one giving the largest saving.

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};

use crate::{
    catalogue::VariantKey,
    channels::ChannelKey,
    discounts::{DiscountError, DiscountValue, NotApplicable},
    pricing::{floor_at_zero, total_price},
    promotions::{PromotionRule, PromotionRuleKey, predicates::BasePrices, store::PromotionStore},
};

/// A rule together with its key.
#[derive(Debug, Clone, Copy)]
pub struct PromotionRuleInfo<'r> {
    /// Rule key.
    pub key: PromotionRuleKey,

    /// The rule.
    pub rule: &'r PromotionRule,
}

/// Rule key and discount if the rule is available in `channel`.
///
/// # Errors
///
/// Returns [`NotApplicable::ChannelNotAvailable`] otherwise.
pub fn get_product_discount_on_promotion(
    rule_info: &PromotionRuleInfo<'_>,
    channel: ChannelKey,
) -> Result<(PromotionRuleKey, DiscountValue), NotApplicable> {
    if rule_info.rule.channels.contains(&channel) {
        Ok((rule_info.key, rule_info.rule.discount()))
    } else {
        Err(NotApplicable::ChannelNotAvailable)
    }
}

/// Discounts of every rule available in `channel`; other rules are skipped.
pub fn get_product_promotion_discounts<'r>(
    rules_info: &'r [PromotionRuleInfo<'r>],
    channel: ChannelKey,
) -> impl Iterator<Item = (PromotionRuleKey, DiscountValue)> + 'r {
    rules_info
        .iter()
        .filter_map(move |rule_info| get_product_discount_on_promotion(rule_info, channel).ok())
}

/// The rule with the largest saving on `price`, and that saving.
///
/// Ties keep the first rule in `rules_info` order.
///
/// # Errors
///
/// Returns an error if a discount cannot be calculated.
pub fn get_best_promotion_discount<'a>(
    price: Money<'a, Currency>,
    rules_info: &[PromotionRuleInfo<'_>],
    channel: ChannelKey,
) -> Result<Option<(PromotionRuleKey, Money<'a, Currency>)>, DiscountError> {
    let mut best: Option<(PromotionRuleKey, Money<'a, Currency>)> = None;

    for (rule, discount) in get_product_promotion_discounts(rules_info, channel) {
        let saving = discount.amount_off(price)?;

        let best_minor = best.map(|(_, best_saving)| best_saving.to_minor_units());

        if best_minor.is_none_or(|minor| saving.to_minor_units() > minor) {
            best = Some((rule, saving));
        }
    }

    Ok(best)
}

/// Price after applying every rule at once; savings are summed and the
/// result never drops below zero.
///
/// # Errors
///
/// Returns an error if a discount cannot be calculated.
pub fn calculate_discounted_price_for_rules<'a, 'r>(
    price: Money<'a, Currency>,
    rules: impl IntoIterator<Item = &'r PromotionRule>,
    currency: &'a Currency,
) -> Result<Money<'a, Currency>, DiscountError> {
    let savings = rules
        .into_iter()
        .map(|rule| rule.discount().amount_off(price))
        .collect::<Result<Vec<_>, _>>()?;

    let total_discount = total_price(currency, savings)?;

    Ok(floor_at_zero(price.sub(total_discount)?))
}

/// Best rule and saving for `variant`, if it has any rules.
///
/// # Errors
///
/// Returns an error if a discount cannot be calculated.
pub fn calculate_discounted_price_for_promotions<'a>(
    price: Money<'a, Currency>,
    rules_info_per_variant: &FxHashMap<VariantKey, Vec<PromotionRuleInfo<'_>>>,
    channel: ChannelKey,
    variant: VariantKey,
) -> Result<Option<(PromotionRuleKey, Money<'a, Currency>)>, DiscountError> {
    match rules_info_per_variant.get(&variant) {
        Some(rules_info) if !rules_info.is_empty() => {
            get_best_promotion_discount(price, rules_info, channel)
        }
        _ => Ok(None),
    }
}

/// Rules of active promotions related to each of `variants`.
pub fn get_variants_to_promotion_rules_map(
    store: &PromotionStore,
    variants: impl IntoIterator<Item = VariantKey>,
    now: Timestamp,
) -> FxHashMap<VariantKey, Vec<PromotionRuleInfo<'_>>> {
    let mut rules_info_per_variant: FxHashMap<VariantKey, Vec<PromotionRuleInfo<'_>>> =
        FxHashMap::default();

    for variant in variants {
        let rules_info: Vec<PromotionRuleInfo<'_>> = store
            .rules_for_variant(variant)
            .filter_map(|key| {
                let (rule, promotion) = store.rule_with_promotion(key)?;

                promotion
                    .is_active(now)
                    .then_some(PromotionRuleInfo { key, rule })
            })
            .collect();

        if !rules_info.is_empty() {
            rules_info_per_variant.insert(variant, rules_info);
        }
    }

    rules_info_per_variant
}

/// Order rules of active promotions in `channel` whose predicate matches `prices`.
pub fn fetch_promotion_rules_for_target<'s>(
    store: &'s PromotionStore,
    channel: ChannelKey,
    prices: &BasePrices<'_>,
    now: Timestamp,
) -> Vec<PromotionRuleInfo<'s>> {
    store
        .active_rules(now)
        .filter(|(_, rule)| rule.channels.contains(&channel))
        .filter(|(_, rule)| {
            rule.order_predicate
                .as_ref()
                .is_some_and(|predicate| predicate.matches(prices))
        })
        .map(|(key, rule)| PromotionRuleInfo { key, rule })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::GBP;
    use slotmap::SlotMap;
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::promotions::{
        CataloguePredicate, OrderPredicate, PriceRange, Promotion, PromotionKey, RewardType,
    };

    use super::*;

    fn channels() -> (ChannelKey, ChannelKey) {
        let mut keys = SlotMap::<ChannelKey, ()>::with_key();

        (keys.insert(()), keys.insert(()))
    }

    fn rule_keys(count: usize) -> Vec<PromotionRuleKey> {
        let mut keys = SlotMap::<PromotionRuleKey, ()>::with_key();

        (0..count).map(|_| keys.insert(())).collect()
    }

    fn catalogue_rule(channel: ChannelKey, reward: DiscountValue) -> PromotionRule {
        PromotionRule::catalogue(PromotionKey::default(), CataloguePredicate::default(), reward)
            .with_channel(channel)
    }

    #[test]
    fn rule_outside_channel_is_not_applicable() {
        let (uk, us) = channels();
        let rule = catalogue_rule(uk, DiscountValue::percentage(Decimal::from(10)));
        let info = PromotionRuleInfo {
            key: PromotionRuleKey::default(),
            rule: &rule,
        };

        assert!(get_product_discount_on_promotion(&info, uk).is_ok());
        assert_eq!(
            get_product_discount_on_promotion(&info, us),
            Err(NotApplicable::ChannelNotAvailable)
        );
    }

    #[test]
    fn best_discount_picks_largest_saving() -> TestResult {
        let (uk, us) = channels();
        let keys = rule_keys(3);
        let ten_percent = catalogue_rule(uk, DiscountValue::percentage(Decimal::from(10)));
        let three_off = catalogue_rule(uk, DiscountValue::fixed(Decimal::from(3)));
        let elsewhere = catalogue_rule(us, DiscountValue::percentage(Decimal::from(90)));

        let rules_info = [
            PromotionRuleInfo {
                key: *keys.first().ok_or("key")?,
                rule: &ten_percent,
            },
            PromotionRuleInfo {
                key: *keys.get(1).ok_or("key")?,
                rule: &three_off,
            },
            PromotionRuleInfo {
                key: *keys.get(2).ok_or("key")?,
                rule: &elsewhere,
            },
        ];

        let best = get_best_promotion_discount(Money::from_minor(2000, GBP), &rules_info, uk)?;

        assert_eq!(best, Some((*keys.get(1).ok_or("key")?, Money::from_minor(300, GBP))));

        Ok(())
    }

    #[test]
    fn best_discount_tie_keeps_first() -> TestResult {
        let (uk, _) = channels();
        let keys = rule_keys(2);
        let percent = catalogue_rule(uk, DiscountValue::percentage(Decimal::from(10)));
        let fixed = catalogue_rule(uk, DiscountValue::fixed(Decimal::from(2)));

        let rules_info = [
            PromotionRuleInfo {
                key: *keys.first().ok_or("key")?,
                rule: &percent,
            },
            PromotionRuleInfo {
                key: *keys.get(1).ok_or("key")?,
                rule: &fixed,
            },
        ];

        let best = get_best_promotion_discount(Money::from_minor(2000, GBP), &rules_info, uk)?;

        assert_eq!(best, Some((*keys.first().ok_or("key")?, Money::from_minor(200, GBP))));

        Ok(())
    }

    #[test]
    fn best_discount_without_applicable_rules_is_none() -> TestResult {
        let (_, us) = channels();

        assert_eq!(get_best_promotion_discount(Money::from_minor(2000, GBP), &[], us)?, None);

        Ok(())
    }

    #[test]
    fn discounted_price_for_rules_sums_savings_and_floors() -> TestResult {
        let (uk, _) = channels();
        let rules = [
            catalogue_rule(uk, DiscountValue::percentage(Decimal::from(10))),
            catalogue_rule(uk, DiscountValue::fixed(Decimal::from(5))),
        ];

        assert_eq!(
            calculate_discounted_price_for_rules(Money::from_minor(2000, GBP), &rules, GBP)?,
            Money::from_minor(1300, GBP)
        );

        let greedy = [
            catalogue_rule(uk, DiscountValue::percentage(Decimal::from(60))),
            catalogue_rule(uk, DiscountValue::percentage(Decimal::from(60))),
        ];

        assert_eq!(
            calculate_discounted_price_for_rules(Money::from_minor(2000, GBP), &greedy, GBP)?,
            Money::from_minor(0, GBP)
        );

        Ok(())
    }

    #[test]
    fn fetch_rules_for_target_filters_channel_and_predicate() -> TestResult {
        let (uk, us) = channels();
        let mut store = PromotionStore::new();
        let promotion =
            store.add_promotion(Promotion::new(Uuid::nil(), None, Timestamp::UNIX_EPOCH));

        let over_fifty = store.add_rule(
            PromotionRule::order(
                promotion,
                OrderPredicate::BaseSubtotalPrice(PriceRange::at_least(Decimal::from(50))),
                RewardType::SubtotalDiscount,
                DiscountValue::percentage(Decimal::from(10)),
            )
            .with_channel(uk),
        )?;

        store.add_rule(
            PromotionRule::order(
                promotion,
                OrderPredicate::BaseSubtotalPrice(PriceRange::at_least(Decimal::from(500))),
                RewardType::SubtotalDiscount,
                DiscountValue::percentage(Decimal::from(20)),
            )
            .with_channel(uk),
        )?;

        store.add_rule(
            PromotionRule::catalogue(
                promotion,
                CataloguePredicate::default(),
                DiscountValue::percentage(Decimal::from(5)),
            )
            .with_channel(uk),
        )?;

        let prices = BasePrices {
            subtotal: Money::from_minor(8000, GBP),
            total: Money::from_minor(8500, GBP),
        };

        let now = Timestamp::now();
        let rules: Vec<PromotionRuleKey> =
            fetch_promotion_rules_for_target(&store, uk, &prices, now)
                .iter()
            .map(|info| info.key)
            .collect();

        assert_eq!(rules, vec![over_fifty]);
        assert!(fetch_promotion_rules_for_target(&store, us, &prices, now).is_empty());

        Ok(())
    }
}
