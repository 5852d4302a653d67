//! Catalogue prices for lines.

use jiff::Timestamp;
use tracing::{Span, field};

use crate::{
    channels::ChannelKey,
    discounts::DiscountError,
    lines::{Line, LineRule},
    promotions::{
        matcher::{get_best_promotion_discount, get_variants_to_promotion_rules_map},
        store::PromotionStore,
    },
};

/// Apply the best catalogue rule to each line's unit price.
///
/// Every line gets its discounted unit price set from the best rule for its
/// variant in `channel`, and that rule recorded with its per-unit saving.
/// Lines without a rule fall back to their undiscounted price.
///
/// # Errors
///
/// Returns an error if a discount cannot be calculated.
#[tracing::instrument(
    name = "promotions.apply_catalogue_promotions",
    skip(store, lines),
    fields(lines = lines.len(), discounted = field::Empty),
    err
)]
pub fn apply_catalogue_promotions(
    store: &PromotionStore,
    lines: &mut [Line<'_>],
    channel: ChannelKey,
    now: Timestamp,
) -> Result<(), DiscountError> {
    let rules_info_per_variant =
        get_variants_to_promotion_rules_map(store, lines.iter().map(Line::variant), now);

    let mut discounted = 0_usize;

    for line in lines.iter_mut() {
        let price = line.undiscounted_unit_price();

        let best = match rules_info_per_variant.get(&line.variant()) {
            Some(rules_info) => get_best_promotion_discount(price, rules_info, channel)?,
            None => None,
        };

        match best {
            Some((rule, saving)) => {
                line.set_discounted_unit_price(price.sub(saving)?)?;
                line.set_rules([LineRule {
                    rule,
                    unit_discount: Some(saving),
                }]);

                discounted += 1;
            }
            None => {
                line.set_discounted_unit_price(price)?;
                line.set_rules([]);
            }
        }
    }

    Span::current().record("discounted", discounted);

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::{Money, iso::GBP};
    use slotmap::SlotMap;
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::{
        catalogue::{Catalogue, Product, ProductVariant},
        discounts::DiscountValue,
        lines::LineKey,
        promotions::{CataloguePredicate, Promotion, PromotionRule},
    };

    use super::*;

    #[test]
    fn best_rule_sets_discounted_price_and_rule() -> TestResult {
        let channel = SlotMap::<ChannelKey, ()>::with_key().insert(());

        let mut catalogue = Catalogue::new();
        let boots = catalogue.add_product(Product::default());
        let hats = catalogue.add_product(Product::default());
        let boot = catalogue.add_variant(ProductVariant::new(boots, "Boot"));
        let hat = catalogue.add_variant(ProductVariant::new(hats, "Hat"));

        let mut store = PromotionStore::new();
        let promotion =
            store.add_promotion(Promotion::new(Uuid::nil(), None, Timestamp::UNIX_EPOCH));
        let predicate = CataloguePredicate {
            products: [boots].into_iter().collect(),
            ..CataloguePredicate::default()
        };

        store.add_rule(
            PromotionRule::catalogue(
                promotion,
                predicate.clone(),
                DiscountValue::percentage(Decimal::from(10)),
            )
            .with_channel(channel),
        )?;

        let best = store.add_rule(
            PromotionRule::catalogue(promotion, predicate, DiscountValue::fixed(Decimal::from(3)))
                .with_channel(channel),
        )?;

        store.assign_rule_variants(&catalogue)?;

        let mut lines = [
            Line::new(LineKey::default(), boot, 2, Money::from_minor(2000, GBP))?,
            Line::new(LineKey::default(), hat, 1, Money::from_minor(1500, GBP))?,
        ];

        apply_catalogue_promotions(&store, &mut lines, channel, Timestamp::now())?;

        let [boot_line, hat_line] = &lines;

        assert_eq!(boot_line.discounted_unit_price(), Money::from_minor(1700, GBP));
        assert_eq!(boot_line.catalogue_discount_amount()?, Money::from_minor(600, GBP));
        assert_eq!(
            boot_line.rules(),
            &[LineRule {
                rule: best,
                unit_discount: Some(Money::from_minor(300, GBP)),
            }]
        );

        assert_eq!(hat_line.discounted_unit_price(), Money::from_minor(1500, GBP));
        assert!(hat_line.rules().is_empty());

        Ok(())
    }
}
