//! Catalogue line-discount sync.

use rustc_hash::FxHashSet;
use tracing::{Span, field};

use crate::{
    discounts::{
        DiscountType,
        records::{
            DiscountKey, DiscountRecord, DiscountScope, NewDiscount, PromotionDiscount,
            UpdatedFields,
        },
        store::DiscountStore,
    },
    lines::Line,
    pricing::{multiply, zero_money},
    promotions::{
        PromotionError, PromotionRuleKey,
        naming::{
            get_discount_name, get_discount_translated_name, get_rule_translations, get_sale_id,
            prepare_promotion_discount_reason,
        },
        store::PromotionStore,
    },
    reconcile::{Discountable, ReconcileError},
};

/// Counts of line-level records written by one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineDiscountChanges {
    /// Records created.
    pub created: usize,

    /// Records updated.
    pub updated: usize,

    /// Records deleted.
    pub deleted: usize,
}

/// Bring every line's catalogue promotion records in line with the rules it
/// currently qualifies for.
///
/// A line without a catalogue discount loses all of its promotion records.
/// Otherwise records for rules the line no longer qualifies for are deleted,
/// existing records are updated in place and missing ones are created. All
/// writes are deferred to one bulk create, one bulk update (changed fields
/// only) and one bulk delete, in that order.
///
/// # Errors
///
/// Returns an error if a rule is unknown, an amount cannot be calculated or a
/// store operation fails.
#[tracing::instrument(
    name = "reconcile.catalogue_promotions",
    skip_all,
    fields(created = field::Empty, updated = field::Empty, deleted = field::Empty),
    err
)]
pub fn create_discount_objects_for_catalogue_promotions<'a, T, S>(
    target: &mut T,
    promotions: &PromotionStore,
    store: &mut S,
) -> Result<LineDiscountChanges, ReconcileError>
where
    T: Discountable<'a> + ?Sized,
    S: DiscountStore<'a> + ?Sized,
{
    let language_code = target.language_code().map(str::to_owned);
    let mut writes = PendingWrites::default();

    for (index, line) in target.lines_mut().iter_mut().enumerate() {
        plan_line(index, line, promotions, language_code.as_deref(), &mut writes)?;
    }

    let PendingWrites {
        create: to_create,
        update: to_update,
        remove: to_remove,
        fields: updated_fields,
    } = writes;

    let mut changes = LineDiscountChanges::default();

    if !to_create.is_empty() {
        let (indexes, new_discounts): (Vec<usize>, Vec<NewDiscount<'a>>) =
            to_create.into_iter().unzip();

        let created = store.bulk_create(new_discounts)?;

        changes.created = created.len();

        for (index, record) in indexes.into_iter().zip(created) {
            if let Some(line) = target.lines_mut().get_mut(index) {
                line.discounts_mut().push(record);
            }
        }
    }

    if !to_update.is_empty() && !updated_fields.is_empty() {
        changes.updated = store.bulk_update(&to_update, &updated_fields)?;
    }

    if !to_remove.is_empty() {
        changes.deleted = store.bulk_delete(&to_remove)?;
    }

    let span = Span::current();

    span.record("created", changes.created);
    span.record("updated", changes.updated);
    span.record("deleted", changes.deleted);

    Ok(changes)
}

#[derive(Debug, Default)]
struct PendingWrites<'a> {
    create: Vec<(usize, NewDiscount<'a>)>,
    update: Vec<DiscountRecord<'a>>,
    remove: Vec<DiscountKey>,
    fields: UpdatedFields,
}

fn plan_line<'a>(
    index: usize,
    line: &mut Line<'a>,
    promotions: &PromotionStore,
    language_code: Option<&str>,
    writes: &mut PendingWrites<'a>,
) -> Result<(), ReconcileError> {
    if line.catalogue_discount_amount()?.to_minor_units() == 0 {
        writes
            .remove
            .extend(promotion_records(line).map(|record| record.key));

        line.discounts_mut()
            .retain(|record| record.discount_type != DiscountType::Promotion);

        return Ok(());
    }

    let rule_keys: FxHashSet<PromotionRuleKey> =
        line.rules().iter().map(|rule| rule.rule).collect();

    let stale: Vec<DiscountKey> = promotion_records(line)
        .filter(|record| {
            record
                .promotion_rule
                .is_none_or(|rule| !rule_keys.contains(&rule))
        })
        .map(|record| record.key)
        .collect();

    line.discounts_mut()
        .retain(|record| !stale.contains(&record.key));

    writes.remove.extend(stale);

    let line_key = line.key();
    let quantity = line.quantity();
    let currency = line.currency();

    for line_rule in line.rules().to_vec() {
        let (rule, promotion) = promotions
            .rule_with_promotion(line_rule.rule)
            .ok_or(PromotionError::RuleNotFound(line_rule.rule))?;

        let amount = match line_rule.unit_discount {
            Some(unit_discount) => multiply(&unit_discount, quantity)?,
            None => zero_money(currency),
        };

        let (promotion_translation, rule_translation) =
            get_rule_translations(promotion, rule, language_code);

        let discount = PromotionDiscount {
            rule: line_rule.rule,
            value: rule.discount(),
            amount,
            name: get_discount_name(rule, promotion),
            translated_name: get_discount_translated_name(promotion_translation, rule_translation),
            reason: Some(prepare_promotion_discount_reason(
                promotion,
                &get_sale_id(promotion),
            )),
        };

        let existing = line.discounts_mut().iter_mut().find(|record| {
            record.discount_type == DiscountType::Promotion
                && record.promotion_rule == Some(line_rule.rule)
        });

        if let Some(record) = existing {
            record.sync_with_promotion(&discount, &mut writes.fields);
            writes.update.push(record.clone());
        } else {
            writes.create.push((
                index,
                NewDiscount::from_promotion(
                    DiscountScope::Line(line_key),
                    DiscountType::Promotion,
                    discount,
                ),
            ));
        }
    }

    Ok(())
}

fn promotion_records<'l, 'a>(line: &'l Line<'a>) -> impl Iterator<Item = &'l DiscountRecord<'a>> {
    line.discounts()
        .iter()
        .filter(|record| record.discount_type == DiscountType::Promotion)
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use rusty_money::{Money, iso::GBP};
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::{
        catalogue::VariantKey,
        channels::{Channel, ChannelKey},
        checkout::Checkout,
        discounts::{
            DiscountValue,
            records::DiscountField,
            store::{BulkOperation, InMemoryDiscountStore},
        },
        lines::{LineKey, LineRule},
        promotions::{CataloguePredicate, Promotion, PromotionRule},
    };

    use super::*;

    struct Setup {
        promotions: PromotionStore,
        boots: PromotionRuleKey,
        hats: PromotionRuleKey,
    }

    fn setup() -> TestResult<Setup> {
        let mut promotions = PromotionStore::new();
        let promotion = promotions.add_promotion(Promotion::new(
            Uuid::nil(),
            Some("Summer".to_string()),
            Timestamp::UNIX_EPOCH,
        ));

        let boots = promotions.add_rule(
            PromotionRule::catalogue(
                promotion,
                CataloguePredicate::default(),
                DiscountValue::fixed(Decimal::from(3)),
            )
            .with_name("Boots"),
        )?;

        let hats = promotions.add_rule(
            PromotionRule::catalogue(
                promotion,
                CataloguePredicate::default(),
                DiscountValue::percentage(Decimal::from(10)),
            )
            .with_name("Hats"),
        )?;

        Ok(Setup {
            promotions,
            boots,
            hats,
        })
    }

    fn discounted_line<'a>(rule: PromotionRuleKey, unit_discount: i64) -> TestResult<Line<'a>> {
        let mut line = Line::new(
            LineKey::default(),
            VariantKey::default(),
            2,
            Money::from_minor(2000, GBP),
        )?;

        line.set_discounted_unit_price(Money::from_minor(2000 - unit_discount, GBP))?;
        line.set_rules([LineRule {
            rule,
            unit_discount: Some(Money::from_minor(unit_discount, GBP)),
        }]);

        Ok(line)
    }

    fn line_records<'c, 'a>(checkout: &'c Checkout<'a>) -> Vec<&'c DiscountRecord<'a>> {
        checkout
            .lines()
            .iter()
            .flat_map(|line| line.discounts())
            .collect()
    }

    #[test]
    fn creates_record_for_each_qualifying_rule() -> TestResult {
        let Setup { promotions, boots, .. } = setup()?;
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let mut checkout = Checkout::new(&channel).with_line(discounted_line(boots, 300)?);
        let mut store = InMemoryDiscountStore::new();

        let changes = create_discount_objects_for_catalogue_promotions(
            &mut checkout,
            &promotions,
            &mut store,
        )?;

        assert_eq!(
            changes,
            LineDiscountChanges {
                created: 1,
                updated: 0,
                deleted: 0,
            }
        );

        let records = line_records(&checkout);
        let [record] = records.as_slice() else {
            return Err("expected one line record".into());
        };

        assert_eq!(record.discount_type, DiscountType::Promotion);
        assert_eq!(record.promotion_rule, Some(boots));
        assert_eq!(record.amount, Money::from_minor(600, GBP));
        assert_eq!(record.name.as_deref(), Some("Summer: Boots"));
        assert_eq!(
            record.reason.as_deref(),
            Some("Promotion: UHJvbW90aW9uOjAwMDAwMDAwLTAwMDAtMDAwMC0wMDAwLTAwMDAwMDAwMDAwMA==")
        );
        assert_eq!(store.get(record.key), Some(*record));

        Ok(())
    }

    #[test]
    fn unchanged_lines_write_nothing() -> TestResult {
        let Setup { promotions, boots, .. } = setup()?;
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let mut checkout = Checkout::new(&channel).with_line(discounted_line(boots, 300)?);
        let mut store = InMemoryDiscountStore::new();

        create_discount_objects_for_catalogue_promotions(&mut checkout, &promotions, &mut store)?;
        store.clear_operations();

        let changes = create_discount_objects_for_catalogue_promotions(
            &mut checkout,
            &promotions,
            &mut store,
        )?;

        assert_eq!(changes, LineDiscountChanges::default());
        assert!(store.operations().is_empty());

        Ok(())
    }

    #[test]
    fn changed_amount_updates_only_amount() -> TestResult {
        let Setup { promotions, boots, .. } = setup()?;
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let mut checkout = Checkout::new(&channel).with_line(discounted_line(boots, 300)?);
        let mut store = InMemoryDiscountStore::new();

        create_discount_objects_for_catalogue_promotions(&mut checkout, &promotions, &mut store)?;
        store.clear_operations();

        if let Some(line) = checkout.lines_mut().first_mut() {
            line.set_discounted_unit_price(Money::from_minor(1500, GBP))?;
            line.set_rules([LineRule {
                rule: boots,
                unit_discount: Some(Money::from_minor(500, GBP)),
            }]);
        }

        let changes = create_discount_objects_for_catalogue_promotions(
            &mut checkout,
            &promotions,
            &mut store,
        )?;

        assert_eq!(changes.updated, 1);
        assert_eq!(
            store.operations(),
            &[BulkOperation::Update(
                1,
                [DiscountField::Amount].into_iter().collect()
            )]
        );
        assert!(store.iter().all(|record| record.amount == Money::from_minor(1000, GBP)));

        Ok(())
    }

    #[test]
    fn stale_rule_record_is_replaced() -> TestResult {
        let Setup {
            promotions,
            boots,
            hats,
        } = setup()?;
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let mut checkout = Checkout::new(&channel).with_line(discounted_line(boots, 300)?);
        let mut store = InMemoryDiscountStore::new();

        create_discount_objects_for_catalogue_promotions(&mut checkout, &promotions, &mut store)?;
        store.clear_operations();

        if let Some(line) = checkout.lines_mut().first_mut() {
            line.set_rules([LineRule {
                rule: hats,
                unit_discount: Some(Money::from_minor(300, GBP)),
            }]);
        }

        let changes = create_discount_objects_for_catalogue_promotions(
            &mut checkout,
            &promotions,
            &mut store,
        )?;

        assert_eq!(
            changes,
            LineDiscountChanges {
                created: 1,
                updated: 0,
                deleted: 1,
            }
        );

        let rules: Vec<Option<PromotionRuleKey>> = line_records(&checkout)
            .iter()
            .map(|record| record.promotion_rule)
            .collect();

        assert_eq!(rules, vec![Some(hats)]);
        assert_eq!(store.len(), 1);

        Ok(())
    }

    #[test]
    fn undiscounted_line_drops_promotion_records_only() -> TestResult {
        let Setup { promotions, boots, .. } = setup()?;
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let mut checkout = Checkout::new(&channel).with_line(discounted_line(boots, 300)?);
        let mut store = InMemoryDiscountStore::new();

        create_discount_objects_for_catalogue_promotions(&mut checkout, &promotions, &mut store)?;

        let line_key = checkout.lines().first().map(Line::key).ok_or("missing line")?;
        let manual = store
            .bulk_create(vec![NewDiscount::new(
                DiscountScope::Line(line_key),
                DiscountType::Manual,
                DiscountValue::fixed(Decimal::ONE),
                Money::from_minor(100, GBP),
            )])?;

        if let Some(line) = checkout.lines_mut().first_mut() {
            line.discounts_mut().extend(manual);
            line.set_discounted_unit_price(Money::from_minor(2000, GBP))?;
            line.set_rules([]);
        }

        let changes = create_discount_objects_for_catalogue_promotions(
            &mut checkout,
            &promotions,
            &mut store,
        )?;

        assert_eq!(changes.deleted, 1);

        let kinds: Vec<DiscountType> = line_records(&checkout)
            .iter()
            .map(|record| record.discount_type)
            .collect();

        assert_eq!(kinds, vec![DiscountType::Manual]);
        assert_eq!(store.len(), 1);

        Ok(())
    }

    #[test]
    fn unknown_rule_is_an_error() -> TestResult {
        let Setup { promotions, .. } = setup()?;
        let channel = Channel::new(ChannelKey::default(), "uk", GBP);
        let mut checkout =
            Checkout::new(&channel).with_line(discounted_line(PromotionRuleKey::default(), 300)?);
        let mut store = InMemoryDiscountStore::new();

        let result = create_discount_objects_for_catalogue_promotions(
            &mut checkout,
            &promotions,
            &mut store,
        );

        assert_eq!(
            result,
            Err(ReconcileError::Promotion(PromotionError::RuleNotFound(
                PromotionRuleKey::default()
            )))
        );
        assert!(store.is_empty());

        Ok(())
    }
}
