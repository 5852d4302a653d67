//! Promotion Fixtures

use jiff::Timestamp;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    discounts::{DiscountValue, DiscountValueType},
    fixtures::{Fixture, FixtureError, parse_decimal},
    promotions::{
        CataloguePredicate, OrderPredicate, PriceRange, Promotion, PromotionKey, PromotionRule,
        RewardType,
    },
};

/// Wrapper for promotions in YAML
#[derive(Debug, Deserialize)]
pub struct PromotionsFixture {
    /// Map of promotion key -> promotion fixture
    pub promotions: FxHashMap<String, PromotionFixture>,
}

/// Promotion Fixture
#[derive(Debug, Deserialize)]
pub struct PromotionFixture {
    /// Promotion id (UUID)
    pub id: String,

    /// Display name
    pub name: Option<String>,

    /// Id of the legacy sale this promotion replaced
    pub old_sale_id: Option<u64>,

    /// Start of the active window
    pub start: Timestamp,

    /// End of the active window
    pub end: Option<Timestamp>,

    /// Language code -> translated name
    #[serde(default)]
    pub translations: FxHashMap<String, String>,

    /// Rules
    pub rules: Vec<RuleFixture>,
}

/// Promotion Rule Fixture
#[derive(Debug, Deserialize)]
pub struct RuleFixture {
    /// Display name
    pub name: Option<String>,

    /// Channel keys the rule is available in
    #[serde(default)]
    pub channels: Vec<String>,

    /// Catalogue condition
    pub catalogue: Option<CataloguePredicateFixture>,

    /// Order condition; makes this an order rule
    pub order: Option<OrderPredicateFixture>,

    /// Reward of an order rule
    pub reward_type: Option<RewardType>,

    /// How `reward_value` is interpreted
    pub reward_value_type: DiscountValueType,

    /// Reward amount (major units) or percentage points
    pub reward_value: String,

    /// Language code -> translated name
    #[serde(default)]
    pub translations: FxHashMap<String, String>,
}

/// Catalogue Predicate Fixture
#[derive(Debug, Default, Deserialize)]
pub struct CataloguePredicateFixture {
    /// Variant keys
    #[serde(default)]
    pub variants: Vec<String>,

    /// Product keys
    #[serde(default)]
    pub products: Vec<String>,

    /// Category names
    #[serde(default)]
    pub categories: Vec<String>,

    /// Collection names
    #[serde(default)]
    pub collections: Vec<String>,
}

/// Order Predicate Fixture
///
/// Every condition given must hold.
#[derive(Debug, Default, Deserialize)]
pub struct OrderPredicateFixture {
    /// Every child holds
    #[serde(default)]
    pub and: Vec<OrderPredicateFixture>,

    /// At least one child holds
    #[serde(default)]
    pub or: Vec<OrderPredicateFixture>,

    /// Base subtotal range
    pub base_subtotal_price: Option<PriceRangeFixture>,

    /// Base total range
    pub base_total_price: Option<PriceRangeFixture>,
}

/// Price Range Fixture, in major units
#[derive(Debug, Default, Deserialize)]
pub struct PriceRangeFixture {
    /// Inclusive lower bound
    pub gte: Option<String>,

    /// Inclusive upper bound
    pub lte: Option<String>,

    /// Exact amount
    pub eq: Option<String>,
}

impl TryFrom<PriceRangeFixture> for PriceRange {
    type Error = FixtureError;

    fn try_from(fixture: PriceRangeFixture) -> Result<Self, Self::Error> {
        let parse = |value: Option<String>| value.as_deref().map(parse_decimal).transpose();

        Ok(PriceRange {
            gte: parse(fixture.gte)?,
            lte: parse(fixture.lte)?,
            eq: parse(fixture.eq)?,
        })
    }
}

impl TryFrom<OrderPredicateFixture> for OrderPredicate {
    type Error = FixtureError;

    fn try_from(fixture: OrderPredicateFixture) -> Result<Self, Self::Error> {
        let mut conditions = Vec::new();

        if !fixture.and.is_empty() {
            conditions.push(OrderPredicate::And(
                fixture
                    .and
                    .into_iter()
                    .map(OrderPredicate::try_from)
                    .collect::<Result<_, _>>()?,
            ));
        }

        if !fixture.or.is_empty() {
            conditions.push(OrderPredicate::Or(
                fixture
                    .or
                    .into_iter()
                    .map(OrderPredicate::try_from)
                    .collect::<Result<_, _>>()?,
            ));
        }

        if let Some(range) = fixture.base_subtotal_price {
            conditions.push(OrderPredicate::BaseSubtotalPrice(range.try_into()?));
        }

        if let Some(range) = fixture.base_total_price {
            conditions.push(OrderPredicate::BaseTotalPrice(range.try_into()?));
        }

        if conditions.len() == 1
            && let Some(condition) = conditions.pop()
        {
            return Ok(condition);
        }

        Ok(OrderPredicate::And(conditions))
    }
}

impl Fixture {
    /// Load promotions and their rules from a YAML fixture file, then relate
    /// catalogue rules to the variants they match
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a rule
    /// refers to an unknown channel or catalogue entity.
    pub fn load_promotions(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: PromotionsFixture = self.read("promotions", name)?;

        for (key, promotion_fixture) in fixture.promotions {
            let id = Uuid::parse_str(&promotion_fixture.id)
                .map_err(|_err| FixtureError::InvalidId(promotion_fixture.id.clone()))?;

            let mut promotion = Promotion::new(id, promotion_fixture.name, promotion_fixture.start);

            promotion.old_sale_id = promotion_fixture.old_sale_id;
            promotion.end_date = promotion_fixture.end;
            promotion.translations = promotion_fixture.translations;

            let promotion_key = self.scenario.promotions.add_promotion(promotion);

            for rule_fixture in promotion_fixture.rules {
                let rule = self.build_rule(promotion_key, rule_fixture)?;

                self.scenario.promotions.add_rule(rule)?;
            }

            self.promotion_keys.insert(key, promotion_key);
        }

        self.scenario
            .promotions
            .assign_rule_variants(&self.scenario.catalogue)?;

        Ok(self)
    }

    fn build_rule(
        &self,
        promotion: PromotionKey,
        fixture: RuleFixture,
    ) -> Result<PromotionRule, FixtureError> {
        let reward = DiscountValue::new(
            parse_decimal(&fixture.reward_value)?,
            fixture.reward_value_type,
        );

        let mut rule = match fixture.order {
            Some(order) => PromotionRule::order(
                promotion,
                order.try_into()?,
                fixture.reward_type.unwrap_or(RewardType::SubtotalDiscount),
                reward,
            ),
            None => PromotionRule::catalogue(
                promotion,
                self.catalogue_predicate(fixture.catalogue.unwrap_or_default())?,
                reward,
            ),
        };

        rule.name = fixture.name;
        rule.translations = fixture.translations;

        for channel in &fixture.channels {
            rule.channels.insert(self.channel_key(channel)?);
        }

        Ok(rule)
    }

    fn catalogue_predicate(
        &self,
        fixture: CataloguePredicateFixture,
    ) -> Result<CataloguePredicate, FixtureError> {
        Ok(CataloguePredicate {
            variants: lookup_all(
                &self.variant_keys,
                fixture.variants,
                FixtureError::VariantNotFound,
            )?,
            products: lookup_all(
                &self.product_keys,
                fixture.products,
                FixtureError::ProductNotFound,
            )?,
            categories: lookup_all(
                &self.category_keys,
                fixture.categories,
                FixtureError::CategoryNotFound,
            )?,
            collections: lookup_all(
                &self.collection_keys,
                fixture.collections,
                FixtureError::CollectionNotFound,
            )?,
        })
    }
}

fn lookup_all<K: Copy + Eq + Hash>(
    keys: &FxHashMap<String, K>,
    names: Vec<String>,
    missing: fn(String) -> FixtureError,
) -> Result<FxHashSet<K>, FixtureError> {
    names
        .into_iter()
        .map(|name| keys.get(&name).copied().ok_or_else(|| missing(name)))
        .collect()
}
