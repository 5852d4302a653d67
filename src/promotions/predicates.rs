//! Predicates
//!
//! Structured conditions deciding which catalogue items a rule discounts and
//! which orders an order rule applies to.

use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};

use crate::{
    catalogue::{Catalogue, CategoryKey, CollectionKey, ProductKey, VariantKey},
    pricing::to_major,
};

/// Catalogue items a rule discounts. A variant matches if it, its product,
/// its product's category or any of its product's collections is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CataloguePredicate {
    /// Matching variants.
    pub variants: FxHashSet<VariantKey>,

    /// Matching products.
    pub products: FxHashSet<ProductKey>,

    /// Matching categories.
    pub categories: FxHashSet<CategoryKey>,

    /// Matching collections.
    pub collections: FxHashSet<CollectionKey>,
}

impl CataloguePredicate {
    /// Whether nothing is listed.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
            && self.products.is_empty()
            && self.categories.is_empty()
            && self.collections.is_empty()
    }

    /// Whether `variant` matches.
    pub fn matches(&self, catalogue: &Catalogue<'_>, variant: VariantKey) -> bool {
        if self.variants.contains(&variant) {
            return true;
        }

        let Some(product_key) = catalogue.variant(variant).map(|variant| variant.product) else {
            return false;
        };

        let Some(product) = catalogue.product(product_key) else {
            return false;
        };

        self.products.contains(&product_key)
            || product
                .category
                .is_some_and(|category| self.categories.contains(&category))
            || product
                .collections
                .iter()
                .any(|collection| self.collections.contains(collection))
    }
}

/// Inclusive bounds on a price, in major units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceRange {
    /// Lower bound.
    pub gte: Option<Decimal>,

    /// Upper bound.
    pub lte: Option<Decimal>,

    /// Exact value.
    pub eq: Option<Decimal>,
}

impl PriceRange {
    /// Prices of at least `amount`.
    pub fn at_least(amount: Decimal) -> Self {
        Self {
            gte: Some(amount),
            ..Self::default()
        }
    }

    /// Prices of at most `amount`.
    pub fn at_most(amount: Decimal) -> Self {
        Self {
            lte: Some(amount),
            ..Self::default()
        }
    }

    /// Whether `price` satisfies every bound that is set.
    pub fn contains(&self, price: &Money<'_, Currency>) -> bool {
        let amount = to_major(price);

        self.gte.is_none_or(|gte| amount >= gte)
            && self.lte.is_none_or(|lte| amount <= lte)
            && self.eq.is_none_or(|eq| amount == eq)
    }
}

/// Base prices of a checkout or order, used to evaluate order predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasePrices<'a> {
    /// Subtotal including catalogue discounts only.
    pub subtotal: Money<'a, Currency>,

    /// Subtotal plus shipping, including catalogue discounts only.
    pub total: Money<'a, Currency>,
}

/// Condition on a whole checkout or order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderPredicate {
    /// Every child matches. Empty matches everything.
    And(Vec<OrderPredicate>),

    /// At least one child matches. Empty matches nothing.
    Or(Vec<OrderPredicate>),

    /// Base subtotal within range.
    BaseSubtotalPrice(PriceRange),

    /// Base total within range.
    BaseTotalPrice(PriceRange),
}

impl OrderPredicate {
    /// Evaluate against a target's base prices.
    pub fn matches(&self, prices: &BasePrices<'_>) -> bool {
        match self {
            OrderPredicate::And(children) => children.iter().all(|child| child.matches(prices)),
            OrderPredicate::Or(children) => children.iter().any(|child| child.matches(prices)),
            OrderPredicate::BaseSubtotalPrice(range) => range.contains(&prices.subtotal),
            OrderPredicate::BaseTotalPrice(range) => range.contains(&prices.total),
        }
    }
}
