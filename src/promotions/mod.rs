//! Promotions
//!
//! A [`Promotion`] is a named campaign with an active window. Each of its
//! [`PromotionRule`]s targets either catalogue items (through a
//! [`CataloguePredicate`]) or whole orders (through an [`OrderPredicate`]),
//! and carries the reward given when it matches.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use slotmap::new_key_type;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    channels::ChannelKey,
    discounts::{DiscountValue, DiscountValueType},
};

pub use predicates::{CataloguePredicate, OrderPredicate, PriceRange};

pub mod listings;
pub mod matcher;
pub mod naming;
pub mod predicates;
pub mod store;

new_key_type! {
    /// Promotion Key
    pub struct PromotionKey;
}

new_key_type! {
    /// Promotion Rule Key
    pub struct PromotionRuleKey;
}

/// Errors raised by the promotion registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromotionError {
    /// Promotion key not found.
    #[error("promotion {0:?} not found")]
    PromotionNotFound(PromotionKey),

    /// Rule key not found.
    #[error("promotion rule {0:?} not found")]
    RuleNotFound(PromotionRuleKey),
}

/// What an order rule rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    /// A discount on the order subtotal.
    SubtotalDiscount,

    /// A free gift line; carries no price reduction.
    Gift,
}

/// A promotion campaign.
#[derive(Debug, Clone)]
pub struct Promotion {
    /// Public id.
    pub id: Uuid,

    /// Display name.
    pub name: Option<String>,

    /// Id of the legacy sale this promotion was migrated from.
    pub old_sale_id: Option<u64>,

    /// Start of the active window.
    pub start_date: Timestamp,

    /// End of the active window; open-ended when `None`.
    pub end_date: Option<Timestamp>,

    /// Translated names keyed by language code.
    pub translations: FxHashMap<String, String>,
}

impl Promotion {
    /// A promotion active from `start_date` with no end.
    pub fn new(id: Uuid, name: Option<String>, start_date: Timestamp) -> Self {
        Self {
            id,
            name,
            old_sale_id: None,
            start_date,
            end_date: None,
            translations: FxHashMap::default(),
        }
    }

    /// Whether `now` falls inside the active window.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.start_date <= now && self.end_date.is_none_or(|end| end >= now)
    }
}

/// One rule of a promotion.
#[derive(Debug, Clone)]
pub struct PromotionRule {
    /// Owning promotion.
    pub promotion: PromotionKey,

    /// Display name.
    pub name: Option<String>,

    /// Channels the rule applies in.
    pub channels: FxHashSet<ChannelKey>,

    /// Catalogue items the rule discounts.
    pub catalogue_predicate: CataloguePredicate,

    /// Order condition; set only on order rules.
    pub order_predicate: Option<OrderPredicate>,

    /// Reward kind, for order rules.
    pub reward_type: Option<RewardType>,

    /// Amount (major units) or percentage points.
    pub reward_value: Decimal,

    /// How `reward_value` is interpreted.
    pub reward_value_type: DiscountValueType,

    /// Translated names keyed by language code.
    pub translations: FxHashMap<String, String>,
}

impl PromotionRule {
    /// A catalogue rule with the given reward and no channels.
    pub fn catalogue(
        promotion: PromotionKey,
        catalogue_predicate: CataloguePredicate,
        reward: DiscountValue,
    ) -> Self {
        Self {
            promotion,
            name: None,
            channels: FxHashSet::default(),
            catalogue_predicate,
            order_predicate: None,
            reward_type: None,
            reward_value: reward.value,
            reward_value_type: reward.value_type,
            translations: FxHashMap::default(),
        }
    }

    /// An order rule with the given predicate and reward and no channels.
    pub fn order(
        promotion: PromotionKey,
        order_predicate: OrderPredicate,
        reward_type: RewardType,
        reward: DiscountValue,
    ) -> Self {
        Self {
            promotion,
            name: None,
            channels: FxHashSet::default(),
            catalogue_predicate: CataloguePredicate::default(),
            order_predicate: Some(order_predicate),
            reward_type: Some(reward_type),
            reward_value: reward.value,
            reward_value_type: reward.value_type,
            translations: FxHashMap::default(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Make the rule available in `channel`.
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelKey) -> Self {
        self.channels.insert(channel);
        self
    }

    /// The rule's reward as a discount value.
    pub fn discount(&self) -> DiscountValue {
        DiscountValue::new(self.reward_value, self.reward_value_type)
    }

    /// Whether this is an order rule.
    pub fn is_order_rule(&self) -> bool {
        self.order_predicate.is_some()
    }
}
