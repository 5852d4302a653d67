//! Promotion Store
//!
//! Registry of promotions and rules, plus the rule to variant relation that
//! catalogue rules are resolved through.

use std::collections::BTreeSet;

use jiff::Timestamp;
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use tracing::{debug, info};

use crate::{
    catalogue::{Catalogue, ProductKey, VariantKey},
    promotions::{Promotion, PromotionError, PromotionKey, PromotionRule, PromotionRuleKey},
};

/// Outcome of a rule to variant relation update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationChanges {
    /// Pairs added.
    pub added: usize,

    /// Pairs removed.
    pub removed: usize,
}

/// Promotions, their rules and the rule to variant relation.
#[derive(Debug, Default)]
pub struct PromotionStore {
    promotions: SlotMap<PromotionKey, Promotion>,
    rules: SlotMap<PromotionRuleKey, PromotionRule>,
    rule_variants: BTreeSet<(PromotionRuleKey, VariantKey)>,
}

impl PromotionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a promotion.
    pub fn add_promotion(&mut self, promotion: Promotion) -> PromotionKey {
        self.promotions.insert(promotion)
    }

    /// Add a rule to an existing promotion.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::PromotionNotFound`] if the rule's promotion is unknown.
    pub fn add_rule(&mut self, rule: PromotionRule) -> Result<PromotionRuleKey, PromotionError> {
        if !self.promotions.contains_key(rule.promotion) {
            return Err(PromotionError::PromotionNotFound(rule.promotion));
        }

        Ok(self.rules.insert(rule))
    }

    /// Look up a promotion.
    pub fn promotion(&self, key: PromotionKey) -> Option<&Promotion> {
        self.promotions.get(key)
    }

    /// Look up a rule.
    pub fn rule(&self, key: PromotionRuleKey) -> Option<&PromotionRule> {
        self.rules.get(key)
    }

    /// Look up a rule together with its promotion.
    pub fn rule_with_promotion(
        &self,
        key: PromotionRuleKey,
    ) -> Option<(&PromotionRule, &Promotion)> {
        let rule = self.rules.get(key)?;

        Some((rule, self.promotions.get(rule.promotion)?))
    }

    /// Iterate over every rule.
    pub fn rules(&self) -> impl Iterator<Item = (PromotionRuleKey, &PromotionRule)> {
        self.rules.iter()
    }

    /// Rules whose promotion is active at `now`.
    pub fn active_rules(
        &self,
        now: Timestamp,
    ) -> impl Iterator<Item = (PromotionRuleKey, &PromotionRule)> {
        self.rules.iter().filter(move |(_, rule)| {
            self.promotions
                .get(rule.promotion)
                .is_some_and(|promotion| promotion.is_active(now))
        })
    }

    /// Variants currently related to `rule`.
    pub fn variants_for_rule(
        &self,
        rule: PromotionRuleKey,
    ) -> impl Iterator<Item = VariantKey> + '_ {
        self.rule_variants
            .iter()
            .filter(move |(related, _)| *related == rule)
            .map(|(_, variant)| *variant)
    }

    /// Rules currently related to `variant`, in rule order.
    pub fn rules_for_variant(
        &self,
        variant: VariantKey,
    ) -> impl Iterator<Item = PromotionRuleKey> + '_ {
        self.rule_variants
            .iter()
            .filter(move |(_, related)| *related == variant)
            .map(|(rule, _)| *rule)
    }

    /// Replace the variants related to `rules` with `new_rule_variants`.
    ///
    /// Pairs of `rules` missing from `new_rule_variants` are removed and new
    /// pairs are added. Every rule is checked before anything changes, so the
    /// update is all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::RuleNotFound`] if any rule is unknown.
    pub fn update_rule_variant_relation(
        &mut self,
        rules: &[PromotionRuleKey],
        new_rule_variants: impl IntoIterator<Item = (PromotionRuleKey, VariantKey)>,
    ) -> Result<RelationChanges, PromotionError> {
        if let Some(missing) = rules.iter().find(|rule| !self.rules.contains_key(**rule)) {
            return Err(PromotionError::RuleNotFound(*missing));
        }

        let new_rule_variants: BTreeSet<(PromotionRuleKey, VariantKey)> =
            new_rule_variants.into_iter().collect();

        if let Some((missing, _)) = new_rule_variants
            .iter()
            .find(|(rule, _)| !rules.contains(rule))
        {
            return Err(PromotionError::RuleNotFound(*missing));
        }

        let rules: FxHashSet<PromotionRuleKey> = rules.iter().copied().collect();

        let to_remove: Vec<(PromotionRuleKey, VariantKey)> = self
            .rule_variants
            .iter()
            .filter(|pair| rules.contains(&pair.0) && !new_rule_variants.contains(*pair))
            .copied()
            .collect();

        let to_add: Vec<(PromotionRuleKey, VariantKey)> = new_rule_variants
            .difference(&self.rule_variants)
            .copied()
            .collect();

        for pair in &to_remove {
            self.rule_variants.remove(pair);
        }

        self.rule_variants.extend(to_add.iter().copied());

        let changes = RelationChanges {
            added: to_add.len(),
            removed: to_remove.len(),
        };

        debug!(
            added = changes.added,
            removed = changes.removed,
            "updated rule variant relation"
        );

        Ok(changes)
    }

    /// Recompute the variants of every catalogue rule from its predicate.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::RuleNotFound`] if the registry changed underneath.
    pub fn assign_rule_variants(
        &mut self,
        catalogue: &Catalogue<'_>,
    ) -> Result<RelationChanges, PromotionError> {
        let rules: Vec<PromotionRuleKey> = self.rules.keys().collect();

        let pairs: Vec<(PromotionRuleKey, VariantKey)> = self
            .rules
            .iter()
            .filter(|(_, rule)| !rule.catalogue_predicate.is_empty())
            .flat_map(|(key, rule)| {
                catalogue
                    .variants()
                    .filter(|(variant, _)| rule.catalogue_predicate.matches(catalogue, *variant))
                    .map(move |(variant, _)| (key, variant))
            })
            .collect();

        let changes = self.update_rule_variant_relation(&rules, pairs)?;

        info!(
            added = changes.added,
            removed = changes.removed,
            "assigned rule variants"
        );

        Ok(changes)
    }

    /// Products owning any variant related to `rules`.
    pub fn get_current_products_for_rules(
        &self,
        catalogue: &Catalogue<'_>,
        rules: &[PromotionRuleKey],
    ) -> FxHashSet<ProductKey> {
        self.rule_variants
            .iter()
            .filter(|(rule, _)| rules.contains(rule))
            .filter_map(|(_, variant)| catalogue.variant(*variant).map(|variant| variant.product))
            .collect()
    }
}
