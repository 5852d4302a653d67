//! Discount Records
//!
//! The persisted ledger of discounts applied to a line or to a whole
//! checkout/order. Records must mirror the currently applicable rules; stale
//! records are deleted rather than ignored.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::{
    discounts::{DiscountType, DiscountValue, DiscountValueType},
    lines::LineKey,
    promotions::PromotionRuleKey,
    vouchers::VoucherKey,
};

new_key_type! {
    /// Discount Record Key
    pub struct DiscountKey;
}

/// What a discount record is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscountScope {
    /// A single line.
    Line(LineKey),

    /// The whole checkout or order.
    Order,
}

/// Mutable columns of a discount record, used to limit bulk updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscountField {
    /// Promotion rule reference.
    PromotionRule,

    /// Value type.
    ValueType,

    /// Value.
    Value,

    /// Computed amount.
    Amount,

    /// Display name.
    Name,

    /// Translated display name.
    TranslatedName,

    /// Reason.
    Reason,
}

/// Set of fields changed during a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatedFields(SmallVec<[DiscountField; 7]>);

impl UpdatedFields {
    /// An empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a changed field; duplicates are ignored.
    pub fn insert(&mut self, field: DiscountField) {
        if !self.0.contains(&field) {
            self.0.push(field);
        }
    }

    /// Whether `field` was recorded.
    pub fn contains(&self, field: DiscountField) -> bool {
        self.0.contains(&field)
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct changed fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the recorded fields.
    pub fn iter(&self) -> impl Iterator<Item = DiscountField> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<DiscountField> for UpdatedFields {
    fn from_iter<I: IntoIterator<Item = DiscountField>>(iter: I) -> Self {
        let mut fields = Self::new();

        for field in iter {
            fields.insert(field);
        }

        fields
    }
}

/// Target state of a promotion-derived discount.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionDiscount<'a> {
    /// Rule the discount comes from.
    pub rule: PromotionRuleKey,

    /// Reward value of the rule.
    pub value: DiscountValue,

    /// Discount amount for the line or order.
    pub amount: Money<'a, Currency>,

    /// Display name.
    pub name: Option<String>,

    /// Translated display name.
    pub translated_name: Option<String>,

    /// Reason, e.g. `Promotion: <id>`.
    pub reason: Option<String>,
}

/// A discount that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscount<'a> {
    /// What the discount is attached to.
    pub scope: DiscountScope,

    /// Where the discount came from.
    pub discount_type: DiscountType,

    /// How `value` is interpreted.
    pub value_type: DiscountValueType,

    /// Amount (major units) or percentage points.
    pub value: Decimal,

    /// Computed discount amount.
    pub amount: Money<'a, Currency>,

    /// Display name.
    pub name: Option<String>,

    /// Translated display name.
    pub translated_name: Option<String>,

    /// Reason shown to staff.
    pub reason: Option<String>,

    /// Promotion rule, for promotion discounts.
    pub promotion_rule: Option<PromotionRuleKey>,

    /// Voucher, for voucher discounts.
    pub voucher: Option<VoucherKey>,

    /// Voucher code, for voucher discounts.
    pub voucher_code: Option<String>,
}

impl<'a> NewDiscount<'a> {
    /// Build a new promotion discount record.
    pub fn from_promotion(
        scope: DiscountScope,
        discount_type: DiscountType,
        discount: PromotionDiscount<'a>,
    ) -> Self {
        Self {
            scope,
            discount_type,
            value_type: discount.value.value_type,
            value: discount.value.value,
            amount: discount.amount,
            name: discount.name,
            translated_name: discount.translated_name,
            reason: discount.reason,
            promotion_rule: Some(discount.rule),
            voucher: None,
            voucher_code: None,
        }
    }

    /// Build a discount not tied to a promotion rule (voucher or manual).
    pub fn new(
        scope: DiscountScope,
        discount_type: DiscountType,
        value: DiscountValue,
        amount: Money<'a, Currency>,
    ) -> Self {
        Self {
            scope,
            discount_type,
            value_type: value.value_type,
            value: value.value,
            amount,
            name: None,
            translated_name: None,
            reason: None,
            promotion_rule: None,
            voucher: None,
            voucher_code: None,
        }
    }

    /// Attach a voucher and code.
    #[must_use]
    pub fn with_voucher(mut self, voucher: VoucherKey, code: impl Into<String>) -> Self {
        self.voucher = Some(voucher);
        self.voucher_code = Some(code.into());
        self
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Assign a primary key, producing a persisted record.
    pub fn into_record(self, key: DiscountKey) -> DiscountRecord<'a> {
        DiscountRecord {
            key,
            scope: self.scope,
            discount_type: self.discount_type,
            value_type: self.value_type,
            value: self.value,
            amount: self.amount,
            name: self.name,
            translated_name: self.translated_name,
            reason: self.reason,
            promotion_rule: self.promotion_rule,
            voucher: self.voucher,
            voucher_code: self.voucher_code,
        }
    }
}

/// A persisted discount.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountRecord<'a> {
    /// Primary key.
    pub key: DiscountKey,

    /// What the discount is attached to.
    pub scope: DiscountScope,

    /// Where the discount came from.
    pub discount_type: DiscountType,

    /// How `value` is interpreted.
    pub value_type: DiscountValueType,

    /// Amount (major units) or percentage points.
    pub value: Decimal,

    /// Computed discount amount.
    pub amount: Money<'a, Currency>,

    /// Display name.
    pub name: Option<String>,

    /// Translated display name.
    pub translated_name: Option<String>,

    /// Reason shown to staff.
    pub reason: Option<String>,

    /// Promotion rule, for promotion discounts.
    pub promotion_rule: Option<PromotionRuleKey>,

    /// Voucher, for voucher discounts.
    pub voucher: Option<VoucherKey>,

    /// Voucher code, for voucher discounts.
    pub voucher_code: Option<String>,
}

impl<'a> DiscountRecord<'a> {
    /// The discount value and its type.
    pub fn discount_value(&self) -> DiscountValue {
        DiscountValue::new(self.value, self.value_type)
    }

    /// Bring this record in line with a promotion discount, recording every
    /// field that actually changed.
    pub fn sync_with_promotion(
        &mut self,
        discount: &PromotionDiscount<'a>,
        updated: &mut UpdatedFields,
    ) {
        if self.promotion_rule != Some(discount.rule) {
            self.promotion_rule = Some(discount.rule);
            updated.insert(DiscountField::PromotionRule);
        }

        if self.value_type != discount.value.value_type {
            self.value_type = discount.value.value_type;
            updated.insert(DiscountField::ValueType);
        }

        if self.value != discount.value.value {
            self.value = discount.value.value;
            updated.insert(DiscountField::Value);
        }

        if self.amount != discount.amount {
            self.amount = discount.amount;
            updated.insert(DiscountField::Amount);
        }

        if self.name != discount.name {
            self.name.clone_from(&discount.name);
            updated.insert(DiscountField::Name);
        }

        if self.translated_name != discount.translated_name {
            self.translated_name.clone_from(&discount.translated_name);
            updated.insert(DiscountField::TranslatedName);
        }

        if self.reason != discount.reason {
            self.reason.clone_from(&discount.reason);
            updated.insert(DiscountField::Reason);
        }
    }

    /// Copy only the listed fields from `other`.
    pub fn copy_fields_from(&mut self, other: &DiscountRecord<'a>, fields: &UpdatedFields) {
        for field in fields.iter() {
            match field {
                DiscountField::PromotionRule => self.promotion_rule = other.promotion_rule,
                DiscountField::ValueType => self.value_type = other.value_type,
                DiscountField::Value => self.value = other.value,
                DiscountField::Amount => self.amount = other.amount,
                DiscountField::Name => self.name.clone_from(&other.name),
                DiscountField::TranslatedName => {
                    self.translated_name.clone_from(&other.translated_name);
                }
                DiscountField::Reason => self.reason.clone_from(&other.reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use slotmap::SlotMap;

    use super::*;

    fn rule_keys() -> (PromotionRuleKey, PromotionRuleKey) {
        let mut keys = SlotMap::<PromotionRuleKey, ()>::with_key();

        (keys.insert(()), keys.insert(()))
    }

    fn promotion_discount<'a>(rule: PromotionRuleKey, amount: i64) -> PromotionDiscount<'a> {
        PromotionDiscount {
            rule,
            value: DiscountValue::percentage(Decimal::from(10)),
            amount: Money::from_minor(amount, GBP),
            name: Some("Summer: Shoes".to_string()),
            translated_name: None,
            reason: Some("Promotion: abc".to_string()),
        }
    }

    #[test]
    fn updated_fields_ignores_duplicates() {
        let mut fields = UpdatedFields::new();

        fields.insert(DiscountField::Amount);
        fields.insert(DiscountField::Amount);
        fields.insert(DiscountField::Name);

        assert_eq!(fields.len(), 2);
        assert!(fields.contains(DiscountField::Amount));
        assert!(!fields.contains(DiscountField::Reason));
    }

    #[test]
    fn sync_with_promotion_records_only_changed_fields() {
        let (rule, _) = rule_keys();

        let mut record = NewDiscount::from_promotion(
            DiscountScope::Order,
            DiscountType::OrderPromotion,
            promotion_discount(rule, 100),
        )
        .into_record(DiscountKey::default());

        let mut updated = UpdatedFields::new();

        record.sync_with_promotion(&promotion_discount(rule, 250), &mut updated);

        assert_eq!(updated.iter().collect::<Vec<_>>(), vec![DiscountField::Amount]);
        assert_eq!(record.amount, Money::from_minor(250, GBP));
    }

    #[test]
    fn sync_with_promotion_switches_rule() {
        let (first, second) = rule_keys();

        let mut record = NewDiscount::from_promotion(
            DiscountScope::Order,
            DiscountType::OrderPromotion,
            promotion_discount(first, 100),
        )
        .into_record(DiscountKey::default());

        let mut updated = UpdatedFields::new();

        record.sync_with_promotion(&promotion_discount(second, 100), &mut updated);

        assert!(updated.contains(DiscountField::PromotionRule));
        assert_eq!(record.promotion_rule, Some(second));
    }

    #[test]
    fn sync_with_identical_discount_changes_nothing() {
        let (rule, _) = rule_keys();
        let discount = promotion_discount(rule, 100);

        let mut record = NewDiscount::from_promotion(
            DiscountScope::Order,
            DiscountType::OrderPromotion,
            discount.clone(),
        )
        .into_record(DiscountKey::default());

        let mut updated = UpdatedFields::new();

        record.sync_with_promotion(&discount, &mut updated);

        assert!(updated.is_empty());
    }

    #[test]
    fn copy_fields_from_copies_only_listed_fields() {
        let (rule, _) = rule_keys();

        let mut stored = NewDiscount::from_promotion(
            DiscountScope::Order,
            DiscountType::OrderPromotion,
            promotion_discount(rule, 100),
        )
        .into_record(DiscountKey::default());

        let mut changed = stored.clone();
        changed.amount = Money::from_minor(900, GBP);
        changed.name = Some("Other".to_string());

        stored.copy_fields_from(&changed, &[DiscountField::Amount].into_iter().collect());

        assert_eq!(stored.amount, Money::from_minor(900, GBP));
        assert_eq!(stored.name.as_deref(), Some("Summer: Shoes"));
    }
}
