//! Display names and reasons for promotion discounts.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::promotions::{Promotion, PromotionRule};

/// `"<promotion>: <rule>"` when both are named, else whichever name exists.
pub fn get_discount_name(rule: &PromotionRule, promotion: &Promotion) -> Option<String> {
    match (promotion.name.as_deref(), rule.name.as_deref()) {
        (Some(promotion), Some(rule)) if !promotion.is_empty() && !rule.is_empty() => {
            Some(format!("{promotion}: {rule}"))
        }
        (promotion, rule) => rule
            .filter(|name| !name.is_empty())
            .or(promotion.filter(|name| !name.is_empty()))
            .map(str::to_string),
    }
}

/// Translations of the promotion and rule names for `language_code`.
pub fn get_rule_translations<'p>(
    promotion: &'p Promotion,
    rule: &'p PromotionRule,
    language_code: Option<&str>,
) -> (Option<&'p str>, Option<&'p str>) {
    let Some(language_code) = language_code else {
        return (None, None);
    };

    (
        promotion.translations.get(language_code).map(String::as_str),
        rule.translations.get(language_code).map(String::as_str),
    )
}

/// Translated counterpart of [`get_discount_name`].
pub fn get_discount_translated_name(
    promotion_translation: Option<&str>,
    rule_translation: Option<&str>,
) -> Option<String> {
    match (promotion_translation, rule_translation) {
        (Some(promotion), Some(rule)) => Some(format!("{promotion}: {rule}")),
        (_, Some(rule)) => Some(rule.to_string()),
        (Some(promotion), None) => Some(promotion.to_string()),
        (None, None) => None,
    }
}

/// Global id of the promotion, or of the legacy sale it was migrated from.
pub fn get_sale_id(promotion: &Promotion) -> String {
    let raw = match promotion.old_sale_id {
        Some(sale_id) => format!("Sale:{sale_id}"),
        None => format!("Promotion:{}", promotion.id),
    };

    STANDARD.encode(raw)
}

/// `"Sale: <id>"` for migrated sales, `"Promotion: <id>"` otherwise.
pub fn prepare_promotion_discount_reason(promotion: &Promotion, sale_id: &str) -> String {
    let kind = if promotion.old_sale_id.is_some() {
        "Sale"
    } else {
        "Promotion"
    };

    format!("{kind}: {sale_id}")
}
