//! Rebate prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    catalogue::{
        Catalogue, CategoryKey, CollectionKey, Product, ProductKey, ProductVariant, VariantKey,
    },
    channels::{Channel, ChannelKey, ShippingMethodKey},
    checkout::Checkout,
    discounts::{
        DiscountError, DiscountSummary, DiscountType, DiscountValue, DiscountValueType,
        NotApplicable, apply_discount_to_value,
        records::{DiscountKey, DiscountRecord, DiscountScope, NewDiscount},
        store::{DiscountStore, InMemoryDiscountStore, StoreError},
    },
    fixtures::{Fixture, FixtureError},
    lines::{Line, LineKey},
    order::{Order, OrderError, base_calculations::apply_order_discounts},
    pricing::PriceError,
    promotions::{
        CataloguePredicate, OrderPredicate, PriceRange, Promotion, PromotionError, PromotionKey,
        PromotionRule, PromotionRuleKey, RewardType, store::PromotionStore,
    },
    receipt::{Receipt, ReceiptError},
    reconcile::{
        Discountable, ReconcileError, create_or_update_discount_objects_from_promotion,
    },
    scenario::{Scenario, ScenarioError},
    vouchers::{
        Voucher, VoucherCode, VoucherCodeKey, VoucherError, VoucherKey, VoucherType,
        store::{InMemoryVoucherStore, VoucherStore},
        usage::{get_voucher_code_instance, increase_voucher_usage, release_voucher_code_usage},
    },
};
