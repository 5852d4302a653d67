//! Catalogue
//!
//! Products, their variants and the groupings catalogue predicates select on.

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::channels::ChannelKey;

new_key_type! {
    /// Product Key
    pub struct ProductKey;
}

new_key_type! {
    /// Product Variant Key
    pub struct VariantKey;
}

new_key_type! {
    /// Category Key
    pub struct CategoryKey;
}

new_key_type! {
    /// Collection Key
    pub struct CollectionKey;
}

/// Product
#[derive(Debug, Clone, Default)]
pub struct Product {
    /// Product name
    pub name: String,

    /// Product category
    pub category: Option<CategoryKey>,

    /// Collections the product belongs to
    pub collections: SmallVec<[CollectionKey; 4]>,
}

/// Product variant, the unit that is actually sold.
#[derive(Debug, Clone)]
pub struct ProductVariant<'a> {
    /// Parent product
    pub product: ProductKey,

    /// Variant name
    pub name: String,

    /// Undiscounted price per channel
    pub channel_listings: FxHashMap<ChannelKey, Money<'a, Currency>>,
}

impl<'a> ProductVariant<'a> {
    /// Create a variant with no channel listings.
    pub fn new(product: ProductKey, name: impl Into<String>) -> Self {
        Self {
            product,
            name: name.into(),
            channel_listings: FxHashMap::default(),
        }
    }

    /// List the variant in a channel.
    #[must_use]
    pub fn with_price(mut self, channel: ChannelKey, price: Money<'a, Currency>) -> Self {
        self.channel_listings.insert(channel, price);
        self
    }

    /// Undiscounted price in a channel.
    pub fn price(&self, channel: ChannelKey) -> Option<Money<'a, Currency>> {
        self.channel_listings.get(&channel).copied()
    }
}

/// Registry of catalogue entities.
#[derive(Debug, Default)]
pub struct Catalogue<'a> {
    products: SlotMap<ProductKey, Product>,
    variants: SlotMap<VariantKey, ProductVariant<'a>>,
    categories: SlotMap<CategoryKey, String>,
    collections: SlotMap<CollectionKey, String>,
}

impl<'a> Catalogue<'a> {
    /// Create an empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category.
    pub fn add_category(&mut self, name: impl Into<String>) -> CategoryKey {
        self.categories.insert(name.into())
    }

    /// Add a collection.
    pub fn add_collection(&mut self, name: impl Into<String>) -> CollectionKey {
        self.collections.insert(name.into())
    }

    /// Add a product.
    pub fn add_product(&mut self, product: Product) -> ProductKey {
        self.products.insert(product)
    }

    /// Add a variant.
    pub fn add_variant(&mut self, variant: ProductVariant<'a>) -> VariantKey {
        self.variants.insert(variant)
    }

    /// Look up a product.
    pub fn product(&self, key: ProductKey) -> Option<&Product> {
        self.products.get(key)
    }

    /// Look up a variant.
    pub fn variant(&self, key: VariantKey) -> Option<&ProductVariant<'a>> {
        self.variants.get(key)
    }

    /// Look up the product a variant belongs to.
    pub fn variant_product(&self, key: VariantKey) -> Option<&Product> {
        self.variant(key)
            .and_then(|variant| self.products.get(variant.product))
    }

    /// Iterate over all variants.
    pub fn variants(&self) -> impl Iterator<Item = (VariantKey, &ProductVariant<'a>)> {
        self.variants.iter()
    }

    /// Category name.
    pub fn category_name(&self, key: CategoryKey) -> Option<&str> {
        self.categories.get(key).map(String::as_str)
    }

    /// Collection name.
    pub fn collection_name(&self, key: CollectionKey) -> Option<&str> {
        self.collections.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn variant_product_resolves_parent() {
        let mut catalogue = Catalogue::new();
        let shoes = catalogue.add_category("Shoes");
        let sale = catalogue.add_collection("Sale");

        let product = catalogue.add_product(Product {
            name: "Runner".to_string(),
            category: Some(shoes),
            collections: smallvec![sale],
        });

        let variant = catalogue.add_variant(
            ProductVariant::new(product, "Runner 42")
                .with_price(ChannelKey::default(), Money::from_minor(5999, GBP)),
        );

        let parent = catalogue.variant_product(variant);

        assert_eq!(parent.map(|product| product.name.as_str()), Some("Runner"));
        assert_eq!(catalogue.category_name(shoes), Some("Shoes"));
        assert_eq!(catalogue.collection_name(sale), Some("Sale"));
        assert_eq!(catalogue.variants().count(), 1);
    }

    #[test]
    fn variant_price_is_per_channel() {
        let variant = ProductVariant::new(ProductKey::default(), "Mug")
            .with_price(ChannelKey::default(), Money::from_minor(800, GBP));

        assert_eq!(
            variant.price(ChannelKey::default()),
            Some(Money::from_minor(800, GBP))
        );
    }
}
