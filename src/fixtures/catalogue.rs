//! Catalogue Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;
use smallvec::SmallVec;

use crate::{
    catalogue::{Product, ProductVariant},
    fixtures::{Fixture, FixtureError, parse_price},
};

/// Wrapper for the catalogue in YAML
#[derive(Debug, Deserialize)]
pub struct CatalogueFixture {
    /// Category names
    #[serde(default)]
    pub categories: Vec<String>,

    /// Collection names
    #[serde(default)]
    pub collections: Vec<String>,

    /// Map of product key -> product fixture
    pub products: FxHashMap<String, ProductFixture>,
}

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Category name
    pub category: Option<String>,

    /// Collection names
    #[serde(default)]
    pub collections: Vec<String>,

    /// Map of variant key -> variant fixture
    pub variants: FxHashMap<String, VariantFixture>,
}

/// Variant Fixture
#[derive(Debug, Deserialize)]
pub struct VariantFixture {
    /// Variant name
    pub name: String,

    /// Channel key -> price (e.g., "80.00 GBP")
    #[serde(default)]
    pub prices: FxHashMap<String, String>,
}

impl Fixture {
    /// Load categories, collections, products and variants from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if a referenced
    /// category, collection or channel doesn't exist, or if a price is not in
    /// its channel's currency.
    pub fn load_catalogue(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: CatalogueFixture = self.read("catalogue", name)?;

        for category in fixture.categories {
            let key = self.scenario.catalogue.add_category(category.clone());

            self.category_keys.insert(category, key);
        }

        for collection in fixture.collections {
            let key = self.scenario.catalogue.add_collection(collection.clone());

            self.collection_keys.insert(collection, key);
        }

        for (product_name, product_fixture) in fixture.products {
            let category = product_fixture
                .category
                .map(|category| {
                    self.category_keys
                        .get(&category)
                        .copied()
                        .ok_or(FixtureError::CategoryNotFound(category))
                })
                .transpose()?;

            let collections = product_fixture
                .collections
                .into_iter()
                .map(|collection| {
                    self.collection_keys
                        .get(&collection)
                        .copied()
                        .ok_or(FixtureError::CollectionNotFound(collection))
                })
                .collect::<Result<SmallVec<_>, _>>()?;

            let product = self.scenario.catalogue.add_product(Product {
                name: product_fixture.name,
                category,
                collections,
            });

            self.product_keys.insert(product_name, product);

            for (variant_name, variant_fixture) in product_fixture.variants {
                let mut variant = ProductVariant::new(product, variant_fixture.name);

                for (channel_name, price) in variant_fixture.prices {
                    let channel = self.channel_key(&channel_name)?;
                    let price = parse_price(&price)?;

                    if let Some(listed) = self.scenario.channels.get(channel)
                        && listed.currency() != price.currency()
                    {
                        return Err(FixtureError::CurrencyMismatch(
                            listed.currency().iso_alpha_code.to_string(),
                            price.currency().iso_alpha_code.to_string(),
                        ));
                    }

                    variant = variant.with_price(channel, price);
                }

                let variant = self.scenario.catalogue.add_variant(variant);

                self.variant_keys.insert(variant_name, variant);
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::GBP};
    use tempfile::TempDir;
    use testresult::TestResult;

    use crate::fixtures::tests::write_fixture;

    use super::*;

    const CHANNELS: &str = "channels:\n  uk:\n    currency: GBP\n";

    #[test]
    fn catalogue_links_products_to_categories_and_collections() -> TestResult {
        let dir = TempDir::new()?;

        write_fixture(dir.path(), "channels", "shop", CHANNELS)?;
        write_fixture(
            dir.path(),
            "catalogue",
            "shop",
            "categories: [Footwear]\n\
             collections: [Summer]\n\
             products:\n  \
               boots:\n    \
                 name: Walking Boots\n    \
                 category: Footwear\n    \
                 collections: [Summer]\n    \
                 variants:\n      \
                   boots-42:\n        \
                     name: Size 42\n        \
                     prices:\n          \
                       uk: 80.00 GBP\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());

        fixture.load_channels("shop")?.load_catalogue("shop")?;

        let uk = fixture.channel_key("uk")?;
        let variant = fixture.variant_key("boots-42")?;
        let catalogue = &fixture.scenario().catalogue;

        let product = catalogue.variant_product(variant).ok_or("missing product")?;

        assert_eq!(product.name, "Walking Boots");
        assert_eq!(
            product.category.and_then(|category| catalogue.category_name(category)),
            Some("Footwear")
        );
        assert_eq!(product.collections.len(), 1);
        assert_eq!(
            catalogue.variant(variant).and_then(|variant| variant.price(uk)),
            Some(Money::from_minor(8000, GBP))
        );

        Ok(())
    }

    #[test]
    fn unknown_category_is_rejected() -> TestResult {
        let dir = TempDir::new()?;

        write_fixture(dir.path(), "channels", "shop", CHANNELS)?;
        write_fixture(
            dir.path(),
            "catalogue",
            "shop",
            "products:\n  hat:\n    name: Hat\n    category: Headwear\n    variants: {}\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());

        fixture.load_channels("shop")?;

        let result = fixture.load_catalogue("shop");

        assert!(matches!(result, Err(FixtureError::CategoryNotFound(_))));

        Ok(())
    }

    #[test]
    fn price_in_another_currency_is_rejected() -> TestResult {
        let dir = TempDir::new()?;

        write_fixture(dir.path(), "channels", "shop", CHANNELS)?;
        write_fixture(
            dir.path(),
            "catalogue",
            "shop",
            "products:\n  hat:\n    name: Hat\n    variants:\n      hat-one:\n        name: One size\n        \
             prices:\n          uk: 10.00 USD\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());

        fixture.load_channels("shop")?;

        let result = fixture.load_catalogue("shop");

        assert!(matches!(result, Err(FixtureError::CurrencyMismatch(_, _))));

        Ok(())
    }
}
