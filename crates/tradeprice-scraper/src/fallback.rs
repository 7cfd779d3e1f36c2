//! Literal store, price and catalog records used when live retrieval yields
//! nothing.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tradeprice_core::{
    Address, ConfigError, Product, ProductPriceQuote, Provenance, StoreCoordinates,
    StoreLocation, WeeklyHours,
};

use crate::normalize::product_id;

const FALLBACK_STORES_YAML: &str = include_str!("../../../config/fallback_stores.yaml");
const FALLBACK_PRICES_YAML: &str = include_str!("../../../config/fallback_prices.yaml");
const FALLBACK_PRODUCTS_YAML: &str = include_str!("../../../config/fallback_products.yaml");

#[derive(Debug, Clone, Deserialize)]
struct FallbackStore {
    id: String,
    chain: String,
    chain_name: String,
    name: String,
    address: Address,
    phone: String,
    coordinates: Option<StoreCoordinates>,
    #[serde(default)]
    services: Vec<String>,
}

/// A hand-recorded shelf price, scored like a live search result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackQuote {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct FallbackProduct {
    name: String,
    brand: Option<String>,
    category: String,
    subcategory: String,
    description: String,
    price: Decimal,
    #[serde(default = "in_stock_default")]
    in_stock: bool,
}

fn in_stock_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FixtureFile<T> {
    retailers: HashMap<String, Vec<T>>,
}

/// Parsed fallback datasets, keyed by retailer id.
#[derive(Debug, Clone)]
pub struct FallbackProvider {
    stores: HashMap<String, Vec<FallbackStore>>,
    prices: HashMap<String, Vec<FallbackQuote>>,
    products: HashMap<String, Vec<FallbackProduct>>,
}

impl FallbackProvider {
    /// Parse the datasets compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FixtureParse`] if either dataset is malformed.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml(FALLBACK_STORES_YAML, FALLBACK_PRICES_YAML)?
            .with_products(FALLBACK_PRODUCTS_YAML)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::FixtureParse`] if either document is malformed.
    pub fn from_yaml(stores_yaml: &str, prices_yaml: &str) -> Result<Self, ConfigError> {
        let stores: FixtureFile<FallbackStore> =
            serde_yaml::from_str(stores_yaml).map_err(|source| ConfigError::FixtureParse {
                name: "fallback_stores",
                source,
            })?;
        let prices: FixtureFile<FallbackQuote> =
            serde_yaml::from_str(prices_yaml).map_err(|source| ConfigError::FixtureParse {
                name: "fallback_prices",
                source,
            })?;
        Ok(Self {
            stores: stores.retailers,
            prices: prices.retailers,
            products: HashMap::new(),
        })
    }

    /// Replace the catalog dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FixtureParse`] if the document is malformed.
    pub fn with_products(mut self, products_yaml: &str) -> Result<Self, ConfigError> {
        let products: FixtureFile<FallbackProduct> = serde_yaml::from_str(products_yaml)
            .map_err(|source| ConfigError::FixtureParse {
                name: "fallback_products",
                source,
            })?;
        self.products = products.retailers;
        Ok(self)
    }

    /// The fixed store list for `retailer`, tagged as fallback data.
    /// Unknown retailers yield an empty list.
    #[must_use]
    pub fn stores(&self, retailer: &str) -> Vec<StoreLocation> {
        let now = Utc::now();
        self.stores
            .get(retailer)
            .map(|records| {
                records
                    .iter()
                    .map(|r| StoreLocation {
                        id: r.id.clone(),
                        chain: r.chain.clone(),
                        chain_name: r.chain_name.clone(),
                        name: r.name.clone(),
                        address: r.address.clone(),
                        phone: r.phone.clone(),
                        coordinates: r.coordinates,
                        hours: WeeklyHours::default(),
                        services: r.services.clone(),
                        provenance: Provenance::FallbackLiteral,
                        last_updated: now,
                        distance_km: None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Candidate price records for `retailer`, unscored.
    #[must_use]
    pub fn quotes(&self, retailer: &str) -> &[FallbackQuote] {
        self.prices.get(retailer).map_or(&[], Vec::as_slice)
    }

    /// Catalog entries for `retailer`, tagged as fallback data.
    #[must_use]
    pub fn products(&self, retailer: &str) -> Vec<Product> {
        let now = Utc::now();
        self.products
            .get(retailer)
            .map(|records| {
                records
                    .iter()
                    .map(|r| Product {
                        id: product_id(retailer, &r.name),
                        retailer_id: retailer.to_string(),
                        name: r.name.clone(),
                        brand: r.brand.clone(),
                        category: r.category.clone(),
                        subcategory: r.subcategory.clone(),
                        description: r.description.clone(),
                        price: r.price,
                        currency: ProductPriceQuote::CURRENCY.to_string(),
                        in_stock: r.in_stock,
                        product_url: None,
                        image_url: None,
                        search_term: None,
                        provenance: Provenance::FallbackLiteral,
                        last_updated: now,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> FallbackProvider {
        FallbackProvider::embedded().expect("embedded fixtures")
    }

    #[test]
    fn every_configured_retailer_has_fallback_stores() {
        let provider = provider();
        let retailers = tradeprice_core::RetailersFile::embedded().expect("retailers");
        for id in retailers.ids() {
            let stores = provider.stores(id);
            assert!(!stores.is_empty(), "{id} has no fallback stores");
            assert!(stores.iter().all(|s| s.chain == id), "{id} chain mismatch");
        }
    }

    #[test]
    fn fallback_stores_are_tagged_and_verified_in_nz() {
        let stores = provider().stores("bunnings");
        assert_eq!(stores.len(), 10);
        assert!(stores
            .iter()
            .all(|s| s.provenance == Provenance::FallbackLiteral));
        assert!(stores.iter().all(StoreLocation::is_nz_verified));
        assert_eq!(stores[0].id, "bunnings-botany");
        assert_eq!(stores[0].address.postcode, "2013");
        assert_eq!(stores[0].hours, WeeklyHours::default());
    }

    #[test]
    fn fallback_store_ids_are_unique() {
        let provider = provider();
        let mut seen = std::collections::HashSet::new();
        for records in provider.stores.values() {
            for r in records {
                assert!(seen.insert(r.id.clone()), "duplicate id {}", r.id);
            }
        }
        assert_eq!(seen.len(), 38);
    }

    #[test]
    fn fallback_prices_are_positive_and_consistent() {
        let provider = provider();
        let mut total = 0;
        for quotes in provider.prices.values() {
            for q in quotes {
                assert!(q.price > Decimal::ZERO, "{} has no price", q.name);
                if let Some(original) = q.original_price {
                    assert!(original >= q.price, "{} original below price", q.name);
                }
                total += 1;
            }
        }
        assert!(total > 0);
    }

    #[test]
    fn fallback_catalog_covers_five_retailers() {
        let provider = provider();
        let counts: Vec<usize> = [
            "bunnings",
            "mitre10",
            "placemakers",
            "repco",
            "supercheapAuto",
        ]
        .iter()
        .map(|r| provider.products(r).len())
        .collect();
        assert_eq!(counts, vec![8, 6, 4, 4, 3]);
        let drill = &provider.products("bunnings")[0];
        assert_eq!(drill.brand.as_deref(), Some("Makita"));
        assert_eq!(drill.category, "power-tools");
        assert_eq!(drill.price, Decimal::new(28900, 2));
        assert_eq!(drill.currency, "NZD");
        assert!(drill.id.starts_with("bunnings-makita-18v"));
        assert_eq!(drill.provenance, Provenance::FallbackLiteral);
        assert!(provider.products("corysElectrical").is_empty());
    }

    #[test]
    fn catalog_fixture_is_optional_for_custom_providers() {
        let provider = FallbackProvider::from_yaml("retailers: {}", "retailers: {}")
            .expect("empty fixtures");
        assert!(provider.products("bunnings").is_empty());
        let err = provider.with_products("retailers: [").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FixtureParse {
                name: "fallback_products",
                ..
            }
        ));
    }

    #[test]
    fn unknown_retailer_is_empty() {
        let provider = provider();
        assert!(provider.stores("warehouse").is_empty());
        assert!(provider.quotes("corysElectrical").is_empty());
    }

    #[test]
    fn malformed_fixture_names_dataset() {
        let err = FallbackProvider::from_yaml("retailers: [", "retailers: {}").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FixtureParse {
                name: "fallback_stores",
                ..
            }
        ));
    }
}
