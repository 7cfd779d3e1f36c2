//! Product categories and the pure list operations over catalog entries.

use std::collections::HashSet;

use serde::Deserialize;

use crate::types::Product;
use crate::ConfigError;

const CATEGORIES_YAML: &str = include_str!("../../../config/categories.yaml");

/// Terms searched per category on each catalog refresh.
pub const SEARCH_TERMS_PER_CATEGORY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: String,
    pub terms: Vec<String>,
}

impl Category {
    /// The terms a refresh searches for, in table order.
    #[must_use]
    pub fn search_terms(&self) -> &[String] {
        &self.terms[..self.terms.len().min(SEARCH_TERMS_PER_CATEGORY)]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded YAML is malformed or invalid.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml(CATEGORIES_YAML)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `yaml` cannot be parsed, lists no
    /// categories, repeats an id, or has a category without terms.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let table: CategoryTable =
            serde_yaml::from_str(yaml).map_err(|source| ConfigError::FixtureParse {
                name: "categories",
                source,
            })?;
        if table.categories.is_empty() {
            return Err(ConfigError::Validation(
                "category table must list at least one category".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for category in &table.categories {
            if !seen.insert(category.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate category '{}'",
                    category.id
                )));
            }
            if category.terms.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "category '{}' has no search terms",
                    category.id
                )));
            }
        }
        Ok(table)
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.id.as_str()).collect()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }
}

/// Keep the first product per [`Product::dedup_key`], preserving order.
#[must_use]
pub fn dedup_products(products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.dedup_key()))
        .collect()
}

/// Narrow a product list by category and free-text search. `None` or a
/// blank value skips that filter.
#[must_use]
pub fn filter_products(
    products: &[Product],
    category: Option<&str>,
    search: Option<&str>,
) -> Vec<Product> {
    let category = category.map(str::trim).filter(|c| !c.is_empty());
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    products
        .iter()
        .filter(|p| category.map_or(true, |c| p.in_category(c)))
        .filter(|p| search.map_or(true, |s| p.matches_term(s)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::Provenance;

    fn product(retailer: &str, name: &str, category: &str) -> Product {
        Product {
            id: format!("{retailer}-{}", name.to_lowercase().replace(' ', "-")),
            retailer_id: retailer.to_string(),
            name: name.to_string(),
            brand: Some("Makita".to_string()),
            category: category.to_string(),
            subcategory: "drills".to_string(),
            description: "18V brushless hammer driver drill".to_string(),
            price: Decimal::new(28900, 2),
            currency: "NZD".to_string(),
            in_stock: true,
            product_url: None,
            image_url: None,
            search_term: None,
            provenance: Provenance::FallbackLiteral,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn embedded_table_lists_six_categories_with_two_search_terms() {
        let table = CategoryTable::embedded().expect("embedded categories");
        assert_eq!(
            table.ids(),
            vec![
                "power-tools",
                "hand-tools",
                "plumbing",
                "electrical",
                "automotive",
                "gardening"
            ]
        );
        for category in table.categories() {
            assert_eq!(category.search_terms().len(), SEARCH_TERMS_PER_CATEGORY);
        }
        assert_eq!(table.categories()[0].search_terms(), ["drill", "saw"]);
    }

    #[test]
    fn duplicate_or_empty_categories_are_rejected() {
        let dup = "categories:\n  - { id: a, terms: [x] }\n  - { id: a, terms: [y] }\n";
        assert!(matches!(
            CategoryTable::from_yaml(dup),
            Err(ConfigError::Validation(_))
        ));
        let bare = "categories:\n  - { id: a, terms: [] }\n";
        assert!(matches!(
            CategoryTable::from_yaml(bare),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            CategoryTable::from_yaml("categories: ["),
            Err(ConfigError::FixtureParse {
                name: "categories",
                ..
            })
        ));
    }

    #[test]
    fn dedup_keeps_first_per_retailer_and_name() {
        let products = vec![
            product("bunnings", "Makita Drill", "power-tools"),
            product("bunnings", "MAKITA DRILL ", "power-tools"),
            product("mitre10", "Makita Drill", "power-tools"),
        ];
        let kept = dedup_products(products);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].name, "Makita Drill");
        assert_eq!(kept[1].retailer_id, "mitre10");
    }

    #[test]
    fn filter_matches_category_subcategory_and_text() {
        let products = vec![
            product("bunnings", "Makita Drill", "power-tools"),
            product("repco", "Castrol GTX 5L", "automotive"),
        ];
        assert_eq!(filter_products(&products, Some("automotive"), None).len(), 1);
        assert_eq!(filter_products(&products, Some("DRILLS"), None).len(), 2);
        assert_eq!(filter_products(&products, Some("all"), Some("castrol")).len(), 1);
        assert_eq!(filter_products(&products, None, Some("brushless")).len(), 2);
        assert_eq!(filter_products(&products, Some(" "), Some("")).len(), 2);
        assert!(filter_products(&products, Some("gardening"), None).is_empty());
    }
}
