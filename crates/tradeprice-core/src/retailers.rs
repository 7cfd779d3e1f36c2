use std::collections::HashSet;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

const RETAILERS_YAML: &str = include_str!("../../../config/retailers.yaml");

const MAX_RATE_LIMIT_MS: u64 = 60_000;
const QUERY_PLACEHOLDER: &str = "{query}";

/// CSS selector groups for store listings. Each value is a comma-separated
/// selector list tried as one `select` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSelectors {
    pub container: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub suburb: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSelectors {
    pub container: String,
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub original_price: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Canonical store field -> source keys tried in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub name: Vec<String>,
    pub address: Vec<String>,
    pub suburb: Vec<String>,
    pub city: Vec<String>,
    pub postcode: Vec<String>,
    pub phone: Vec<String>,
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerConfig {
    pub id: String,
    pub display_name: String,
    pub official_site: String,
    pub base_url: String,
    pub store_locator_url: String,
    /// Product search URL with a `{query}` placeholder. Retailers without
    /// one only serve store data.
    #[serde(default)]
    pub search_url: Option<String>,
    /// Pause after this retailer before the next one is fetched.
    pub rate_limit_ms: u64,
    #[serde(default)]
    pub region_search: Vec<String>,
    #[serde(default)]
    pub filter_param: Option<String>,
    #[serde(default)]
    pub api_endpoints: Vec<String>,
    /// Service tags applied to live records that publish none.
    #[serde(default)]
    pub services: Vec<String>,
    pub store_selectors: StoreSelectors,
    #[serde(default)]
    pub product_selectors: Option<ProductSelectors>,
    #[serde(default)]
    pub field_map: FieldMap,
}

impl RetailerConfig {
    /// Search URL with `query` percent-encoded into the template.
    #[must_use]
    pub fn search_url_for(&self, query: &str) -> Option<String> {
        let template = self.search_url.as_deref()?;
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        Some(template.replace(QUERY_PLACEHOLDER, &encoded))
    }

    /// Locator URL with `param=value` appended, used by the filter and
    /// region strategies.
    #[must_use]
    pub fn locator_url_with(&self, param: &str, value: &str) -> String {
        let sep = if self.store_locator_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{sep}{param}={}",
            self.store_locator_url,
            utf8_percent_encode(value, NON_ALPHANUMERIC)
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetailersFile {
    pub retailers: Vec<RetailerConfig>,
}

impl RetailersFile {
    /// The retailer table compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the embedded table fails to parse or validate.
    pub fn embedded() -> Result<Self, ConfigError> {
        parse_retailers(RETAILERS_YAML)
    }

    /// Load from `path` when given, otherwise the embedded table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the table cannot be read, parsed, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => load_retailers(p),
            None => Self::embedded(),
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RetailerConfig> {
        self.retailers.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.retailers.iter().map(|r| r.id.as_str())
    }
}

/// Load and validate the retailer table from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_retailers(path: &Path) -> Result<RetailersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RetailersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_retailers(&content)
}

fn parse_retailers(content: &str) -> Result<RetailersFile, ConfigError> {
    let file: RetailersFile =
        serde_yaml::from_str(content).map_err(ConfigError::RetailersFileParse)?;
    validate_retailers(&file)?;
    Ok(file)
}

fn validate_retailers(file: &RetailersFile) -> Result<(), ConfigError> {
    if file.retailers.is_empty() {
        return Err(ConfigError::Validation(
            "retailer table must list at least one retailer".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for retailer in &file.retailers {
        if retailer.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "retailer id must be non-empty".to_string(),
            ));
        }

        if !seen_ids.insert(retailer.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate retailer id: '{}'",
                retailer.id
            )));
        }

        for (field, url) in [
            ("official_site", &retailer.official_site),
            ("base_url", &retailer.base_url),
            ("store_locator_url", &retailer.store_locator_url),
        ] {
            if !url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "retailer '{}' {field} must use https: '{url}'",
                    retailer.id
                )));
            }
        }

        if let Some(search) = &retailer.search_url {
            if !search.contains(QUERY_PLACEHOLDER) {
                return Err(ConfigError::Validation(format!(
                    "retailer '{}' search_url is missing the {QUERY_PLACEHOLDER} placeholder",
                    retailer.id
                )));
            }
        }

        if retailer.rate_limit_ms > MAX_RATE_LIMIT_MS {
            return Err(ConfigError::Validation(format!(
                "retailer '{}' rate_limit_ms {} exceeds {MAX_RATE_LIMIT_MS}",
                retailer.id, retailer.rate_limit_ms
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
retailers:
  - id: bunnings
    display_name: Bunnings Warehouse
    official_site: https://www.bunnings.co.nz
    base_url: https://www.bunnings.co.nz
    store_locator_url: https://www.bunnings.co.nz/stores
    search_url: "https://www.bunnings.co.nz/search/products?q={query}"
    rate_limit_ms: 2000
    store_selectors:
      container: ".store"
      name: ".name"
      address: ".address"
      phone: ".phone"
"#;

    #[test]
    fn embedded_table_lists_retailers_in_order() {
        let file = RetailersFile::embedded().expect("embedded table");
        let ids: Vec<&str> = file.ids().collect();
        assert_eq!(
            ids,
            vec![
                "bunnings",
                "mitre10",
                "placemakers",
                "repco",
                "supercheapAuto",
                "corysElectrical",
                "plumbingWorld"
            ]
        );
        assert!(file
            .retailers
            .iter()
            .all(|r| (2000..=5000).contains(&r.rate_limit_ms)));
    }

    #[test]
    fn embedded_field_map_expands_anchor() {
        let file = RetailersFile::embedded().expect("embedded table");
        let repco = file.get("repco").expect("repco");
        assert_eq!(repco.field_map.name[0], "name");
        assert!(repco.field_map.latitude.contains(&"lat".to_string()));
        assert!(file.get("plumbingWorld").expect("plumbing").search_url.is_none());
    }

    #[test]
    fn minimal_table_parses() {
        let file = parse_retailers(MINIMAL).expect("parse");
        let bunnings = file.get("bunnings").expect("bunnings");
        assert!(bunnings.product_selectors.is_none());
        assert!(bunnings.field_map.name.is_empty());
        assert!(bunnings.region_search.is_empty());
    }

    #[test]
    fn search_url_encodes_query() {
        let file = parse_retailers(MINIMAL).expect("parse");
        let url = file
            .get("bunnings")
            .and_then(|r| r.search_url_for("Makita DHP484Z"))
            .expect("url");
        assert_eq!(
            url,
            "https://www.bunnings.co.nz/search/products?q=Makita%20DHP484Z"
        );
    }

    #[test]
    fn locator_url_appends_param() {
        let file = parse_retailers(MINIMAL).expect("parse");
        let bunnings = file.get("bunnings").expect("bunnings");
        assert_eq!(
            bunnings.locator_url_with("region", "Bay of Plenty"),
            "https://www.bunnings.co.nz/stores?region=Bay%20of%20Plenty"
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = format!("{MINIMAL}{}", MINIMAL.replace("retailers:\n", ""));
        let err = parse_retailers(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_plain_http() {
        let yaml = MINIMAL.replace("base_url: https://", "base_url: http://");
        let err = parse_retailers(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("base_url")));
    }

    #[test]
    fn rejects_search_url_without_placeholder() {
        let yaml = MINIMAL.replace("q={query}", "q=");
        let err = parse_retailers(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("placeholder")));
    }

    #[test]
    fn rejects_excessive_delay() {
        let yaml = MINIMAL.replace("rate_limit_ms: 2000", "rate_limit_ms: 60001");
        let err = parse_retailers(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("rate_limit_ms")));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = parse_retailers("retailers: [").unwrap_err();
        assert!(matches!(err, ConfigError::RetailersFileParse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_retailers(Path::new("/nonexistent/retailers.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::RetailersFileIo { .. }));
    }
}
