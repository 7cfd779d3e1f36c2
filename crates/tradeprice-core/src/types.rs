//! Records produced by the store and price pipelines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, NZ_BOUNDS};

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    LiveFetch,
    FallbackLiteral,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::LiveFetch => write!(f, "live-fetch"),
            Provenance::FallbackLiteral => write!(f, "fallback-literal"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub suburb: String,
    pub city: String,
    pub region: String,
    pub postcode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreCoordinates {
    pub lat: f64,
    pub lng: f64,
    /// Estimated accuracy in metres.
    pub accuracy_m: Option<u32>,
    pub verified: bool,
}

impl StoreCoordinates {
    #[must_use]
    pub fn point(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Trading hours for a single weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DayHours {
    Open { open: String, close: String },
    Closed,
}

impl DayHours {
    fn open(open: &str, close: &str) -> Self {
        DayHours::Open {
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyHours {
    pub monday: DayHours,
    pub tuesday: DayHours,
    pub wednesday: DayHours,
    pub thursday: DayHours,
    pub friday: DayHours,
    pub saturday: DayHours,
    pub sunday: DayHours,
}

impl Default for WeeklyHours {
    /// Typical trade-store hours, used when a source publishes none.
    fn default() -> Self {
        let weekday = DayHours::open("07:00", "17:00");
        Self {
            monday: weekday.clone(),
            tuesday: weekday.clone(),
            wednesday: weekday.clone(),
            thursday: weekday.clone(),
            friday: weekday,
            saturday: DayHours::open("08:00", "16:00"),
            sunday: DayHours::open("09:00", "15:00"),
        }
    }
}

/// A physical store belonging to one retailer chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreLocation {
    pub id: String,
    /// Retailer id from the retailer table, e.g. `bunnings`.
    pub chain: String,
    /// Chain display name, e.g. `Bunnings Warehouse`.
    pub chain_name: String,
    /// Store display name, e.g. `Bunnings Botany`.
    pub name: String,
    pub address: Address,
    /// Normalized to `+64…` where possible.
    pub phone: String,
    pub coordinates: Option<StoreCoordinates>,
    pub hours: WeeklyHours,
    pub services: Vec<String>,
    pub provenance: Provenance,
    pub last_updated: DateTime<Utc>,
    /// Distance from a reference area, set by the geo ranking helpers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl StoreLocation {
    /// `true` when the record carries verified coordinates inside New Zealand.
    #[must_use]
    pub fn is_nz_verified(&self) -> bool {
        self.coordinates
            .is_some_and(|c| c.verified && NZ_BOUNDS.contains(c.point()))
    }

    /// Composite key used to deduplicate merged store sets.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}",
            self.name.trim().to_lowercase(),
            self.address.suburb.trim().to_lowercase()
        )
    }
}

/// A price observed for a product at one retailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceQuote {
    pub retailer_id: String,
    pub retailer_name: String,
    pub product_name: String,
    pub brand: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub on_sale: bool,
    pub currency: String,
    pub in_stock: bool,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub match_score: u32,
    pub provenance: Provenance,
    pub last_updated: DateTime<Utc>,
}

impl ProductPriceQuote {
    pub const CURRENCY: &'static str = "NZD";
}

/// A catalog entry found by browsing a retailer's category searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub retailer_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub in_stock: bool,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    /// The search term a live record was found under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    pub provenance: Provenance,
    pub last_updated: DateTime<Utc>,
}

impl Product {
    /// Retailer plus lowercased name. One retailer lists a product once.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!("{}|{}", self.retailer_id, self.name.trim().to_lowercase())
    }

    /// Case-insensitive substring match on name, brand, category or
    /// description.
    #[must_use]
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [
            Some(self.name.as_str()),
            self.brand.as_deref(),
            Some(self.category.as_str()),
            Some(self.description.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
    }

    /// `all` matches everything; otherwise category or subcategory,
    /// ignoring case.
    #[must_use]
    pub fn in_category(&self, category: &str) -> bool {
        let category = category.trim();
        category.eq_ignore_ascii_case("all")
            || self.category.eq_ignore_ascii_case(category)
            || self.subcategory.eq_ignore_ascii_case(category)
    }
}
