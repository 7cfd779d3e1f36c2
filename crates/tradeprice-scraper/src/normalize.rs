//! Maps raw retailer records onto [`StoreLocation`].
//!
//! Every extraction strategy yields JSON objects with whatever keys the
//! retailer happens to use. The retailer's [`FieldMap`] says which keys to
//! try for each canonical field; this module applies it once for all
//! retailers.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tradeprice_core::retailers::FieldMap;
use tradeprice_core::{Address, Provenance, RetailerConfig, StoreCoordinates, StoreLocation, WeeklyHours};

const DEFAULT_REGION: &str = "Auckland";

const ACCURACY_WITH_COORDINATES_M: u32 = 10;

// Substring of a lowercased address -> region. First hit wins.
const REGION_TABLE: [(&str, &str); 12] = [
    ("auckland", "Auckland"),
    ("wellington", "Wellington"),
    ("christchurch", "Canterbury"),
    ("hamilton", "Waikato"),
    ("tauranga", "Bay of Plenty"),
    ("dunedin", "Otago"),
    ("palmerston north", "Manawatu-Whanganui"),
    ("nelson", "Nelson"),
    ("rotorua", "Bay of Plenty"),
    ("new plymouth", "Taranaki"),
    ("whangarei", "Northland"),
    ("invercargill", "Southland"),
];

const HOURS_KEYS: [&str; 2] = ["hours", "openingHours"];

static POSTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));

/// Normalize a phone number to `+64…` form where the digits allow it.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.starts_with("64") {
        format!("+{digits}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("+64{rest}")
    } else if digits.len() >= 7 {
        format!("+64{digits}")
    } else {
        raw.trim().to_string()
    }
}

fn region_hit(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    REGION_TABLE
        .iter()
        .find(|(city, _)| lower.contains(city))
        .map(|(_, region)| *region)
}

/// Region for an address, by city name. Defaults to Auckland.
#[must_use]
pub fn region_for(address: &str) -> &'static str {
    region_hit(address).unwrap_or(DEFAULT_REGION)
}

/// First standalone 4-digit group.
#[must_use]
pub fn extract_postcode(text: &str) -> Option<&str> {
    POSTCODE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Lowercase with every run of non-alphanumerics collapsed to one dash.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[must_use]
pub fn store_id(retailer_id: &str, name: &str) -> String {
    format!("{retailer_id}-{}", slugify(name))
}

/// Longest product id; longer slugs are cut at this many characters.
pub const MAX_PRODUCT_ID_LEN: usize = 50;

#[must_use]
pub fn product_id(retailer_id: &str, name: &str) -> String {
    let id = store_id(retailer_id, name);
    let cut: String = id.chars().take(MAX_PRODUCT_ID_LEN).collect();
    cut.trim_end_matches('-').to_string()
}

/// Deduplication key for raw records within one strategy run:
/// `name-address-suburb`, lowercased.
#[must_use]
pub fn raw_dedup_key(raw: &Value) -> String {
    let get = |key: &str| raw.get(key).map(value_as_string).unwrap_or_default();
    format!("{}-{}-{}", get("name"), get("address"), get("suburb")).to_lowercase()
}

/// Drop raw records whose [`raw_dedup_key`] was already seen.
#[must_use]
pub fn dedup_raw(records: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(raw_dedup_key(r)))
        .collect()
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|v| v.is_finite())
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

/// First present value among `keys`.
fn lookup<'a>(raw: &'a Value, keys: &[String]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(k.as_str()))
        .find(|v| is_present(v))
}

fn lookup_string(raw: &Value, keys: &[String]) -> Option<String> {
    lookup(raw, keys)
        .map(value_as_string)
        .filter(|s| !s.is_empty())
}

fn split_address(full: &str) -> Address {
    let parts: Vec<&str> = full.split(',').map(str::trim).collect();
    let part = |i: usize| parts.get(i).copied().unwrap_or_default().to_string();
    Address {
        street: part(0),
        suburb: part(1),
        city: parts
            .len()
            .checked_sub(2)
            .map(part)
            .unwrap_or_default(),
        region: region_for(full).to_string(),
        postcode: extract_postcode(full).unwrap_or_default().to_string(),
    }
}

fn structured_address(obj: &serde_json::Map<String, Value>) -> Address {
    let get = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .map(value_as_string)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    };
    let street = get(&["street", "line1", "address1", "streetAddress"]);
    let suburb = get(&["suburb", "locality"]);
    let city = get(&["city", "town"]);
    let postcode = get(&["postcode", "postCode", "postalCode"]);
    let region = {
        let explicit = get(&["region"]);
        if explicit.is_empty() {
            region_for(&format!("{street} {suburb} {city}")).to_string()
        } else {
            explicit
        }
    };
    Address {
        street,
        suburb,
        city,
        region,
        postcode,
    }
}

fn build_address(raw: &Value, map: &FieldMap) -> Address {
    let mut address = match lookup(raw, &map.address) {
        Some(Value::Object(obj)) => structured_address(obj),
        Some(other) => split_address(&value_as_string(other)),
        None => Address {
            region: DEFAULT_REGION.to_string(),
            ..Address::default()
        },
    };

    if let Some(suburb) = lookup_string(raw, &map.suburb) {
        address.suburb = suburb;
    }
    if let Some(city) = lookup_string(raw, &map.city) {
        if let Some(region) = region_hit(&city) {
            address.region = region.to_string();
        }
        address.city = city;
    }
    if let Some(postcode) = lookup_string(raw, &map.postcode) {
        address.postcode = postcode;
    }
    address
}

fn build_services(retailer: &RetailerConfig, raw: &Value) -> Vec<String> {
    let extra: Vec<String> = match lookup(raw, &retailer.field_map.services) {
        Some(Value::Array(items)) => items
            .iter()
            .map(value_as_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    retailer
        .services
        .iter()
        .cloned()
        .chain(extra)
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

fn build_hours(raw: &Value) -> WeeklyHours {
    HOURS_KEYS
        .iter()
        .filter_map(|k| raw.get(*k))
        .find_map(|v| serde_json::from_value::<WeeklyHours>(v.clone()).ok())
        .unwrap_or_default()
}

/// Map one raw record onto the canonical schema.
///
/// Returns `None` for non-objects, records without a name, and records with
/// neither a street nor a suburb.
#[must_use]
pub fn normalize_store(
    retailer: &RetailerConfig,
    raw: &Value,
    provenance: Provenance,
    now: DateTime<Utc>,
) -> Option<StoreLocation> {
    if !raw.is_object() {
        return None;
    }
    let map = &retailer.field_map;

    let name = lookup_string(raw, &map.name)?;
    let address = build_address(raw, map);
    if address.street.is_empty() && address.suburb.is_empty() {
        return None;
    }

    let phone = lookup_string(raw, &map.phone)
        .map(|p| normalize_phone(&p))
        .unwrap_or_default();

    let lat = lookup(raw, &map.latitude).and_then(value_as_f64);
    let lng = lookup(raw, &map.longitude).and_then(value_as_f64);
    let coordinates = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(StoreCoordinates {
            lat,
            lng,
            accuracy_m: Some(ACCURACY_WITH_COORDINATES_M),
            verified: true,
        }),
        _ => None,
    };

    Some(StoreLocation {
        id: store_id(&retailer.id, &name),
        chain: retailer.id.clone(),
        chain_name: retailer.display_name.clone(),
        name,
        address,
        phone,
        coordinates,
        hours: build_hours(raw),
        services: build_services(retailer, raw),
        provenance,
        last_updated: now,
        distance_km: None,
    })
}

/// Normalize a batch, dropping records that fail [`normalize_store`].
#[must_use]
pub fn normalize_all(
    retailer: &RetailerConfig,
    raw: &[Value],
    provenance: Provenance,
) -> Vec<StoreLocation> {
    let now = Utc::now();
    let stores: Vec<StoreLocation> = raw
        .iter()
        .filter_map(|r| normalize_store(retailer, r, provenance, now))
        .collect();
    if stores.len() < raw.len() {
        tracing::debug!(
            retailer = %retailer.id,
            kept = stores.len(),
            dropped = raw.len() - stores.len(),
            "dropped raw records without name or address"
        );
    }
    stores
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
