//! Store record checks applied before merging.
//!
//! Missing required fields drop a record. Coordinates outside New Zealand
//! and unrecognized phone numbers only flag it.

use std::sync::LazyLock;

use regex::Regex;
use tradeprice_core::geo::NZ_BOUNDS;
use tradeprice_core::StoreLocation;

static NZ_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+64|0)\d{8,9}$").expect("valid regex"));

static POSTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

/// Counts from one validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub kept: usize,
    pub dropped: usize,
    pub out_of_bounds: usize,
    pub bad_phone: usize,
}

/// Names of required fields that are blank.
#[must_use]
pub fn missing_fields(store: &StoreLocation) -> Vec<&'static str> {
    [
        ("id", store.id.as_str()),
        ("chain", store.chain.as_str()),
        ("name", store.name.as_str()),
        ("street", store.address.street.as_str()),
        ("suburb", store.address.suburb.as_str()),
        ("phone", store.phone.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect()
}

/// `true` when `phone`, with spaces, dashes, dots and parentheses removed,
/// is `+64` or `0` followed by 8-9 digits.
#[must_use]
pub fn is_nz_phone(phone: &str) -> bool {
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    NZ_PHONE_RE.is_match(&compact)
}

/// Stricter check used for display-quality records: required fields, a
/// 4-digit postcode, an NZ phone and, if present, coordinates inside NZ.
#[must_use]
pub fn is_strictly_valid(store: &StoreLocation) -> bool {
    missing_fields(store).is_empty()
        && POSTCODE_RE.is_match(store.address.postcode.trim())
        && is_nz_phone(&store.phone)
        && store
            .coordinates
            .is_none_or(|c| NZ_BOUNDS.contains(c.point()))
}

/// Validate one retailer's records.
///
/// Records missing a required field are dropped. Records with coordinates
/// outside the NZ bounding box are kept with `verified` cleared. Records
/// with an unrecognized phone are kept as they are.
#[must_use]
pub fn validate_stores(
    retailer_id: &str,
    stores: Vec<StoreLocation>,
) -> (Vec<StoreLocation>, ValidationSummary) {
    let mut summary = ValidationSummary::default();
    let mut kept = Vec::with_capacity(stores.len());

    for mut store in stores {
        let missing = missing_fields(&store);
        if !missing.is_empty() {
            tracing::warn!(
                retailer = retailer_id,
                store = %store.name,
                missing = ?missing,
                "dropping store with missing fields"
            );
            summary.dropped += 1;
            continue;
        }

        if let Some(coords) = store.coordinates.as_mut() {
            if !NZ_BOUNDS.contains(coords.point()) {
                tracing::warn!(
                    retailer = retailer_id,
                    store = %store.name,
                    lat = coords.lat,
                    lng = coords.lng,
                    "coordinates outside New Zealand"
                );
                coords.verified = false;
                summary.out_of_bounds += 1;
            }
        }

        if !is_nz_phone(&store.phone) {
            tracing::warn!(
                retailer = retailer_id,
                store = %store.name,
                phone = %store.phone,
                "unrecognized phone format"
            );
            summary.bad_phone += 1;
        }

        kept.push(store);
    }

    summary.kept = kept.len();
    (kept, summary)
}
