use serde_json::json;
use tradeprice_core::{DayHours, RetailersFile};

use super::*;

fn repco() -> RetailerConfig {
    RetailersFile::embedded()
        .expect("embedded retailers")
        .get("repco")
        .cloned()
        .expect("repco configured")
}

fn normalize(raw: &Value) -> Option<StoreLocation> {
    normalize_store(&repco(), raw, Provenance::LiveFetch, Utc::now())
}

#[test]
fn phone_forms() {
    assert_eq!(normalize_phone("09 579 2020"), "+6495792020");
    assert_eq!(normalize_phone("+64 9 579 2020"), "+6495792020");
    assert_eq!(normalize_phone("(64) 3-366 1234"), "+6433661234");
    assert_eq!(normalize_phone("579 2020"), "+645792020");
    assert_eq!(normalize_phone("ext 12"), "ext 12");
    assert_eq!(normalize_phone(""), "");
}

#[test]
fn region_from_city_substring() {
    assert_eq!(region_for("12 Main St, Riccarton, Christchurch 8011"), "Canterbury");
    assert_eq!(region_for("1 Devon St, New Plymouth"), "Taranaki");
    assert_eq!(region_for("Somewhere Rural"), "Auckland");
}

#[test]
fn postcode_is_first_four_digit_group() {
    assert_eq!(extract_postcode("39 Cavendish Drive, Manukau, Auckland 2104"), Some("2104"));
    assert_eq!(extract_postcode("3058 Great North Road"), Some("3058"));
    assert_eq!(extract_postcode("Unit 12B"), None);
}

#[test]
fn slug_collapses_punctuation() {
    assert_eq!(slugify("Repco  Mt. Wellington"), "repco-mt-wellington");
    assert_eq!(store_id("repco", "Repco Penrose"), "repco-repco-penrose");
}

#[test]
fn product_id_is_capped_without_trailing_dash() {
    let id = product_id(
        "bunnings",
        "Makita 18V LXT Brushless Hammer Driver Drill - Tool Only",
    );
    assert!(id.len() <= MAX_PRODUCT_ID_LEN);
    assert!(id.starts_with("bunnings-makita-18v-lxt-brushless"));
    assert!(!id.ends_with('-'));
    assert_eq!(product_id("repco", "Ryco Z516"), "repco-ryco-z516");
}

#[test]
fn comma_address_is_split() {
    let store = normalize(&json!({
        "storeName": "Repco Penrose",
        "fullAddress": "2 Station Road, Penrose, Auckland, 1061",
        "phoneNumber": "09 579 2020",
        "latitude": "-36.9170",
        "lng": 174.8170
    }))
    .expect("normalized");

    assert_eq!(store.id, "repco-repco-penrose");
    assert_eq!(store.chain, "repco");
    assert_eq!(store.chain_name, "Repco");
    assert_eq!(store.address.street, "2 Station Road");
    assert_eq!(store.address.suburb, "Penrose");
    assert_eq!(store.address.city, "Auckland");
    assert_eq!(store.address.region, "Auckland");
    assert_eq!(store.address.postcode, "1061");
    assert_eq!(store.phone, "+6495792020");
    let coords = store.coordinates.expect("coordinates");
    assert!((coords.lat + 36.917).abs() < 1e-9);
    assert_eq!(coords.accuracy_m, Some(10));
    assert!(coords.verified);
    assert_eq!(store.provenance, Provenance::LiveFetch);
}

#[test]
fn explicit_fields_override_split_address() {
    let store = normalize(&json!({
        "name": "Repco Riccarton",
        "address": "129 Riccarton Road",
        "suburb": "Riccarton",
        "city": "Christchurch",
        "postcode": "8011"
    }))
    .expect("normalized");
    assert_eq!(store.address.suburb, "Riccarton");
    assert_eq!(store.address.city, "Christchurch");
    assert_eq!(store.address.postcode, "8011");
    assert_eq!(store.address.region, "Canterbury");
    assert!(store.coordinates.is_none());
}

#[test]
fn region_comes_from_city_when_no_address() {
    let store = normalize(&json!({
        "name": "Repco Tauranga",
        "suburb": "Mount Maunganui",
        "city": "Tauranga"
    }))
    .expect("normalized");
    assert_eq!(store.address.region, "Bay of Plenty");
    assert_eq!(store.address.street, "");
}

#[test]
fn structured_address_object() {
    let store = normalize(&json!({
        "name": "Repco Hamilton",
        "address": { "street": "1 Te Rapa Road", "suburb": "Te Rapa", "city": "Hamilton" }
    }))
    .expect("normalized");
    assert_eq!(store.address.street, "1 Te Rapa Road");
    assert_eq!(store.address.region, "Waikato");
}

#[test]
fn records_without_name_or_location_are_dropped() {
    assert!(normalize(&json!({ "address": "1 Queen St, CBD" })).is_none());
    assert!(normalize(&json!({ "name": "Repco Somewhere" })).is_none());
    assert!(normalize(&json!({ "name": "  ", "suburb": "Penrose" })).is_none());
    assert!(normalize(&json!(["not", "an", "object"])).is_none());
}

#[test]
fn half_coordinates_are_ignored() {
    let store = normalize(&json!({
        "name": "Repco Penrose",
        "suburb": "Penrose",
        "lat": -36.917
    }))
    .expect("normalized");
    assert!(store.coordinates.is_none());
}

#[test]
fn services_merge_defaults_without_duplicates() {
    let store = normalize(&json!({
        "name": "Repco Penrose",
        "suburb": "Penrose",
        "services": ["Oil Change", "Wiper Fitting", "oil change"]
    }))
    .expect("normalized");
    assert_eq!(
        store.services,
        vec![
            "Auto Parts",
            "Trade Services",
            "Battery Testing",
            "Oil Change",
            "Wiper Fitting"
        ]
    );
}

#[test]
fn hours_default_unless_published_in_canonical_shape() {
    let store = normalize(&json!({ "name": "Repco Penrose", "suburb": "Penrose" }))
        .expect("normalized");
    assert_eq!(store.hours, WeeklyHours::default());

    let mut hours = serde_json::to_value(WeeklyHours::default()).expect("hours");
    hours["sunday"] = json!({ "status": "closed" });
    let store = normalize(&json!({
        "name": "Repco Penrose",
        "suburb": "Penrose",
        "openingHours": hours
    }))
    .expect("normalized");
    assert_eq!(store.hours.sunday, DayHours::Closed);
}

#[test]
fn raw_dedup_ignores_case() {
    let records = vec![
        json!({ "name": "Repco Penrose", "address": "2 Station Rd", "suburb": "Penrose" }),
        json!({ "name": "REPCO PENROSE", "address": "2 station rd", "suburb": "penrose" }),
        json!({ "name": "Repco Botany", "address": "2 Station Rd", "suburb": "Penrose" }),
    ];
    let unique = dedup_raw(records);
    assert_eq!(unique.len(), 2);
}

#[test]
fn normalize_all_drops_bad_records() {
    let raw = vec![
        json!({ "name": "Repco Penrose", "suburb": "Penrose" }),
        json!({ "suburb": "Nameless" }),
    ];
    let stores = normalize_all(&repco(), &raw, Provenance::LiveFetch);
    assert_eq!(stores.len(), 1);
}
