//! Strategy 1: store arrays assigned to well-known globals inside `<script>` tags.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Text that precedes store data in locator pages, tried in order.
const MARKERS: [&str; 11] = [
    "window.__INITIAL_STATE__",
    "window.storeData",
    "window.stores",
    "var stores",
    "\"stores\":",
    "\"locations\":",
    "storeLocations:",
    "storeList:",
    "\"storeData\":",
    "bunningsStores =",
    "allStores:",
];

/// At least one of these on the first element marks an array as store records.
const STORE_KEYS: [&str; 4] = ["name", "storeName", "address", "suburb"];

/// Keys checked first when looking inside a wrapper object.
const WRAPPER_KEYS: [&str; 3] = ["stores", "locations", "data"];

const MAX_NESTING: usize = 4;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>(.*?)</script>").expect("valid regex"));

/// Scan script contents for a known marker followed by a JSON value that
/// holds store records. Returns the first non-empty match.
pub(in crate::fetcher) fn extract_embedded_stores(html: &str) -> Vec<Value> {
    for cap in SCRIPT_RE.captures_iter(html) {
        let Some(content) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if content.trim().is_empty() {
            continue;
        }

        for marker in MARKERS {
            for (pos, _) in content.match_indices(marker) {
                let rest = content[pos + marker.len()..]
                    .trim_start_matches(|c: char| c.is_whitespace() || c == '=' || c == ':');
                let Some(json) = extract_balanced(rest) else {
                    continue;
                };
                let Ok(value) = serde_json::from_str::<Value>(json) else {
                    continue;
                };
                let records = store_records(value);
                if !records.is_empty() {
                    tracing::debug!(marker, count = records.len(), "found embedded store data");
                    return records;
                }
            }
        }
    }
    vec![]
}

/// Pull the store array out of a decoded JSON document.
///
/// Accepts a bare array of store-shaped objects, or an object that holds one
/// under `stores`, `locations` or `data`, possibly a few levels down.
pub(in crate::fetcher) fn store_records(value: Value) -> Vec<Value> {
    find_store_records(value, 0).unwrap_or_default()
}

fn find_store_records(value: Value, depth: usize) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if looks_like_stores(&items) => Some(items),
        Value::Object(mut map) if depth < MAX_NESTING => {
            for key in WRAPPER_KEYS {
                if let Some(found) = map
                    .remove(key)
                    .and_then(|inner| find_store_records(inner, depth + 1))
                {
                    return Some(found);
                }
            }
            map.into_iter()
                .find_map(|(_, inner)| find_store_records(inner, depth + 1))
        }
        _ => None,
    }
}

fn looks_like_stores(items: &[Value]) -> bool {
    items
        .first()
        .and_then(Value::as_object)
        .is_some_and(|first| STORE_KEYS.iter().any(|k| first.contains_key(*k)))
}

/// Shortest prefix of `s` forming a complete `[…]` or `{…}` value.
///
/// Tracks bracket depth while skipping string literals and escapes. The
/// closing bracket at depth zero must match the opening one, so `[42}` is
/// rejected.
pub(crate) fn extract_balanced(s: &str) -> Option<&str> {
    let closer = match s.chars().next()? {
        '[' => ']',
        '{' => '}',
        _ => return None,
    };
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return (c == closer).then(|| &s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn balanced_array_stops_at_matching_bracket() {
        let s = r#"[{"name":"a]b"},[1,2]]; var x = 1;"#;
        assert_eq!(extract_balanced(s), Some(r#"[{"name":"a]b"},[1,2]]"#));
    }

    #[test]
    fn balanced_object_handles_escaped_quotes() {
        let s = r#"{"name":"say \"hi\" {"}  trailing"#;
        assert_eq!(extract_balanced(s), Some(r#"{"name":"say \"hi\" {"}"#));
    }

    #[test]
    fn mismatched_or_unterminated_is_rejected() {
        assert_eq!(extract_balanced("[42}"), None);
        assert_eq!(extract_balanced("[1, 2"), None);
        assert_eq!(extract_balanced("stores"), None);
        assert_eq!(extract_balanced(""), None);
    }

    #[test]
    fn initial_state_wrapper_is_unwrapped() {
        let html = r#"<html><script>
            window.__INITIAL_STATE__ = {"storeLocator":{"stores":[
                {"storeName":"Bunnings Botany","suburb":"Botany"},
                {"storeName":"Bunnings Manukau","suburb":"Manukau"}
            ]}};
        </script></html>"#;
        let records = extract_embedded_stores(html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["storeName"], "Bunnings Manukau");
    }

    #[test]
    fn assignment_array_is_found() {
        let html = r#"<script type="text/javascript">var stores = [{"name":"Repco Penrose","address":"2 Station Rd"}];</script>"#;
        let records = extract_embedded_stores(html);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn non_store_arrays_are_ignored() {
        let html = r#"<script>window.stores = [{"sku":"123"}]; var x = "locations": [1,2];</script>"#;
        assert!(extract_embedded_stores(html).is_empty());
    }

    #[test]
    fn later_script_is_searched_after_unparseable_one() {
        let html = r#"
            <script>window.storeData = [{name: 'not json'}];</script>
            <script>{"locations": [{"name":"Mitre 10 Botany","suburb":"Botany"}]}</script>
        "#;
        let records = extract_embedded_stores(html);
        assert_eq!(records[0]["name"], "Mitre 10 Botany");
    }

    #[test]
    fn data_wrapper_is_accepted() {
        let records = store_records(json!({ "data": [{ "name": "PlaceMakers Penrose" }] }));
        assert_eq!(records.len(), 1);
        assert!(store_records(json!({ "data": [] })).is_empty());
        assert!(store_records(json!("stores")).is_empty());
    }
}
