use serde_json::json;
use tradeprice_core::RetailersFile;

use super::*;
use crate::testing::FakePageSource;

const LOCATOR: &str = "https://www.bunnings.co.nz/stores";

fn bunnings() -> RetailerConfig {
    RetailersFile::embedded()
        .expect("embedded retailers")
        .get("bunnings")
        .cloned()
        .expect("bunnings configured")
}

fn fetcher(source: FakePageSource) -> (StoreFetcher, Arc<FakePageSource>) {
    let source = Arc::new(source);
    let fallback = Arc::new(FallbackProvider::embedded().expect("fixtures"));
    (StoreFetcher::new(source.clone(), fallback), source)
}

fn fallback_ids(retailer: &str) -> Vec<String> {
    FallbackProvider::embedded()
        .expect("fixtures")
        .stores(retailer)
        .into_iter()
        .map(|s| s.id)
        .collect()
}

#[tokio::test]
async fn embedded_json_wins_first() {
    let page = r#"<html><script>
        window.__INITIAL_STATE__ = {"stores":[{
            "storeName":"Bunnings Botany",
            "fullAddress":"2 Te Irirangi Drive, Botany, Auckland 2013",
            "phone":"09 274 4100",
            "lat":-36.9342,"lng":174.9142
        }]};
    </script></html>"#;
    let (fetcher, _) = fetcher(FakePageSource::default().with_html(LOCATOR, page));

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.strategy, Some(Strategy::EmbeddedJson));
    assert_eq!(outcome.provenance, Provenance::LiveFetch);
    assert!(outcome.fallback_reason.is_none());
    assert_eq!(outcome.stores.len(), 1);
    let store = &outcome.stores[0];
    assert_eq!(store.id, "bunnings-bunnings-botany");
    assert_eq!(store.address.suburb, "Botany");
    assert_eq!(store.provenance, Provenance::LiveFetch);
    assert!(store.is_nz_verified());
}

#[tokio::test]
async fn network_endpoint_discovered_in_page() {
    let page = r#"<script>fetch("/api/store-list").then(render);</script>"#;
    let source = FakePageSource::default()
        .with_html(LOCATOR, page)
        .with_json(
            "https://www.bunnings.co.nz/api/store-list",
            json!({ "data": [
                {
                    "name": "Bunnings Albany",
                    "address": "6 Mercari Way, Albany, Auckland 0632",
                    "phone": "09 415 3000"
                }
            ]}),
        );
    let (fetcher, _) = fetcher(source);

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.strategy, Some(Strategy::NetworkJson));
    assert_eq!(outcome.stores[0].address.postcode, "0632");
}

#[tokio::test]
async fn unusable_records_advance_to_next_strategy() {
    let page = r#"
        <script>var stores = [{"name":"Bunnings Botany"}];</script>
        <div class="store-card">
          <h3>Bunnings Manukau</h3>
          <p class="address">39 Cavendish Drive, Manukau, Auckland 2104</p>
          <span class="phone">09 263 4200</span>
        </div>
    "#;
    let (fetcher, _) = fetcher(FakePageSource::default().with_html(LOCATOR, page));

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.strategy, Some(Strategy::VisibleElements));
    assert_eq!(outcome.stores.len(), 1);
    assert_eq!(outcome.stores[0].name, "Bunnings Manukau");
    assert_eq!(outcome.stores[0].phone, "+6492634200");
}

#[tokio::test]
async fn records_missing_required_fields_fall_back() {
    let page = r#"<div class="store-card">
        <h3>Bunnings Botany</h3>
        <p class="address">2 Te Irirangi Drive, Botany, Auckland 2013</p>
    </div>"#;
    let (fetcher, _) = fetcher(FakePageSource::default().with_html(LOCATOR, page));

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.provenance, Provenance::FallbackLiteral);
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::StrategiesExhausted)
    );
    let ids: Vec<String> = outcome.stores.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, fallback_ids("bunnings"));
}

#[tokio::test]
async fn complete_records_win_over_incomplete_ones_in_the_same_strategy() {
    let page = r#"
        <div class="store-card"><h3>Bunnings Botany</h3>
          <p class="address">2 Te Irirangi Drive, Botany, Auckland 2013</p></div>
        <div class="store-card"><h3>Bunnings Manukau</h3>
          <p class="address">39 Cavendish Drive, Manukau, Auckland 2104</p>
          <span class="phone">09 263 4200</span></div>
    "#;
    let (fetcher, _) = fetcher(FakePageSource::default().with_html(LOCATOR, page));

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.strategy, Some(Strategy::VisibleElements));
    let names: Vec<&str> = outcome.stores.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Bunnings Manukau"]);
}

#[tokio::test]
async fn interactive_filter_pages_are_parsed() {
    let page = r#"<select name="region"><option value="">All</option><option value="auckland">Auckland</option></select>"#;
    let filtered = r#"<div class="store-item"><h4>Bunnings Henderson</h4>
        <div class="address">171 Lincoln Road, Henderson, Auckland 0610</div>
        <span class="phone">09 836 0040</span></div>"#;
    let source = FakePageSource::default()
        .with_html(LOCATOR, page)
        .with_html("https://www.bunnings.co.nz/stores?region=auckland", filtered);
    let (fetcher, _) = fetcher(source);

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.strategy, Some(Strategy::InteractiveFilters));
    assert_eq!(outcome.stores[0].address.suburb, "Henderson");
}

#[tokio::test]
async fn region_search_tolerates_missing_regions() {
    let wellington = r#"<div class="store-card"><h3>Bunnings Petone</h3>
        <p class="address">Corner Jackson Street, Petone, Wellington</p>
        <p class="phone">04 568 8000</p></div>"#;
    let source = FakePageSource::default()
        .with_html(LOCATOR, "<html><body>Find a store</body></html>")
        .with_html("https://www.bunnings.co.nz/stores?location=Wellington", wellington);
    let (fetcher, _) = fetcher(source);

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.strategy, Some(Strategy::RegionSearch));
    assert_eq!(outcome.stores.len(), 1);
    assert_eq!(outcome.stores[0].address.region, "Wellington");
}

#[tokio::test]
async fn scenario_d_failing_strategies_return_exact_fallback_list() {
    let (fetcher, _) = fetcher(FakePageSource::failing());

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(outcome.provenance, Provenance::FallbackLiteral);
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::StrategiesExhausted)
    );
    assert!(outcome.strategy.is_none());
    let ids: Vec<String> = outcome.stores.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, fallback_ids("bunnings"));
    assert!(outcome
        .stores
        .iter()
        .all(|s| s.provenance == Provenance::FallbackLiteral));
}

#[tokio::test]
async fn disabled_automation_skips_all_requests() {
    let (fetcher, source) = fetcher(FakePageSource::disabled());

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::AutomationUnavailable)
    );
    assert_eq!(outcome.stores.len(), fallback_ids("bunnings").len());
    assert_eq!(source.request_count(), 0);
}

#[tokio::test]
async fn error_status_on_ping_is_unreachable() {
    let source = FakePageSource {
        ping_status: Some(503),
        ..FakePageSource::default()
    };
    let (fetcher, source) = fetcher(source);

    let outcome = fetcher.fetch(&bunnings()).await;
    assert_eq!(
        outcome.fallback_reason,
        Some(FallbackReason::RetailerUnreachable(
            "retailer bunnings unreachable: HTTP 503".to_string()
        ))
    );
    assert_eq!(source.request_count(), 1);
}

#[tokio::test]
async fn ping_error_is_unreachable() {
    let source = FakePageSource {
        ping_fails: true,
        ..FakePageSource::default()
    };
    let (fetcher, _) = fetcher(source);

    let outcome = fetcher.fetch(&bunnings()).await;
    assert!(matches!(
        outcome.fallback_reason,
        Some(FallbackReason::RetailerUnreachable(_))
    ));
    assert_eq!(outcome.provenance, Provenance::FallbackLiteral);
}

#[test]
fn strategy_outcome_from_result() {
    fn outcome(result: Result<Vec<Value>, ScraperError>) -> StrategyOutcome {
        result.into()
    }
    assert!(matches!(outcome(Ok(vec![])), StrategyOutcome::Empty));
    assert!(matches!(
        outcome(Ok(vec![json!({ "name": "x" })])),
        StrategyOutcome::Records(ref r) if r.len() == 1
    ));
    assert!(matches!(
        outcome(Err(ScraperError::AutomationUnavailable)),
        StrategyOutcome::Failed(_)
    ));
}
