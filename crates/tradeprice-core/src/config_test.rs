use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

fn build_with(pairs: &[(&'static str, &'static str)]) -> Result<AppConfig, ConfigError> {
    let map: HashMap<&str, &str> = pairs.iter().copied().collect();
    build_app_config(lookup_from_map(&map))
}

fn assert_invalid(var: &'static str, value: &'static str) {
    let result = build_with(&[(var, value)]);
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { var: ref v, .. }) if v == var),
        "expected InvalidEnvVar({var}), got: {result:?}"
    );
}

#[test]
fn parse_environment_known_values() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "TRADEPRICE_ENV"));
}

#[test]
fn build_app_config_defaults_with_empty_env() {
    let cfg = build_with(&[]).unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3001");
    assert_eq!(cfg.log_level, "info");
    assert!(cfg.retailers_path.is_none());
    assert_eq!(cfg.request_timeout_secs, 30);
    assert_eq!(cfg.ping_timeout_secs, 10);
    assert!(cfg.user_agent.starts_with("Mozilla/5.0"));
    assert_eq!(cfg.inter_retailer_delay_ms, 5000);
    assert_eq!(cfg.store_cache_ttl_minutes, 1440);
    assert_eq!(cfg.price_cache_ttl_minutes, 30);
    assert_eq!(cfg.price_cache_ttl(), chrono::Duration::minutes(30));
    assert_eq!(cfg.product_cache_ttl(), chrono::Duration::hours(24));
    assert!(cfg.automation_enabled);
    assert!(cfg.scheduler_enabled);
}

#[test]
fn build_app_config_reads_overrides() {
    let cfg = build_with(&[
        ("TRADEPRICE_ENV", "production"),
        ("TRADEPRICE_BIND_ADDR", "127.0.0.1:8080"),
        ("TRADEPRICE_RETAILERS_PATH", "./config/retailers.yaml"),
        ("TRADEPRICE_INTER_RETAILER_DELAY_MS", "0"),
        ("TRADEPRICE_PRICE_CACHE_TTL_MINUTES", "5"),
        ("TRADEPRICE_AUTOMATION_ENABLED", "false"),
        ("TRADEPRICE_SCHEDULER_ENABLED", "0"),
        ("TRADEPRICE_USER_AGENT", "tradeprice-test/1.0"),
    ])
    .unwrap();
    assert_eq!(cfg.env, Environment::Production);
    assert_eq!(cfg.bind_addr.port(), 8080);
    assert_eq!(
        cfg.retailers_path.as_deref(),
        Some(std::path::Path::new("./config/retailers.yaml"))
    );
    assert_eq!(cfg.inter_retailer_delay_ms, 0);
    assert_eq!(cfg.price_cache_ttl_minutes, 5);
    assert!(!cfg.automation_enabled);
    assert!(!cfg.scheduler_enabled);
    assert_eq!(cfg.user_agent, "tradeprice-test/1.0");
}

#[test]
fn blank_retailers_path_means_embedded() {
    let cfg = build_with(&[("TRADEPRICE_RETAILERS_PATH", "  ")]).unwrap();
    assert!(cfg.retailers_path.is_none());
}

#[test]
fn build_app_config_rejects_invalid_values() {
    assert_invalid("TRADEPRICE_BIND_ADDR", "not-a-socket-addr");
    assert_invalid("TRADEPRICE_REQUEST_TIMEOUT_SECS", "thirty");
    assert_invalid("TRADEPRICE_PING_TIMEOUT_SECS", "-1");
    assert_invalid("TRADEPRICE_INTER_RETAILER_DELAY_MS", "soon");
    assert_invalid("TRADEPRICE_STORE_CACHE_TTL_MINUTES", "0");
    assert_invalid("TRADEPRICE_PRICE_CACHE_TTL_MINUTES", "-30");
    assert_invalid("TRADEPRICE_PRODUCT_CACHE_TTL_MINUTES", "daily");
    assert_invalid("TRADEPRICE_AUTOMATION_ENABLED", "maybe");
    assert_invalid("TRADEPRICE_ENV", "staging");
}
