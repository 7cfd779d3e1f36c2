use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from the current process environment
/// without reading `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_minutes = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let minutes = or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if minutes <= 0 {
            return Err(invalid(var, "must be a positive number of minutes".to_string()));
        }
        Ok(minutes)
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let env = parse_environment(&or_default("TRADEPRICE_ENV", "development"))?;

    let bind_addr = or_default("TRADEPRICE_BIND_ADDR", "0.0.0.0:3001")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("TRADEPRICE_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("TRADEPRICE_LOG_LEVEL", "info");
    let retailers_path = lookup("TRADEPRICE_RETAILERS_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let request_timeout_secs = parse_u64("TRADEPRICE_REQUEST_TIMEOUT_SECS", "30")?;
    let ping_timeout_secs = parse_u64("TRADEPRICE_PING_TIMEOUT_SECS", "10")?;
    let user_agent = or_default("TRADEPRICE_USER_AGENT", DEFAULT_USER_AGENT);
    let inter_retailer_delay_ms = parse_u64("TRADEPRICE_INTER_RETAILER_DELAY_MS", "5000")?;

    let store_cache_ttl_minutes = parse_minutes("TRADEPRICE_STORE_CACHE_TTL_MINUTES", "1440")?;
    let price_cache_ttl_minutes = parse_minutes("TRADEPRICE_PRICE_CACHE_TTL_MINUTES", "30")?;
    let product_cache_ttl_minutes =
        parse_minutes("TRADEPRICE_PRODUCT_CACHE_TTL_MINUTES", "1440")?;

    let automation_enabled = parse_bool("TRADEPRICE_AUTOMATION_ENABLED", "true")?;
    let scheduler_enabled = parse_bool("TRADEPRICE_SCHEDULER_ENABLED", "true")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        retailers_path,
        request_timeout_secs,
        ping_timeout_secs,
        user_agent,
        inter_retailer_delay_ms,
        store_cache_ttl_minutes,
        price_cache_ttl_minutes,
        product_cache_ttl_minutes,
        automation_enabled,
        scheduler_enabled,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value is not one of
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TRADEPRICE_ENV".to_string(),
            reason: format!(
                "unknown environment '{other}'; expected development, test, or production"
            ),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
