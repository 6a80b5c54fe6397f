use crate::app_config::{AppConfig, Environment};
use crate::thresholds::{BrandThresholds, CategoryMapperSettings};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_i32 = |var: &str, default: &str| -> Result<i32, ConfigError> {
        or_default(var, default)
            .parse::<i32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_flag(&or_default(var, default)).ok_or_else(|| invalid(var, "expected a boolean".into()))
    };

    let parse_unit = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(invalid(var, format!("{value} is outside [0, 1]")))
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SUPERCAT_ENV", "development"));
    let log_level = or_default("SUPERCAT_LOG_LEVEL", "info");
    let category_tables_path = PathBuf::from(or_default(
        "SUPERCAT_CATEGORY_TABLES_PATH",
        "./config/category_tables.yaml",
    ));
    let evidence_dir = PathBuf::from(or_default("SUPERCAT_EVIDENCE_DIR", "./evidence"));

    let db_max_connections = parse_u32("SUPERCAT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SUPERCAT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SUPERCAT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_u64("SUPERCAT_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default(
        "SUPERCAT_SCRAPER_USER_AGENT",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    );
    let scraper_inter_request_delay_ms =
        parse_u64("SUPERCAT_SCRAPER_INTER_REQUEST_DELAY_MS", "500")?;
    let scraper_max_retries = parse_u32("SUPERCAT_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_ms =
        parse_u64("SUPERCAT_SCRAPER_RETRY_BACKOFF_BASE_MS", "1000")?;
    let scraper_max_pages = parse_usize("SUPERCAT_SCRAPER_MAX_PAGES", "20")?;
    let scraper_fetch_product_details =
        parse_bool("SUPERCAT_SCRAPER_FETCH_PRODUCT_DETAILS", "false")?;

    let brand_thresholds = BrandThresholds {
        exact: parse_unit("SUPERCAT_BRAND_EXACT_THRESHOLD", "0.95")?,
        fuzzy: parse_unit("SUPERCAT_BRAND_FUZZY_THRESHOLD", "0.85")?,
        keyword: parse_unit("SUPERCAT_BRAND_KEYWORD_THRESHOLD", "0.75")?,
        contextual: parse_unit("SUPERCAT_BRAND_CONTEXTUAL_THRESHOLD", "0.65")?,
    };

    let category_settings = CategoryMapperSettings {
        fuzzy_threshold: parse_unit("SUPERCAT_CATEGORY_FUZZY_THRESHOLD", "0.8")?,
        max_suggestions: parse_usize("SUPERCAT_CATEGORY_MAX_SUGGESTIONS", "5")?,
        min_suggestion_score: CategoryMapperSettings::default().min_suggestion_score,
        hierarchy_search: parse_bool("SUPERCAT_CATEGORY_HIERARCHY_SEARCH", "true")?,
    };

    let worker_concurrency = parse_usize("SUPERCAT_WORKER_CONCURRENCY", "2")?;
    let worker_poll_interval_ms = parse_u64("SUPERCAT_WORKER_POLL_INTERVAL_MS", "2000")?;
    let job_max_attempts = parse_i32("SUPERCAT_JOB_MAX_ATTEMPTS", "3")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        category_tables_path,
        evidence_dir,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_inter_request_delay_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
        scraper_max_pages,
        scraper_fetch_product_details,
        brand_thresholds,
        category_settings,
        worker_concurrency,
        worker_poll_interval_ms,
        job_max_attempts,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
