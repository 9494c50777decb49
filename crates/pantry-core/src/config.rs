use crate::app_config::{AppConfig, Environment, TransactConfig};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const DEFAULT_TITLE_PREFIXES: &str = "QuadPoint Cloud,Transact Cloud POS";

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
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let env = parse_environment(&or_default("PANTRY_ENV", "development"))?;

    let raw_bind_addr = or_default("PANTRY_BIND_ADDR", "0.0.0.0:8080");
    let bind_addr =
        raw_bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: "PANTRY_BIND_ADDR".to_string(),
                reason: e.to_string(),
            })?;
    let log_level = or_default("PANTRY_LOG_LEVEL", "info");

    let transact = build_transact_config(&lookup)?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        transact,
    })
}

fn build_transact_config<F>(lookup: &F) -> Result<TransactConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let require_i64 = |var: &str| -> Result<i64, ConfigError> {
        let raw = require(var)?;
        raw.trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    // Zero is never a usable timer period or request timeout.
    let parse_period = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let secs = parse_u64(var, default)?;
        if secs == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(secs)
    };

    let base_url = require("TRANSACT_BASE_URL")?
        .trim_end_matches('/')
        .to_string();
    let tenant = require("TRANSACT_TENANT")?;
    let username = require("TRANSACT_USERNAME")?;
    let password = require("TRANSACT_PASSWORD")?;
    let report_name = require("TRANSACT_CSV_FAVORITE_REPORT_NAME")?;
    let report_type = require("TRANSACT_REPORT_TYPE")?;
    let profit_center_prefix = require("TRANSACT_PROFIT_CENTER_PREFIX")?;

    let name_column_offset = require_i64("TRANSACT_CSV_REPORT_NAME_COLUMN_OFFSET")?;
    let id_column_offset = require_i64("TRANSACT_CSV_REPORT_ID_COLUMN_OFFSET")?;
    let quantity_column_offset = require_i64("TRANSACT_CSV_REPORT_QTY_COLUMN_OFFSET")?;

    let fetch_period_secs = parse_period("TRANSACT_FETCH_PERIOD_SECS", "600")?;
    let reload_session_period_secs = parse_period("TRANSACT_RELOAD_SESSION_PERIOD_SECS", "3600")?;
    let report_poll_period_secs = parse_period("TRANSACT_REPORT_POLL_PERIOD_SECS", "5")?;
    let report_poll_timeout_secs = parse_period("TRANSACT_REPORT_POLL_TIMEOUT_SECS", "300")?;
    let request_timeout_secs = parse_period("TRANSACT_REQUEST_TIMEOUT_SECS", "30")?;

    let user_agent = or_default("TRANSACT_USER_AGENT", DEFAULT_USER_AGENT);

    let title_prefixes = parse_title_prefixes(&or_default(
        "TRANSACT_TITLE_PREFIXES",
        DEFAULT_TITLE_PREFIXES,
    ))?;
    let finalize_report = parse_bool(
        "TRANSACT_REPORT_FINALIZE",
        &or_default("TRANSACT_REPORT_FINALIZE", "true"),
    )?;

    Ok(TransactConfig {
        base_url,
        tenant,
        username,
        password,
        report_name,
        report_type,
        profit_center_prefix,
        name_column_offset,
        id_column_offset,
        quantity_column_offset,
        fetch_period_secs,
        reload_session_period_secs,
        report_poll_period_secs,
        report_poll_timeout_secs,
        request_timeout_secs,
        user_agent,
        title_prefixes,
        finalize_report,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PANTRY_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Split a comma-separated prefix list, trimming each entry.
///
/// Prefixes are matched against the portal's page title followed by
/// whitespace, so surrounding spaces in the env value are not significant.
fn parse_title_prefixes(raw: &str) -> Result<Vec<String>, ConfigError> {
    let prefixes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    if prefixes.is_empty() {
        return Err(ConfigError::InvalidEnvVar {
            var: "TRANSACT_TITLE_PREFIXES".to_string(),
            reason: "at least one title prefix is required".to_string(),
        });
    }

    Ok(prefixes)
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
