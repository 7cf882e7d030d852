use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

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

/// Load application configuration from environment variables already in the process.
///
/// Does not read `.env`; callers that want it should go through [`load_app_config`].
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default; the lookup only overrides. Kept separate from
/// the process environment so it can be tested with a plain `HashMap`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if a looked-up value is invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
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

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
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
        parse_flag(&or_default(var, default)).ok_or_else(|| {
            invalid(var, "expected one of true/false/1/0/yes/no".to_string())
        })
    };

    let env = parse_environment(&or_default("TRIPCHECK_ENV", "development"));

    let bind_addr = parse_addr("TRIPCHECK_BIND_ADDR", "0.0.0.0:3001")?;
    let log_level = or_default("TRIPCHECK_LOG_LEVEL", "info");

    let session_path = PathBuf::from(or_default("TRIPCHECK_SESSION_PATH", "./session.json"));
    let screenshot_dir = PathBuf::from(or_default("TRIPCHECK_SCREENSHOT_DIR", "./screenshots"));
    let results_dir = PathBuf::from(or_default("TRIPCHECK_RESULTS_DIR", "./results"));

    let batch_size = parse_usize("TRIPCHECK_BATCH_SIZE", "3")?;
    if batch_size == 0 {
        return Err(invalid("TRIPCHECK_BATCH_SIZE", "must be at least 1".to_string()));
    }

    let poll_attempts = parse_u32("TRIPCHECK_POLL_ATTEMPTS", "15")?;
    if poll_attempts == 0 {
        return Err(invalid("TRIPCHECK_POLL_ATTEMPTS", "must be at least 1".to_string()));
    }
    let poll_interval_ms = parse_u64("TRIPCHECK_POLL_INTERVAL_MS", "3000")?;
    let fail_after_attempt = parse_u32("TRIPCHECK_FAIL_AFTER_ATTEMPT", "3")?;
    let navigation_timeout_secs = parse_u64("TRIPCHECK_NAVIGATION_TIMEOUT_SECS", "20")?;

    let settle_min_ms = parse_u64("TRIPCHECK_SETTLE_MIN_MS", "500")?;
    let settle_max_ms = parse_u64("TRIPCHECK_SETTLE_MAX_MS", "1500")?;
    if settle_min_ms > settle_max_ms {
        return Err(invalid(
            "TRIPCHECK_SETTLE_MIN_MS",
            format!("{settle_min_ms} exceeds TRIPCHECK_SETTLE_MAX_MS ({settle_max_ms})"),
        ));
    }

    let tracking_domain = or_default("TRIPCHECK_TRACKING_DOMAIN", "rakuten.com").to_lowercase();
    let login_url = or_default("TRIPCHECK_LOGIN_URL", "https://www.rakuten.com");
    let login_wait_secs = parse_u64("TRIPCHECK_LOGIN_WAIT_SECS", "60")?;
    let source_name = or_default("TRIPCHECK_SOURCE_NAME", "Web-Desktop");
    let ebstask = or_default("TRIPCHECK_EBSTASK", "shoppingTripAttrProps");
    let user_agent = or_default("TRIPCHECK_USER_AGENT", DEFAULT_USER_AGENT);
    let chrome_no_sandbox = parse_bool("TRIPCHECK_CHROME_NO_SANDBOX", "true")?;
    let chrome_path = lookup("CHROME_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let api_keys = parse_api_keys(&or_default("TRIPCHECK_API_KEYS", ""));

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        session_path,
        screenshot_dir,
        results_dir,
        batch_size,
        poll_attempts,
        poll_interval_ms,
        fail_after_attempt,
        navigation_timeout_secs,
        settle_min_ms,
        settle_max_ms,
        tracking_domain,
        login_url,
        login_wait_secs,
        source_name,
        ebstask,
        user_agent,
        chrome_no_sandbox,
        chrome_path,
        api_keys,
    })
}

/// Splits a comma-separated token list, dropping blanks and repeats.
fn parse_api_keys(raw: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in raw.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
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
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
