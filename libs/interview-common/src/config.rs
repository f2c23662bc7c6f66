// Environment-driven settings shared by the service and the CLI

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::{info, warn};

/// Read `key`, falling back to `default` when unset
pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

/// Read and parse `key`, falling back to `default` when unset
pub fn env_parse<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            warn!("Invalid {key} value '{raw}': {e}");
            format!("invalid value for {key}: {e}")
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

/// Read an optional value; empty strings count as unset
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
