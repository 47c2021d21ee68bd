use std::env;
use std::str::FromStr;

pub fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

pub fn env_or(key: &str, fallback: &str) -> String {
    env_opt(key).unwrap_or_else(|| fallback.to_string())
}

/// Parses `key` into `T`, falling back when the variable is unset or malformed.
pub fn env_parse<T: FromStr>(key: &str, fallback: T) -> T {
    match env_opt(key) {
        Some(raw) => raw.parse::<T>().unwrap_or(fallback),
        None => fallback,
    }
}

pub fn env_bool(key: &str, fallback: bool) -> bool {
    match env_opt(key) {
        Some(raw) => parse_on_off(&raw).unwrap_or(fallback),
        None => fallback,
    }
}

pub fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Joins an API path onto a base URL without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
