//! Environment variable loading utilities
//!
//! Helper functions for loading and parsing environment variables with proper
//! error handling. The core is configured exclusively through the
//! environment; any CLI surface belongs to the edge.

use crate::{Result, ToolingError};
use std::env;
use std::str::FromStr;

/// Load an environment variable as a string
///
/// Returns `Ok(None)` when the variable is absent and an error only for
/// invalid UTF-8.
pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ToolingError::Config(format!(
            "Environment variable {} contains invalid UTF-8",
            key
        ))),
    }
}

/// Load and parse an environment variable into any `FromStr` type
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => {
            let parsed = val.parse::<T>().map_err(|e| {
                ToolingError::Config(format!(
                    "Failed to parse environment variable {}: {}",
                    key, e
                ))
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Load an environment variable with a default value
pub fn get_env_or(key: &str, default: impl Into<String>) -> Result<String> {
    Ok(get_env(key)?.unwrap_or_else(|| default.into()))
}

/// Load and parse an environment variable with a default value
pub fn get_env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(get_env_parse(key)?.unwrap_or(default))
}

/// Load a boolean environment variable
///
/// Accepts `1`, `true`, `yes`, `on` (case-insensitive) as true.
pub fn get_env_bool(key: &str, default: bool) -> Result<bool> {
    match get_env(key)? {
        Some(val) => {
            let lower = val.to_lowercase();
            Ok(matches!(lower.as_str(), "1" | "true" | "yes" | "on"))
        }
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_missing() {
        assert_eq!(get_env("CONDUCTOR_TEST_MISSING_VAR").unwrap(), None);
    }

    #[test]
    fn test_get_env_present() {
        env::set_var("CONDUCTOR_TEST_PRESENT", "value");
        assert_eq!(
            get_env("CONDUCTOR_TEST_PRESENT").unwrap(),
            Some("value".to_string())
        );
        env::remove_var("CONDUCTOR_TEST_PRESENT");
    }

    #[test]
    fn test_get_env_parse() {
        env::set_var("CONDUCTOR_TEST_PORT", "8080");
        let port: Option<u16> = get_env_parse("CONDUCTOR_TEST_PORT").unwrap();
        assert_eq!(port, Some(8080));
        env::remove_var("CONDUCTOR_TEST_PORT");
    }

    #[test]
    fn test_get_env_parse_invalid() {
        env::set_var("CONDUCTOR_TEST_BAD_PORT", "not-a-number");
        let result: Result<Option<u16>> = get_env_parse("CONDUCTOR_TEST_BAD_PORT");
        assert!(result.is_err());
        env::remove_var("CONDUCTOR_TEST_BAD_PORT");
    }

    #[test]
    fn test_get_env_or_default() {
        assert_eq!(
            get_env_or("CONDUCTOR_TEST_MISSING_VAR", "fallback").unwrap(),
            "fallback"
        );
    }

    #[test]
    fn test_get_env_bool() {
        env::set_var("CONDUCTOR_TEST_FLAG", "yes");
        assert!(get_env_bool("CONDUCTOR_TEST_FLAG", false).unwrap());
        env::set_var("CONDUCTOR_TEST_FLAG", "0");
        assert!(!get_env_bool("CONDUCTOR_TEST_FLAG", true).unwrap());
        env::remove_var("CONDUCTOR_TEST_FLAG");
        assert!(get_env_bool("CONDUCTOR_TEST_FLAG", true).unwrap());
    }
}
