//! # Environment Variables
//!
//! Utilities for reading and parsing environment variables.

use std::env;
use std::str::FromStr;

/// Get an environment variable, falling back to `default` when unset or blank.
pub fn get_env_or(name: &'static str, default: &str) -> String {
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => val,
        _ => default.to_string(),
    }
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// A value that is present but unparsable is still an error.
pub fn get_env_parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, Error> {
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => {
            val.trim().parse::<T>().map_err(|_| Error::WrongFormat(name))
        }
        _ => Ok(default),
    }
}

/// Read a comma-separated list. Empty items are dropped; `None` when unset.
pub fn get_env_list(name: &'static str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

// region:    --- Error
#[derive(Debug)]
pub enum Error {
    WrongFormat(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
// endregion: --- Error

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_only_when_unset() {
        assert_eq!(get_env_parse_or("LIB_UTILS_TEST_UNSET", 7u64).unwrap(), 7);

        env::set_var("LIB_UTILS_TEST_BAD_NUMBER", "seven");
        assert!(matches!(
            get_env_parse_or("LIB_UTILS_TEST_BAD_NUMBER", 7u64),
            Err(Error::WrongFormat("LIB_UTILS_TEST_BAD_NUMBER"))
        ));
    }

    #[test]
    fn test_list_drops_blank_items() {
        env::set_var("LIB_UTILS_TEST_LIST", " https://a.test , ,https://b.test");
        assert_eq!(
            get_env_list("LIB_UTILS_TEST_LIST"),
            Some(vec!["https://a.test".to_string(), "https://b.test".to_string()])
        );

        env::set_var("LIB_UTILS_TEST_EMPTY_LIST", " , ");
        assert_eq!(get_env_list("LIB_UTILS_TEST_EMPTY_LIST"), None);
    }
}
