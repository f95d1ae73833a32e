//! Error types for the ttlkit library.
//!
//! All cache operations are total functions over their inputs and report
//! failure through return values (`bool` / `Option`); the only error type
//! is [`ConfigError`], returned by fallible constructors when a
//! user-supplied configuration is invalid.
//!
//! ## Example Usage
//!
//! ```
//! use ttlkit::cache::{Cache, Config};
//! use ttlkit::error::ConfigError;
//!
//! // Fallible constructor for user-configurable parameters
//! let cache: Result<Cache, ConfigError> = Cache::try_new(Config {
//!     size: 1024,
//!     ttl_ms: 5_000,
//!     ..Config::default()
//! });
//! assert!(cache.is_ok());
//!
//! // Invalid load factor is caught without panicking
//! let bad = Cache::try_new(Config {
//!     size: 1024,
//!     ttl_ms: 5_000,
//!     load_factor: 250,
//!     ..Config::default()
//! });
//! assert!(bad.is_err());
//! ```

use std::fmt;

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`Cache::try_new`](crate::cache::Cache::try_new). Carries a
/// human-readable description of which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("size must be > 0");
        assert_eq!(err.to_string(), "size must be > 0");
    }

    #[test]
    fn config_debug_includes_message() {
        let err = ConfigError::new("bad load factor");
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("bad load factor"));
    }

    #[test]
    fn config_message_accessor() {
        let err = ConfigError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn config_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ConfigError>();
    }
}
