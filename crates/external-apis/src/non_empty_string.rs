// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Non-empty string validation utilities
//!
//! [`NonEmptyString`] is used for adapter settings that make no sense when blank:
//! endpoint URLs, source names, token symbols. Adapters convert their configuration
//! into these once, at construction, so a misconfigured source fails at startup rather
//! than on the first query.
//!
//! ```rust
//! use external_apis::NonEmptyString;
//!
//! let endpoint = NonEmptyString::new("https://gql-rmrk2-prod.graphcdn.app").unwrap();
//! assert_eq!(endpoint.as_str(), "https://gql-rmrk2-prod.graphcdn.app");
//!
//! assert!(NonEmptyString::new("   \t\n  ").is_err());
//! ```

use core::fmt;
use std::str::FromStr;

/// A string with at least one non-whitespace character
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyString(Box<str>);

impl NonEmptyString {
    /// Create a new `NonEmptyString` from any string-like input
    ///
    /// Leading and trailing whitespace is kept; only blank input is rejected.
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if s.trim().is_empty() {
            Err("String cannot be empty or whitespace-only".to_string())
        } else {
            Ok(NonEmptyString(s.into_boxed_str()))
        }
    }

    /// Validate a named setting, producing an error message that names it
    pub fn setting(name: &str, value: impl Into<String>) -> Result<Self, String> {
        Self::new(value).map_err(|_| format!("{name} cannot be empty"))
    }

    /// Get a string slice of the contained value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NonEmptyString {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_input() {
        assert!(NonEmptyString::new("").is_err());
        assert!(NonEmptyString::new("   ").is_err());
        assert!(NonEmptyString::new("\t\n").is_err());
    }

    #[test]
    fn keeps_surrounding_whitespace() {
        let value = NonEmptyString::new(" KSM ").unwrap();
        assert_eq!(value.as_str(), " KSM ");
        assert_eq!(value.to_string(), " KSM ");
    }

    #[test]
    fn setting_error_names_the_setting() {
        let error = NonEmptyString::setting("rmrk1.endpoint", "").unwrap_err();
        assert_eq!(error, "rmrk1.endpoint cannot be empty");
    }

    #[test]
    fn parses_from_str() {
        let parsed: NonEmptyString = "Statemine".parse().unwrap();
        assert_eq!(parsed.as_ref(), "Statemine");
        assert!("".parse::<NonEmptyString>().is_err());
    }
}
