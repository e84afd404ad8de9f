// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

use regex::Regex;
use serde_json::Number;

use std::sync::OnceLock;

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn identifier_regex() -> &'static Regex {
    IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Invalid identifier regex pattern")
    })
}

/// Error returned by [`str_to_num`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("The provided string {0} is not a number")]
pub struct NotANumber(pub String);

/// Convert a string to a number.
/// Integers are preferred; anything else that parses as a finite float is returned as a float.
///
/// # Arguments
///
/// * `value` - String to convert
///
/// # Returns
///
/// * `Result<Number, NotANumber>` - The parsed number
///
/// # Errors
///
/// * `NotANumber` - The string is neither an integer nor a float
///
pub fn str_to_num(value: &str) -> Result<Number, NotANumber> {
    if let Ok(int) = value.parse::<i64>() {
        return Ok(Number::from(int));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| NotANumber(value.to_owned()))
}

/// Whether `name` can be used as a table or column name.
pub fn is_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/// Quote an identifier for use in SQL. Callers validate with [`is_identifier`] first.
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_str_to_num_with_int_string() {
        assert_eq!(str_to_num("123").unwrap(), Number::from(123));
        assert!(str_to_num("-7").unwrap().is_i64());
    }

    #[test]
    fn test_str_to_num_with_float_string() {
        let number = str_to_num("123.456").unwrap();
        assert!(number.is_f64());
        assert_eq!(number.as_f64(), Some(123.456));
    }

    #[test]
    fn test_str_to_num_with_non_numeric_string() {
        let error = str_to_num("abc").unwrap_err();
        assert_eq!(error.to_string(), "The provided string abc is not a number");
    }

    #[test]
    fn test_str_to_num_with_empty_string() {
        let error = str_to_num("").unwrap_err();
        assert_eq!(error.to_string(), "The provided string  is not a number");
    }

    #[test]
    fn test_str_to_num_rejects_nan() {
        assert!(str_to_num("NaN").is_err());
    }

    #[test]
    fn test_identifier() {
        assert!(is_identifier("name"));
        assert!(is_identifier("_id"));
        assert!(is_identifier("column_2"));
        assert!(!is_identifier("1column"));
        assert!(!is_identifier("$eq"));
        assert!(!is_identifier("employer.name"));
        assert!(!is_identifier(""));
        assert_eq!(quote("name"), "\"name\"");
    }
}
