// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Sorting.
//!
//! A sort specification is one of:
//!
//! * a string of comma separated fields, `-` marking descending order: `"name,-age"`;
//! * an object of fields to directions: `{"name": 1, "age": -1}`;
//! * a list of `[field, direction]` pairs: `[["name", 1], ["age", -1]]`.
//!
//! A field may address a path inside a JSON column with dots: `employer.name`.

use std::fmt;

use serde_json::Value;

use crate::{error::EazyError, utils::is_identifier};

use super::display_value;

/// One key of an ORDER BY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Column followed by the path inside it, if any.
    pub path: Vec<String>,
    pub descending: bool,
}

impl SortKey {
    fn parse(field: &str) -> Option<Self> {
        let (descending, name) = match field.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, field),
        };
        let path: Vec<String> = name.split('.').map(str::to_owned).collect();
        if path.iter().all(|segment| is_identifier(segment)) {
            Some(Self { path, descending })
        } else {
            None
        }
    }

    /// Column the key sorts on.
    pub fn column(&self) -> &str {
        &self.path[0]
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-")?;
        }
        write!(f, "{}", self.path.join("__"))
    }
}

/// Validate a sort specification and return its keys in order.
///
/// # Arguments
///
/// * `sort` - A string, an object or a list of pairs
///
/// # Errors
///
/// * `EazyError::InvalidQuery` - A field is not a valid name, a direction is not `1` or
///   `-1`, a list item is not a pair, or `sort` has another type.
///
pub fn validate_sort(sort: &Value) -> Result<Vec<SortKey>, EazyError> {
    match sort {
        Value::String(fields) => fields
            .split(',')
            .map(str::trim)
            .map(|field| {
                SortKey::parse(field).ok_or_else(|| {
                    EazyError::invalid_query(format!("Invalid sort field: {field}"))
                })
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, direction)| sort_key(key, direction))
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item.as_array().map(Vec::as_slice) {
                Some([Value::String(key), direction]) => sort_key(key, direction),
                Some([key, _]) => Err(EazyError::invalid_query(format!(
                    "Invalid sort key: {}",
                    display_value(key)
                ))),
                _ => Err(EazyError::invalid_query(format!(
                    "Invalid sort item: {}, it should be a tuple of size 2",
                    display_value(item)
                ))),
            })
            .collect(),
        other => Err(EazyError::invalid_query(format!(
            "Invalid sort type: {}, allowed types are str, dict, and list of tuples",
            type_name(other)
        ))),
    }
}

/// Normalize a sort specification into its textual keys, e.g. `name`, `-age`,
/// `employer__name`.
pub fn prepare_sorting(sort: &Value) -> Result<Vec<String>, EazyError> {
    Ok(validate_sort(sort)?.iter().map(ToString::to_string).collect())
}

/// Read a sort argument from the command line: JSON when it looks like an object or a
/// list, a field string otherwise.
pub fn parse_sort_arg(arg: &str) -> Result<Value, EazyError> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .map_err(|e| EazyError::invalid_query(format!("Invalid JSON for sort: {e}")))
    } else {
        Ok(Value::String(arg.to_owned()))
    }
}

fn sort_key(key: &str, direction: &Value) -> Result<SortKey, EazyError> {
    let mut sort_key = SortKey::parse(key)
        .ok_or_else(|| EazyError::invalid_query(format!("Invalid sort key: {key}")))?;
    match direction.as_f64() {
        Some(d) if d == 1.0 => {}
        Some(d) if d == -1.0 => sort_key.descending = !sort_key.descending,
        _ => {
            return Err(EazyError::invalid_query(format!(
                "Invalid sort value: {}, allowed values are -1 and 1",
                display_value(direction)
            )))
        }
    }
    Ok(sort_key)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
