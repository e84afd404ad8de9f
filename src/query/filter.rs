// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Filters.
//!
//! Filters are JSON objects in a Mongo-like syntax:
//!
//! ```json
//! {
//!     "name": "John",
//!     "age": {"$gte": 30},
//!     "score": ">=4.5",
//!     "$or": [{"city": "New York"}, {"status": {"$ne": "inactive"}}]
//! }
//! ```
//!
//! Top-level keys are combined with AND. [`validate_filters`] parses such an object into a
//! [`Filter`] tree, rejecting anything that could not be turned into a parameterised query.

use serde_json::{Map, Value};

use crate::{
    error::EazyError,
    utils::{is_identifier, str_to_num},
};

use super::display_value;

/// Comparison applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Comparison {
    fn from_operator(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$in" => Some(Self::In),
            "$nin" => Some(Self::Nin),
            _ => None,
        }
    }

    fn expects_list(&self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }
}

/// A single column condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub comparison: Comparison,
    pub value: Value,
}

/// Parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Condition(Condition),
}

impl Filter {
    /// Equality on every entry of `record`.
    pub fn matching(record: &Map<String, Value>) -> Self {
        Self::And(
            record
                .iter()
                .map(|(column, value)| {
                    Self::Condition(Condition {
                        column: column.clone(),
                        comparison: Comparison::Eq,
                        value: value.clone(),
                    })
                })
                .collect(),
        )
    }

    /// Whether the filter places no restriction at all. A disjunction with one
    /// unrestricted branch matches everything.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) => children.iter().all(Filter::is_empty),
            Self::Or(children) => children.is_empty() || children.iter().any(Filter::is_empty),
            Self::Condition(_) => false,
        }
    }
}

/// Validate a filter object and return its parsed form.
///
/// # Arguments
///
/// * `filters` - Filter object
///
/// # Errors
///
/// * `EazyError::InvalidQuery` - A key is not a valid column name or operator, a value has
///   an unsupported type, or an operator that expects a list got something else.
///
pub fn validate_filters(filters: &Value) -> Result<Filter, EazyError> {
    match filters {
        Value::Object(map) => parse_object(map),
        other => Err(invalid_value(other)),
    }
}

fn parse_object(map: &Map<String, Value>) -> Result<Filter, EazyError> {
    let mut conditions = Vec::with_capacity(map.len());
    for (key, value) in map {
        match key.as_str() {
            "$and" | "$or" => {
                let Value::Array(items) = value else {
                    return Err(list_expected(key));
                };
                let children = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => parse_object(map),
                        other => Err(invalid_value(other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                conditions.push(if key == "$and" {
                    Filter::And(children)
                } else {
                    Filter::Or(children)
                });
            }
            operator if Comparison::from_operator(operator).is_some() => {
                if matches!(operator, "$in" | "$nin") && !value.is_array() {
                    return Err(list_expected(key));
                }
                return Err(EazyError::invalid_query(format!(
                    "Operator {key} must be applied to a column"
                )));
            }
            column => {
                if !is_identifier(column) {
                    return Err(EazyError::invalid_query(format!(
                        "Invalid key {column} in filter"
                    )));
                }
                parse_column(column, value, &mut conditions)?;
            }
        }
    }
    Ok(Filter::And(conditions))
}

fn parse_column(
    column: &str,
    value: &Value,
    conditions: &mut Vec<Filter>,
) -> Result<(), EazyError> {
    let mut push = |comparison, value| {
        conditions.push(Filter::Condition(Condition {
            column: column.to_owned(),
            comparison,
            value,
        }))
    };
    match value {
        Value::Object(operators) => {
            for (operator, operand) in operators {
                let Some(comparison) = Comparison::from_operator(operator) else {
                    return Err(EazyError::invalid_query(format!(
                        "Invalid key {operator} in filter"
                    )));
                };
                if comparison.expects_list() && !operand.is_array() {
                    return Err(list_expected(operator));
                }
                push(comparison, operand.clone());
            }
        }
        Value::String(text) => {
            let (comparison, operand) = parse_shorthand(text);
            push(comparison, operand);
        }
        Value::Array(_) => return Err(invalid_value(value)),
        scalar => push(Comparison::Eq, scalar.clone()),
    }
    Ok(())
}

/// `">=30"`, `"<2.5"`, `"!=0"`... compare numerically. Strings whose remainder is not a
/// number are compared literally.
fn parse_shorthand(text: &str) -> (Comparison, Value) {
    const PREFIXES: [(&str, Comparison); 6] = [
        (">=", Comparison::Gte),
        (">", Comparison::Gt),
        ("<=", Comparison::Lte),
        ("<", Comparison::Lt),
        ("!=", Comparison::Ne),
        ("=", Comparison::Eq),
    ];
    for (prefix, comparison) in PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            return match str_to_num(rest.trim()) {
                Ok(number) => (comparison, Value::Number(number)),
                Err(_) => (Comparison::Eq, Value::String(text.to_owned())),
            };
        }
    }
    (Comparison::Eq, Value::String(text.to_owned()))
}

fn list_expected(key: &str) -> EazyError {
    EazyError::invalid_query(format!("Value for {key} should be of type list"))
}

fn invalid_value(value: &Value) -> EazyError {
    EazyError::invalid_query(format!("Invalid value {} in filter", display_value(value)))
}
