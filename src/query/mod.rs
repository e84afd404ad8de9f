// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Query module.
//!
//! Parsing of the filter and sort languages, and translation of parsed queries into
//! parameterised SQL.
//!

pub mod filter;
pub mod sort;
pub mod sql;

pub use filter::{validate_filters, Comparison, Condition, Filter};
pub use sort::{parse_sort_arg, prepare_sorting, validate_sort, SortKey};

use serde_json::Value;

use crate::error::EazyError;

/// Options of a list query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Filter object, see [`filter`].
    pub filter: Option<Value>,
    /// Sort specification, see [`sort`].
    pub sort: Option<Value>,
    /// 1-based page number.
    pub page: Option<u64>,
    /// Records per page.
    pub page_size: Option<u64>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn paginate(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Sort keys of the query. A missing, `null` or empty sort means no ordering.
    ///
    /// # Errors
    ///
    /// * `EazyError::InvalidQuery` - The sort specification is malformed.
    ///
    pub fn sort_keys(&self) -> Result<Vec<SortKey>, EazyError> {
        match &self.sort {
            None | Some(Value::Null) => Ok(vec![]),
            Some(Value::String(fields)) if fields.is_empty() => Ok(vec![]),
            Some(sort) => validate_sort(sort),
        }
    }

    /// Window selected by the pagination options.
    /// Pagination applies only when both the page and the page size are set.
    ///
    /// # Errors
    ///
    /// * `EazyError::InvalidQuery` - The page or the page size is zero.
    ///
    pub fn window(&self) -> Result<Option<Window>, EazyError> {
        match (self.page, self.page_size) {
            (Some(0), Some(_)) => Err(EazyError::invalid_query("Page numbers start at 1")),
            (Some(_), Some(0)) => Err(EazyError::invalid_query(
                "Page size must be greater than 0",
            )),
            (Some(page), Some(page_size)) => Ok(Some(Window {
                offset: (page - 1).saturating_mul(page_size),
                limit: page_size,
            })),
            _ => Ok(None),
        }
    }
}

/// `LIMIT`/`OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

/// Format a JSON value for an error message: strings as-is, everything else as JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
