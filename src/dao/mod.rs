// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Data access objects.
//!
//! [`Dao`] is the generic CRUD interface every backend implements. Models are addressed by
//! name, records are JSON objects, filters and sort orders use the languages described in
//! [`crate::query`].

#[cfg(feature = "sqlite")]
pub mod sql;

#[cfg(feature = "sqlite")]
pub use sql::SqlDao;

pub use crate::query::{validate_filters, validate_sort, ListQuery};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::EazyError, model::Record};

/// Generic data access object.
#[async_trait]
pub trait Dao: Send + Sync {
    /// Open the connections with the database and create the model tables.
    ///
    /// # Errors
    ///
    /// * `EazyError::DatabaseConnection` - The database could not be opened or initialized.
    ///
    async fn init(&self) -> Result<(), EazyError>;

    /// Close the connections with the database.
    ///
    /// # Errors
    ///
    /// * `EazyError::DatabaseConnection` - A connection could not be closed.
    ///
    async fn close(&self) -> Result<(), EazyError>;

    /// Fetch a record by its primary key.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name
    /// * `id` - Primary key
    ///
    /// # Errors
    ///
    /// * `EazyError::RecordNotFound` - No such record.
    /// * `EazyError::DatabaseOperation` - The database failed the query.
    /// * `EazyError::InvalidQuery` - Unknown model.
    ///
    async fn get_by_id(&self, model: &str, id: i64) -> Result<Record, EazyError>;

    /// Fetch the only record whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// * `EazyError::RecordNotFound` - No record matches.
    /// * `EazyError::MultipleRecordsFound` - More than one record matches.
    /// * `EazyError::DatabaseOperation` - The database failed the query.
    /// * `EazyError::InvalidQuery` - Unknown model or field.
    ///
    async fn get_by_field(&self, model: &str, field: &str, value: Value)
        -> Result<Record, EazyError>;

    /// Fetch the records matching a filter, sorted and paginated.
    ///
    /// # Errors
    ///
    /// * `EazyError::DatabaseOperation` - The database failed the query.
    /// * `EazyError::InvalidQuery` - Malformed filter, sort or pagination.
    ///
    async fn get_many(&self, model: &str, query: ListQuery) -> Result<Vec<Record>, EazyError>;

    /// Create a record and return it as stored.
    ///
    /// # Errors
    ///
    /// * `EazyError::DatabaseOperation` - Constraint violation or database failure.
    /// * `EazyError::Validation` - The record does not match the model.
    /// * `EazyError::InvalidQuery` - Unknown model.
    ///
    async fn create(&self, model: &str, record: Record) -> Result<Record, EazyError>;

    /// Apply `changes` to a record and return it as stored.
    ///
    /// # Errors
    ///
    /// * `EazyError::RecordNotFound` - No such record.
    /// * `EazyError::DatabaseOperation` - Constraint violation or database failure.
    /// * `EazyError::Validation` - The changes do not match the model.
    /// * `EazyError::InvalidQuery` - Unknown model.
    ///
    async fn update(&self, model: &str, id: i64, changes: Record) -> Result<Record, EazyError>;

    /// Update the record matching `lookup` with `defaults`, or create one from both.
    /// Returns the record and whether it was created.
    ///
    /// # Errors
    ///
    /// * `EazyError::MultipleRecordsFound` - More than one record matches `lookup`.
    /// * `EazyError::DatabaseOperation` - Constraint violation or database failure.
    /// * `EazyError::Validation` - The data does not match the model.
    /// * `EazyError::InvalidQuery` - Unknown model.
    ///
    async fn update_or_create(
        &self,
        model: &str,
        lookup: Record,
        defaults: Record,
    ) -> Result<(Record, bool), EazyError>;

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// * `EazyError::RecordNotFound` - No such record.
    /// * `EazyError::DatabaseOperation` - The database failed the statement.
    /// * `EazyError::InvalidQuery` - Unknown model.
    ///
    async fn delete(&self, model: &str, id: i64) -> Result<(), EazyError>;

    /// Create several records at once. Either all are created or none.
    async fn bulk_create(&self, model: &str, records: Vec<Record>) -> Result<usize, EazyError>;

    /// Apply the same `changes` to every record matching `filter`.
    /// Returns the number of updated records.
    async fn bulk_update(
        &self,
        model: &str,
        filter: Value,
        changes: Record,
    ) -> Result<usize, EazyError>;

    /// Delete every record matching `filter`. Returns the number of deleted records.
    async fn bulk_delete(&self, model: &str, filter: Value) -> Result<usize, EazyError>;

    /// Count the records matching `filter`, or all records.
    async fn count(&self, model: &str, filter: Option<Value>) -> Result<u64, EazyError>;

    /// Whether any record matches `filter`, or the model has any record.
    async fn exists(&self, model: &str, filter: Option<Value>) -> Result<bool, EazyError>;
}
