// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # eazyapi errors.
//!
//! This module contains the different errors that can be returned by the data layer.
//! The display form of every variant is the bare message, so callers can match on it.
//!

use thiserror::Error;

/// eazyapi errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EazyError {
    /// Connecting to, initializing or closing the database failed.
    #[error("{0}")]
    DatabaseConnection(String),
    /// No record matched a single-record operation.
    #[error("{0}")]
    RecordNotFound(String),
    /// More than one record matched where exactly one was expected.
    #[error("{0}")]
    MultipleRecordsFound(String),
    /// A model name, filter, sort or pagination argument is malformed.
    #[error("{0}")]
    InvalidQuery(String),
    /// The database rejected or failed an operation.
    #[error("{0}")]
    DatabaseOperation(String),
    /// Record data does not match the model definition.
    #[error("{0}")]
    Validation(String),
    /// Configuration could not be built.
    #[error("{0}")]
    Config(String),
}

impl EazyError {
    pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
