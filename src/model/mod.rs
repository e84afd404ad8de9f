// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Data model for eazyapi.
//!
//! Models are declared at runtime, either in code or in the configuration file, and are
//! backed by one table each.
//!
//! ## Data model
//!
//! * [`ModelDef`] - a named table with typed fields and an implicit `_id` primary key.
//! * [`FieldDef`] - a typed column.
//! * [`ModelRegistry`] - the models of one application, looked up by name.
//! * [`Record`] - a JSON object holding the values of one row.
//!

pub mod field;
pub mod registry;

pub use field::*;
pub use registry::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::EazyError, utils::{is_identifier, quote}};

/// Name of the implicit primary key column.
pub const PRIMARY_KEY: &str = "_id";

/// A row as a JSON object.
pub type Record = Map<String, Value>;

/// A column of a model, including the primary key.
#[derive(Debug, Clone, Copy)]
pub enum Column<'a> {
    PrimaryKey,
    Field(&'a FieldDef),
}

impl<'a> Column<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::PrimaryKey => PRIMARY_KEY,
            Self::Field(field) => &field.name,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::PrimaryKey => FieldKind::Int,
            Self::Field(field) => field.kind,
        }
    }
}

/// Model definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelDef {
    /// Model name, used to look the model up.
    pub name: String,
    /// Table name. Defaults to the lowercased model name.
    #[serde(default)]
    pub table: Option<String>,
    /// Fields, in column order.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            table: None,
            fields: vec![],
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_owned());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Table backing the model.
    pub fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<Column<'_>> {
        if name == PRIMARY_KEY {
            return Some(Column::PrimaryKey);
        }
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(Column::Field)
    }

    /// All columns in select order, primary key first.
    pub fn columns(&self) -> impl Iterator<Item = Column<'_>> {
        std::iter::once(Column::PrimaryKey).chain(self.fields.iter().map(Column::Field))
    }

    /// Check names and defaults.
    ///
    /// # Errors
    ///
    /// * `EazyError::Validation` - Invalid model, table or field name, duplicate or reserved
    ///   field, or a default that does not match its field.
    ///
    pub fn validate(&self) -> Result<(), EazyError> {
        if !is_identifier(&self.name) {
            return Err(EazyError::validation(format!(
                "Invalid model name: {}",
                self.name
            )));
        }
        let table = self.table_name();
        if !is_identifier(&table) {
            return Err(EazyError::validation(format!("Invalid table name: {table}")));
        }
        for (position, field) in self.fields.iter().enumerate() {
            if !is_identifier(&field.name) {
                return Err(EazyError::validation(format!(
                    "Invalid field name {} in model {}",
                    field.name, self.name
                )));
            }
            if field.name == PRIMARY_KEY {
                return Err(EazyError::validation(format!(
                    "Field {PRIMARY_KEY} is reserved in model {}",
                    self.name
                )));
            }
            if self.fields[..position].iter().any(|f| f.name == field.name) {
                return Err(EazyError::validation(format!(
                    "Duplicate field {} in model {}",
                    field.name, self.name
                )));
            }
            if let Some(default) = &field.default {
                field.encode(default)?;
            }
        }
        Ok(())
    }

    /// Encode a record for writing, in field order.
    /// The primary key is accepted only when `allow_primary_key` is set.
    ///
    /// # Errors
    ///
    /// * `EazyError::Validation` - Unknown field or mismatched value.
    ///
    pub fn encode_record(
        &self,
        record: &Record,
        allow_primary_key: bool,
    ) -> Result<Vec<(String, SqlParam)>, EazyError> {
        let mut encoded = Vec::with_capacity(record.len());
        for (name, value) in record {
            match self.column(name) {
                Some(Column::PrimaryKey) if allow_primary_key => {
                    let id = value.as_i64().ok_or_else(|| {
                        EazyError::validation(format!(
                            "Field {PRIMARY_KEY} expects an integer, got {value}"
                        ))
                    })?;
                    encoded.push((PRIMARY_KEY.to_owned(), SqlParam::Integer(id)));
                }
                Some(Column::PrimaryKey) => {
                    return Err(EazyError::validation(format!(
                        "Field {PRIMARY_KEY} cannot be updated"
                    )))
                }
                Some(Column::Field(field)) => {
                    encoded.push((field.name.clone(), field.encode(value)?));
                }
                None => {
                    return Err(EazyError::validation(format!(
                        "Unknown field {name} for model {}",
                        self.name
                    )))
                }
            }
        }
        Ok(encoded)
    }

    /// Decode a row read in [`ModelDef::columns`] order.
    pub fn decode_row(&self, values: Vec<SqlParam>) -> Record {
        self.columns()
            .zip(values)
            .map(|(column, value)| (column.name().to_owned(), column.kind().decode(value)))
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the model.
    pub fn create_table_sql(&self) -> Result<String, EazyError> {
        let mut columns = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote(PRIMARY_KEY)
        )];
        for field in &self.fields {
            columns.push(field.column_sql()?);
        }
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&self.table_name()),
            columns.join(", ")
        ))
    }
}
