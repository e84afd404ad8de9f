// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Model fields.
//!
//! Field definitions and the conversions between JSON values and the values bound to SQL
//! statements.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::EazyError;

/// A value bound to a SQL statement or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlParam {
    /// Best-effort conversion used for filter operands, where the column type only hints
    /// at the representation.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    /// Render as a SQL literal, used only for column defaults in DDL.
    pub(crate) fn to_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_owned(),
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => format!("{r:?}"),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

/// Storage kind of a field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Int,
    Float,
    Text,
    Bool,
    /// Arbitrary JSON, stored as text.
    Json,
}

impl FieldKind {
    /// Column type used in `CREATE TABLE`.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Int | Self::Bool => "INTEGER",
            Self::Float => "REAL",
            Self::Text | Self::Json => "TEXT",
        }
    }

    /// Decode a stored value into JSON.
    pub fn decode(&self, param: SqlParam) -> Value {
        match (self, param) {
            (_, SqlParam::Null) => Value::Null,
            (Self::Bool, SqlParam::Integer(i)) => Value::Bool(i != 0),
            (Self::Json, SqlParam::Text(s)) => {
                serde_json::from_str(&s).unwrap_or(Value::String(s))
            }
            (_, SqlParam::Integer(i)) => Value::Number(Number::from(i)),
            (_, SqlParam::Real(r)) => Number::from_f64(r).map_or(Value::Null, Value::Number),
            (_, SqlParam::Text(s)) => Value::String(s),
        }
    }
}

/// Field of a model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Column name.
    pub name: String,
    /// Storage kind.
    pub kind: FieldKind,
    /// Whether the column accepts `null`.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the column carries a unique constraint.
    #[serde(default)]
    pub unique: bool,
    /// Default value used when a record omits the field.
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            nullable: false,
            unique: false,
            default: None,
        }
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, FieldKind::Int)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn json(name: &str) -> Self {
        Self::new(name, FieldKind::Json)
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Encode a JSON value for storage in this field.
    ///
    /// # Errors
    ///
    /// * `EazyError::Validation` - The value does not match the field kind, or is `null` for a
    ///   non-nullable field.
    ///
    pub fn encode(&self, value: &Value) -> Result<SqlParam, EazyError> {
        if value.is_null() {
            if self.nullable {
                return Ok(SqlParam::Null);
            }
            return Err(EazyError::validation(format!(
                "Field {} does not accept null",
                self.name
            )));
        }
        let param = match (self.kind, value) {
            (FieldKind::Int, Value::Number(n)) => n.as_i64().map(SqlParam::Integer),
            (FieldKind::Float, Value::Number(n)) => n.as_f64().map(SqlParam::Real),
            (FieldKind::Text, Value::String(s)) => Some(SqlParam::Text(s.clone())),
            (FieldKind::Bool, Value::Bool(b)) => Some(SqlParam::Integer(i64::from(*b))),
            (FieldKind::Json, value) => Some(SqlParam::Text(value.to_string())),
            _ => None,
        };
        param.ok_or_else(|| {
            EazyError::validation(format!(
                "Field {} expects a value of kind {:?}, got {}",
                self.name, self.kind, value
            ))
        })
    }

    /// Column definition used in `CREATE TABLE`.
    pub(crate) fn column_sql(&self) -> Result<String, EazyError> {
        let mut sql = format!(
            "{} {}",
            crate::utils::quote(&self.name),
            self.kind.sql_type()
        );
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.encode(default)?.to_literal());
        }
        Ok(sql)
    }
}
