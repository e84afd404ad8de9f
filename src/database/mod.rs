// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Database module.
//!
//! This module contains the database configuration, the connection router and the
//! different database implementations that can be used by the data layer.
//!
//! ## Database implementations
//!
//! The following database implementations are available:
//!
//! * [Sqlite](sqlite/index.html)
//!

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::EazyError, model::ModelDef};

/// Name of the connection used for writes.
pub const MASTER: &str = "master";
/// Name of the connection used for reads.
pub const SLAVE: &str = "slave";

/// Database configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Database URI, e.g. `sqlite://db.sqlite3`.
    pub uri: String,
    /// Database (application) name.
    #[serde(alias = "name")]
    pub database: String,
    /// Models stored in the database.
    #[serde(default)]
    pub models: Vec<ModelDef>,
}

impl DatabaseConfig {
    pub fn new(uri: &str, database: &str, models: Vec<ModelDef>) -> Self {
        Self {
            uri: uri.to_owned(),
            database: database.to_owned(),
            models,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("sqlite://:memory:", "default", vec![])
    }
}

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(String),
}

impl DatabaseLocation {
    /// Parse a database URI.
    ///
    /// # Errors
    ///
    /// * `EazyError::DatabaseConnection` - Unsupported scheme or empty path.
    ///
    pub fn parse(uri: &str) -> Result<Self, EazyError> {
        let Some(path) = uri.strip_prefix("sqlite://") else {
            return Err(EazyError::DatabaseConnection(format!(
                "Unsupported database URI: {uri}"
            )));
        };
        match path {
            "" => Err(EazyError::DatabaseConnection(format!(
                "Missing database path in URI: {uri}"
            ))),
            ":memory:" => Ok(Self::Memory),
            path => Ok(Self::File(path.to_owned())),
        }
    }
}

/// Picks the connection an operation on a model runs on.
pub trait Router: Send + Sync {
    /// Connection for read operations.
    fn db_for_read(&self, model: &ModelDef) -> &str;
    /// Connection for write operations.
    fn db_for_write(&self, model: &ModelDef) -> &str;
}

/// Sends reads to `slave` and writes to `master`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRouter;

impl Router for DefaultRouter {
    fn db_for_read(&self, _model: &ModelDef) -> &str {
        SLAVE
    }

    fn db_for_write(&self, _model: &ModelDef) -> &str {
        MASTER
    }
}

/// Effective connection layout, as derived from a [`DatabaseConfig`].
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OrmConfig {
    pub connections: BTreeMap<String, String>,
    pub apps: BTreeMap<String, AppConfig>,
    pub routers: Vec<String>,
}

/// Models of one application and the connection they use by default.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub models: Vec<String>,
    pub default_connection: String,
}

impl From<&DatabaseConfig> for OrmConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            connections: BTreeMap::from([
                (MASTER.to_owned(), config.uri.clone()),
                (SLAVE.to_owned(), config.uri.clone()),
            ]),
            apps: BTreeMap::from([(
                config.database.clone(),
                AppConfig {
                    models: config.models.iter().map(|m| m.name.clone()).collect(),
                    default_connection: MASTER.to_owned(),
                },
            )]),
            routers: vec!["eazyapi::database::DefaultRouter".to_owned()],
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::model::FieldDef;
    use serde_json::json;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            DatabaseLocation::parse("sqlite://:memory:").unwrap(),
            DatabaseLocation::Memory
        );
        assert_eq!(
            DatabaseLocation::parse("sqlite://db.sqlite3").unwrap(),
            DatabaseLocation::File("db.sqlite3".to_owned())
        );
        assert_eq!(
            DatabaseLocation::parse("sqlite:///tmp/test.sqlite3").unwrap(),
            DatabaseLocation::File("/tmp/test.sqlite3".to_owned())
        );
        assert!(matches!(
            DatabaseLocation::parse("postgres://localhost/db"),
            Err(EazyError::DatabaseConnection(_))
        ));
        assert!(DatabaseLocation::parse("sqlite://").is_err());
    }

    #[test]
    fn test_default_router() {
        let model = ModelDef::new("SampleModel");
        assert_eq!(DefaultRouter.db_for_read(&model), "slave");
        assert_eq!(DefaultRouter.db_for_write(&model), "master");
    }

    #[test]
    fn test_orm_config() {
        let config = DatabaseConfig::new(
            "sqlite://testdb.sqlite3",
            "test",
            vec![ModelDef::new("SampleModel").field(FieldDef::text("name"))],
        );
        let orm = serde_json::to_value(OrmConfig::from(&config)).unwrap();
        assert_eq!(
            orm,
            json!({
                "connections": {"master": "sqlite://testdb.sqlite3", "slave": "sqlite://testdb.sqlite3"},
                "apps": {"test": {"models": ["SampleModel"], "default_connection": "master"}},
                "routers": ["eazyapi::database::DefaultRouter"],
            })
        );
    }

    #[test]
    fn test_deserialize_config() {
        let config: DatabaseConfig = serde_json::from_value(json!({
            "uri": "sqlite://:memory:",
            "name": "shop",
        }))
        .unwrap();
        assert_eq!(config, DatabaseConfig::new("sqlite://:memory:", "shop", vec![]));
    }
}
