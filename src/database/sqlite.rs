// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # SQLite database backend.
//!
//! This module contains the SQLite connections and the helpers that run [`Statement`]s on
//! them.
//!

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use rusqlite::{
    params_from_iter,
    types::{ToSqlOutput, Value as SqliteValue, ValueRef},
    Connection, ErrorCode, OpenFlags, Result as SQLiteResult, ToSql,
};

use crate::{
    error::EazyError,
    model::{ModelDef, ModelRegistry, Record, SqlParam},
    query::sql::Statement,
};

use super::{DatabaseLocation, MASTER, SLAVE};

/// Shared SQLite connection.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Named SQLite connections.
#[derive(Default)]
pub struct SqliteConnections {
    connections: RwLock<HashMap<String, SharedConnection>>,
}

impl SqliteConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the `master` and `slave` connections, replacing any open ones.
    /// An in-memory database is private to its connection, so both names share one.
    pub fn connect(&self, location: &DatabaseLocation) -> Result<(), EazyError> {
        let (master, slave) = match location {
            DatabaseLocation::Memory => {
                let conn = Arc::new(Mutex::new(open(":memory:")?));
                (conn.clone(), conn)
            }
            DatabaseLocation::File(path) => {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && fs::metadata(parent).is_err() {
                        fs::create_dir_all(parent).map_err(|error| {
                            EazyError::DatabaseConnection(format!(
                                "Error creating database directory: {}",
                                error
                            ))
                        })?;
                    }
                }
                (
                    Arc::new(Mutex::new(open(path)?)),
                    Arc::new(Mutex::new(open(path)?)),
                )
            }
        };
        let mut connections = self
            .connections
            .write()
            .map_err(|_| EazyError::DatabaseConnection("Connections lock poisoned".to_owned()))?;
        connections.insert(MASTER.to_owned(), master);
        connections.insert(SLAVE.to_owned(), slave);
        Ok(())
    }

    /// Get a connection by name.
    pub fn get(&self, name: &str) -> Option<SharedConnection> {
        self.connections
            .read()
            .ok()
            .and_then(|connections| connections.get(name).cloned())
    }

    /// Close every connection. Connections still in use elsewhere are dropped when released.
    pub fn close_all(&self) -> Result<(), EazyError> {
        let drained: Vec<SharedConnection> = self
            .connections
            .write()
            .map_err(|_| EazyError::DatabaseConnection("Connections lock poisoned".to_owned()))?
            .drain()
            .map(|(_, conn)| conn)
            .collect();
        for conn in drained {
            let Ok(conn) = Arc::try_unwrap(conn) else {
                continue;
            };
            let conn = conn
                .into_inner()
                .map_err(|_| EazyError::DatabaseConnection("Connection lock poisoned".to_owned()))?;
            conn.close()
                .map_err(|(_, error)| EazyError::DatabaseConnection(error.to_string()))?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.connections
            .read()
            .map(|connections| connections.is_empty())
            .unwrap_or(true)
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> SQLiteResult<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Null => ToSqlOutput::Owned(SqliteValue::Null),
            SqlParam::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            SqlParam::Real(r) => ToSqlOutput::Owned(SqliteValue::Real(*r)),
            SqlParam::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for SqlParam {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Self::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// Run a select statement and decode its rows as records of `model`.
pub fn query_records(
    conn: &Connection,
    model: &ModelDef,
    statement: &Statement,
) -> SQLiteResult<Vec<Record>> {
    let width = model.columns().count();
    let mut stmt = conn.prepare(&statement.sql)?;
    let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
        (0..width)
            .map(|i| row.get_ref(i).map(SqlParam::from))
            .collect::<SQLiteResult<Vec<_>>>()
    })?;
    let records = rows
        .map(|values| values.map(|values| model.decode_row(values)))
        .collect::<SQLiteResult<Vec<_>>>();
    records
}

/// Run a statement returning a single integer, such as a count.
pub fn query_i64(conn: &Connection, statement: &Statement) -> SQLiteResult<i64> {
    conn.query_row(
        &statement.sql,
        params_from_iter(statement.params.iter()),
        |row| row.get(0),
    )
}

/// Run a statement and return the number of affected rows.
pub fn execute(conn: &Connection, statement: &Statement) -> SQLiteResult<usize> {
    conn.execute(&statement.sql, params_from_iter(statement.params.iter()))
}

/// Create the tables of every registered model.
pub fn create_schema(conn: &Connection, registry: &ModelRegistry) -> Result<(), EazyError> {
    for model in registry.iter() {
        let ddl = model.create_table_sql()?;
        log::debug!("{}", ddl);
        conn.execute(&ddl, ()).map_err(|error| {
            EazyError::DatabaseConnection(format!(
                "Cannot create table {}: {}",
                model.table_name(),
                error
            ))
        })?;
    }
    Ok(())
}

/// Whether the error is a constraint violation (unique, not null, check...).
pub fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

/// Open a SQLite database connection.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection, EazyError> {
    let path = path.as_ref();
    let mut flags = OpenFlags::default();
    flags.insert(OpenFlags::SQLITE_OPEN_READ_WRITE);
    flags.insert(OpenFlags::SQLITE_OPEN_CREATE);
    let conn = Connection::open_with_flags(path, flags).map_err(|error| {
        EazyError::DatabaseConnection(format!("SQLite fail open connection: {}", error))
    })?;
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA busy_timeout=5000;
        ",
    )
    .map_err(|error| {
        EazyError::DatabaseConnection(format!("SQLite fail execute batch: {}", error))
    })?;
    Ok(conn)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::model::FieldDef;
    use crate::query::sql;
    use serde_json::json;

    fn registry() -> ModelRegistry {
        ModelRegistry::new(
            "test",
            vec![ModelDef::new("Person")
                .field(FieldDef::text("name"))
                .field(FieldDef::bool("active"))
                .field(FieldDef::json("tags").nullable())],
        )
        .unwrap()
    }

    #[test]
    fn test_memory_connections_are_shared() {
        let connections = SqliteConnections::new();
        assert!(connections.is_empty());
        connections.connect(&DatabaseLocation::Memory).unwrap();
        let master = connections.get(MASTER).unwrap();
        let slave = connections.get(SLAVE).unwrap();
        assert!(Arc::ptr_eq(&master, &slave));
        drop((master, slave));
        connections.close_all().unwrap();
        assert!(connections.get(MASTER).is_none());
        assert!(connections.is_empty());
    }

    #[test]
    fn test_file_connections() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("nested").join("test.sqlite3");
        let connections = SqliteConnections::new();
        connections
            .connect(&DatabaseLocation::File(path.to_str().unwrap().to_owned()))
            .unwrap();
        assert!(path.exists());
        let master = connections.get(MASTER).unwrap();
        let slave = connections.get(SLAVE).unwrap();
        assert!(!Arc::ptr_eq(&master, &slave));
        drop((master, slave));
        connections.close_all().unwrap();
    }

    #[test]
    fn test_write_then_read() {
        let registry = registry();
        let model = registry.get("Person").unwrap();
        let conn = open(":memory:").unwrap();
        create_schema(&conn, &registry).unwrap();

        let record = json!({"name": "John", "active": true, "tags": ["a"]});
        let values = model
            .encode_record(record.as_object().unwrap(), false)
            .unwrap();
        assert_eq!(execute(&conn, &sql::insert(&model, values)).unwrap(), 1);

        let records = query_records(&conn, &model, &sql::select(&model, None, &[], None).unwrap())
            .unwrap();
        assert_eq!(
            serde_json::Value::Object(records[0].clone()),
            json!({"_id": 1, "name": "John", "active": true, "tags": ["a"]})
        );
        assert_eq!(query_i64(&conn, &sql::count(&model, None).unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_constraint_violation() {
        let registry = registry();
        let model = registry.get("Person").unwrap();
        let conn = open(":memory:").unwrap();
        create_schema(&conn, &registry).unwrap();
        let error = execute(&conn, &sql::insert(&model, vec![])).unwrap_err();
        assert!(is_constraint_violation(&error));
    }
}
