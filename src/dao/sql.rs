// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # SQL data access object.
//!
//! [`SqlDao`] implements [`Dao`] on SQLite. Statements run on a blocking thread, on the
//! connection the [`Router`] picks: reads on `slave`, writes on `master` by default.
//!
//! ```no_run
//! use eazyapi::{dao::{Dao, SqlDao}, database::DatabaseConfig, model::{FieldDef, ModelDef}};
//!
//! # async fn example() -> Result<(), eazyapi::error::EazyError> {
//! let config = DatabaseConfig::new(
//!     "sqlite://db.sqlite3",
//!     "shop",
//!     vec![ModelDef::new("Book").field(FieldDef::text("title"))],
//! );
//! let dao = SqlDao::new(config)?;
//! dao.init().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;

use crate::{
    database::{
        sqlite::{
            create_schema, execute, is_constraint_violation, query_i64, query_records,
            SqliteConnections,
        },
        DatabaseConfig, DatabaseLocation, DefaultRouter, OrmConfig, Router, MASTER,
    },
    error::EazyError,
    model::{ModelDef, ModelRegistry, Record, PRIMARY_KEY},
    query::{
        sql::{self, Statement},
        validate_filters, Comparison, Condition, Filter, ListQuery, Window,
    },
};

use super::Dao;

/// Generic DAO for SQL databases.
pub struct SqlDao {
    /// Database configuration.
    config: DatabaseConfig,
    /// Connection layout derived from the configuration.
    orm_config: OrmConfig,
    /// Registered models.
    registry: ModelRegistry,
    /// Connection router.
    router: Arc<dyn Router>,
    /// Open connections.
    connections: SqliteConnections,
}

impl SqlDao {
    /// Build a new `SqlDao`. No connection is opened until [`Dao::init`].
    ///
    /// # Arguments
    ///
    /// * `config` - Database configuration
    ///
    /// # Errors
    ///
    /// * `EazyError::Validation` - A model definition is invalid.
    ///
    pub fn new(config: DatabaseConfig) -> Result<Self, EazyError> {
        let registry = ModelRegistry::new(&config.database, config.models.clone())?;
        Ok(Self {
            orm_config: OrmConfig::from(&config),
            config,
            registry,
            router: Arc::new(DefaultRouter),
            connections: SqliteConnections::new(),
        })
    }

    /// Replace the connection router.
    pub fn with_router(mut self, router: impl Router + 'static) -> Self {
        self.router = Arc::new(router);
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn orm_config(&self) -> &OrmConfig {
        &self.orm_config
    }

    pub fn connections(&self) -> &SqliteConnections {
        &self.connections
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Get a model by name.
    ///
    /// # Errors
    ///
    /// * `EazyError::InvalidQuery` - Invalid or unknown model name.
    ///
    pub fn get_model(&self, name: &str) -> Result<Arc<ModelDef>, EazyError> {
        self.registry.get(name)
    }

    /// Run `operation` on a blocking thread with the named connection.
    async fn run<T, F>(&self, connection: &str, operation: F) -> Result<T, EazyError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, EazyError> + Send + 'static,
    {
        let shared = self.connections.get(connection).ok_or_else(|| {
            EazyError::DatabaseConnection(format!("Connection {connection} is not initialized"))
        })?;
        tokio::task::spawn_blocking(move || {
            let mut conn = shared.lock().map_err(|_| {
                EazyError::DatabaseConnection("Connection lock poisoned".to_owned())
            })?;
            operation(&mut *conn)
        })
        .await
        .map_err(|error| EazyError::DatabaseOperation(format!("Database task failed: {error}")))?
    }
}

fn failed(context: &'static str) -> impl Fn(rusqlite::Error) -> EazyError {
    move |error| EazyError::DatabaseOperation(format!("{context}: {error}"))
}

fn not_found() -> EazyError {
    EazyError::RecordNotFound("Record not found".to_owned())
}

fn multiple_found() -> EazyError {
    EazyError::MultipleRecordsFound("Multiple records found".to_owned())
}

/// At most two records, enough to tell one match from several.
const UNIQUE_WINDOW: Window = Window {
    offset: 0,
    limit: 2,
};

fn fetch_by_id(
    conn: &Connection,
    model: &ModelDef,
    id: i64,
    context: &'static str,
) -> Result<Record, EazyError> {
    let statement = sql::select(model, Some(&sql::by_id(id)), &[], None)?;
    query_records(conn, model, &statement)
        .map_err(failed(context))?
        .into_iter()
        .next()
        .ok_or_else(not_found)
}

fn parse_filter(filter: Option<&Value>) -> Result<Option<Filter>, EazyError> {
    filter.map(validate_filters).transpose()
}

#[async_trait]
impl Dao for SqlDao {
    async fn init(&self) -> Result<(), EazyError> {
        let initialize = async {
            let location = DatabaseLocation::parse(&self.config.uri)?;
            self.connections.connect(&location)?;
            let registry = self.registry.clone();
            self.run(MASTER, move |conn| create_schema(conn, &registry))
                .await
        };
        initialize.await.map_err(|error| {
            EazyError::DatabaseConnection(format!("Failed to initialize connection: {error}"))
        })?;
        log::info!(
            "Connected to {} with {} models",
            self.config.uri,
            self.registry.len()
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), EazyError> {
        self.connections.close_all().map_err(|error| {
            EazyError::DatabaseConnection(format!("Failed to close connection: {error}"))
        })?;
        log::info!("Closed connections to {}", self.config.uri);
        Ok(())
    }

    async fn get_by_id(&self, model: &str, id: i64) -> Result<Record, EazyError> {
        let model = self.get_model(model)?;
        let connection = self.router.db_for_read(&model);
        self.run(connection, move |conn| {
            fetch_by_id(conn, &model, id, "Failed to fetch record")
        })
        .await
    }

    async fn get_by_field(
        &self,
        model: &str,
        field: &str,
        value: Value,
    ) -> Result<Record, EazyError> {
        let model = self.get_model(model)?;
        let filter = Filter::Condition(Condition {
            column: field.to_owned(),
            comparison: Comparison::Eq,
            value,
        });
        let statement = sql::select(&model, Some(&filter), &[], Some(UNIQUE_WINDOW))?;
        let connection = self.router.db_for_read(&model);
        let mut records = self
            .run(connection, move |conn| {
                query_records(conn, &model, &statement).map_err(failed("Failed to fetch record"))
            })
            .await?;
        match records.len() {
            0 => Err(not_found()),
            1 => Ok(records.remove(0)),
            _ => Err(multiple_found()),
        }
    }

    async fn get_many(&self, model: &str, query: ListQuery) -> Result<Vec<Record>, EazyError> {
        let model = self.get_model(model)?;
        let filter = parse_filter(query.filter.as_ref())?;
        let statement = sql::select(
            &model,
            filter.as_ref(),
            &query.sort_keys()?,
            query.window()?,
        )?;
        log::debug!("{} {:?}", statement.sql, statement.params);
        let connection = self.router.db_for_read(&model);
        self.run(connection, move |conn| {
            query_records(conn, &model, &statement).map_err(failed("Failed to fetch records"))
        })
        .await
    }

    async fn create(&self, model: &str, record: Record) -> Result<Record, EazyError> {
        let model = self.get_model(model)?;
        let statement = sql::insert(&model, model.encode_record(&record, true)?);
        let connection = self.router.db_for_write(&model);
        self.run(connection, move |conn| {
            execute(conn, &statement).map_err(|error| {
                if is_constraint_violation(&error) {
                    EazyError::DatabaseOperation(
                        "Failed to create record due to IntegrityError".to_owned(),
                    )
                } else {
                    failed("Failed to create record")(error)
                }
            })?;
            fetch_by_id(conn, &model, conn.last_insert_rowid(), "Failed to create record")
        })
        .await
    }

    async fn update(&self, model: &str, id: i64, changes: Record) -> Result<Record, EazyError> {
        let model = self.get_model(model)?;
        let changes = model.encode_record(&changes, false)?;
        let statement = if changes.is_empty() {
            None
        } else {
            Some(sql::update(&model, changes, Some(&sql::by_id(id)))?)
        };
        let connection = self.router.db_for_write(&model);
        self.run(connection, move |conn| {
            let tx = conn.transaction().map_err(failed("Failed to update record"))?;
            if let Some(statement) = statement {
                let updated = execute(&tx, &statement).map_err(failed("Failed to update record"))?;
                if updated == 0 {
                    return Err(not_found());
                }
            }
            let record = fetch_by_id(&tx, &model, id, "Failed to update record")?;
            tx.commit().map_err(failed("Failed to update record"))?;
            Ok(record)
        })
        .await
    }

    async fn update_or_create(
        &self,
        model: &str,
        lookup: Record,
        defaults: Record,
    ) -> Result<(Record, bool), EazyError> {
        let model = self.get_model(model)?;
        model.encode_record(&lookup, true)?;
        let changes = model.encode_record(&defaults, false)?;
        let lookup_query = sql::select(
            &model,
            Some(&Filter::matching(&lookup)),
            &[],
            Some(UNIQUE_WINDOW),
        )?;
        let mut merged = defaults;
        merged.extend(lookup);
        let insert = sql::insert(&model, model.encode_record(&merged, true)?);
        let connection = self.router.db_for_write(&model);
        self.run(connection, move |conn| {
            let context = "Failed to update record";
            let tx = conn.transaction().map_err(failed(context))?;
            let existing = query_records(&tx, &model, &lookup_query).map_err(failed(context))?;
            let (id, created) = match existing.as_slice() {
                [] => {
                    execute(&tx, &insert).map_err(failed(context))?;
                    (tx.last_insert_rowid(), true)
                }
                [record] => {
                    let id = record
                        .get(PRIMARY_KEY)
                        .and_then(Value::as_i64)
                        .ok_or_else(not_found)?;
                    if !changes.is_empty() {
                        let statement = sql::update(&model, changes, Some(&sql::by_id(id)))?;
                        execute(&tx, &statement).map_err(failed(context))?;
                    }
                    (id, false)
                }
                _ => return Err(multiple_found()),
            };
            let record = fetch_by_id(&tx, &model, id, context)?;
            tx.commit().map_err(failed(context))?;
            Ok((record, created))
        })
        .await
    }

    async fn delete(&self, model: &str, id: i64) -> Result<(), EazyError> {
        let model = self.get_model(model)?;
        let statement = sql::delete(&model, Some(&sql::by_id(id)))?;
        let connection = self.router.db_for_write(&model);
        let deleted = self
            .run(connection, move |conn| {
                execute(conn, &statement).map_err(failed("Failed to delete record"))
            })
            .await?;
        if deleted == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    async fn bulk_create(&self, model: &str, records: Vec<Record>) -> Result<usize, EazyError> {
        let model = self.get_model(model)?;
        let statements = records
            .iter()
            .map(|record| Ok(sql::insert(&model, model.encode_record(record, true)?)))
            .collect::<Result<Vec<Statement>, EazyError>>()?;
        let connection = self.router.db_for_write(&model);
        self.run(connection, move |conn| {
            let context = "Failed to create records";
            let tx = conn.transaction().map_err(failed(context))?;
            for statement in &statements {
                execute(&tx, statement).map_err(failed(context))?;
            }
            tx.commit().map_err(failed(context))?;
            Ok(statements.len())
        })
        .await
    }

    async fn bulk_update(
        &self,
        model: &str,
        filter: Value,
        changes: Record,
    ) -> Result<usize, EazyError> {
        let model = self.get_model(model)?;
        let filter = validate_filters(&filter)?;
        let statement = sql::update(&model, model.encode_record(&changes, false)?, Some(&filter))?;
        let connection = self.router.db_for_write(&model);
        self.run(connection, move |conn| {
            execute(conn, &statement).map_err(failed("Failed to update records"))
        })
        .await
    }

    async fn bulk_delete(&self, model: &str, filter: Value) -> Result<usize, EazyError> {
        let model = self.get_model(model)?;
        let filter = validate_filters(&filter)?;
        let statement = sql::delete(&model, Some(&filter))?;
        let connection = self.router.db_for_write(&model);
        self.run(connection, move |conn| {
            execute(conn, &statement).map_err(failed("Failed to delete records"))
        })
        .await
    }

    async fn count(&self, model: &str, filter: Option<Value>) -> Result<u64, EazyError> {
        let model = self.get_model(model)?;
        let filter = parse_filter(filter.as_ref())?;
        let statement = sql::count(&model, filter.as_ref())?;
        let connection = self.router.db_for_read(&model);
        let count = self
            .run(connection, move |conn| {
                query_i64(conn, &statement).map_err(failed("Failed to count records"))
            })
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn exists(&self, model: &str, filter: Option<Value>) -> Result<bool, EazyError> {
        let model = self.get_model(model)?;
        let filter = parse_filter(filter.as_ref())?;
        let statement = sql::exists(&model, filter.as_ref())?;
        let connection = self.router.db_for_read(&model);
        let exists = self
            .run(connection, move |conn| {
                query_i64(conn, &statement).map_err(failed("Failed to check if record exists"))
            })
            .await?;
        Ok(exists != 0)
    }
}
