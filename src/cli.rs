// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Command line interface.
//!
//! Every subcommand maps onto one [`Dao`] operation. Records, filters and sort objects are
//! given as JSON arguments; results are returned as JSON.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::{
    dao::{Dao, SqlDao},
    error::EazyError,
    model::Record,
    query::{parse_sort_arg, ListQuery},
};

/// Generic CRUD access to the models of a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "eazyapi", author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path (json, yaml or toml)
    #[arg(short, long, global = true, default_value = "")]
    pub config: String,

    /// Read settings from EAZYAPI_* environment variables
    #[arg(short, long, global = true)]
    pub env: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Create the tables of every configured model
    Migrate,
    /// Fetch a record by primary key
    Get { model: String, id: i64 },
    /// Fetch the only record whose field equals a value
    Find {
        model: String,
        field: String,
        /// JSON value, or a plain string
        value: String,
    },
    /// List records
    List {
        model: String,
        /// Filter object
        #[arg(short, long)]
        filter: Option<String>,
        /// Sort string ("name,-age") or JSON sort object
        #[arg(short, long, allow_hyphen_values = true)]
        sort: Option<String>,
        #[arg(short, long, requires = "page_size")]
        page: Option<u64>,
        #[arg(long, requires = "page")]
        page_size: Option<u64>,
    },
    /// Create a record
    Create { model: String, record: String },
    /// Update a record by primary key
    Update {
        model: String,
        id: i64,
        changes: String,
    },
    /// Update the record matching a lookup, or create it
    Upsert {
        model: String,
        lookup: String,
        #[arg(short, long, default_value = "{}")]
        defaults: String,
    },
    /// Delete a record by primary key
    Delete { model: String, id: i64 },
    /// Create every record of a JSON array file, all or none
    Import { model: String, file: String },
    /// Update every record matching a filter
    UpdateMany {
        model: String,
        filter: String,
        changes: String,
    },
    /// Delete every record matching a filter
    DeleteMany { model: String, filter: String },
    /// Count records
    Count {
        model: String,
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Whether any record matches
    Exists {
        model: String,
        #[arg(short, long)]
        filter: Option<String>,
    },
}

fn parse_filter(arg: &str) -> Result<Value, EazyError> {
    serde_json::from_str(arg)
        .map_err(|e| EazyError::invalid_query(format!("Invalid JSON for filter: {e}")))
}

fn parse_record(arg: &str) -> Result<Record, EazyError> {
    match serde_json::from_str(arg) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(EazyError::validation(format!(
            "Expected a JSON object, got {other}"
        ))),
        Err(e) => Err(EazyError::validation(format!("Invalid JSON for record: {e}"))),
    }
}

fn parse_records(content: &str) -> Result<Vec<Record>, EazyError> {
    let records: Vec<Value> = serde_json::from_str(content)
        .map_err(|e| EazyError::validation(format!("Invalid JSON for records: {e}")))?;
    records
        .into_iter()
        .map(|record| match record {
            Value::Object(record) => Ok(record),
            other => Err(EazyError::validation(format!(
                "Expected a JSON object, got {other}"
            ))),
        })
        .collect()
}

/// Run a subcommand on an initialized DAO.
pub async fn run(command: Command, dao: &SqlDao) -> Result<Value, EazyError> {
    let output = match command {
        Command::Migrate => {
            let registry = dao.registry();
            let models: Vec<&str> = registry.iter().map(|m| m.name.as_str()).collect();
            json!({"app": registry.app(), "models": models})
        }
        Command::Get { model, id } => Value::Object(dao.get_by_id(&model, id).await?),
        Command::Find {
            model,
            field,
            value,
        } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            Value::Object(dao.get_by_field(&model, &field, value).await?)
        }
        Command::List {
            model,
            filter,
            sort,
            page,
            page_size,
        } => {
            let query = ListQuery {
                filter: filter.as_deref().map(parse_filter).transpose()?,
                sort: sort.as_deref().map(parse_sort_arg).transpose()?,
                page,
                page_size,
            };
            let records = dao.get_many(&model, query).await?;
            Value::Array(records.into_iter().map(Value::Object).collect())
        }
        Command::Create { model, record } => {
            Value::Object(dao.create(&model, parse_record(&record)?).await?)
        }
        Command::Update { model, id, changes } => {
            Value::Object(dao.update(&model, id, parse_record(&changes)?).await?)
        }
        Command::Upsert {
            model,
            lookup,
            defaults,
        } => {
            let (record, created) = dao
                .update_or_create(&model, parse_record(&lookup)?, parse_record(&defaults)?)
                .await?;
            json!({"record": record, "created": created})
        }
        Command::Delete { model, id } => {
            dao.delete(&model, id).await?;
            json!({"deleted": id})
        }
        Command::Import { model, file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|e| EazyError::validation(format!("Cannot read {file}: {e}")))?;
            let created = dao.bulk_create(&model, parse_records(&content)?).await?;
            json!({"created": created})
        }
        Command::UpdateMany {
            model,
            filter,
            changes,
        } => {
            let updated = dao
                .bulk_update(&model, parse_filter(&filter)?, parse_record(&changes)?)
                .await?;
            json!({"updated": updated})
        }
        Command::DeleteMany { model, filter } => {
            let deleted = dao.bulk_delete(&model, parse_filter(&filter)?).await?;
            json!({"deleted": deleted})
        }
        Command::Count { model, filter } => {
            let filter = filter.as_deref().map(parse_filter).transpose()?;
            Value::from(dao.count(&model, filter).await?)
        }
        Command::Exists { model, filter } => {
            let filter = filter.as_deref().map(parse_filter).transpose()?;
            Value::from(dao.exists(&model, filter).await?)
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;
    use crate::{
        database::DatabaseConfig,
        model::{FieldDef, ModelDef},
    };

    async fn dao() -> SqlDao {
        let config = DatabaseConfig::new(
            "sqlite://:memory:",
            "shop",
            vec![ModelDef::new("Book")
                .field(FieldDef::text("title"))
                .field(FieldDef::int("pages").nullable())],
        );
        let dao = SqlDao::new(config).unwrap();
        dao.init().await.unwrap();
        dao
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["eazyapi"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap().command.unwrap()
    }

    #[test]
    fn test_version() {
        let error = Args::try_parse_from(["eazyapi", "--version"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DisplayVersion);
        assert!(error
            .to_string()
            .contains(&format!("eazyapi {}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn test_help() {
        let error = Args::try_parse_from(["eazyapi", "--help"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DisplayHelp);
        assert!(error.to_string().contains("Usage: eazyapi"));
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(["eazyapi", "--config", "eazyapi.toml", "--env"]).unwrap();
        assert_eq!(args.config, "eazyapi.toml");
        assert!(args.env);
        assert!(args.command.is_none());

        assert_eq!(
            parse(&["list", "Book", "--sort", "-pages", "--page", "2", "--page-size", "10"]),
            Command::List {
                model: "Book".to_owned(),
                filter: None,
                sort: Some("-pages".to_owned()),
                page: Some(2),
                page_size: Some(10),
            }
        );
        assert_eq!(
            parse(&["delete-many", "Book", r#"{"pages": null}"#]),
            Command::DeleteMany {
                model: "Book".to_owned(),
                filter: r#"{"pages": null}"#.to_owned(),
            }
        );
        assert!(Args::try_parse_from(["eazyapi", "list", "Book", "--page", "2"]).is_err());
        assert!(Args::try_parse_from(["eazyapi", "get", "Book", "one"]).is_err());
    }

    #[tokio::test]
    async fn test_run_commands() {
        let dao = dao().await;

        let migrated = run(Command::Migrate, &dao).await.unwrap();
        assert_eq!(migrated, json!({"app": "shop", "models": ["Book"]}));

        let created = run(
            parse(&["create", "Book", r#"{"title": "Dune", "pages": 412}"#]),
            &dao,
        )
        .await
        .unwrap();
        assert_eq!(created, json!({"_id": 1, "title": "Dune", "pages": 412}));

        let found = run(parse(&["find", "Book", "title", "Dune"]), &dao)
            .await
            .unwrap();
        assert_eq!(found, created);
        let found = run(parse(&["find", "Book", "pages", "412"]), &dao)
            .await
            .unwrap();
        assert_eq!(found, created);

        let upserted = run(
            parse(&["upsert", "Book", r#"{"title": "Emma"}"#, "--defaults", r#"{"pages": 300}"#]),
            &dao,
        )
        .await
        .unwrap();
        assert_eq!(upserted["created"], json!(true));
        assert_eq!(upserted["record"]["pages"], json!(300));

        let listed = run(parse(&["list", "Book", "--sort", "-pages"]), &dao)
            .await
            .unwrap();
        assert_eq!(listed[0]["title"], json!("Dune"));
        assert_eq!(listed[1]["title"], json!("Emma"));

        let count = run(parse(&["count", "Book", "--filter", r#"{"pages": ">300"}"#]), &dao)
            .await
            .unwrap();
        assert_eq!(count, json!(1));

        let updated = run(
            parse(&["update-many", "Book", "{}", r#"{"pages": null}"#]),
            &dao,
        )
        .await
        .unwrap();
        assert_eq!(updated, json!({"updated": 2}));

        run(parse(&["delete", "Book", "1"]), &dao).await.unwrap();
        let exists = run(parse(&["exists", "Book", "--filter", r#"{"_id": 1}"#]), &dao)
            .await
            .unwrap();
        assert_eq!(exists, json!(false));
    }

    #[tokio::test]
    async fn test_list_descending_sort_strings() {
        let dao = dao().await;
        for record in [
            r#"{"title": "Emma", "pages": 300}"#,
            r#"{"title": "Dune", "pages": 412}"#,
            r#"{"title": "Ulysses", "pages": 300}"#,
        ] {
            run(parse(&["create", "Book", record]), &dao).await.unwrap();
        }

        let titles = |listed: Value| -> Vec<String> {
            listed
                .as_array()
                .unwrap()
                .iter()
                .map(|book| book["title"].as_str().unwrap().to_owned())
                .collect()
        };

        let listed = run(parse(&["list", "Book", "-s", "-pages,-title"]), &dao)
            .await
            .unwrap();
        assert_eq!(titles(listed), vec!["Dune", "Ulysses", "Emma"]);

        let listed = run(parse(&["list", "Book", "--sort=-title"]), &dao)
            .await
            .unwrap();
        assert_eq!(titles(listed), vec!["Ulysses", "Emma", "Dune"]);

        let listed = run(parse(&["list", "Book", "--sort", r#"[["pages", -1], ["title", 1]]"#]), &dao)
            .await
            .unwrap();
        assert_eq!(titles(listed), vec!["Dune", "Emma", "Ulysses"]);
    }

    #[tokio::test]
    async fn test_import() {
        let dao = dao().await;
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("books.json");
        std::fs::write(&path, r#"[{"title": "Dune"}, {"title": "Emma", "pages": 300}]"#).unwrap();

        let imported = run(
            parse(&["import", "Book", path.to_str().unwrap()]),
            &dao,
        )
        .await
        .unwrap();
        assert_eq!(imported, json!({"created": 2}));

        std::fs::write(&path, r#"[{"title": "Dune"}, 5]"#).unwrap();
        let error = run(parse(&["import", "Book", path.to_str().unwrap()]), &dao)
            .await
            .unwrap_err();
        assert!(matches!(error, EazyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_run_errors() {
        let dao = dao().await;
        let error = run(parse(&["get", "Book", "9"]), &dao).await.unwrap_err();
        assert_eq!(error, EazyError::RecordNotFound("Record not found".to_owned()));

        let error = run(parse(&["create", "Book", "[1]"]), &dao).await.unwrap_err();
        assert!(matches!(error, EazyError::Validation(_)));

        let error = run(parse(&["count", "Book", "--filter", "{"]), &dao)
            .await
            .unwrap_err();
        assert!(matches!(error, EazyError::InvalidQuery(_)));

        let error = run(parse(&["list", "Novel"]), &dao).await.unwrap_err();
        assert!(matches!(error, EazyError::InvalidQuery(_)));
    }
}
