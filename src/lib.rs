// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # eazyapi
//!
//! Generic data access over SQLite: models declared as data, records as JSON objects,
//! Mongo-style filters, flexible sort specifications and pagination.

#[cfg(feature = "sqlite")]
pub mod cli;
pub mod config;
pub mod dao;
pub mod database;
pub mod error;
pub mod model;
pub mod query;
mod settings;
pub mod utils;
pub use clap;

#[cfg(feature = "sqlite")]
pub use dao::SqlDao;
pub use dao::{Dao, ListQuery};
pub use database::{DatabaseConfig, DefaultRouter, Router};
pub use error::EazyError;
pub use model::{FieldDef, FieldKind, ModelDef, Record};
pub use settings::Settings;
pub use utils::str_to_num;
