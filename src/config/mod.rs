// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Configuration.
//!
//! Settings are read from a json, yaml or toml file under the `eazyapi` key, and from
//! `EAZYAPI_*` environment variables which take precedence over the file.

pub mod build;
mod params;

pub use build::build_config;
