// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::database::DatabaseConfig;

/// Settings of an `eazyapi` process.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            log_level: "info".to_owned(),
        }
    }
}
