// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

//! `eazyapi` command.

use std::process::ExitCode;

use eazyapi::{
    clap::Parser,
    cli::{run, Args},
    config::build_config,
    dao::{Dao, SqlDao},
    error::EazyError,
    Settings,
};
use tracing_subscriber::EnvFilter;

async fn execute(settings: Settings, command: eazyapi::cli::Command) -> Result<String, EazyError> {
    let dao = SqlDao::new(settings.database)?;
    dao.init().await?;
    let result = run(command, &dao).await;
    dao.close().await?;
    serde_json::to_string_pretty(&result?)
        .map_err(|e| EazyError::DatabaseOperation(format!("Cannot serialize result: {e}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match build_config(args.env, &args.config) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = args.command else {
        println!("No command given, run `eazyapi --help` for the list of commands.");
        return ExitCode::SUCCESS;
    };

    match execute(settings, command).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
