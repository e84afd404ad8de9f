use serde::Deserialize;

use crate::{database::DatabaseConfig, error::EazyError, model::ModelDef, settings::Settings};

#[derive(Debug, Deserialize, Default)]
pub struct Params {
    #[serde(default)]
    eazyapi: EazyParams,
}

impl From<Params> for Settings {
    fn from(params: Params) -> Self {
        let database = params.eazyapi.database;
        Self {
            database: DatabaseConfig {
                uri: database.uri,
                database: database.database,
                models: database.models,
            },
            log_level: params.eazyapi.log_level,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EazyParams {
    #[serde(default)]
    database: DatabaseParams,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for EazyParams {
    fn default() -> Self {
        Self {
            database: DatabaseParams::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[derive(Debug, Deserialize)]
struct DatabaseParams {
    #[serde(default = "default_uri")]
    uri: String,
    #[serde(default = "default_database", alias = "name")]
    database: String,
    #[serde(default)]
    models: Vec<ModelDef>,
}

impl Default for DatabaseParams {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            models: vec![],
        }
    }
}

fn default_uri() -> String {
    "sqlite://:memory:".to_owned()
}

fn default_database() -> String {
    "default".to_owned()
}

/// Values given through `EAZYAPI_*` environment variables. Unset variables leave the
/// file value in place.
#[derive(Debug, Deserialize, Default)]
pub struct EnvParams {
    #[serde(skip)]
    database: DatabaseEnvParams,
    log_level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DatabaseEnvParams {
    uri: Option<String>,
    name: Option<String>,
}

impl EnvParams {
    pub fn from_env(parent: &str) -> Result<Self, EazyError> {
        let mut params: Self = from_prefix(parent)?;
        params.database = from_prefix(&format!("{parent}_DATABASE"))?;
        Ok(params)
    }

    /// Overlay these values on the ones read from a file.
    pub fn mix_config(self, mut file: Params) -> Params {
        if let Some(uri) = self.database.uri {
            file.eazyapi.database.uri = uri;
        }
        if let Some(name) = self.database.name {
            file.eazyapi.database.database = name;
        }
        if let Some(log_level) = self.log_level {
            file.eazyapi.log_level = log_level;
        }
        file
    }
}

fn from_prefix<T: serde::de::DeserializeOwned>(prefix: &str) -> Result<T, EazyError> {
    config::Config::builder()
        .add_source(config::Environment::with_prefix(prefix))
        .build()
        .map_err(|e| EazyError::Config(format!("Error building config: {}", e)))?
        .try_deserialize()
        .map_err(|e| EazyError::Config(format!("Error try deserialize config: {}", e)))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 3] = [
        "EAZYAPI_DATABASE_URI",
        "EAZYAPI_DATABASE_NAME",
        "EAZYAPI_LOG_LEVEL",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        std::env::set_var("EAZYAPI_DATABASE_URI", "sqlite://env.sqlite3");
        std::env::set_var("EAZYAPI_DATABASE_NAME", "shop");
        std::env::set_var("EAZYAPI_LOG_LEVEL", "debug");

        let env = EnvParams::from_env("EAZYAPI").unwrap();
        clear_env();

        assert_eq!(env.database.uri.as_deref(), Some("sqlite://env.sqlite3"));
        assert_eq!(env.database.name.as_deref(), Some("shop"));
        assert_eq!(env.log_level.as_deref(), Some("debug"));
    }

    #[test]
    #[serial]
    fn test_from_env_default() {
        clear_env();
        let env = EnvParams::from_env("EAZYAPI").unwrap();
        assert!(env.database.uri.is_none());
        assert!(env.database.name.is_none());
        assert!(env.log_level.is_none());
    }

    #[test]
    fn test_mix_config() {
        let env = EnvParams {
            database: DatabaseEnvParams {
                uri: None,
                name: Some("shop".to_owned()),
            },
            log_level: Some("warn".to_owned()),
        };
        let settings = Settings::from(env.mix_config(Params::default()));
        assert_eq!(settings.database.uri, "sqlite://:memory:");
        assert_eq!(settings.database.database, "shop");
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_default_params() {
        assert_eq!(Settings::from(Params::default()), Settings::default());
    }
}
