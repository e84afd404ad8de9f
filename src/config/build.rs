use crate::{error::EazyError, settings::Settings};
use config::Config;

use super::params::{EnvParams, Params};

/// Build the settings from a configuration file and, if `env` is set, the `EAZYAPI_*`
/// environment variables. An empty `file` means no file.
pub fn build_config(env: bool, file: &str) -> Result<Settings, EazyError> {
    // Env configuration
    let mut params_env = EnvParams::default();
    if env {
        params_env = EnvParams::from_env("EAZYAPI")?;
    }

    // file configuration (json, yaml or toml)
    let mut params_file = Params::default();
    if !file.is_empty() {
        let config = Config::builder()
            .add_source(config::File::with_name(file))
            .build()
            .map_err(|e| EazyError::Config(format!("Error building config: {}", e)))?;

        params_file = config
            .try_deserialize()
            .map_err(|e| EazyError::Config(format!("Error try deserialize config: {}", e)))?;
    }

    // Mix configurations.
    Ok(Settings::from(params_env.mix_config(params_file)))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::TempDir;

    use super::build_config;
    use crate::{error::EazyError, model::FieldKind, settings::Settings};

    fn write(name: &str, content: &str) -> (TempDir, String) {
        let temp_dir = TempDir::new().unwrap();
        let temp_file_path = temp_dir.path().join(name);
        std::fs::write(&temp_file_path, content.as_bytes()).unwrap();
        let path = temp_file_path.to_str().unwrap().to_owned();
        (temp_dir, path)
    }

    #[test]
    #[serial]
    fn test_env() {
        std::env::set_var("EAZYAPI_DATABASE_URI", "sqlite://env.sqlite3");
        std::env::set_var("EAZYAPI_LOG_LEVEL", "debug");
        let settings = build_config(true, "");
        std::env::remove_var("EAZYAPI_DATABASE_URI");
        std::env::remove_var("EAZYAPI_LOG_LEVEL");

        let settings = settings.unwrap();
        assert_eq!(settings.database.uri, "sqlite://env.sqlite3");
        assert_eq!(settings.database.database, "default");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_env_ignored() {
        std::env::set_var("EAZYAPI_LOG_LEVEL", "trace");
        let settings = build_config(false, "");
        std::env::remove_var("EAZYAPI_LOG_LEVEL");
        assert_eq!(settings.unwrap(), Settings::default());
    }

    #[test]
    fn test_json() {
        let content = r#"
            {
              "eazyapi": {
                "database": {
                  "uri": "sqlite://db.sqlite3",
                  "name": "shop",
                  "models": [
                    {
                      "name": "Book",
                      "fields": [
                        {"name": "title", "kind": "text"},
                        {"name": "pages", "kind": "int", "nullable": true}
                      ]
                    }
                  ]
                },
                "log_level": "warn"
              }
            }"#;
        let (_dir, path) = write("config.json", content);

        let settings = build_config(false, &path).unwrap();
        assert_eq!(settings.database.uri, "sqlite://db.sqlite3");
        assert_eq!(settings.database.database, "shop");
        assert_eq!(settings.log_level, "warn");
        let book = &settings.database.models[0];
        assert_eq!(book.name, "Book");
        assert_eq!(book.fields[1].kind, FieldKind::Int);
        assert!(book.fields[1].nullable);
    }

    #[test]
    fn test_yaml() {
        let content = r#"
        eazyapi:
            database:
                uri: "sqlite://db.sqlite3"
                database: "shop"
                models:
                - name: "Person"
                  table: "people"
                  fields:
                  - name: "email"
                    kind: "text"
                    unique: true
        "#;
        let (_dir, path) = write("config.yaml", content);

        let settings = build_config(false, &path).unwrap();
        assert_eq!(settings.database.database, "shop");
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.database.models[0].table_name(), "people");
        assert!(settings.database.models[0].fields[0].unique);
    }

    #[test]
    fn test_toml() {
        let content = r#"
        [eazyapi]
        log_level = "error"

        [eazyapi.database]
        uri = "sqlite://:memory:"
        name = "test"
        "#;
        let (_dir, path) = write("config.toml", content);

        let settings = build_config(false, &path).unwrap();
        assert_eq!(settings.database.database, "test");
        assert!(settings.database.models.is_empty());
        assert_eq!(settings.log_level, "error");
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let content = r#"
        [eazyapi.database]
        uri = "sqlite://file.sqlite3"
        name = "file"
        "#;
        let (_dir, path) = write("config.toml", content);
        std::env::set_var("EAZYAPI_DATABASE_NAME", "env");
        let settings = build_config(true, &path);
        std::env::remove_var("EAZYAPI_DATABASE_NAME");

        let settings = settings.unwrap();
        assert_eq!(settings.database.uri, "sqlite://file.sqlite3");
        assert_eq!(settings.database.database, "env");
    }

    #[test]
    fn test_missing_file() {
        let result = build_config(false, "/nonexistent/eazyapi.toml");
        assert!(matches!(result, Err(EazyError::Config(_))));
    }
}
