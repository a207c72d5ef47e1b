//! Schema and logging configuration for the wikigraph CLI.
//!
//! The model schema lives in its own file (TOML, JSON or YAML) as a list
//! of `[[models]]`. Logging settings come from the `[logging]` section of
//! the connection config file or `WIKIGRAPH__LOGGING__` variables.

use serde::Deserialize;

use wikigraph_core::{ModelSchema, Schema};

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    models: Vec<ModelSchema>,
}

/// Load and validate a model schema file.
pub fn load_schema(path: &str) -> Result<Schema> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()?;
    let file: SchemaFile = cfg.try_deserialize()?;
    if file.models.is_empty() {
        return Err(CliError::Config(format!("schema {path} declares no models")));
    }
    Ok(Schema::new(file.models)?)
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default = "default_true")]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: default_true(),
        }
    }
}

impl LoggingConfig {
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("WIKIGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<Self>("logging") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}
