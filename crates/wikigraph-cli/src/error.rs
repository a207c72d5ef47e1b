//! Error types for the wikigraph CLI.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Adapter error: {0}")]
    Adapter(#[from] wikigraph_core::AdapterError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument {argument:?}: {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn invalid(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
