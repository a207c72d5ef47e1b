use thiserror::Error;

/// Top-level error type for the wikigraph adapter.
///
/// Every variant carries enough context (model, field, entity id, store
/// error code) to diagnose a failure without re-querying the store.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Field {field} is not mapped for model {model}")]
    UnmappedField { model: String, field: String },

    #[error("Unsupported query on {model}.{path}: {reason}")]
    UnsupportedQuery {
        model: String,
        path: String,
        reason: String,
    },

    #[error("Invalid value for {model}.{field}: {reason}")]
    InvalidValue {
        model: String,
        field: String,
        reason: String,
    },

    #[error("Value of unique field {model}.{field} is already used by {existing}")]
    UniqueViolation {
        model: String,
        field: String,
        existing: String,
    },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Store rejected edit{}: {code}: {info}", entity_suffix(.entity_id))]
    RemoteWrite {
        entity_id: Option<String>,
        code: String,
        info: String,
    },

    #[error("Partial write on {entity_id}: applied {applied:?}, failed {failed:?}")]
    PartialWrite {
        entity_id: String,
        applied: Vec<String>,
        failed: Vec<(String, String)>,
    },

    #[error("Bulk insert into {model} stopped after {} rows: {source}", .created.len())]
    PartialBatch {
        model: String,
        /// Ids of the rows created before the failure, in input order.
        created: Vec<String>,
        source: Box<AdapterError>,
    },

    #[error("Timed out after {after_secs}s during {operation}")]
    Timeout { operation: String, after_secs: u64 },

    #[error("Inconsistent data in {model}{}: {reason}", entity_suffix(.entity_id))]
    InconsistentData {
        model: String,
        entity_id: Option<String>,
        reason: String,
    },

    #[error("Edit API error during {action}: {code}: {info}")]
    Api {
        action: String,
        code: String,
        info: String,
    },

    #[error("SPARQL endpoint rejected query (HTTP {status}): {body}")]
    QueryRejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    /// Whether the failed operation may be retried as-is.
    ///
    /// Writes are only safe to retry when they are idempotent (update,
    /// delete); callers own that decision. A query rejected with HTTP 429
    /// was throttled, not refused.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport(_) | Self::QueryRejected { status: 429, .. }
        )
    }

    /// Whether the store reported an expired or missing edit token.
    pub fn is_auth_expiry(&self) -> bool {
        matches!(self, Self::RemoteWrite { code, .. } if is_auth_expiry_code(code))
    }

    pub fn inconsistent(
        model: impl Into<String>,
        entity_id: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InconsistentData {
            model: model.into(),
            entity_id: entity_id.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn unsupported(
        model: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedQuery {
            model: model.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_value(
        model: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            model: model.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Edit API error codes that mean the session or token went stale.
pub fn is_auth_expiry_code(code: &str) -> bool {
    matches!(
        code,
        "badtoken" | "notoken" | "assertuserfailed" | "assertbotfailed"
    )
}

fn entity_suffix(entity_id: &Option<String>) -> String {
    entity_id
        .as_deref()
        .map(|id| format!(" ({id})"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AdapterError>;
