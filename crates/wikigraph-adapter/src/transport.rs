//! HTTP plumbing to the two Wikibase endpoints.
//!
//! [`Transport`] is the seam between the adapter and the network: the edit
//! API (`api.php`, form-encoded, JSON responses) and the SPARQL query
//! service. [`HttpTransport`] is the production implementation; tests plug
//! in an in-memory store.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use wikigraph_core::{AdapterConfig, AdapterError, Result};

/// Raw access to the edit API and the SPARQL endpoint.
///
/// Implementations return the decoded JSON body even when it carries an
/// API-level `error` object; interpreting error codes is the client's job.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET api.php?format=json&<params>`.
    async fn api_get(&self, params: &[(&str, String)]) -> Result<serde_json::Value>;

    /// `POST api.php` with a form-encoded body (`format=json` added).
    async fn api_post(&self, params: &[(&str, String)]) -> Result<serde_json::Value>;

    /// Run a SPARQL `SELECT` and return the JSON result set.
    async fn sparql(&self, query: &str) -> Result<SparqlResults>;
}

// ── SPARQL result format ─────────────────────────────────────────

/// `application/sparql-results+json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub head: SparqlHead,
    #[serde(default)]
    pub results: SparqlBindings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparqlHead {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparqlBindings {
    #[serde(default)]
    pub bindings: Vec<HashMap<String, Binding>>,
}

/// One bound variable in a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// `uri`, `literal`, or `bnode`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl Binding {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: "uri".to_string(),
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: "literal".to_string(),
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            datatype: Some(datatype.into()),
            ..Self::literal(value)
        }
    }
}

// ── HTTP implementation ──────────────────────────────────────────

/// reqwest-backed transport with a cookie jar holding the login session.
pub struct HttpTransport {
    http: reqwest::Client,
    api_url: String,
    sparql_url: String,
    timeout_secs: u64,
}

impl HttpTransport {
    pub fn new(config: &AdapterConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .user_agent(concat!("wikigraph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            sparql_url: config.sparql_url.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn map_err(&self, operation: &str, err: reqwest::Error) -> AdapterError {
        if err.is_timeout() {
            AdapterError::Timeout {
                operation: operation.to_string(),
                after_secs: self.timeout_secs,
            }
        } else {
            AdapterError::Transport(format!("{operation}: {err}"))
        }
    }

    async fn decode_api(&self, operation: &str, response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if status.is_server_error() {
            return Err(AdapterError::Transport(format!(
                "{operation}: edit API returned HTTP {status}"
            )));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| self.map_err(operation, e))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn api_get(&self, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let operation = action_of(params);
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("format", "json")])
            .query(params)
            .send()
            .await
            .map_err(|e| self.map_err(operation, e))?;
        self.decode_api(operation, response).await
    }

    async fn api_post(&self, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let operation = action_of(params);
        let mut form: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        form.push(("format", "json"));
        let response = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.map_err(operation, e))?;
        self.decode_api(operation, response).await
    }

    async fn sparql(&self, query: &str) -> Result<SparqlResults> {
        let response = self
            .http
            .post(&self.sparql_url)
            .header(CONTENT_TYPE, "application/sparql-query; charset=utf-8")
            .header(ACCEPT, "application/sparql-results+json")
            .body(query.to_string())
            .send()
            .await
            .map_err(|e| self.map_err("sparql", e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AdapterError::Transport(format!(
                "SPARQL endpoint returned HTTP {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::QueryRejected {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<SparqlResults>()
            .await
            .map_err(|e| self.map_err("sparql", e))
    }
}

/// The `action` parameter of a request, for log and error context.
pub(crate) fn action_of<'a>(params: &'a [(&str, String)]) -> &'a str {
    params
        .iter()
        .find(|(k, _)| *k == "action")
        .map(|(_, v)| v.as_str())
        .unwrap_or("api")
}
