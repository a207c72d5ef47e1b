//! Shared Wikibase client: request dispatch, retries and error mapping.

use std::sync::Arc;
use std::time::Duration;

use wikigraph_core::{AdapterConfig, AdapterError, Result};

use crate::session::{SessionManager, SessionToken};
use crate::transport::{action_of, SparqlResults, Transport};

/// Edit API codes that mean the store did not apply the request and asks
/// the caller to come back later.
const TRANSIENT_CODES: &[&str] = &[
    "maxlag",
    "ratelimited",
    "actionthrottledtext",
    "failed-save",
    "no-automatic-entity-id",
    "readonly",
];

/// Growth factor between retry delays.
const BACKOFF_FACTOR: f64 = 1.27;

/// Thread-safe client for the edit API and SPARQL endpoint.
///
/// This is the single point of access to the store. Reads go straight to
/// the transport; writes carry the session's edit token and are retried
/// once with a fresh session when the token is rejected.
pub struct WikibaseClient {
    transport: Arc<dyn Transport>,
    session: SessionManager,
    max_retries: u32,
    backoff: Duration,
    language: String,
}

impl WikibaseClient {
    pub fn new(transport: Arc<dyn Transport>, config: &AdapterConfig) -> Self {
        let session = SessionManager::new(
            transport.clone(),
            config.bot_username.clone(),
            config.bot_password.clone(),
        );
        Self {
            transport,
            session,
            max_retries: config.max_retries.max(1),
            backoff: Duration::from_secs(1),
            language: config.language.clone(),
        }
    }

    /// Override the first retry delay (the default is one second).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Language code used for labels and searches.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Run a read-only edit API request.
    pub async fn read(&self, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let body = self.dispatch(params, false).await?;
        match api_error(&body) {
            Some((code, info)) => Err(AdapterError::Api {
                action: action_of(params).to_string(),
                code,
                info,
            }),
            None => Ok(body),
        }
    }

    /// Run a state-changing edit API request as the bot user.
    ///
    /// API errors come back as [`AdapterError::RemoteWrite`] without an
    /// entity id; callers attach one with [`with_entity`].
    pub async fn write(&self, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let token = self.session.ensure_authenticated().await?;
        match self.write_with(&token, params).await {
            Err(e) if e.is_auth_expiry() => {
                let fresh = self.session.refresh(&token).await?;
                match self.write_with(&fresh, params).await {
                    Err(e) if e.is_auth_expiry() => {
                        self.session.invalidate().await;
                        Err(AdapterError::Authentication(format!(
                            "edit token rejected again after re-login: {e}"
                        )))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Run a SPARQL `SELECT`, retrying transport failures.
    pub async fn sparql(&self, query: &str) -> Result<SparqlResults> {
        let mut attempt = 0;
        loop {
            match self.transport.sparql(query).await {
                Err(e) if e.is_retryable() && attempt + 1 < self.max_retries => {
                    tracing::warn!(attempt, error = %e, "SPARQL request failed, retrying");
                    self.sleep(attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn write_with(&self, token: &SessionToken, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let mut signed: Vec<(&str, String)> = params.to_vec();
        signed.push(("token", token.csrf_token.clone()));
        signed.push(("assert", "user".to_string()));
        signed.push(("bot", "1".to_string()));

        let body = self.dispatch(&signed, true).await?;
        match api_error(&body) {
            Some((code, info)) => Err(AdapterError::RemoteWrite {
                entity_id: None,
                code,
                info,
            }),
            None => Ok(body),
        }
    }

    /// Send a request, retrying while the store reports a transient
    /// condition. Transport failures are retried for reads only: a write
    /// whose response was lost may already have been applied.
    async fn dispatch(&self, params: &[(&str, String)], post: bool) -> Result<serde_json::Value> {
        let action = action_of(params);
        let mut attempt = 0;
        loop {
            let outcome = if post {
                self.transport.api_post(params).await
            } else {
                self.transport.api_get(params).await
            };
            let transient = match &outcome {
                Ok(body) => api_error(body).is_some_and(|(code, _)| TRANSIENT_CODES.contains(&code.as_str())),
                Err(e) => !post && e.is_retryable(),
            };
            if !transient || attempt + 1 >= self.max_retries {
                return outcome;
            }
            tracing::warn!(action, attempt, "Store asked to retry later");
            self.sleep(attempt).await;
            attempt += 1;
        }
    }

    async fn sleep(&self, attempt: u32) {
        let delay = self.backoff.mul_f64(BACKOFF_FACTOR.powi(attempt as i32));
        tokio::time::sleep(delay).await;
    }
}

/// Extract `(code, info)` from an edit API error response.
pub fn api_error(body: &serde_json::Value) -> Option<(String, String)> {
    let error = body.get("error")?;
    let code = error["code"].as_str().unwrap_or("unknown").to_string();
    let info = error["info"].as_str().unwrap_or_default().to_string();
    Some((code, info))
}

/// Attach the entity being edited to a [`AdapterError::RemoteWrite`].
pub fn with_entity(err: AdapterError, entity_id: &str) -> AdapterError {
    match err {
        AdapterError::RemoteWrite { code, info, .. } => AdapterError::RemoteWrite {
            entity_id: Some(entity_id.to_string()),
            code,
            info,
        },
        other => other,
    }
}
