//! Bot login and edit-token lifecycle.
//!
//! One [`SessionManager`] is shared by all concurrent operations. Login
//! happens lazily on the first write; a stale token triggers at most one
//! re-login no matter how many writers observe it at the same time (the
//! generation counter lets late arrivals reuse the fresh token). A rejected
//! password is latched so later writes fail fast instead of hammering the
//! login endpoint.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use wikigraph_core::{AdapterError, Result};

use crate::transport::Transport;

/// Conservative estimate of how long a login stays usable.
const SESSION_LIFETIME_MINUTES: i64 = 30;

/// MediaWiki hands out this token to anonymous sessions.
const ANONYMOUS_TOKEN: &str = "+\\";

/// A usable authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub username: String,
    pub csrf_token: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_estimate: DateTime<Utc>,
    /// Incremented on every successful login.
    pub generation: u64,
}

impl SessionToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_estimate
    }
}

#[derive(Default)]
struct SessionState {
    current: Option<SessionToken>,
    generation: u64,
    fatal: Option<String>,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    username: String,
    password: String,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            transport,
            username: username.into(),
            password: password.into(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Return a valid token, logging in if there is none or it has expired.
    pub async fn ensure_authenticated(&self) -> Result<SessionToken> {
        let mut state = self.state.lock().await;
        if let Some(reason) = &state.fatal {
            return Err(AdapterError::Authentication(reason.clone()));
        }
        if let Some(token) = &state.current {
            if !token.is_expired(Utc::now()) {
                return Ok(token.clone());
            }
            tracing::debug!(generation = token.generation, "Session estimate expired, logging in again");
        }
        self.login_locked(&mut state).await
    }

    /// Replace a token the store rejected.
    ///
    /// If another task already refreshed past `stale`, its token is returned
    /// without a second login.
    pub async fn refresh(&self, stale: &SessionToken) -> Result<SessionToken> {
        let mut state = self.state.lock().await;
        if let Some(reason) = &state.fatal {
            return Err(AdapterError::Authentication(reason.clone()));
        }
        if let Some(current) = &state.current {
            if current.generation > stale.generation {
                return Ok(current.clone());
            }
        }
        tracing::info!(generation = stale.generation, "Edit token rejected, refreshing session");
        self.login_locked(&mut state).await
    }

    /// Drop the current token; the next write logs in again.
    pub async fn invalidate(&self) {
        self.state.lock().await.current = None;
    }

    /// Log out if a session is open. Later writes log in again.
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(token) = state.current.take() else {
            return Ok(());
        };
        let params = [
            ("action", "logout".to_string()),
            ("token", token.csrf_token),
        ];
        self.transport.api_post(&params).await?;
        tracing::info!(username = %self.username, "Logged out");
        Ok(())
    }

    pub async fn current(&self) -> Option<SessionToken> {
        self.state.lock().await.current.clone()
    }

    async fn login_locked(&self, state: &mut SessionState) -> Result<SessionToken> {
        state.current = None;

        let login_token = self.fetch_token("login").await?;
        let params = [
            ("action", "login".to_string()),
            ("lgname", self.username.clone()),
            ("lgpassword", self.password.clone()),
            ("lgtoken", login_token),
        ];
        let body = self.transport.api_post(&params).await?;
        let result = body["login"]["result"].as_str().unwrap_or_default();
        if result != "Success" {
            let reason = body["login"]["reason"]
                .as_str()
                .or_else(|| body["error"]["info"].as_str())
                .unwrap_or("login rejected");
            let message = format!("login as {} failed ({result}): {reason}", self.username);
            tracing::error!(username = %self.username, result, "Login rejected");
            // `WrongToken` and `Aborted` clear up on a later attempt.
            if result == "Failed" {
                state.fatal = Some(message.clone());
            }
            return Err(AdapterError::Authentication(message));
        }

        let csrf_token = self.fetch_token("csrf").await?;
        if csrf_token == ANONYMOUS_TOKEN {
            return Err(AdapterError::Authentication(format!(
                "login as {} succeeded but the session is anonymous",
                self.username
            )));
        }

        state.generation += 1;
        let now = Utc::now();
        let token = SessionToken {
            username: self.username.clone(),
            csrf_token,
            acquired_at: now,
            expires_estimate: now + Duration::minutes(SESSION_LIFETIME_MINUTES),
            generation: state.generation,
        };
        tracing::info!(username = %self.username, generation = token.generation, "Logged in");
        state.current = Some(token.clone());
        Ok(token)
    }

    async fn fetch_token(&self, kind: &str) -> Result<String> {
        let params = [
            ("action", "query".to_string()),
            ("meta", "tokens".to_string()),
            ("type", kind.to_string()),
        ];
        let body = self.transport.api_get(&params).await?;
        body["query"]["tokens"][format!("{kind}token")]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::Authentication(format!("store issued no {kind} token")))
    }
}
