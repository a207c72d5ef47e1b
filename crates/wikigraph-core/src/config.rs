//! Configuration for a wikigraph adapter connection.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`WIKIGRAPH__WIKIBASE__` prefix)
//! 2. Config file (`wikigraph.toml`, `[wikibase]` section)
//! 3. Defaults for the optional keys
//!
//! Every required key must be present; [`AdapterConfig::validate`] reports
//! all missing keys at once.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{AdapterError, Result};

/// Connection settings for one Wikibase instance.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Edit API endpoint (`https://wiki.example.org/w/api.php`).
    #[serde(default)]
    pub api_url: String,

    /// SPARQL query service endpoint.
    #[serde(default)]
    pub sparql_url: String,

    /// Bot password login name (`User@BotName`).
    #[serde(default)]
    pub bot_username: String,

    #[serde(default)]
    pub bot_password: String,

    /// Numeric id of the "instance of" property.
    #[serde(default)]
    pub instance_of_property_id: u64,

    /// Numeric id of the "subclass of" property.
    #[serde(default)]
    pub subclass_of_property_id: u64,

    /// Character encoding of API payloads. Only UTF-8 is accepted.
    #[serde(default)]
    pub charset: String,

    /// Namespace tag isolating this application's entities.
    #[serde(default)]
    pub namespace: String,

    /// Concept URI base used in SPARQL prefixes (`https://wiki.example.org`).
    /// Discovered from the site info when absent.
    #[serde(default)]
    pub concept_base_uri: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts for transient store conditions (maxlag, rate limits).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether the bot may hard-delete item pages. When false, deletes tag
    /// the entity instead.
    #[serde(default)]
    pub hard_delete: bool,

    /// Page title prefix of items, used for hard deletes.
    #[serde(default = "default_item_page_prefix")]
    pub item_page_prefix: String,

    /// Language code of labels the adapter writes and searches.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_item_page_prefix() -> String {
    "Item:".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            sparql_url: String::new(),
            bot_username: String::new(),
            bot_password: String::new(),
            instance_of_property_id: 0,
            subclass_of_property_id: 0,
            charset: String::new(),
            namespace: String::new(),
            concept_base_uri: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            hard_delete: false,
            item_page_prefix: default_item_page_prefix(),
            language: default_language(),
        }
    }
}

impl AdapterConfig {
    /// Load the `[wikibase]` section from `<file_prefix>.{toml,json,yaml}`
    /// (optional) overlaid with `WIKIGRAPH__WIKIBASE__*` variables, then
    /// validate it.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("WIKIGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AdapterError::Configuration(e.to_string()))?;

        let loaded: Self = match cfg.get::<Self>("wikibase") {
            Ok(c) => c,
            Err(config::ConfigError::NotFound(_)) => Self::default(),
            Err(e) => return Err(AdapterError::Configuration(e.to_string())),
        };
        loaded.validate()?;
        tracing::debug!(api_url = %loaded.api_url, namespace = %loaded.namespace, "Configuration loaded");
        Ok(loaded)
    }

    /// Check that every required value is present and usable.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        let required = [
            ("api_url", &self.api_url),
            ("sparql_url", &self.sparql_url),
            ("bot_username", &self.bot_username),
            ("bot_password", &self.bot_password),
            ("charset", &self.charset),
            ("namespace", &self.namespace),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                missing.push(key);
            }
        }
        if self.instance_of_property_id == 0 {
            missing.push("instance_of_property_id");
        }
        if self.subclass_of_property_id == 0 {
            missing.push("subclass_of_property_id");
        }
        if !missing.is_empty() {
            return Err(AdapterError::Configuration(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if !matches!(
            self.charset.to_ascii_lowercase().as_str(),
            "utf-8" | "utf8" | "utf_8"
        ) {
            return Err(AdapterError::Configuration(format!(
                "unsupported charset {}: the edit API and SPARQL endpoint exchange UTF-8",
                self.charset
            )));
        }
        if self.instance_of_property_id == self.subclass_of_property_id {
            return Err(AdapterError::Configuration(
                "instance_of_property_id and subclass_of_property_id must differ".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(AdapterError::Configuration(
                "timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
