//! Edit API operations on the store.
//!
//! These are the primitive reads and writes the registry and the adapter
//! build on. Callers attach model context to the errors.

use wikigraph_core::{AdapterError, Result};

use crate::claims::ClaimSet;
use crate::client::{with_entity, WikibaseClient};

/// Page size of label searches. Exact matches of adapter labels are rare
/// beyond the first result, so one page is enough.
const SEARCH_LIMIT: usize = 50;

/// Kind of entity in the edit API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Item,
    Property,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Property => "property",
        }
    }
}

impl WikibaseClient {
    // ── Reads ────────────────────────────────────────────────────

    /// Ids of entities whose label in the client language is exactly `label`.
    pub async fn search_exact(&self, label: &str, kind: EntityKind) -> Result<Vec<String>> {
        let params = [
            ("action", "wbsearchentities".to_string()),
            ("search", label.to_string()),
            ("language", self.language().to_string()),
            ("type", kind.as_str().to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        let body = self.read(&params).await?;
        let ids = body["search"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|hit| hit["label"].as_str() == Some(label))
            .filter_map(|hit| hit["id"].as_str().map(str::to_string))
            .collect();
        Ok(ids)
    }

    /// Claims of an entity, or `None` if it does not exist.
    pub async fn get_claims(&self, entity_id: &str) -> Result<Option<ClaimSet>> {
        let params = [
            ("action", "wbgetentities".to_string()),
            ("ids", entity_id.to_string()),
            ("props", "claims".to_string()),
        ];
        let body = match self.read(&params).await {
            Ok(body) => body,
            Err(AdapterError::Api { code, .. }) if code == "no-such-entity" => return Ok(None),
            Err(e) => return Err(e),
        };
        let entity = &body["entities"][entity_id];
        if entity.is_null() || entity.get("missing").is_some() {
            return Ok(None);
        }
        Ok(Some(ClaimSet::from_json(&entity["claims"])))
    }

    /// Concept URI base of the site, from `meta=siteinfo`.
    pub async fn site_server(&self) -> Result<String> {
        let params = [
            ("action", "query".to_string()),
            ("meta", "siteinfo".to_string()),
        ];
        let body = self.read(&params).await?;
        let server = body["query"]["general"]["server"].as_str().ok_or_else(|| {
            AdapterError::Configuration("site info carries no server URL".to_string())
        })?;
        let server = match server.strip_prefix("//") {
            Some(rest) => format!("https://{rest}"),
            None => server.to_string(),
        };
        Ok(server.trim_end_matches('/').to_string())
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Create an entity from `wbeditentity` data and return its id.
    pub async fn create_entity(&self, kind: EntityKind, data: &serde_json::Value) -> Result<String> {
        let params = [
            ("action", "wbeditentity".to_string()),
            ("new", kind.as_str().to_string()),
            ("data", data.to_string()),
        ];
        let body = self.write(&params).await?;
        body["entity"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::RemoteWrite {
                entity_id: None,
                code: "no-entity-id".to_string(),
                info: format!("{} creation returned no id", kind.as_str()),
            })
    }

    /// Add a value claim to an entity and return the claim GUID.
    pub async fn create_claim(&self, entity_id: &str, property: &str, value: &serde_json::Value) -> Result<String> {
        let params = [
            ("action", "wbcreateclaim".to_string()),
            ("entity", entity_id.to_string()),
            ("property", property.to_string()),
            ("snaktype", "value".to_string()),
            ("value", value.to_string()),
        ];
        let body = self.write(&params).await.map_err(|e| with_entity(e, entity_id))?;
        Ok(body["claim"]["id"].as_str().unwrap_or_default().to_string())
    }

    /// Replace the value of an existing claim.
    pub async fn set_claim_value(&self, entity_id: &str, guid: &str, value: &serde_json::Value) -> Result<()> {
        let params = [
            ("action", "wbsetclaimvalue".to_string()),
            ("claim", guid.to_string()),
            ("snaktype", "value".to_string()),
            ("value", value.to_string()),
        ];
        self.write(&params).await.map_err(|e| with_entity(e, entity_id))?;
        Ok(())
    }

    /// Remove claims by GUID.
    pub async fn remove_claims(&self, entity_id: &str, guids: &[String]) -> Result<()> {
        if guids.is_empty() {
            return Ok(());
        }
        let params = [
            ("action", "wbremoveclaims".to_string()),
            ("claim", guids.join("|")),
        ];
        self.write(&params).await.map_err(|e| with_entity(e, entity_id))?;
        Ok(())
    }

    /// Delete a page. Returns `false` if it was already gone.
    pub async fn delete_page(&self, entity_id: &str, title: &str) -> Result<bool> {
        let params = [
            ("action", "delete".to_string()),
            ("title", title.to_string()),
            ("reason", "deleted through wikigraph".to_string()),
        ];
        match self.write(&params).await {
            Ok(_) => Ok(true),
            Err(AdapterError::RemoteWrite { code, .. }) if code == "missingtitle" => Ok(false),
            Err(e) => Err(with_entity(e, entity_id)),
        }
    }
}
