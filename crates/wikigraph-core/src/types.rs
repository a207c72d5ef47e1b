//! Core value types exchanged between callers and the adapter.
//!
//! Identifiers mirror the Wikibase addressing scheme: items are `Q<n>`,
//! properties are `P<n>`, and row entities are opaque ids assigned by the
//! store on creation.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};
use crate::schema::FieldType;

// ── Identifiers ──────────────────────────────────────────────────

/// Opaque identifier of a graph entity, assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric identifier of a property (`P<n>`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u64);

impl PropertyId {
    /// Parse a `P<n>` identifier as returned by the edit API.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.strip_prefix('P')?.parse().ok().map(Self)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Numeric identifier of an item (`Q<n>`), used for type items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Parse a `Q<n>` identifier as returned by the edit API.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.strip_prefix('Q')?.parse().ok().map(Self)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

// ── Values ───────────────────────────────────────────────────────

/// A typed column value.
///
/// Serializes untagged (dates as `YYYY-MM-DD`, references as their id).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    Date(NaiveDate),
    Reference(EntityId),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value can be stored in a field of the given type.
    /// `Null` is accepted by every type; nullability is checked separately.
    pub fn fits(&self, field_type: &FieldType) -> bool {
        matches!(
            (self, field_type),
            (Self::Null, _)
                | (Self::Text(_), FieldType::Text)
                | (Self::Number(_), FieldType::Number)
                | (Self::Boolean(_), FieldType::Boolean)
                | (Self::Date(_), FieldType::Date)
                | (Self::Reference(_), FieldType::ForeignKey { .. })
        )
    }

    /// Parse a textual value (e.g. from the command line) as the given type.
    /// The literal `null` parses to [`Value::Null`] for every type.
    pub fn parse_as(field_type: &FieldType, raw: &str) -> Result<Self> {
        if raw == "null" {
            return Ok(Self::Null);
        }
        let bad = |what: &str| AdapterError::Configuration(format!("cannot parse {raw:?} as {what}"));
        match field_type {
            FieldType::Text => Ok(Self::Text(raw.to_string())),
            FieldType::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Self::Number)
                .ok_or_else(|| bad("number")),
            FieldType::Boolean => match raw {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(bad("boolean")),
            },
            FieldType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|_| bad("date (YYYY-MM-DD)")),
            FieldType::ForeignKey { .. } => Ok(Self::Reference(EntityId::new(raw))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Reference(id) => write!(f, "{id}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Self::Reference(id)
    }
}

// ── Rows ─────────────────────────────────────────────────────────

/// A typed row reconstructed from the graph.
///
/// Values are kept in the model's effective field order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Row {
    pub id: EntityId,
    pub values: Vec<(String, Value)>,
}

impl Row {
    /// Look up a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Render the row as a JSON object including the `id` column.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), serde_json::Value::String(self.id.0.clone()));
        for (name, value) in &self.values {
            let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            map.insert(name.clone(), json);
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_parse_and_display() {
        assert_eq!(PropertyId::parse("P31"), Some(PropertyId(31)));
        assert_eq!(ItemId::parse("Q5"), Some(ItemId(5)));
        assert_eq!(PropertyId::parse("Q5"), None);
        assert_eq!(ItemId::parse("Qx"), None);
        assert_eq!(PropertyId(279).to_string(), "P279");
        assert_eq!(ItemId(42).to_string(), "Q42");
    }

    #[test]
    fn values_fit_declared_types() {
        assert!(Value::Text("Ada".into()).fits(&FieldType::Text));
        assert!(Value::Number(36.0).fits(&FieldType::Number));
        assert!(Value::Null.fits(&FieldType::Boolean));
        assert!(!Value::Text("36".into()).fits(&FieldType::Number));
        assert!(Value::Reference(EntityId::new("Q9")).fits(&FieldType::ForeignKey {
            target: "Publisher".into()
        }));
    }

    #[test]
    fn parse_as_declared_type() {
        assert_eq!(
            Value::parse_as(&FieldType::Number, "36").unwrap(),
            Value::Number(36.0)
        );
        assert_eq!(
            Value::parse_as(&FieldType::Date, "1815-12-10").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1815, 12, 10).unwrap())
        );
        assert_eq!(Value::parse_as(&FieldType::Text, "null").unwrap(), Value::Null);
        assert!(Value::parse_as(&FieldType::Boolean, "yes").is_err());
        assert!(Value::parse_as(&FieldType::Number, "NaN").is_err());
    }

    #[test]
    fn row_json_includes_id() {
        let row = Row {
            id: EntityId::new("Q1"),
            values: vec![
                ("name".into(), Value::Text("Ada".into())),
                ("age".into(), Value::Number(36.0)),
                ("nickname".into(), Value::Null),
            ],
        };
        let json = row.to_json();
        assert_eq!(json["id"], "Q1");
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["age"], 36.0);
        assert!(json["nickname"].is_null());
        assert_eq!(row.get("age"), Some(&Value::Number(36.0)));
        assert_eq!(row.get("missing"), None);
    }
}
