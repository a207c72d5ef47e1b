//! Namespace partitioning of one shared Wikibase instance.
//!
//! Every property, type item and row entity the adapter creates is labelled
//! and tagged with the namespace, and every query is constrained to it, so
//! several applications can share an instance without seeing each other.

use uuid::Uuid;

use wikigraph_core::PropertyId;

/// Label of the global string property holding an entity's namespace tag.
pub const NAMESPACE_PROPERTY_LABEL: &str = "wikigraph namespace";

/// Label of the global string property marking soft-deleted entities.
pub const DELETED_PROPERTY_LABEL: &str = "wikigraph deleted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    tag: String,
}

impl Namespace {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Label of the type item standing for `model`.
    pub fn type_label(&self, model: &str) -> String {
        format!("{model} in {}", self.tag)
    }

    /// Label of the property storing `model.field`.
    pub fn property_label(&self, model: &str, field: &str) -> String {
        format!("{model}.{field} in {}", self.tag)
    }

    /// Fresh, unique label for a new row entity.
    pub fn entity_label(&self, model: &str) -> String {
        format!("{model}:{} in {}", Uuid::new_v4(), self.tag)
    }

    /// Triple pattern requiring `var` to carry this namespace's tag.
    pub fn constraint(&self, var: &str, property: PropertyId) -> String {
        format!("{var} wdt:{property} {} .", string_literal(&self.tag))
    }

    /// Filter dropping entities soft-deleted in this namespace.
    pub fn exclude_deleted(&self, var: &str, property: PropertyId) -> String {
        format!(
            "FILTER NOT EXISTS {{ {var} wdt:{property} {} . }}",
            string_literal(&self.tag)
        )
    }
}

/// Quote a string as a SPARQL literal.
pub fn string_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
