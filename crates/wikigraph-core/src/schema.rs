//! Model schema supplied by the host application.
//!
//! A [`Schema`] is built once at adapter initialization and never changes
//! afterwards. Models may inherit from one parent; a model's effective
//! fields are its ancestors' fields (root first) followed by its own.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};

/// Name reserved for the entity identifier column.
pub const ID_FIELD: &str = "id";

/// Declared type of a model field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    /// Reference to a row of another model.
    ForeignKey { target: String },
}

impl FieldType {
    /// Whether range comparisons (`<`, `<=`, `>`, `>=`) are meaningful.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Text | Self::Number | Self::Date)
    }

    pub fn foreign_target(&self) -> Option<&str> {
        match self {
            Self::ForeignKey { target } => Some(target),
            _ => None,
        }
    }
}

/// A single column of a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            unique: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A model as declared by the host application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSchema {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Fields declared by this model itself (inherited fields excluded).
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// A field together with the model that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Model whose declaration introduced the field (may be an ancestor).
    pub declared_by: String,
    pub descriptor: FieldDescriptor,
}

/// The validated, immutable set of models.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: BTreeMap<String, ModelSchema>,
}

impl Schema {
    /// Validate and freeze a set of model declarations.
    pub fn new(models: impl IntoIterator<Item = ModelSchema>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for model in models {
            if !is_identifier(&model.name) {
                return Err(config_err(format!("invalid model name {:?}", model.name)));
            }
            if map.insert(model.name.clone(), model.clone()).is_some() {
                return Err(config_err(format!("model {} declared twice", model.name)));
            }
        }
        let schema = Self { models: map };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        for model in self.models.values() {
            if let Some(parent) = &model.parent {
                if !self.models.contains_key(parent) {
                    return Err(config_err(format!(
                        "model {} inherits from unknown model {parent}",
                        model.name
                    )));
                }
            }
            // Detects cycles as a side effect.
            self.ancestry(&model.name)?;

            let mut seen = BTreeSet::new();
            for resolved in self.fields(&model.name)? {
                let name = &resolved.descriptor.name;
                if !is_identifier(name) || name == ID_FIELD {
                    return Err(config_err(format!(
                        "model {} declares invalid field name {name:?}",
                        model.name
                    )));
                }
                if !seen.insert(name.clone()) {
                    return Err(config_err(format!(
                        "field {name} is declared more than once in the hierarchy of {}",
                        model.name
                    )));
                }
                if let Some(target) = resolved.descriptor.field_type.foreign_target() {
                    if !self.models.contains_key(target) {
                        return Err(config_err(format!(
                            "field {}.{name} references unknown model {target}",
                            model.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn model(&self, name: &str) -> Result<&ModelSchema> {
        self.models
            .get(name)
            .ok_or_else(|| AdapterError::UnknownModel(name.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.models.values()
    }

    /// The inheritance chain of a model, root first, ending with the model.
    pub fn ancestry(&self, name: &str) -> Result<Vec<&ModelSchema>> {
        let mut chain = Vec::new();
        let mut current = Some(self.model(name)?);
        while let Some(model) = current {
            if chain.iter().any(|m: &&ModelSchema| m.name == model.name) {
                return Err(config_err(format!("inheritance cycle through {}", model.name)));
            }
            chain.push(model);
            current = match &model.parent {
                Some(parent) => Some(self.model(parent)?),
                None => None,
            };
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every model that transitively inherits from `name` (not including it).
    pub fn descendants(&self, name: &str) -> Vec<&ModelSchema> {
        let mut found: Vec<&ModelSchema> = Vec::new();
        let mut frontier = vec![name.to_string()];
        while let Some(current) = frontier.pop() {
            for model in self.models.values() {
                if model.parent.as_deref() == Some(current.as_str())
                    && !found.iter().any(|m| m.name == model.name)
                {
                    found.push(model);
                    frontier.push(model.name.clone());
                }
            }
        }
        found
    }

    /// Effective fields of a model in declaration order, inherited first.
    pub fn fields(&self, name: &str) -> Result<Vec<ResolvedField>> {
        Ok(self
            .ancestry(name)?
            .into_iter()
            .flat_map(|model| {
                model.fields.iter().map(|descriptor| ResolvedField {
                    declared_by: model.name.clone(),
                    descriptor: descriptor.clone(),
                })
            })
            .collect())
    }

    /// Look up one effective field of a model.
    pub fn field(&self, model: &str, field: &str) -> Result<ResolvedField> {
        self.fields(model)?
            .into_iter()
            .find(|f| f.descriptor.name == field)
            .ok_or_else(|| AdapterError::UnmappedField {
                model: model.to_string(),
                field: field.to_string(),
            })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn config_err(msg: String) -> AdapterError {
    AdapterError::Configuration(msg)
}
