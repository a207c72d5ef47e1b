//! Field-to-property and model-to-type-item mappings.
//!
//! Both mappings are discovered lazily: the first request for a field (or
//! model) searches the store for the namespaced label and creates the
//! property (or type item) if none exists. Concurrent requests for the same
//! key share one in-flight resolution, so a property is never created
//! twice by the same process.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::OnceCell;

use wikigraph_core::{AdapterError, FieldType, ItemId, PropertyId, Result, Schema};

use crate::claims::{self, item_datavalue, statement, string_datavalue};
use crate::client::WikibaseClient;
use crate::mutations::EntityKind;
use crate::namespace::{Namespace, DELETED_PROPERTY_LABEL, NAMESPACE_PROPERTY_LABEL};

/// Key of a field mapping: the model that declares the field, and the field.
type FieldKey = (String, String);

/// Properties every namespace relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedProperties {
    pub instance_of: PropertyId,
    pub subclass_of: PropertyId,
    /// String property holding the namespace tag.
    pub namespace: PropertyId,
    /// String property holding the namespace tag of soft-deleted entities.
    pub deleted: PropertyId,
}

pub(crate) fn labels_to_json(language: &str, label: &str) -> serde_json::Value {
    let mut labels = serde_json::Map::new();
    labels.insert(language.to_string(), json!({ "language": language, "value": label }));
    serde_json::Value::Object(labels)
}

// ── Property registry ────────────────────────────────────────────

pub struct PropertyRegistry {
    client: Arc<WikibaseClient>,
    schema: Arc<Schema>,
    namespace: Arc<Namespace>,
    fields: DashMap<FieldKey, Arc<OnceCell<PropertyId>>>,
    owners: DashMap<PropertyId, FieldKey>,
    global: DashMap<String, Arc<OnceCell<PropertyId>>>,
}

impl PropertyRegistry {
    pub fn new(client: Arc<WikibaseClient>, schema: Arc<Schema>, namespace: Arc<Namespace>) -> Self {
        Self {
            client,
            schema,
            namespace,
            fields: DashMap::new(),
            owners: DashMap::new(),
            global: DashMap::new(),
        }
    }

    /// Property storing `model.field`, creating it on first use.
    ///
    /// Inherited fields resolve to the property of the declaring ancestor,
    /// so a parent and all its descendants share one property per field.
    pub async fn resolve(&self, model: &str, field: &str) -> Result<PropertyId> {
        let resolved = self.schema.field(model, field)?;
        let key: FieldKey = (resolved.declared_by, field.to_string());
        let cell = self.fields.entry(key.clone()).or_default().clone();
        let property = *cell
            .get_or_try_init(|| self.lookup_or_create(&key, &resolved.descriptor.field_type))
            .await?;
        self.claim_ownership(property, &key)?;
        Ok(property)
    }

    /// Resolve the namespace and deletion properties shared by all
    /// namespaces, plus the configured hierarchy properties.
    pub async fn reserved(&self, instance_of: PropertyId, subclass_of: PropertyId) -> Result<ReservedProperties> {
        Ok(ReservedProperties {
            instance_of,
            subclass_of,
            namespace: self.resolve_global(NAMESPACE_PROPERTY_LABEL).await?,
            deleted: self.resolve_global(DELETED_PROPERTY_LABEL).await?,
        })
    }

    /// Forget every field mapping. The next resolution consults the store.
    pub fn clear(&self) {
        self.fields.clear();
        self.owners.clear();
    }

    /// Number of field mappings resolved so far.
    pub fn len(&self) -> usize {
        self.fields.iter().filter(|entry| entry.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn resolve_global(&self, label: &str) -> Result<PropertyId> {
        let cell = self.global.entry(label.to_string()).or_default().clone();
        let property = *cell
            .get_or_try_init(|| self.find_or_create_property(label, "string", "(reserved)"))
            .await?;
        Ok(property)
    }

    async fn lookup_or_create(&self, key: &FieldKey, field_type: &FieldType) -> Result<PropertyId> {
        let (model, field) = key;
        let label = self.namespace.property_label(model, field);
        self.find_or_create_property(&label, claims::datatype(field_type), model)
            .await
    }

    async fn find_or_create_property(&self, label: &str, datatype: &str, model: &str) -> Result<PropertyId> {
        let found = self.client.search_exact(label, EntityKind::Property).await?;
        let id = match found.as_slice() {
            [] => {
                let data = json!({
                    "labels": labels_to_json(self.client.language(), label),
                    "datatype": datatype,
                });
                let id = self.client.create_entity(EntityKind::Property, &data).await?;
                tracing::info!(label, property = %id, datatype, "Created property");
                id
            }
            [id] => {
                tracing::debug!(label, property = %id, "Found property");
                id.clone()
            }
            many => {
                return Err(AdapterError::inconsistent(
                    model,
                    None,
                    format!("label {label:?} is carried by several properties: {}", many.join(", ")),
                ))
            }
        };
        PropertyId::parse(&id).ok_or_else(|| {
            AdapterError::inconsistent(model, Some(&id), format!("{id} is not a property id"))
        })
    }

    /// Record that `property` stores `key`; two fields may never share one.
    fn claim_ownership(&self, property: PropertyId, key: &FieldKey) -> Result<()> {
        match self.owners.entry(property) {
            Entry::Occupied(owner) if owner.get() != key => Err(AdapterError::inconsistent(
                key.0.clone(),
                None,
                format!(
                    "{property} is mapped to both {}.{} and {}.{}",
                    owner.get().0,
                    owner.get().1,
                    key.0,
                    key.1
                ),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
                Ok(())
            }
        }
    }
}

// ── Type resolver ────────────────────────────────────────────────

/// Maps models to type items linked by "subclass of" along the model
/// hierarchy.
pub struct TypeResolver {
    client: Arc<WikibaseClient>,
    schema: Arc<Schema>,
    namespace: Arc<Namespace>,
    reserved: ReservedProperties,
    items: DashMap<String, Arc<OnceCell<ItemId>>>,
}

impl TypeResolver {
    pub fn new(
        client: Arc<WikibaseClient>,
        schema: Arc<Schema>,
        namespace: Arc<Namespace>,
        reserved: ReservedProperties,
    ) -> Self {
        Self {
            client,
            schema,
            namespace,
            reserved,
            items: DashMap::new(),
        }
    }

    /// Type item of the model itself.
    pub async fn type_item(&self, model: &str) -> Result<ItemId> {
        let mut parent = None;
        let mut item = None;
        for ancestor in self.schema.ancestry(model)? {
            let resolved = self.resolve_one(&ancestor.name, parent).await?;
            parent = Some(resolved);
            item = Some(resolved);
        }
        item.ok_or_else(|| AdapterError::UnknownModel(model.to_string()))
    }

    /// Type items a row of `model` may carry: its own and every
    /// descendant's, so querying a parent also yields subclass rows.
    pub async fn resolve_type(&self, model: &str) -> Result<BTreeSet<ItemId>> {
        let mut set = BTreeSet::new();
        set.insert(self.type_item(model).await?);
        for descendant in self.schema.descendants(model) {
            set.insert(self.type_item(&descendant.name).await?);
        }
        Ok(set)
    }

    /// Type item of `model` if it already exists. Never creates one.
    pub async fn find(&self, model: &str) -> Result<Option<ItemId>> {
        self.schema.model(model)?;
        if let Some(item) = self.items.get(model).and_then(|cell| cell.get().copied()) {
            return Ok(Some(item));
        }
        self.search(model).await
    }

    pub fn clear(&self) {
        self.items.clear();
    }

    async fn resolve_one(&self, model: &str, parent: Option<ItemId>) -> Result<ItemId> {
        let cell = self.items.entry(model.to_string()).or_default().clone();
        let item = *cell
            .get_or_try_init(|| self.lookup_or_create(model, parent))
            .await?;
        Ok(item)
    }

    async fn lookup_or_create(&self, model: &str, parent: Option<ItemId>) -> Result<ItemId> {
        if let Some(item) = self.search(model).await? {
            return Ok(item);
        }
        let label = self.namespace.type_label(model);
        let mut statements = vec![statement(
            self.reserved.namespace,
            string_datavalue(self.namespace.tag()),
        )];
        if let Some(parent) = parent {
            statements.push(statement(self.reserved.subclass_of, item_datavalue(parent)));
        }
        let data = json!({
            "labels": labels_to_json(self.client.language(), &label),
            "claims": statements,
        });
        let id = self.client.create_entity(EntityKind::Item, &data).await?;
        tracing::info!(model, item = %id, "Created type item");
        ItemId::parse(&id)
            .ok_or_else(|| AdapterError::inconsistent(model, Some(&id), format!("{id} is not an item id")))
    }

    async fn search(&self, model: &str) -> Result<Option<ItemId>> {
        let label = self.namespace.type_label(model);
        let found = self.client.search_exact(&label, EntityKind::Item).await?;
        match found.as_slice() {
            [] => Ok(None),
            [id] => ItemId::parse(id)
                .map(Some)
                .ok_or_else(|| AdapterError::inconsistent(model, Some(id), format!("{id} is not an item id"))),
            many => Err(AdapterError::inconsistent(
                model,
                None,
                format!("label {label:?} is carried by several items: {}", many.join(", ")),
            )),
        }
    }
}
