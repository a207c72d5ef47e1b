//! The adapter facade: typed rows in, graph edits and SPARQL out.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use wikigraph_core::schema::ResolvedField;
use wikigraph_core::{
    AdapterConfig, AdapterError, EntityId, FieldType, ItemId, PropertyId, Result, Row, Schema, Value,
};

use crate::claims::{
    self, decode_datavalue, entity_id_from_iri, item_datavalue, snak_value, statement,
    string_datavalue, ClaimSet, StoredClaim,
};
use crate::client::WikibaseClient;
use crate::materialize::{materialize, RowStream};
use crate::mutations::EntityKind;
use crate::namespace::Namespace;
use crate::query::{Operator, Query, QueryTranslator, COUNT_VAR};
use crate::registry::{labels_to_json, PropertyRegistry, ReservedProperties, TypeResolver};
use crate::transport::{HttpTransport, Transport};

/// Field values of a row being written, keyed by field name.
pub type Values = BTreeMap<String, Value>;

/// One namespace of a Wikibase instance, seen as a set of typed tables.
///
/// All methods take `&self`; share an adapter between tasks with `Arc`.
pub struct Adapter {
    config: AdapterConfig,
    schema: Arc<Schema>,
    namespace: Arc<Namespace>,
    client: Arc<WikibaseClient>,
    properties: PropertyRegistry,
    types: TypeResolver,
    reserved: ReservedProperties,
    base_uri: String,
}

impl Adapter {
    /// Connect over HTTP using the configured endpoints.
    pub async fn connect(config: AdapterConfig, schema: Schema) -> Result<Self> {
        config.validate()?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, schema, transport).await
    }

    pub async fn with_transport(config: AdapterConfig, schema: Schema, transport: Arc<dyn Transport>) -> Result<Self> {
        let client = WikibaseClient::new(transport, &config);
        Self::with_client(config, schema, client).await
    }

    /// Build on an existing client. Resolves the reserved properties, which
    /// logs in if they have to be created.
    pub async fn with_client(config: AdapterConfig, schema: Schema, client: WikibaseClient) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(client);
        let schema = Arc::new(schema);
        let namespace = Arc::new(Namespace::new(config.namespace.clone()));

        let base_uri = match &config.concept_base_uri {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => client.site_server().await?,
        };

        let properties = PropertyRegistry::new(client.clone(), schema.clone(), namespace.clone());
        let reserved = properties
            .reserved(
                PropertyId(config.instance_of_property_id),
                PropertyId(config.subclass_of_property_id),
            )
            .await?;
        let types = TypeResolver::new(client.clone(), schema.clone(), namespace.clone(), reserved);

        tracing::info!(
            namespace = %namespace.tag(),
            base_uri = %base_uri,
            models = schema.models().count(),
            "Adapter ready"
        );
        Ok(Self {
            config,
            schema,
            namespace,
            client,
            properties,
            types,
            reserved,
            base_uri,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn reserved(&self) -> ReservedProperties {
        self.reserved
    }

    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    pub fn types(&self) -> &TypeResolver {
        &self.types
    }

    pub fn client(&self) -> &WikibaseClient {
        &self.client
    }

    fn translator(&self) -> QueryTranslator<'_> {
        QueryTranslator {
            schema: &self.schema,
            namespace: &self.namespace,
            properties: &self.properties,
            types: &self.types,
            reserved: self.reserved,
            base_uri: &self.base_uri,
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Render a query as SPARQL without running it.
    pub async fn translate(&self, model: &str, query: &Query) -> Result<String> {
        let span = tracing::info_span!("translate", op_id = %Uuid::new_v4(), model);
        self.translator().translate(model, query).instrument(span).await
    }

    /// Render the counting form of a query without running it.
    pub async fn translate_count(&self, model: &str, query: &Query) -> Result<String> {
        let span = tracing::info_span!("translate_count", op_id = %Uuid::new_v4(), model);
        self.translator().translate_count(model, query).instrument(span).await
    }

    /// Run a query and stream the matching rows.
    pub async fn select(&self, model: &str, query: &Query) -> Result<RowStream> {
        let span = tracing::info_span!("select", op_id = %Uuid::new_v4(), model);
        async {
            let sparql = self.translator().translate(model, query).await?;
            tracing::debug!(%sparql, "Running query");
            let results = self.client.sparql(&sparql).await?;
            let stream = materialize(&self.schema, model, results)?;
            tracing::debug!(solutions = stream.size_hint().0, "Query answered");
            Ok(stream)
        }
        .instrument(span)
        .await
    }

    /// Number of rows matching the query's filters. Ordering and
    /// pagination are ignored.
    pub async fn count(&self, model: &str, query: &Query) -> Result<u64> {
        let span = tracing::info_span!("count", op_id = %Uuid::new_v4(), model);
        async {
            let sparql = self.translator().translate_count(model, query).await?;
            tracing::debug!(%sparql, "Running count");
            let results = self.client.sparql(&sparql).await?;
            let raw = results
                .results
                .bindings
                .first()
                .and_then(|solution| solution.get(COUNT_VAR))
                .map(|binding| binding.value.as_str());
            match raw {
                None => Ok(0),
                Some(raw) => raw.parse::<u64>().map_err(|_| {
                    AdapterError::inconsistent(model, None, format!("query service returned count {raw:?}"))
                }),
            }
        }
        .instrument(span)
        .await
    }

    /// Schema models whose type item exists in this namespace, with that
    /// item. Nothing is created.
    pub async fn stored_models(&self) -> Result<Vec<(String, ItemId)>> {
        let mut stored = Vec::new();
        for model in self.schema.models() {
            if let Some(item) = self.types.find(&model.name).await? {
                stored.push((model.name.clone(), item));
            }
        }
        Ok(stored)
    }

    /// Fetch one row by id.
    pub async fn get(&self, model: &str, id: &EntityId) -> Result<Option<Row>> {
        let query = Query::new()
            .filter("id", Operator::Eq(Value::Reference(id.clone())))
            .limit(2);
        self.select(model, &query).await?.next().transpose()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Create a row and return the new entity's id.
    ///
    /// Dropping the returned future does not cancel an edit already sent;
    /// its effect may already be visible.
    pub async fn create(&self, model: &str, values: &Values) -> Result<EntityId> {
        let span = tracing::info_span!("create", op_id = %Uuid::new_v4(), model);
        self.create_row(model, values).instrument(span).await
    }

    /// Create several rows of one model, in order.
    ///
    /// Every row is validated, and unique fields are checked against the
    /// store and across the batch, before the first edit. If a row fails
    /// after earlier rows were created the result is
    /// [`AdapterError::PartialBatch`] listing them. Dropping the returned
    /// future does not cancel an edit already sent; its effect may already
    /// be visible.
    pub async fn create_many(&self, model: &str, rows: &[Values]) -> Result<Vec<EntityId>> {
        let span = tracing::info_span!("create_many", op_id = %Uuid::new_v4(), model, rows = rows.len());
        async {
            let mut prepared = Vec::with_capacity(rows.len());
            for values in rows {
                let validated = self.validate(model, values, true)?;
                self.check_unique(&validated, None).await?;
                prepared.push(validated);
            }
            check_unique_within(model, &prepared)?;

            let mut created = Vec::with_capacity(prepared.len());
            for validated in &prepared {
                match self.insert(model, validated).await {
                    Ok(id) => created.push(id),
                    Err(e) if created.is_empty() => return Err(e),
                    Err(e) => {
                        tracing::warn!(created = created.len(), error = %e, "Bulk insert interrupted");
                        return Err(AdapterError::PartialBatch {
                            model: model.to_string(),
                            created: created.iter().map(ToString::to_string).collect(),
                            source: Box::new(e),
                        });
                    }
                }
            }
            tracing::info!(created = created.len(), "Rows created");
            Ok(created)
        }
        .instrument(span)
        .await
    }

    /// Return the row whose unique `key` field equals the given value,
    /// creating it if there is none. The flag tells whether it was created.
    pub async fn create_with_natural_key(&self, model: &str, values: &Values, key: &str) -> Result<(EntityId, bool)> {
        let span = tracing::info_span!("create_with_natural_key", op_id = %Uuid::new_v4(), model, key);
        async {
            let field = self.schema.field(model, key)?;
            if !field.descriptor.unique {
                return Err(AdapterError::invalid_value(model, key, "natural key must be a unique field"));
            }
            let value = values
                .get(key)
                .filter(|v| !v.is_null())
                .ok_or_else(|| AdapterError::invalid_value(model, key, "natural key value is required"))?;

            let existing = self.find_ids(&field.declared_by, key, value).await?;
            if let Some(id) = existing.into_iter().next() {
                tracing::debug!(entity_id = %id, "Natural key already present");
                return Ok((id, false));
            }
            Ok((self.create_row(model, values).await?, true))
        }
        .instrument(span)
        .await
    }

    /// Set the given fields of a row. `Value::Null` removes a value.
    ///
    /// Fields are edited one at a time, after every field's property has
    /// been resolved. Returns the names of fields that actually changed;
    /// unchanged fields issue no edit. If some edits fail after others
    /// succeeded the result is [`AdapterError::PartialWrite`]. Dropping the
    /// returned future does not cancel an edit already sent; its effect
    /// may already be visible.
    pub async fn update(&self, model: &str, id: &EntityId, values: &Values) -> Result<Vec<String>> {
        let span = tracing::info_span!("update", op_id = %Uuid::new_v4(), model, entity_id = %id);
        async {
            let validated = self.validate(model, values, false)?;
            let claims = self.load_owned(model, id).await?;
            self.check_unique(&validated, Some(id)).await?;

            let mut planned = Vec::with_capacity(validated.len());
            for (field, value) in &validated {
                let property = self.properties.resolve(model, &field.descriptor.name).await?;
                planned.push((field, value, property));
            }

            let mut applied = Vec::new();
            let mut failed = Vec::new();
            let mut first_error = None;
            for (field, value, property) in planned {
                let name = &field.descriptor.name;
                let stored = claims.get(property);
                match self
                    .apply_field(model, id, property, field, stored, value)
                    .await
                {
                    Ok(true) => applied.push(name.clone()),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(field = %name, error = %e, "Field edit failed");
                        failed.push((name.clone(), e.to_string()));
                        first_error.get_or_insert(e);
                    }
                }
            }

            match first_error {
                None => {
                    tracing::info!(changed = applied.len(), "Row updated");
                    Ok(applied)
                }
                Some(e) if applied.is_empty() => Err(e),
                Some(_) => Err(AdapterError::PartialWrite {
                    entity_id: id.to_string(),
                    applied,
                    failed,
                }),
            }
        }
        .instrument(span)
        .await
    }

    /// Delete a row. Deleting an absent or already deleted row succeeds.
    ///
    /// With `hard_delete` the item page is deleted; otherwise the entity is
    /// tagged as deleted in this namespace and drops out of every query.
    /// Only row entities can be deleted, never type items. Dropping the
    /// returned future does not cancel an edit already sent; its effect may
    /// already be visible.
    pub async fn delete(&self, id: &EntityId) -> Result<()> {
        let span = tracing::info_span!("delete", op_id = %Uuid::new_v4(), entity_id = %id);
        async {
            let Some(claims) = self.client.get_claims(id.as_str()).await? else {
                tracing::debug!("Entity already absent");
                return Ok(());
            };
            let tag = self.namespace.tag();
            if !claims.has_string(self.reserved.namespace, tag) {
                return Err(AdapterError::inconsistent(
                    tag,
                    Some(id.as_str()),
                    "entity does not belong to this namespace",
                ));
            }
            if claims.items(self.reserved.instance_of).is_empty() {
                return Err(AdapterError::inconsistent(
                    tag,
                    Some(id.as_str()),
                    "entity is not a row; type items cannot be deleted",
                ));
            }
            if claims.has_string(self.reserved.deleted, tag) {
                tracing::debug!("Entity already tagged as deleted");
                return Ok(());
            }

            if self.config.hard_delete {
                let title = format!("{}{id}", self.config.item_page_prefix);
                let removed = self.client.delete_page(id.as_str(), &title).await?;
                tracing::info!(%title, removed, "Deleted item page");
            } else {
                self.client
                    .create_claim(id.as_str(), &self.reserved.deleted.to_string(), &json!(tag))
                    .await?;
                tracing::info!("Tagged entity as deleted");
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Forget cached property and type mappings.
    pub fn clear_cache(&self) {
        self.properties.clear();
        self.types.clear();
        tracing::info!(namespace = %self.namespace.tag(), "Mapping caches cleared");
    }

    /// Close the bot session.
    pub async fn shutdown(&self) -> Result<()> {
        self.client.session().shutdown().await
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn create_row(&self, model: &str, values: &Values) -> Result<EntityId> {
        let validated = self.validate(model, values, true)?;
        self.check_unique(&validated, None).await?;
        self.insert(model, &validated).await
    }

    /// Create the entity for an already validated row.
    async fn insert(&self, model: &str, validated: &[(ResolvedField, Value)]) -> Result<EntityId> {
        let type_item = self.types.type_item(model).await?;
        let mut statements = vec![
            statement(self.reserved.instance_of, item_datavalue(type_item)),
            statement(self.reserved.namespace, string_datavalue(self.namespace.tag())),
        ];
        for (field, value) in validated {
            if value.is_null() {
                continue;
            }
            let name = &field.descriptor.name;
            let property = self.properties.resolve(model, name).await?;
            let datavalue =
                claims::datavalue(value).map_err(|reason| AdapterError::invalid_value(model, name, reason))?;
            statements.push(statement(property, datavalue));
        }

        let data = json!({
            "labels": labels_to_json(self.client.language(), &self.namespace.entity_label(model)),
            "claims": statements,
        });
        let id = self.client.create_entity(EntityKind::Item, &data).await?;
        tracing::info!(entity_id = %id, "Row created");
        Ok(EntityId::new(id))
    }

    /// Check values against the schema, in effective field order.
    fn validate(&self, model: &str, values: &Values, creating: bool) -> Result<Vec<(ResolvedField, Value)>> {
        let fields = self.schema.fields(model)?;
        if let Some(unknown) = values
            .keys()
            .find(|name| !fields.iter().any(|f| &f.descriptor.name == *name))
        {
            return Err(AdapterError::UnmappedField {
                model: model.to_string(),
                field: unknown.clone(),
            });
        }

        let mut validated = Vec::new();
        for field in fields {
            let descriptor = &field.descriptor;
            let Some(value) = values.get(&descriptor.name) else {
                if creating && !descriptor.nullable {
                    return Err(AdapterError::invalid_value(model, &descriptor.name, "required field is missing"));
                }
                continue;
            };
            if value.is_null() {
                if !descriptor.nullable {
                    return Err(AdapterError::invalid_value(model, &descriptor.name, "field is not nullable"));
                }
            } else {
                if !value.fits(&descriptor.field_type) {
                    return Err(AdapterError::invalid_value(
                        model,
                        &descriptor.name,
                        format!("{value} is not a {}", claims::datatype(&descriptor.field_type)),
                    ));
                }
                snak_value(value).map_err(|reason| AdapterError::invalid_value(model, &descriptor.name, reason))?;
            }
            validated.push((field.clone(), value.clone()));
        }
        Ok(validated)
    }

    /// Reject values already held by another row in a unique field. The
    /// check covers the declaring model and all of its descendants.
    async fn check_unique(&self, validated: &[(ResolvedField, Value)], own: Option<&EntityId>) -> Result<()> {
        for (field, value) in validated {
            if !field.descriptor.unique || value.is_null() {
                continue;
            }
            let existing = self.find_ids(&field.declared_by, &field.descriptor.name, value).await?;
            if let Some(other) = existing.into_iter().find(|id| Some(id) != own) {
                return Err(AdapterError::UniqueViolation {
                    model: field.declared_by.clone(),
                    field: field.descriptor.name.clone(),
                    existing: other.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Ids of rows whose `field` equals `value`, without decoding rows.
    async fn find_ids(&self, model: &str, field: &str, value: &Value) -> Result<Vec<EntityId>> {
        let query = Query::new().filter(field, Operator::Eq(value.clone())).limit(2);
        let sparql = self.translator().translate(model, &query).await?;
        let results = self.client.sparql(&sparql).await?;
        Ok(results
            .results
            .bindings
            .iter()
            .filter_map(|solution| solution.get(crate::query::ITEM_VAR))
            .filter_map(|item| entity_id_from_iri(&item.value))
            .collect())
    }

    /// Claims of a live row of `model` (or a descendant) in this namespace.
    async fn load_owned(&self, model: &str, id: &EntityId) -> Result<ClaimSet> {
        let missing = |info: &str| AdapterError::RemoteWrite {
            entity_id: Some(id.to_string()),
            code: "no-such-entity".to_string(),
            info: info.to_string(),
        };
        let claims = self
            .client
            .get_claims(id.as_str())
            .await?
            .ok_or_else(|| missing("entity does not exist"))?;

        let tag = self.namespace.tag();
        if !claims.has_string(self.reserved.namespace, tag) {
            return Err(AdapterError::inconsistent(
                model,
                Some(id.as_str()),
                "entity does not belong to this namespace",
            ));
        }
        if claims.has_string(self.reserved.deleted, tag) {
            return Err(missing("entity was deleted"));
        }
        let allowed = self.types.resolve_type(model).await?;
        if !claims
            .items(self.reserved.instance_of)
            .iter()
            .any(|item| allowed.contains(item))
        {
            return Err(AdapterError::inconsistent(
                model,
                Some(id.as_str()),
                format!("entity is not a {model}"),
            ));
        }
        Ok(claims)
    }

    /// Bring one field's claims in line with `value`. Returns whether an
    /// edit was issued.
    async fn apply_field(
        &self,
        model: &str,
        id: &EntityId,
        property: PropertyId,
        field: &ResolvedField,
        stored: &[StoredClaim],
        value: &Value,
    ) -> Result<bool> {
        let entity = id.as_str();
        if value.is_null() {
            if stored.is_empty() {
                return Ok(false);
            }
            let guids: Vec<String> = stored.iter().map(|c| c.guid.clone()).collect();
            self.client.remove_claims(entity, &guids).await?;
            return Ok(true);
        }

        let name = &field.descriptor.name;
        let snak = snak_value(value).map_err(|reason| AdapterError::invalid_value(model, name, reason))?;
        let Some((first, extra)) = stored.split_first() else {
            self.client
                .create_claim(entity, &property.to_string(), &snak)
                .await?;
            return Ok(true);
        };

        let current = first
            .datavalue
            .as_ref()
            .and_then(|dv| decode_datavalue(dv, &field.descriptor.field_type));
        let changed = current.as_ref() != Some(value);
        if changed {
            self.client.set_claim_value(entity, &first.guid, &snak).await?;
        }
        if !extra.is_empty() {
            let guids: Vec<String> = extra.iter().map(|c| c.guid.clone()).collect();
            self.client.remove_claims(entity, &guids).await?;
        }
        Ok(changed || !extra.is_empty())
    }
}

/// Reject two rows of one batch sharing a value in a unique field.
fn check_unique_within(model: &str, rows: &[Vec<(ResolvedField, Value)>]) -> Result<()> {
    let mut seen: Vec<(&str, &Value, usize)> = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        for (field, value) in row {
            if !field.descriptor.unique || value.is_null() {
                continue;
            }
            let name = field.descriptor.name.as_str();
            if let Some((_, _, first)) = seen.iter().find(|(n, v, _)| *n == name && *v == value) {
                return Err(AdapterError::invalid_value(
                    model,
                    name,
                    format!("rows {first} and {index} of the batch share the unique value {value}"),
                ));
            }
            seen.push((name, value, index));
        }
    }
    Ok(())
}

/// Parse `field=value` pairs against a model's declared field types.
pub fn parse_values<'a>(
    schema: &Schema,
    model: &str,
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<Values> {
    let mut values = Values::new();
    for (name, raw) in pairs {
        let field = schema.field(model, name)?;
        let field_type: &FieldType = &field.descriptor.field_type;
        let value = Value::parse_as(field_type, raw)
            .map_err(|e| AdapterError::invalid_value(model, name, e.to_string()))?;
        values.insert(name.to_string(), value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use wikigraph_core::{FieldDescriptor, ModelSchema};

    use super::*;

    #[test]
    fn parse_values_uses_declared_types() {
        let schema = Schema::new([ModelSchema::new("Person")
            .with_field(FieldDescriptor::new("name", FieldType::Text))
            .with_field(FieldDescriptor::new("age", FieldType::Number).nullable())])
        .unwrap();

        let values = parse_values(&schema, "Person", [("name", "Ada"), ("age", "36")]).unwrap();
        assert_eq!(values["name"], Value::from("Ada"));
        assert_eq!(values["age"], Value::Number(36.0));

        let cleared = parse_values(&schema, "Person", [("age", "null")]).unwrap();
        assert!(cleared["age"].is_null());

        let err = parse_values(&schema, "Person", [("age", "old")]).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidValue { ref field, .. } if field == "age"));
        assert!(matches!(
            parse_values(&schema, "Person", [("height", "2")]),
            Err(AdapterError::UnmappedField { .. })
        ));
    }
}
