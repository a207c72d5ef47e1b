//! Reconstruction of typed rows from SPARQL solutions.

use std::collections::{HashMap, HashSet};

use wikigraph_core::{AdapterError, EntityId, FieldDescriptor, Result, Row, Schema, Value};

use crate::claims::{decode_binding, entity_id_from_iri};
use crate::query::{field_var, ITEM_VAR};
use crate::transport::{Binding, SparqlResults};

/// Decode the solutions of a query over `model` into a row stream.
pub fn materialize(schema: &Schema, model: &str, results: SparqlResults) -> Result<RowStream> {
    RowStream::new(schema, model, results)
}

/// Rows of one query, decoded lazily in solution order.
///
/// A single pass: the stream is consumed as it is iterated. A solution
/// that cannot be turned into a row (missing required value, undecodable
/// literal, the same entity returned twice) yields
/// [`AdapterError::InconsistentData`] for that row; iteration may continue.
pub struct RowStream {
    model: String,
    fields: Vec<FieldDescriptor>,
    solutions: std::vec::IntoIter<HashMap<String, Binding>>,
    seen: HashSet<EntityId>,
}

impl RowStream {
    pub fn new(schema: &Schema, model: &str, results: SparqlResults) -> Result<Self> {
        let fields = schema
            .fields(model)?
            .into_iter()
            .map(|f| f.descriptor)
            .collect();
        Ok(Self {
            model: model.to_string(),
            fields,
            solutions: results.results.bindings.into_iter(),
            seen: HashSet::new(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Collect every row, stopping at the first inconsistent one.
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }

    fn decode(&mut self, solution: HashMap<String, Binding>) -> Result<Row> {
        let item = solution
            .get(ITEM_VAR)
            .ok_or_else(|| AdapterError::inconsistent(&self.model, None, "solution without an entity"))?;
        let id = entity_id_from_iri(&item.value).ok_or_else(|| {
            AdapterError::inconsistent(&self.model, None, format!("{} is not an item IRI", item.value))
        })?;
        if !self.seen.insert(id.clone()) {
            return Err(AdapterError::inconsistent(
                &self.model,
                Some(id.as_str()),
                "entity returned more than once; some field holds several claims",
            ));
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = match solution.get(&field_var(&field.name)) {
                Some(binding) => decode_binding(binding, &field.field_type).map_err(|reason| {
                    AdapterError::inconsistent(&self.model, Some(id.as_str()), format!("{}: {reason}", field.name))
                })?,
                None if field.nullable => Value::Null,
                None => {
                    return Err(AdapterError::inconsistent(
                        &self.model,
                        Some(id.as_str()),
                        format!("required field {} has no value", field.name),
                    ))
                }
            };
            values.push((field.name.clone(), value));
        }
        Ok(Row { id, values })
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let solution = self.solutions.next()?;
        Some(self.decode(solution))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.solutions.size_hint()
    }
}
