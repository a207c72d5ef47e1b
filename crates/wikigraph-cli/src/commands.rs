//! Argument parsing and command execution.

use wikigraph_adapter::{Adapter, Operator, Query};
use wikigraph_core::schema::ID_FIELD;
use wikigraph_core::{EntityId, FieldType, Schema, Value};

use crate::error::{CliError, Result};

/// Type of the value at the end of a dotted path, `None` for entity ids.
pub fn path_type(schema: &Schema, model: &str, path: &str) -> Result<Option<FieldType>> {
    let mut current = model.to_string();
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment == ID_FIELD && segments.peek().is_none() {
            return Ok(None);
        }
        let field_type = schema.field(&current, segment)?.descriptor.field_type;
        if segments.peek().is_none() {
            return Ok(Some(field_type));
        }
        match field_type.foreign_target() {
            Some(target) => current = target.to_string(),
            None => return Err(CliError::invalid(path, format!("{segment} is not a foreign key"))),
        }
    }
    Err(CliError::invalid(path, "empty path"))
}

fn parse_value(field_type: &Option<FieldType>, raw: &str) -> Result<Value> {
    match field_type {
        Some(field_type) => Ok(Value::parse_as(field_type, raw.trim())?),
        None => Ok(Value::Reference(EntityId::new(raw.trim()))),
    }
}

/// Parse a filter expression such as `age>30`, `author.name=Ada`,
/// `name in Ada,Alan` or `nickname is null`.
pub fn parse_filter(schema: &Schema, model: &str, expr: &str) -> Result<(String, Operator)> {
    let expr = expr.trim();
    // Keywords only count in front of the first operator; after it they
    // are part of the value (`title=Alice in Wonderland`).
    let operator_at = expr.find(['=', '!', '<', '>']);
    if operator_at.is_none() {
        if let Some(path) = expr.strip_suffix(" is not null") {
            return Ok((path.trim().to_string(), Operator::IsNull(false)));
        }
        if let Some(path) = expr.strip_suffix(" is null") {
            return Ok((path.trim().to_string(), Operator::IsNull(true)));
        }
    }
    let membership = expr
        .find(" in ")
        .filter(|at| operator_at.map_or(true, |op| *at < op));
    if let Some(at) = membership {
        let (path, list) = (&expr[..at], &expr[at + " in ".len()..]);
        let path = path.trim();
        let field_type = path_type(schema, model, path)?;
        let values = list
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_value(&field_type, v))
            .collect::<Result<Vec<_>>>()?;
        return Ok((path.to_string(), Operator::In(values)));
    }

    let start = operator_at.ok_or_else(|| CliError::invalid(expr, "expected a comparison operator"))?;
    let (path, rest) = expr.split_at(start);
    let (symbol, raw) = match rest.get(..2) {
        Some(two @ ("!=" | "<=" | ">=")) => (two, &rest[2..]),
        _ => (&rest[..1], &rest[1..]),
    };
    let path = path.trim();
    let field_type = path_type(schema, model, path)?;
    let value = parse_value(&field_type, raw)?;
    let op = match symbol {
        "=" => Operator::Eq(value),
        "!=" => Operator::Ne(value),
        "<" => Operator::Lt(value),
        "<=" => Operator::Le(value),
        ">" => Operator::Gt(value),
        ">=" => Operator::Ge(value),
        other => return Err(CliError::invalid(expr, format!("unknown operator {other}"))),
    };
    Ok((path.to_string(), op))
}

/// Build a query from `--where` and `--order` arguments. A leading `-` on
/// an order path sorts descending.
pub fn build_query(
    schema: &Schema,
    model: &str,
    filters: &[String],
    order: &[String],
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Query> {
    let mut query = Query::new();
    for expr in filters {
        let (path, op) = parse_filter(schema, model, expr)?;
        query = query.filter(path, op);
    }
    for path in order {
        query = match path.strip_prefix('-') {
            Some(path) => query.order_by_desc(path),
            None => query.order_by(path.as_str()),
        };
    }
    query.limit = limit;
    query.offset = offset;
    Ok(query)
}

/// Split `field=value` assignments.
pub fn parse_assignments(assignments: &[String]) -> Result<Vec<(&str, &str)>> {
    assignments
        .iter()
        .map(|a| {
            a.split_once('=')
                .ok_or_else(|| CliError::invalid(a.as_str(), "expected field=value"))
        })
        .collect()
}

/// Run a query and render the rows as a JSON array.
pub async fn select(adapter: &Adapter, model: &str, query: &Query) -> Result<serde_json::Value> {
    let rows = adapter.select(model, query).await?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.to_json());
    }
    Ok(serde_json::Value::Array(out))
}
