//! Encoding of typed values as Wikibase claims and SPARQL terms.
//!
//! | field type  | datatype        | stored value                               |
//! |-------------|-----------------|--------------------------------------------|
//! | text        | `string`        | the string                                 |
//! | number      | `quantity`      | `{amount: "+36", unit: "1"}`               |
//! | boolean     | `string`        | `"true"` / `"false"`                       |
//! | date        | `time`          | `+YYYY-MM-DDT00:00:00Z`, day precision     |
//!
//! Stored times carry an explicit sign and at least four year digits, and
//! count years historically (`-0044` is 44 BCE). The query service exposes
//! them as `xsd:dateTime`, which counts astronomically (`-0043`), the same
//! way `chrono` does.
//! | foreign key | `wikibase-item` | the referenced row entity                  |

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde_json::json;

use wikigraph_core::{EntityId, FieldType, ItemId, PropertyId, Value};

use crate::namespace::string_literal;
use crate::transport::Binding;

/// Proleptic Gregorian calendar item, as used by Wikidata-compatible stores.
pub const GREGORIAN_CALENDAR: &str = "http://www.wikidata.org/entity/Q1985727";

/// Day precision in the Wikibase time model.
const PRECISION_DAY: u8 = 11;

/// Property datatype used to store a field type.
pub fn datatype(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Text | FieldType::Boolean => "string",
        FieldType::Number => "quantity",
        FieldType::Date => "time",
        FieldType::ForeignKey { .. } => "wikibase-item",
    }
}

/// The bare snak value, as passed to `wbcreateclaim` / `wbsetclaimvalue`.
pub fn snak_value(value: &Value) -> Result<serde_json::Value, String> {
    Ok(match value {
        Value::Null => return Err("null has no stored representation".to_string()),
        Value::Text(s) => json!(s),
        Value::Boolean(b) => json!(b.to_string()),
        Value::Number(n) => {
            if !n.is_finite() {
                return Err(format!("{n} is not a finite number"));
            }
            json!({"amount": format!("{n:+}"), "unit": "1"})
        }
        Value::Date(d) => json!({
            "time": wikibase_time(d),
            "timezone": 0,
            "before": 0,
            "after": 0,
            "precision": PRECISION_DAY,
            "calendarmodel": GREGORIAN_CALENDAR,
        }),
        Value::Reference(id) => item_value(parse_item(id)?),
    })
}

/// A full `datavalue` object for `wbeditentity` claim data.
pub fn datavalue(value: &Value) -> Result<serde_json::Value, String> {
    let kind = match value {
        Value::Text(_) | Value::Boolean(_) | Value::Null => "string",
        Value::Number(_) => "quantity",
        Value::Date(_) => "time",
        Value::Reference(_) => "wikibase-entityid",
    };
    Ok(json!({"value": snak_value(value)?, "type": kind}))
}

pub fn string_datavalue(s: &str) -> serde_json::Value {
    json!({"value": s, "type": "string"})
}

pub fn item_datavalue(item: ItemId) -> serde_json::Value {
    json!({"value": item_value(item), "type": "wikibase-entityid"})
}

fn item_value(item: ItemId) -> serde_json::Value {
    json!({"entity-type": "item", "numeric-id": item.0, "id": item.to_string()})
}

/// A statement with a single value main snak.
pub fn statement(property: PropertyId, datavalue: serde_json::Value) -> serde_json::Value {
    json!({
        "mainsnak": {
            "snaktype": "value",
            "property": property.to_string(),
            "datavalue": datavalue,
        },
        "type": "statement",
        "rank": "normal",
    })
}

/// Decode a stored `datavalue` back into a typed value.
pub fn decode_datavalue(datavalue: &serde_json::Value, field_type: &FieldType) -> Option<Value> {
    let value = &datavalue["value"];
    match field_type {
        FieldType::Text => value.as_str().map(Value::from),
        FieldType::Boolean => parse_bool(value.as_str()?),
        FieldType::Number => parse_number(value["amount"].as_str()?),
        FieldType::Date => parse_time(value["time"].as_str()?).map(Value::Date),
        FieldType::ForeignKey { .. } => {
            let id = match value["id"].as_str() {
                Some(id) => ItemId::parse(id)?,
                None => ItemId(value["numeric-id"].as_u64()?),
            };
            Some(Value::Reference(EntityId::new(id.to_string())))
        }
    }
}

/// Decode a SPARQL binding of a `wdt:` value.
pub fn decode_binding(binding: &Binding, field_type: &FieldType) -> Result<Value, String> {
    let raw = binding.value.as_str();
    let decoded = match field_type {
        FieldType::Text => Some(Value::from(raw)),
        FieldType::Boolean => parse_bool(raw),
        FieldType::Number => parse_number(raw),
        FieldType::Date => parse_xsd_date(raw).map(Value::Date),
        FieldType::ForeignKey { .. } => entity_id_from_iri(raw).map(Value::Reference),
    };
    decoded.ok_or_else(|| format!("cannot decode {raw:?} as {}", datatype(field_type)))
}

/// Render a value as a SPARQL term comparable with `wdt:` objects.
pub fn sparql_literal(value: &Value) -> Result<String, String> {
    match value {
        Value::Null => Err("null cannot be compared; use an is-null filter".to_string()),
        Value::Text(s) => Ok(string_literal(s)),
        Value::Boolean(b) => Ok(string_literal(&b.to_string())),
        Value::Number(n) if n.is_finite() => Ok(format!("{n}")),
        Value::Number(n) => Err(format!("{n} is not a finite number")),
        Value::Date(d) => Ok(format!("\"{}\"^^xsd:dateTime", xsd_date_time(d))),
        Value::Reference(id) => Ok(format!("wd:{}", parse_item(id)?)),
    }
}

/// Entity id from a concept IRI such as `https://wiki.example.org/entity/Q12`.
pub fn entity_id_from_iri(iri: &str) -> Option<EntityId> {
    let local = iri.rsplit('/').next()?;
    ItemId::parse(local).map(|id| EntityId::new(id.to_string()))
}

pub fn parse_item(id: &EntityId) -> Result<ItemId, String> {
    ItemId::parse(id.as_str()).ok_or_else(|| format!("{id} is not an item id"))
}

fn parse_bool(raw: &str) -> Option<Value> {
    match raw {
        "true" => Some(Value::Boolean(true)),
        "false" => Some(Value::Boolean(false)),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    raw.trim_start_matches('+')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Value::Number)
}

/// Day-precision time string of the Wikibase time model.
pub fn wikibase_time(date: &NaiveDate) -> String {
    let year = date.year();
    let historical = if year > 0 { year } else { year - 1 };
    let sign = if historical < 0 { '-' } else { '+' };
    format!(
        "{sign}{:04}-{:02}-{:02}T00:00:00Z",
        historical.unsigned_abs(),
        date.month(),
        date.day()
    )
}

/// Lexical `xsd:dateTime` form of a date at midnight UTC.
pub fn xsd_date_time(date: &NaiveDate) -> String {
    let year = date.year();
    let sign = if year < 0 { "-" } else { "" };
    format!(
        "{sign}{:04}-{:02}-{:02}T00:00:00Z",
        year.unsigned_abs(),
        date.month(),
        date.day()
    )
}

/// Parse a stored Wikibase time. There is no year zero.
fn parse_time(raw: &str) -> Option<NaiveDate> {
    let (year, month, day) = split_date(raw)?;
    let year = match year {
        0 => return None,
        y if y < 0 => y + 1,
        y => y,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_xsd_date(raw: &str) -> Option<NaiveDate> {
    let (year, month, day) = split_date(raw)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Signed year, month and day of `[+-]Y+-MM-DD[T...]`.
fn split_date(raw: &str) -> Option<(i32, u32, u32)> {
    let (negative, rest) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let date = rest.split('T').next()?;
    let mut parts = date.splitn(3, '-');
    let mut number = || {
        parts
            .next()
            .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
    };
    let year: i32 = number()?.parse().ok()?;
    let month = number()?.parse().ok()?;
    let day = number()?.parse().ok()?;
    Some((if negative { -year } else { year }, month, day))
}

// ── Stored claims ────────────────────────────────────────────────

/// One statement as stored on an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredClaim {
    pub guid: String,
    /// `None` for `novalue` / `somevalue` snaks.
    pub datavalue: Option<serde_json::Value>,
}

/// Statements of one entity grouped by property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet {
    claims: BTreeMap<PropertyId, Vec<StoredClaim>>,
}

impl ClaimSet {
    /// Build from the `claims` object of a `wbgetentities` entity.
    pub fn from_json(claims: &serde_json::Value) -> Self {
        let mut set = Self::default();
        let Some(map) = claims.as_object() else {
            return set;
        };
        for (raw_property, statements) in map {
            let Some(property) = PropertyId::parse(raw_property) else {
                continue;
            };
            let entries = statements
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|s| {
                    Some(StoredClaim {
                        guid: s["id"].as_str()?.to_string(),
                        datavalue: s["mainsnak"].get("datavalue").cloned(),
                    })
                })
                .collect();
            set.claims.insert(property, entries);
        }
        set
    }

    pub fn get(&self, property: PropertyId) -> &[StoredClaim] {
        self.claims.get(&property).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether some claim of `property` holds the string `expected`.
    pub fn has_string(&self, property: PropertyId, expected: &str) -> bool {
        self.get(property).iter().any(|c| {
            c.datavalue
                .as_ref()
                .and_then(|dv| dv["value"].as_str())
                .is_some_and(|v| v == expected)
        })
    }

    /// Items referenced by claims of `property`.
    pub fn items(&self, property: PropertyId) -> Vec<ItemId> {
        self.get(property)
            .iter()
            .filter_map(|c| c.datavalue.as_ref())
            .filter_map(|dv| match decode_datavalue(dv, &FieldType::ForeignKey { target: String::new() }) {
                Some(Value::Reference(id)) => ItemId::parse(id.as_str()),
                _ => None,
            })
            .collect()
    }
}
