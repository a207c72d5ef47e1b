//! Structured queries and their translation to SPARQL.
//!
//! A [`Query`] over one model renders as a single `SELECT` whose solutions
//! are rows: `?item` is the row entity and every effective field of the
//! model is projected as `?f_<field>` through an `OPTIONAL` triple, so an
//! absent claim yields an unbound variable instead of dropping the row.
//! Dotted filter paths (`author.name`) follow foreign keys with required
//! triples; each joined entity is held to the same namespace. Variables
//! reached through a join are numbered `?j<n>` per distinct path prefix, so
//! they never collide with a field's own variable.
//!
//! Every triple and filter is emitted on its own line.

use wikigraph_core::schema::ID_FIELD;
use wikigraph_core::{AdapterError, EntityId, FieldType, Result, Schema, Value};

use crate::claims::sparql_literal;
use crate::namespace::Namespace;
use crate::registry::{PropertyRegistry, ReservedProperties, TypeResolver};

/// Variable bound to the row entity.
pub const ITEM_VAR: &str = "item";

/// Variable bound to the number of matching rows in a count query.
pub const COUNT_VAR: &str = "count";

/// Variable name (without `?`) projecting a top-level field.
pub fn field_var(field: &str) -> String {
    format!("f_{field}")
}

// ── Query model ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    In(Vec<Value>),
    /// `IsNull(true)` matches absent values, `IsNull(false)` present ones.
    IsNull(bool),
}

impl Operator {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq(_) => "=",
            Self::Ne(_) => "!=",
            Self::Lt(_) => "<",
            Self::Le(_) => "<=",
            Self::Gt(_) => ">",
            Self::Ge(_) => ">=",
            Self::In(_) => "IN",
            Self::IsNull(_) => "BOUND",
        }
    }

    fn is_range(&self) -> bool {
        matches!(self, Self::Lt(_) | Self::Le(_) | Self::Gt(_) | Self::Ge(_))
    }
}

/// A condition on a field path: `name`, `author.name`, or `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub path: String,
    pub op: Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub path: String,
    pub descending: bool,
}

/// Filters (conjunctive), ordering, and pagination over one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub ordering: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, path: impl Into<String>, op: Operator) -> Self {
        self.filters.push(Filter {
            path: path.into(),
            op,
        });
        self
    }

    pub fn order_by(mut self, path: impl Into<String>) -> Self {
        self.ordering.push(OrderBy {
            path: path.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, path: impl Into<String>) -> Self {
        self.ordering.push(OrderBy {
            path: path.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

// ── Translation ──────────────────────────────────────────────────

/// What a filter path resolves to.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    /// An entity id: the row itself or a followed foreign key.
    Id { var: String },
    Field { var: String, field_type: FieldType },
}

impl Target {
    fn var(&self) -> &str {
        match self {
            Self::Id { var } | Self::Field { var, .. } => var,
        }
    }
}

/// Renders queries for one namespace.
pub struct QueryTranslator<'a> {
    pub schema: &'a Schema,
    pub namespace: &'a Namespace,
    pub properties: &'a PropertyRegistry,
    pub types: &'a TypeResolver,
    pub reserved: ReservedProperties,
    /// Concept URI base, e.g. `https://wiki.example.org`.
    pub base_uri: &'a str,
}

impl QueryTranslator<'_> {
    pub async fn translate(&self, model: &str, query: &Query) -> Result<String> {
        self.render(model, query, false).await
    }

    /// Render a query counting the distinct rows that match its filters.
    /// Ordering, limit and offset do not apply.
    pub async fn translate_count(&self, model: &str, query: &Query) -> Result<String> {
        self.render(model, query, true).await
    }

    async fn render(&self, model: &str, query: &Query, count: bool) -> Result<String> {
        let fields = self.schema.fields(model)?;
        let own_type = self.types.type_item(model).await?;
        let item = format!("?{ITEM_VAR}");
        let reserved = &self.reserved;

        let mut select = vec![item.clone()];
        let mut patterns = vec![
            format!(
                "{item} wdt:{}/wdt:{}* wd:{own_type} .",
                reserved.instance_of, reserved.subclass_of
            ),
            self.namespace.constraint(&item, reserved.namespace),
            self.namespace.exclude_deleted(&item, reserved.deleted),
        ];
        for field in &fields {
            let name = &field.descriptor.name;
            let property = self.properties.resolve(model, name).await?;
            let var = format!("?{}", field_var(name));
            patterns.push(format!("OPTIONAL {{ {item} wdt:{property} {var} . }}"));
            select.push(var);
        }

        let mut joins = Joins::default();
        let mut conditions = Vec::new();
        for filter in &query.filters {
            let target = self.resolve_path(model, &filter.path, &mut joins).await?;
            conditions.push(render_condition(model, &filter.path, &target, &filter.op)?);
        }
        let mut ordering = Vec::new();
        for order in query.ordering.iter().filter(|_| !count) {
            let target = self.resolve_path(model, &order.path, &mut joins).await?;
            let direction = if order.descending { "DESC" } else { "ASC" };
            ordering.push(format!("{direction}({})", target.var()));
        }

        let mut sparql = format!(
            "PREFIX wd: <{base}/entity/>\nPREFIX wdt: <{base}/prop/direct/>\nPREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n",
            base = self.base_uri
        );
        if count {
            sparql.push_str(&format!("SELECT (COUNT(DISTINCT {item}) AS ?{COUNT_VAR}) WHERE {{\n"));
        } else {
            sparql.push_str(&format!("SELECT {} WHERE {{\n", select.join(" ")));
        }
        for line in patterns.iter().chain(&joins.lines).chain(&conditions) {
            sparql.push_str("  ");
            sparql.push_str(line);
            sparql.push('\n');
        }
        sparql.push_str("}\n");
        if count {
            return Ok(sparql);
        }
        if !ordering.is_empty() {
            sparql.push_str(&format!("ORDER BY {}\n", ordering.join(" ")));
        }
        if let Some(limit) = query.limit {
            sparql.push_str(&format!("LIMIT {limit}\n"));
        }
        if let Some(offset) = query.offset {
            sparql.push_str(&format!("OFFSET {offset}\n"));
        }
        Ok(sparql)
    }

    /// Resolve a dotted path to a variable, adding join patterns for every
    /// foreign key it follows.
    async fn resolve_path(&self, model: &str, path: &str, joins: &mut Joins) -> Result<Target> {
        if path == ID_FIELD {
            return Ok(Target::Id {
                var: format!("?{ITEM_VAR}"),
            });
        }
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AdapterError::unsupported(model, path, "empty path segment"));
        }

        let mut current_model = model.to_string();
        let mut current_var = format!("?{ITEM_VAR}");
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            if *segment == ID_FIELD && i == last {
                return Ok(Target::Id { var: current_var });
            }
            let field_type = self.schema.field(&current_model, segment)?.descriptor.field_type;
            let property = self.properties.resolve(&current_model, segment).await?;
            let var = if i == 0 {
                format!("?{}", field_var(segment))
            } else {
                joins.alias(&segments[..=i].join("."))
            };

            if i == last {
                if i > 0 {
                    joins.push(format!("OPTIONAL {{ {current_var} wdt:{property} {var} . }}"));
                }
                return Ok(Target::Field { var, field_type });
            }

            let Some(target) = field_type.foreign_target() else {
                return Err(AdapterError::unsupported(
                    model,
                    path,
                    format!("{current_model}.{segment} is not a foreign key"),
                ));
            };
            joins.push(format!("{current_var} wdt:{property} {var} ."));
            joins.push(self.namespace.constraint(&var, self.reserved.namespace));
            joins.push(self.namespace.exclude_deleted(&var, self.reserved.deleted));
            current_model = target.to_string();
            current_var = var;
        }
        Err(AdapterError::unsupported(model, path, "empty path"))
    }
}

/// Join patterns shared by all filters and orderings of one query.
#[derive(Debug, Default)]
struct Joins {
    lines: Vec<String>,
    /// Path prefix (`author.employer`) to its variable.
    aliases: Vec<(String, String)>,
}

impl Joins {
    fn alias(&mut self, prefix: &str) -> String {
        if let Some((_, var)) = self.aliases.iter().find(|(p, _)| p == prefix) {
            return var.clone();
        }
        let var = format!("?j{}", self.aliases.len());
        self.aliases.push((prefix.to_string(), var.clone()));
        var
    }

    fn push(&mut self, line: String) {
        if !self.lines.contains(&line) {
            self.lines.push(line);
        }
    }
}

fn render_condition(model: &str, path: &str, target: &Target, op: &Operator) -> Result<String> {
    let var = target.var();
    let term = |value: &Value| -> Result<String> {
        match target {
            Target::Id { .. } => id_term(model, path, value),
            Target::Field { field_type, .. } => {
                if value.is_null() || !value.fits(field_type) {
                    return Err(AdapterError::unsupported(
                        model,
                        path,
                        format!("{value} cannot be compared with a {} field", crate::claims::datatype(field_type)),
                    ));
                }
                sparql_literal(value).map_err(|reason| AdapterError::unsupported(model, path, reason))
            }
        }
    };

    if op.is_range() {
        let ordered = matches!(target, Target::Field { field_type, .. } if field_type.is_ordered());
        if !ordered {
            return Err(AdapterError::unsupported(
                model,
                path,
                format!("operator {} needs an ordered field", op.symbol()),
            ));
        }
    }

    match op {
        Operator::Eq(v) | Operator::Ne(v) | Operator::Lt(v) | Operator::Le(v) | Operator::Gt(v) | Operator::Ge(v) => {
            Ok(format!("FILTER({var} {} {})", op.symbol(), term(v)?))
        }
        Operator::In(values) if values.is_empty() => Ok("FILTER(false)".to_string()),
        Operator::In(values) => {
            let terms = values.iter().map(term).collect::<Result<Vec<_>>>()?;
            Ok(format!("FILTER({var} IN ({}))", terms.join(", ")))
        }
        Operator::IsNull(is_null) => match target {
            Target::Id { .. } => Err(AdapterError::unsupported(model, path, "ids are never null")),
            Target::Field { .. } if *is_null => Ok(format!("FILTER(!BOUND({var}))")),
            Target::Field { .. } => Ok(format!("FILTER(BOUND({var}))")),
        },
    }
}

fn id_term(model: &str, path: &str, value: &Value) -> Result<String> {
    let id = match value {
        Value::Reference(id) => id.clone(),
        Value::Text(raw) => EntityId::new(raw.clone()),
        other => {
            return Err(AdapterError::unsupported(
                model,
                path,
                format!("{other} is not an entity id"),
            ))
        }
    };
    sparql_literal(&Value::Reference(id)).map_err(|reason| AdapterError::unsupported(model, path, reason))
}
