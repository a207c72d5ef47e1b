//! In-memory Wikibase standing in for the edit API and the query service.
//!
//! The SPARQL side only understands the line-per-pattern shape the
//! translator emits: triple patterns (including joins and the type path),
//! `OPTIONAL`, `FILTER`, `FILTER NOT EXISTS`, `ORDER BY`, `LIMIT`, `OFFSET`
//! and a `COUNT(DISTINCT ?item)` projection.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as Json};

use wikigraph_adapter::{Adapter, Binding, SparqlResults, Transport};
use wikigraph_core::{AdapterConfig, Result, Schema};

pub const BASE: &str = "https://wiki.test";
pub const PASSWORD: &str = "secret";
const LOGIN_TOKEN: &str = "login+\\";
const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

#[derive(Debug, Clone)]
pub struct FakeEntity {
    pub id: String,
    pub label: String,
    pub datatype: Option<String>,
    /// property id -> (claim GUID, datavalue)
    pub claims: BTreeMap<String, Vec<(String, Json)>>,
}

impl FakeEntity {
    fn is_item(&self) -> bool {
        self.id.starts_with('Q')
    }

    fn strings(&self, property: &str) -> Vec<&str> {
        self.claims
            .get(property)
            .into_iter()
            .flatten()
            .filter_map(|(_, dv)| dv["value"].as_str())
            .collect()
    }

    fn items(&self, property: &str) -> Vec<String> {
        self.claims
            .get(property)
            .into_iter()
            .flatten()
            .filter_map(|(_, dv)| dv["value"]["id"].as_str().map(str::to_string))
            .collect()
    }
}

#[derive(Default)]
struct State {
    entities: Vec<FakeEntity>,
    next_item: u64,
    next_property: u64,
    next_guid: u64,
    session: Option<String>,
    sessions_opened: u64,
    login_attempts: usize,
    writes: Vec<String>,
    failing_property: Option<String>,
    reject_new_properties: bool,
    /// Remaining item creations before `wbeditentity` starts failing.
    item_budget: Option<usize>,
}

impl State {
    fn entity(&self, id: &str) -> Option<&FakeEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    fn entity_mut(&mut self, id: &str) -> Option<&mut FakeEntity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    fn guid(&mut self, entity: &str) -> String {
        self.next_guid += 1;
        format!("{entity}$guid-{}", self.next_guid)
    }

    fn datavalue_type(&self, property: &str) -> &'static str {
        match self.entity(property).and_then(|p| p.datatype.as_deref()) {
            Some("quantity") => "quantity",
            Some("time") => "time",
            Some("wikibase-item") => "wikibase-entityid",
            _ => "string",
        }
    }

    /// Whether `start` reaches `target` following `subclass_of` claims.
    fn reaches(&self, start: &str, target: &str, subclass_of: &str) -> bool {
        let mut queue = VecDeque::from([start.to_string()]);
        let mut seen = Vec::new();
        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            if let Some(entity) = self.entity(&current) {
                queue.extend(entity.items(subclass_of));
            }
            seen.push(current);
        }
        false
    }
}

pub struct FakeWikibase {
    password: String,
    state: Mutex<State>,
}

impl FakeWikibase {
    pub fn new() -> Arc<Self> {
        Self::with_password(PASSWORD)
    }

    pub fn with_password(password: &str) -> Arc<Self> {
        let mut state = State {
            next_item: 1,
            next_property: 3,
            ..State::default()
        };
        for (id, label) in [("P1", "instance of"), ("P2", "subclass of")] {
            state.entities.push(FakeEntity {
                id: id.to_string(),
                label: label.to_string(),
                datatype: Some("wikibase-item".to_string()),
                claims: BTreeMap::new(),
            });
        }
        Arc::new(Self {
            password: password.to_string(),
            state: Mutex::new(state),
        })
    }

    // ── Inspection and fault injection ───────────────────────────

    pub fn count_label(&self, label: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.entities.iter().filter(|e| e.label == label).count()
    }

    pub fn entity(&self, id: &str) -> Option<FakeEntity> {
        self.state.lock().unwrap().entity(id).cloned()
    }

    pub fn login_attempts(&self) -> usize {
        self.state.lock().unwrap().login_attempts
    }

    /// Number of token-carrying writes received.
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    /// Forget the server-side session; the next write sees `badtoken`.
    pub fn expire_session(&self) {
        self.state.lock().unwrap().session = None;
    }

    /// Reject every claim edit on `property`.
    pub fn fail_edits_on(&self, property: &str) {
        self.state.lock().unwrap().failing_property = Some(property.to_string());
    }

    /// Refuse to create properties from now on.
    pub fn reject_new_properties(&self) {
        self.state.lock().unwrap().reject_new_properties = true;
    }

    /// Allow `count` more items to be created, then refuse.
    pub fn fail_item_creation_after(&self, count: usize) {
        self.state.lock().unwrap().item_budget = Some(count);
    }

    /// Remove all claims of `property` from `entity` behind the adapter's back.
    pub fn strip_claims(&self, entity: &str, property: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.entity_mut(entity) {
            e.claims.remove(property);
        }
    }

    // ── Edit API ─────────────────────────────────────────────────

    fn login(&self, state: &mut State, params: &HashMap<&str, &str>) -> Json {
        state.login_attempts += 1;
        if params.get("lgtoken") != Some(&LOGIN_TOKEN) {
            return json!({"login": {"result": "WrongToken"}});
        }
        if params.get("lgpassword") != Some(&self.password.as_str()) {
            return json!({"login": {"result": "Failed", "reason": "Incorrect username or password entered."}});
        }
        state.sessions_opened += 1;
        state.session = Some(format!("csrf-{}+\\", state.sessions_opened));
        json!({"login": {"result": "Success", "lgusername": params.get("lgname")}})
    }

    fn edit(&self, state: &mut State, action: &str, params: &HashMap<&str, &str>) -> Json {
        match action {
            "wbeditentity" => {
                let data: Json = serde_json::from_str(params["data"]).unwrap();
                if params["new"] == "property" && state.reject_new_properties {
                    return api_error("permissiondenied", "You are not allowed to create properties.");
                }
                if params["new"] == "item" {
                    match state.item_budget.as_mut() {
                        Some(0) => return api_error("permissiondenied", "Item creation is disabled."),
                        Some(left) => *left -= 1,
                        None => {}
                    }
                }
                let id = if params["new"] == "property" {
                    state.next_property += 1;
                    format!("P{}", state.next_property - 1)
                } else {
                    state.next_item += 1;
                    format!("Q{}", state.next_item - 1)
                };
                let label = data["labels"]
                    .as_object()
                    .and_then(|labels| labels.values().next())
                    .and_then(|l| l["value"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let mut claims: BTreeMap<String, Vec<(String, Json)>> = BTreeMap::new();
                for statement in data["claims"].as_array().into_iter().flatten() {
                    let property = statement["mainsnak"]["property"].as_str().unwrap().to_string();
                    let guid = state.guid(&id);
                    claims
                        .entry(property)
                        .or_default()
                        .push((guid, statement["mainsnak"]["datavalue"].clone()));
                }
                state.entities.push(FakeEntity {
                    id: id.clone(),
                    label,
                    datatype: data["datatype"].as_str().map(str::to_string),
                    claims,
                });
                json!({"entity": {"id": id}, "success": 1})
            }
            "wbcreateclaim" => {
                let property = params["property"];
                if state.failing_property.as_deref() == Some(property) {
                    return api_error("modification-failed", "Injected failure");
                }
                let value: Json = serde_json::from_str(params["value"]).unwrap();
                let datavalue = json!({"value": value, "type": state.datavalue_type(property)});
                let guid = state.guid(params["entity"]);
                let Some(entity) = state.entity_mut(params["entity"]) else {
                    return api_error("no-such-entity", "Could not find an entity");
                };
                entity
                    .claims
                    .entry(property.to_string())
                    .or_default()
                    .push((guid.clone(), datavalue));
                json!({"claim": {"id": guid}, "success": 1})
            }
            "wbsetclaimvalue" => {
                let guid = params["claim"];
                let value: Json = serde_json::from_str(params["value"]).unwrap();
                let failing = state.failing_property.clone();
                for entity in &mut state.entities {
                    for (property, claims) in entity.claims.iter_mut() {
                        if let Some(claim) = claims.iter_mut().find(|(g, _)| g == guid) {
                            if failing.as_deref() == Some(property.as_str()) {
                                return api_error("modification-failed", "Injected failure");
                            }
                            claim.1["value"] = value;
                            return json!({"success": 1});
                        }
                    }
                }
                api_error("invalid-guid", "The claim does not exist")
            }
            "wbremoveclaims" => {
                for guid in params["claim"].split('|') {
                    let mut found = false;
                    for entity in &mut state.entities {
                        for claims in entity.claims.values_mut() {
                            let before = claims.len();
                            claims.retain(|(g, _)| g != guid);
                            found |= claims.len() != before;
                        }
                        entity.claims.retain(|_, claims| !claims.is_empty());
                    }
                    if !found {
                        return api_error("invalid-guid", "The claim does not exist");
                    }
                }
                json!({"success": 1})
            }
            "delete" => {
                let id = params["title"].trim_start_matches("Item:");
                let before = state.entities.len();
                state.entities.retain(|e| e.id != id);
                if state.entities.len() == before {
                    return api_error("missingtitle", "The page you specified doesn't exist.");
                }
                json!({"delete": {"title": params["title"]}})
            }
            other => api_error("badvalue", &format!("unknown action {other}")),
        }
    }

    // ── Query service ────────────────────────────────────────────

    fn evaluate(&self, query: &str) -> SparqlResults {
        let plan = Plan::parse(query);
        let state = self.state.lock().unwrap();

        let mut rows: Vec<Solution> = state
            .entities
            .iter()
            .filter(|e| e.is_item())
            .map(|e| HashMap::from([("item".to_string(), entity_binding(&e.id))]))
            .collect();
        for pattern in &plan.patterns {
            rows = rows
                .into_iter()
                .flat_map(|row| pattern.apply(&state, row))
                .collect();
        }
        rows.retain(|row| plan.filters.iter().all(|f| filter_passes(f, row)));

        let mut results = SparqlResults::default();
        if plan.count {
            let distinct: BTreeSet<&str> = rows
                .iter()
                .filter_map(|row| row.get("item"))
                .map(|b| b.value.as_str())
                .collect();
            let count = Binding::typed(distinct.len().to_string(), format!("{XSD}integer"));
            results.results.bindings = vec![HashMap::from([("count".to_string(), count)])];
            return results;
        }

        rows.sort_by(|a, b| {
            plan.order
                .iter()
                .map(|(var, descending)| {
                    let ordering = compare_bound(a.get(var), b.get(var));
                    if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        results.results.bindings = rows
            .into_iter()
            .skip(plan.offset)
            .take(plan.limit.unwrap_or(usize::MAX))
            .collect();
        results
    }
}

fn entities_response(id: &str, entity: Json) -> Json {
    let mut entities = serde_json::Map::new();
    entities.insert(id.to_string(), entity);
    json!({"entities": entities, "success": 1})
}

fn api_error(code: &str, info: &str) -> Json {
    json!({"error": {"code": code, "info": info}})
}

fn to_map<'a>(params: &'a [(&'a str, String)]) -> HashMap<&'a str, &'a str> {
    params.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

#[async_trait]
impl Transport for FakeWikibase {
    async fn api_get(&self, params: &[(&str, String)]) -> Result<Json> {
        let p = to_map(params);
        if p.get("action") == Some(&"wbsearchentities") {
            // Let concurrent resolutions interleave.
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let state = self.state.lock().unwrap();
        let body = match (p.get("action").copied(), p.get("meta").copied()) {
            (Some("query"), Some("tokens")) if p.get("type") == Some(&"login") => {
                json!({"query": {"tokens": {"logintoken": LOGIN_TOKEN}}})
            }
            (Some("query"), Some("tokens")) => {
                let token = state.session.clone().unwrap_or_else(|| "+\\".to_string());
                json!({"query": {"tokens": {"csrftoken": token}}})
            }
            (Some("query"), Some("siteinfo")) => {
                json!({"query": {"general": {"server": "//wiki.test", "sitename": "Test wiki"}}})
            }
            (Some("wbsearchentities"), _) => {
                let kind_prefix = if p["type"] == "property" { 'P' } else { 'Q' };
                let hits: Vec<Json> = state
                    .entities
                    .iter()
                    .filter(|e| e.id.starts_with(kind_prefix) && e.label.starts_with(p["search"]))
                    .map(|e| json!({"id": e.id, "label": e.label}))
                    .collect();
                json!({"search": hits, "success": 1})
            }
            (Some("wbgetentities"), _) => {
                let id = p["ids"];
                match state.entity(id) {
                    Some(entity) => {
                        let claims: serde_json::Map<String, Json> = entity
                            .claims
                            .iter()
                            .map(|(property, claims)| {
                                let statements = claims
                                    .iter()
                                    .map(|(guid, dv)| {
                                        json!({
                                            "id": guid,
                                            "mainsnak": {"snaktype": "value", "property": property, "datavalue": dv},
                                            "type": "statement",
                                        })
                                    })
                                    .collect::<Vec<_>>();
                                (property.clone(), Json::Array(statements))
                            })
                            .collect();
                        entities_response(id, json!({"id": id, "claims": claims}))
                    }
                    None => entities_response(id, json!({"id": id, "missing": ""})),
                }
            }
            _ => api_error("badvalue", "unsupported read"),
        };
        Ok(body)
    }

    async fn api_post(&self, params: &[(&str, String)]) -> Result<Json> {
        let p = to_map(params);
        let mut state = self.state.lock().unwrap();
        let action = p.get("action").copied().unwrap_or_default();
        let body = match action {
            "login" => self.login(&mut state, &p),
            "logout" => {
                state.session = None;
                json!({})
            }
            _ => {
                if state.session.is_none() || p.get("token").copied() != state.session.as_deref() {
                    return Ok(api_error("badtoken", "Invalid CSRF token."));
                }
                if p.get("assert") != Some(&"user") {
                    return Ok(api_error("assertuserfailed", "You are no longer logged in"));
                }
                state.writes.push(action.to_string());
                self.edit(&mut state, action, &p)
            }
        };
        Ok(body)
    }

    async fn sparql(&self, query: &str) -> Result<SparqlResults> {
        Ok(self.evaluate(query))
    }
}

// ── Minimal SPARQL evaluation ────────────────────────────────────

type Solution = HashMap<String, Binding>;

enum Pattern {
    /// `?s wdt:P1/wdt:P2* wd:Q3 .`
    TypePath {
        subject: String,
        instance_of: String,
        subclass_of: String,
        target: String,
    },
    /// `?s wdt:P3 "tag" .`
    HasString {
        subject: String,
        property: String,
        literal: String,
    },
    /// `FILTER NOT EXISTS { ?s wdt:P4 "tag" . }`
    LacksString {
        subject: String,
        property: String,
        literal: String,
    },
    /// `?s wdt:P5 ?o .` or `OPTIONAL { ?s wdt:P5 ?o . }`
    Triple {
        subject: String,
        property: String,
        object: String,
        optional: bool,
    },
}

impl Pattern {
    fn subject(&self) -> &str {
        match self {
            Self::TypePath { subject, .. }
            | Self::HasString { subject, .. }
            | Self::LacksString { subject, .. }
            | Self::Triple { subject, .. } => subject,
        }
    }

    fn apply(&self, state: &State, row: Solution) -> Vec<Solution> {
        let entity = row
            .get(self.subject())
            .and_then(|b| b.value.rsplit('/').next())
            .and_then(|id| state.entity(id));
        let keep = match (self, entity) {
            (Self::Triple { optional: true, .. }, None) => true,
            (_, None) => false,
            (
                Self::TypePath {
                    instance_of,
                    subclass_of,
                    target,
                    ..
                },
                Some(e),
            ) => e.items(instance_of).iter().any(|t| state.reaches(t, target, subclass_of)),
            (Self::HasString { property, literal, .. }, Some(e)) => e.strings(property).contains(&literal.as_str()),
            (Self::LacksString { property, literal, .. }, Some(e)) => !e.strings(property).contains(&literal.as_str()),
            (
                Self::Triple {
                    property,
                    object,
                    optional,
                    ..
                },
                Some(e),
            ) => {
                let values = e.claims.get(property).cloned().unwrap_or_default();
                if values.is_empty() {
                    *optional
                } else {
                    return values
                        .iter()
                        .map(|(_, dv)| {
                            let mut extended = row.clone();
                            extended.insert(object.clone(), binding_of(dv));
                            extended
                        })
                        .collect();
                }
            }
        };
        if keep {
            vec![row]
        } else {
            Vec::new()
        }
    }
}

#[derive(Default)]
struct Plan {
    count: bool,
    patterns: Vec<Pattern>,
    filters: Vec<String>,
    order: Vec<(String, bool)>,
    limit: Option<usize>,
    offset: usize,
}

impl Plan {
    fn parse(query: &str) -> Self {
        let mut plan = Plan::default();
        for line in query.lines().map(str::trim) {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if line.is_empty() || line.starts_with("PREFIX") || line == "}" {
                continue;
            } else if line.starts_with("SELECT") {
                plan.count = line.contains("COUNT(DISTINCT ?item)");
            } else if line.starts_with("FILTER NOT EXISTS {") {
                plan.patterns.push(Pattern::LacksString {
                    subject: var_name(tokens[4]),
                    property: strip_wdt(tokens[5]),
                    literal: unquote(tokens[6]),
                });
            } else if line.starts_with("FILTER(") {
                plan.filters.push(line.to_string());
            } else if line.starts_with("OPTIONAL {") {
                plan.patterns.push(Pattern::Triple {
                    subject: var_name(tokens[2]),
                    property: strip_wdt(tokens[3]),
                    object: var_name(tokens[4]),
                    optional: true,
                });
            } else if line.starts_with('?') && tokens[1].contains('/') {
                let (instance_of, subclass_of) = tokens[1].split_once('/').unwrap();
                plan.patterns.push(Pattern::TypePath {
                    subject: var_name(tokens[0]),
                    instance_of: strip_wdt(instance_of),
                    subclass_of: strip_wdt(subclass_of.trim_end_matches('*')),
                    target: tokens[2].trim_start_matches("wd:").to_string(),
                });
            } else if line.starts_with('?') && tokens[2].starts_with('?') {
                plan.patterns.push(Pattern::Triple {
                    subject: var_name(tokens[0]),
                    property: strip_wdt(tokens[1]),
                    object: var_name(tokens[2]),
                    optional: false,
                });
            } else if line.starts_with('?') {
                plan.patterns.push(Pattern::HasString {
                    subject: var_name(tokens[0]),
                    property: strip_wdt(tokens[1]),
                    literal: unquote(tokens[2]),
                });
            } else if let Some(keys) = line.strip_prefix("ORDER BY ") {
                for key in keys.split_whitespace() {
                    let (direction, var) = key.trim_end_matches(')').split_once("(?").unwrap();
                    plan.order.push((var.to_string(), direction == "DESC"));
                }
            } else if let Some(limit) = line.strip_prefix("LIMIT ") {
                plan.limit = Some(limit.parse().unwrap());
            } else if let Some(offset) = line.strip_prefix("OFFSET ") {
                plan.offset = offset.parse().unwrap();
            } else {
                panic!("fake query service cannot evaluate {line:?}");
            }
        }
        plan
    }
}

fn var_name(term: &str) -> String {
    term.trim_start_matches('?').to_string()
}

fn strip_wdt(term: &str) -> String {
    term.trim_start_matches("wdt:").to_string()
}

fn unquote(term: &str) -> String {
    let term = term.split("^^").next().unwrap_or(term);
    term.trim_matches('"').replace("\\\"", "\"")
}

fn entity_binding(id: &str) -> Binding {
    Binding::uri(format!("{BASE}/entity/{id}"))
}

fn binding_of(datavalue: &Json) -> Binding {
    let value = &datavalue["value"];
    match datavalue["type"].as_str() {
        Some("quantity") => Binding::typed(
            value["amount"].as_str().unwrap().trim_start_matches('+'),
            format!("{XSD}decimal"),
        ),
        Some("time") => Binding::typed(xsd_time(value["time"].as_str().unwrap()), format!("{XSD}dateTime")),
        Some("wikibase-entityid") => entity_binding(value["id"].as_str().unwrap()),
        _ => Binding::literal(value.as_str().unwrap()),
    }
}

/// The query service shifts BCE years by one: stored `-0044` is `-0043`.
fn xsd_time(stored: &str) -> String {
    let Some(rest) = stored.strip_prefix('-') else {
        return stored.trim_start_matches('+').to_string();
    };
    let (year, tail) = rest.split_once('-').unwrap();
    match year.parse::<i64>().unwrap() - 1 {
        0 => format!("0000-{tail}"),
        year => format!("-{year:04}-{tail}"),
    }
}

/// Unbound sorts first; numbers compare numerically, the rest lexically.
fn compare_bound(a: Option<&Binding>, b: Option<&Binding>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(&a.value, &b.value),
    }
}

fn compare_values(lhs: &str, rhs: &str) -> Ordering {
    match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap(),
        _ => lhs.cmp(rhs),
    }
}

fn term_value(term: &str) -> String {
    match term.strip_prefix("wd:") {
        Some(id) => format!("{BASE}/entity/{id}"),
        None => unquote(term),
    }
}

fn filter_passes(filter: &str, row: &Solution) -> bool {
    let inner = filter
        .strip_prefix("FILTER(")
        .and_then(|f| f.strip_suffix(')'))
        .unwrap();
    if inner == "false" {
        return false;
    }
    if let Some(var) = inner.strip_prefix("!BOUND(?").and_then(|v| v.strip_suffix(')')) {
        return !row.contains_key(var);
    }
    if let Some(var) = inner.strip_prefix("BOUND(?").and_then(|v| v.strip_suffix(')')) {
        return row.contains_key(var);
    }

    let mut parts = inner.splitn(3, ' ');
    let (var, op, term) = (parts.next().unwrap(), parts.next().unwrap(), parts.next().unwrap());
    let Some(bound) = row.get(var.trim_start_matches('?')) else {
        return false;
    };
    let lhs = bound.value.as_str();
    if op == "IN" {
        let list = term.trim_start_matches('(').trim_end_matches(')');
        return list.split(", ").any(|t| term_value(t) == lhs);
    }
    let ordering = compare_values(lhs, &term_value(term));
    match op {
        "=" => ordering.is_eq(),
        "!=" => ordering.is_ne(),
        "<" => ordering.is_lt(),
        "<=" => ordering.is_le(),
        ">" => ordering.is_gt(),
        ">=" => ordering.is_ge(),
        other => panic!("fake query service does not know operator {other}"),
    }
}

// ── Fixtures ─────────────────────────────────────────────────────

pub fn config(namespace: &str) -> AdapterConfig {
    AdapterConfig {
        api_url: format!("{BASE}/w/api.php"),
        sparql_url: "https://query.wiki.test/sparql".to_string(),
        bot_username: "Admin@wikigraph".to_string(),
        bot_password: PASSWORD.to_string(),
        instance_of_property_id: 1,
        subclass_of_property_id: 2,
        charset: "utf-8".to_string(),
        namespace: namespace.to_string(),
        ..AdapterConfig::default()
    }
}

pub async fn adapter(fake: &Arc<FakeWikibase>, namespace: &str, schema: Schema) -> Adapter {
    adapter_with(fake, config(namespace), schema).await
}

pub async fn adapter_with(fake: &Arc<FakeWikibase>, config: AdapterConfig, schema: Schema) -> Adapter {
    Adapter::with_transport(config, schema, fake.clone())
        .await
        .expect("adapter should connect to the fake store")
}
