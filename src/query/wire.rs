//! Canonical JSON wire form.
//!
//! ```text
//! { "filter": <element>,
//!   "page": {"type": "offset", "offset": 0, "limit": 50}
//!         | {"type": "seek", "limit": 50, "after": {...}},
//!   "sort": [{"field": "...", "dir": "ASC"}],
//!   "projection": ["..."],
//!   "groupBy": {"fields": ["..."]},
//!   "params": {...} }
//!
//! <element> = {"and": [<element>...]} | {"or": [<element>...]} | {"not": <element>}
//!           | {"<op>": {"field": "...", "value"|"values"|"lower","upper": ..., "not": bool}}
//! ```
//!
//! The legacy shapes `{clause, elements}`, `[{clause}, <element>...]` and
//! `{operator, property, value|values|lower,upper|from,to, not}` are accepted
//! on input only.
//!
//! JSON numbers carry no width: integer operands read back as `Long` and are
//! narrowed by the bind type id when encoded.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{json, Map, Value as Json};

use super::ast::{Clause, Condition, Operator, Page, Query, QueryElement, SortDir, SortField, DEFAULT_LIMIT};
use crate::error::WireError;
use crate::value::Value;

impl Query {
    pub fn from_wire(root: &Json) -> Result<Query, WireError> {
        let obj = root
            .as_object()
            .ok_or(WireError::Shape("query", "a JSON object"))?;
        let mut q = Query::new();

        if let Some(Json::Object(params)) = obj.get("params") {
            q.params = params
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect();
        }
        if let Some(filter) = obj.get("filter") {
            q.filter = QueryElement::from_wire(filter)?;
        }
        if let Some(page @ Json::Object(_)) = obj.get("page") {
            q.page = parse_page(page)?;
        }
        if let Some(Json::Array(sort)) = obj.get("sort") {
            q.sort = sort
                .iter()
                .filter_map(|s| s.as_object())
                .filter_map(|s| {
                    let field = text(s.get("field"))?;
                    Some(parse_dir(s.get("dir")).map(|dir| SortField { field, dir }))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(Json::Array(projection)) = obj.get("projection") {
            q.projection = strings(projection);
        }
        match obj.get("groupBy") {
            Some(Json::Object(gb)) => {
                if let Some(Json::Array(fields)) = gb.get("fields") {
                    q.group_by = strings(fields);
                }
            }
            Some(Json::Array(fields)) => q.group_by = strings(fields),
            _ => {}
        }
        Ok(q)
    }

    pub fn to_wire(&self) -> Json {
        let mut out = Map::new();
        if let Some(filter) = &self.filter {
            out.insert("filter".into(), filter.to_wire());
        }
        out.insert(
            "page".into(),
            match &self.page {
                Page::Offset { offset, limit } => {
                    json!({"type": "offset", "offset": offset, "limit": limit})
                }
                Page::Seek { limit, after } if after.is_empty() => {
                    json!({"type": "seek", "limit": limit})
                }
                Page::Seek { limit, after } => json!({
                    "type": "seek",
                    "limit": limit,
                    "after": map_to_json(after),
                }),
            },
        );
        if !self.sort.is_empty() {
            let sort = self
                .sort
                .iter()
                .map(|s| json!({"field": s.field, "dir": s.dir.keyword()}))
                .collect();
            out.insert("sort".into(), Json::Array(sort));
        }
        if !self.projection.is_empty() {
            out.insert("projection".into(), json!(self.projection));
        }
        if !self.group_by.is_empty() {
            out.insert("groupBy".into(), json!({"fields": self.group_by}));
        }
        if !self.params.is_empty() {
            out.insert("params".into(), map_to_json(&self.params));
        }
        Json::Object(out)
    }
}

impl FromStr for Query {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let root: Json = serde_json::from_str(s).map_err(|e| WireError::Syntax(e.to_string()))?;
        Query::from_wire(&root)
    }
}

impl QueryElement {
    /// Parse one element; `null` and `{"not": null}` yield `None`.
    pub fn from_wire(n: &Json) -> Result<Option<QueryElement>, WireError> {
        let obj = match n {
            Json::Null => return Ok(None),
            Json::Array(items) => return legacy_group_list(items).map(Some),
            Json::Object(obj) => obj,
            other => return Err(WireError::UnknownElement(other.to_string())),
        };

        for (key, clause) in [("and", Clause::And), ("or", Clause::Or)] {
            if let Some(children) = obj.get(key) {
                return Ok(Some(QueryElement::Group {
                    clause,
                    elements: children_of(children)?,
                }));
            }
        }

        // A legacy condition may carry a boolean `not` of its own.
        if obj.contains_key("operator") || obj.contains_key("op") {
            return legacy_condition(obj).map(Some);
        }

        if let Some(child) = obj.get("not") {
            return Ok(QueryElement::from_wire(child)?.map(|c| QueryElement::Not(Box::new(c))));
        }

        for (key, body) in obj {
            let Ok(op) = key.parse::<Operator>() else { continue };
            let body = body
                .as_object()
                .ok_or_else(|| WireError::OperatorBody(key.clone()))?;
            return canonical_condition(op, body).map(Some);
        }

        if obj.contains_key("clause") || obj.contains_key("elements") {
            let clause = match text(obj.get("clause")) {
                Some(c) => c.parse().unwrap_or(Clause::And),
                None => Clause::And,
            };
            let elements = match obj.get("elements") {
                Some(els) => children_of(els)?,
                None => Vec::new(),
            };
            return Ok(Some(QueryElement::Group { clause, elements }));
        }

        Err(WireError::UnknownElement(n.to_string()))
    }

    pub fn to_wire(&self) -> Json {
        match self {
            QueryElement::Group { clause, elements } => {
                let key = match clause {
                    Clause::And => "and",
                    Clause::Or => "or",
                };
                let children = elements.iter().map(QueryElement::to_wire).collect();
                single(key.to_string(), Json::Array(children))
            }
            QueryElement::Not(child) => json!({"not": child.to_wire()}),
            QueryElement::Condition(c) => {
                let mut body = Map::new();
                body.insert("field".into(), Json::String(c.property.clone()));
                if c.not {
                    body.insert("not".into(), Json::Bool(true));
                }
                match c.operator {
                    Operator::Range => {
                        body.insert("lower".into(), c.lower.to_json());
                        body.insert("upper".into(), c.upper.to_json());
                    }
                    Operator::In | Operator::Nin => {
                        body.insert("values".into(), c.value.to_json());
                    }
                    _ => {
                        body.insert("value".into(), c.value.to_json());
                    }
                }
                single(c.operator.wire_name(), Json::Object(body))
            }
        }
    }
}

fn single(key: String, value: Json) -> Json {
    let mut obj = Map::new();
    obj.insert(key, value);
    Json::Object(obj)
}

fn children_of(n: &Json) -> Result<Vec<QueryElement>, WireError> {
    let Json::Array(items) = n else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if let Some(e) = QueryElement::from_wire(item)? {
            out.push(e);
        }
    }
    Ok(out)
}

/// `[{clause: AND}, <element>...]`
fn legacy_group_list(items: &[Json]) -> Result<QueryElement, WireError> {
    let clause = items
        .first()
        .and_then(|first| text(first.get("clause")))
        .ok_or(WireError::Shape("group list", "a leading {clause: AND|OR}"))?
        .parse()?;
    let mut elements = Vec::with_capacity(items.len() - 1);
    for item in &items[1..] {
        if let Some(e) = QueryElement::from_wire(item)? {
            elements.push(e);
        }
    }
    Ok(QueryElement::Group { clause, elements })
}

fn canonical_condition(op: Operator, body: &Map<String, Json>) -> Result<QueryElement, WireError> {
    let property = text(body.get("field")).ok_or(WireError::Shape("condition", "a 'field'"))?;
    let mut c = Condition::new(property, op, Value::Null);
    c.not = flag(body.get("not"));
    match op {
        Operator::Range => {
            c.lower = value_of(body.get("lower"));
            c.upper = value_of(body.get("upper"));
        }
        Operator::In | Operator::Nin => {
            c.value = value_of(body.get("values").or_else(|| body.get("value")));
        }
        _ => c.value = value_of(body.get("value")),
    }
    Ok(c.into())
}

fn legacy_condition(obj: &Map<String, Json>) -> Result<QueryElement, WireError> {
    let op: Operator = text(obj.get("operator").or_else(|| obj.get("op")))
        .ok_or(WireError::Shape("condition", "an 'operator'"))?
        .parse()?;
    let property = text(obj.get("property").or_else(|| obj.get("propertyPath")))
        .ok_or(WireError::Shape("condition", "a 'property'"))?;
    let mut c = Condition::new(property, op, Value::Null);
    c.not = flag(obj.get("not"));
    if op == Operator::Range {
        c.lower = value_of(obj.get("lower").or_else(|| obj.get("from")));
        c.upper = value_of(obj.get("upper").or_else(|| obj.get("to")));
    } else {
        c.value = value_of(obj.get("value").or_else(|| obj.get("values")));
    }
    Ok(c.into())
}

fn parse_page(page: &Json) -> Result<Page, WireError> {
    let limit = number(page.get("limit"), DEFAULT_LIMIT as i64)?;
    if limit <= 0 {
        return Err(WireError::InvalidPage(format!("limit must be > 0, got {limit}")));
    }
    let limit = limit as u64;
    let is_seek = text(page.get("type")).is_some_and(|t| t.eq_ignore_ascii_case("seek"));
    if is_seek {
        let after = match page.get("after") {
            Some(Json::Object(a)) => a
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
            _ => BTreeMap::new(),
        };
        return Ok(Page::Seek { limit, after });
    }
    let offset = number(page.get("offset"), 0)?;
    if offset < 0 {
        return Err(WireError::InvalidPage(format!("offset must be >= 0, got {offset}")));
    }
    Ok(Page::Offset {
        offset: offset as u64,
        limit,
    })
}

fn parse_dir(n: Option<&Json>) -> Result<SortDir, WireError> {
    match text(n) {
        None => Ok(SortDir::Asc),
        Some(d) if d.eq_ignore_ascii_case("asc") => Ok(SortDir::Asc),
        Some(d) if d.eq_ignore_ascii_case("desc") => Ok(SortDir::Desc),
        Some(_) => Err(WireError::Shape("sort dir", "ASC or DESC")),
    }
}

fn value_of(n: Option<&Json>) -> Value {
    n.map(Value::from_json).unwrap_or(Value::Null)
}

fn text(n: Option<&Json>) -> Option<String> {
    match n? {
        Json::Null => None,
        Json::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn flag(n: Option<&Json>) -> bool {
    match n {
        Some(Json::Bool(b)) => *b,
        Some(Json::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn number(n: Option<&Json>, default: i64) -> Result<i64, WireError> {
    match n {
        None | Some(Json::Null) => Ok(default),
        Some(Json::Number(num)) => num
            .as_i64()
            .ok_or_else(|| WireError::InvalidPage(num.to_string())),
        Some(Json::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| WireError::InvalidPage(s.clone())),
        Some(other) => Err(WireError::InvalidPage(other.to_string())),
    }
}

fn strings(items: &[Json]) -> Vec<String> {
    items
        .iter()
        .filter_map(|x| x.as_str().map(str::to_string))
        .collect()
}

fn map_to_json(m: &BTreeMap<String, Value>) -> Json {
    Json::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}
