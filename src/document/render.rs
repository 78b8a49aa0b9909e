//! Filter rendering to query documents.
//!
//! Negation is pushed to the leaves: `Not` flips AND/OR at groups and
//! toggles each condition, and a negated condition becomes
//! `{$nor: [positive]}`. Operands are encoded through the user type
//! registry and placed by the binder registry at the condition's path, so
//! filters compare against exactly what writes store.

use std::collections::BTreeMap;

use crate::authoring::{EntityAuthoring, ViewDef};
use crate::bind::{element_type_id, BindContext, BinderRegistry, OpKind};
use crate::codec::UserTypeRegistry;
use crate::compile::PropertyTypeResolver;
use crate::dml::{Bind, PathPolicy};
use crate::error::{Error, PathUsage, PlanningError, ValidationError};
use crate::query::json_path::json_path_segments;
use crate::query::{Clause, Condition, Operator, QueryElement, SortDir, SortField};
use crate::value::{Document, Value};

use super::DIALECT_ID;

/// Encodes and binds values for one statement section.
#[derive(Clone, Copy)]
pub(crate) struct Placer<'a> {
    pub user_types: &'a UserTypeRegistry,
    pub binders: &'a BinderRegistry,
}

impl Placer<'_> {
    /// Bind `value` into `target` at `path`.
    pub fn place(&self, target: &mut Document, op: OpKind, path: &str, bind: &Bind) -> Result<(), Error> {
        let encoded = self.user_types.encode(&bind.type_id, &bind.value)?;
        self.binders
            .bind(DIALECT_ID, target, &BindContext::path(op, path), bind, &encoded)
    }

    /// The value a write of `bind` at `path` would store.
    pub fn stored(&self, op: OpKind, path: &str, bind: &Bind) -> Result<Value, Error> {
        let mut tmp = Document::new();
        self.place(&mut tmp, op, path, bind)?;
        Ok(lookup(&tmp, path).cloned().unwrap_or(Value::Null))
    }
}

/// Value at a dot path of a document.
pub(crate) fn lookup<'d>(doc: &'d Document, path: &str) -> Option<&'d Value> {
    match path.split_once('.') {
        None => doc.get(path),
        Some((head, rest)) => doc.get(head)?.get_path(rest),
    }
}

pub(crate) fn doc1(key: impl Into<String>, value: Value) -> Document {
    BTreeMap::from([(key.into(), value)])
}

/// A constant predicate.
fn literal(b: bool) -> Document {
    doc1("$expr", Value::Bool(b))
}

/// `a AND b`, treating an empty document as no predicate.
pub(crate) fn and_docs(a: Document, b: Option<Document>) -> Document {
    match b {
        None => a,
        Some(b) if a.is_empty() => b,
        Some(b) if b.is_empty() => a,
        Some(b) => doc1("$and", Value::List(vec![Value::Map(a), Value::Map(b)])),
    }
}

fn combine(mut parts: Vec<Document>, clause: Clause) -> Option<Document> {
    if parts.len() <= 1 {
        return parts.pop();
    }
    let key = match clause {
        Clause::And => "$and",
        Clause::Or => "$or",
    };
    Some(doc1(key, Value::List(parts.into_iter().map(Value::Map).collect())))
}

/// `^…$` regex equivalent of a LIKE pattern.
pub(crate) fn like_regex(pattern: &str) -> String {
    let mut re = String::from("^");
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '%' | '_' => {
                re.push_str(&regex::escape(&literal));
                literal.clear();
                re.push_str(if ch == '%' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    re.push_str(&regex::escape(&literal));
    re.push('$');
    re
}

fn json_child_path(base: &str, json_path: &str) -> String {
    let segments = json_path_segments(json_path);
    if segments.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{}", segments.join("."))
    }
}

/// Sort keys through explicit mappings.
pub(crate) fn sort_spec(view: &ViewDef, sort: &[SortField]) -> Vec<(String, SortDir)> {
    sort.iter()
        .map(|sf| (PathPolicy::Explicit.column(view, &sf.field), sf.dir))
        .collect()
}

pub(crate) struct FilterRenderer<'a> {
    pub ea: &'a EntityAuthoring,
    pub view: &'a ViewDef,
    pub types: &'a PropertyTypeResolver,
    pub placer: Placer<'a>,
    pub op: OpKind,
}

impl FilterRenderer<'_> {
    /// Query document for `el`; `None` when it constrains nothing.
    pub fn render(&self, el: &QueryElement) -> Result<Option<Document>, Error> {
        self.element(el, false)
    }

    fn element(&self, el: &QueryElement, negate: bool) -> Result<Option<Document>, Error> {
        match el {
            QueryElement::Not(child) => self.element(child, !negate),
            QueryElement::Condition(c) => self.condition(c, negate).map(Some),
            QueryElement::Group { clause, elements } => {
                let clause = if negate { clause.flip() } else { *clause };
                let mut parts = Vec::with_capacity(elements.len());
                for child in elements {
                    if let Some(part) = self.element(child, negate)? {
                        parts.push(part);
                    }
                }
                Ok(combine(parts, clause))
            }
        }
    }

    fn condition(&self, c: &Condition, negate: bool) -> Result<Document, Error> {
        let path = PathPolicy::Explicit.column(self.view, &c.property);
        let type_id = self.scalar_type(&c.property, PathUsage::Filter)?;
        let not = c.not ^ negate;
        let op = c.operator;

        let (positive, not) = match op {
            Operator::Eq | Operator::Ne if c.value.is_null() => {
                let test = if op == Operator::Eq {
                    Value::Null
                } else {
                    Value::Map(doc1("$ne", Value::Null))
                };
                (doc1(&path, test), not)
            }
            Operator::Eq => (doc1(&path, self.operand(&path, &c.value, &type_id)?), not),
            Operator::Ne | Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le => {
                if c.value.is_null() {
                    return Err(PlanningError::NullOperand(op.name().into()).into());
                }
                let key = match op {
                    Operator::Ne => "$ne",
                    Operator::Gt => "$gt",
                    Operator::Ge => "$gte",
                    Operator::Lt => "$lt",
                    _ => "$lte",
                };
                let v = self.operand(&path, &c.value, &type_id)?;
                (doc1(&path, Value::Map(doc1(key, v))), not)
            }
            Operator::In | Operator::Nin => {
                let values = c.value.to_list();
                if values.is_empty() {
                    return Ok(literal((op == Operator::Nin) ^ not));
                }
                if values.iter().any(Value::is_null) {
                    return Err(PlanningError::NullOperand(op.name().into()).into());
                }
                let key = if op == Operator::In { "$in" } else { "$nin" };
                let list = self.operands(&path, values, &type_id)?;
                (doc1(&path, Value::Map(doc1(key, list))), not)
            }
            Operator::Range => {
                if c.lower.is_null() || c.upper.is_null() {
                    return Err(PlanningError::NullOperand(op.name().into()).into());
                }
                let bounds = BTreeMap::from([
                    ("$gte".to_string(), self.operand(&path, &c.lower, &type_id)?),
                    ("$lte".to_string(), self.operand(&path, &c.upper, &type_id)?),
                ]);
                (doc1(&path, Value::Map(bounds)), not)
            }
            Operator::Like => {
                let pattern = match &c.value {
                    Value::Null => return Err(PlanningError::NullOperand(op.name().into()).into()),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let regex = Value::String(like_regex(&pattern));
                (doc1(&path, Value::Map(doc1("$regex", regex))), not)
            }
            Operator::ArrayContains | Operator::ArrayNotContains => {
                let eff_not = not ^ (op == Operator::ArrayNotContains);
                let values = c.value.to_list();
                if values.is_empty() {
                    return Ok(literal(!eff_not));
                }
                let elem = element_type_id(&type_id).unwrap_or(type_id.as_str());
                let list = self.operands(&path, values, elem)?;
                (doc1(&path, Value::Map(doc1("$all", list))), eff_not)
            }
            Operator::ArrayOverlaps | Operator::ArrayNotOverlaps => {
                let eff_not = not ^ (op == Operator::ArrayNotOverlaps);
                let values = c.value.to_list();
                if values.is_empty() {
                    return Ok(literal(eff_not));
                }
                let elem = element_type_id(&type_id).unwrap_or(type_id.as_str());
                let list = self.operands(&path, values, elem)?;
                (doc1(&path, Value::Map(doc1("$in", list))), eff_not)
            }
            Operator::JsonPathExists => {
                let json_path = c.value.as_str().ok_or(PlanningError::InvalidOperand {
                    op,
                    expected: "a JSON path string",
                })?;
                let exists = Value::Map(doc1("$exists", Value::Bool(true)));
                (doc1(json_child_path(&path, json_path), exists), not)
            }
            Operator::JsonValueEq => {
                let (json_path, value) = c
                    .value
                    .as_map()
                    .and_then(|m| Some((m.get("path")?.as_str()?, m.get("value").cloned().unwrap_or(Value::Null))))
                    .ok_or(PlanningError::InvalidOperand {
                        op,
                        expected: "an object with path and value",
                    })?;
                let full = json_child_path(&path, json_path);
                let v = self.operand(&full, &value, &type_id)?;
                (doc1(full, v), not)
            }
        };

        Ok(if not {
            doc1("$nor", Value::List(vec![Value::Map(positive)]))
        } else {
            positive
        })
    }

    /// Keyset predicate continuing after `after`; `None` on the first page.
    pub fn seek(&self, sort: &[SortField], after: &BTreeMap<String, Value>) -> Result<Option<Document>, Error> {
        if after.is_empty() {
            return Ok(None);
        }
        if sort.is_empty() {
            return Err(PlanningError::SeekWithoutSort.into());
        }

        let mut terms = Vec::with_capacity(sort.len());
        for i in 0..sort.len() {
            let mut parts = Vec::with_capacity(i + 1);
            for (j, sf) in sort[..=i].iter().enumerate() {
                let value = after
                    .get(&sf.field)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| PlanningError::MissingSeekValue(sf.field.clone()))?;
                let type_id = self.scalar_type(&sf.field, PathUsage::Sort)?;
                let path = PathPolicy::Explicit.column(self.view, &sf.field);
                let v = self.operand(&path, value, &type_id)?;
                let test = match (j < i, sf.dir) {
                    (true, _) => v,
                    (false, SortDir::Asc) => Value::Map(doc1("$gt", v)),
                    (false, SortDir::Desc) => Value::Map(doc1("$lt", v)),
                };
                parts.push(doc1(path, test));
            }
            if let Some(term) = combine(parts, Clause::And) {
                terms.push(term);
            }
        }
        Ok(combine(terms, Clause::Or))
    }

    fn operand(&self, path: &str, value: &Value, type_id: &str) -> Result<Value, Error> {
        self.placer
            .stored(self.op, path, &Bind::new(value.clone(), type_id))
    }

    fn operands(&self, path: &str, values: Vec<Value>, type_id: &str) -> Result<Value, Error> {
        values
            .iter()
            .map(|v| self.operand(path, v, type_id))
            .collect::<Result<_, _>>()
            .map(Value::List)
    }

    fn scalar_type(&self, path: &str, usage: PathUsage) -> Result<String, ValidationError> {
        self.types
            .resolve_scalar_type_id(self.ea, path)
            .ok_or_else(|| ValidationError::UnknownPath {
                path: path.to_string(),
                usage,
                entity: self.ea.type_name.clone(),
            })
    }
}
