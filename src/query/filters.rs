//! Filter builders.
//!
//! ```ignore
//! use strata::query::filters::*;
//!
//! let f = and([eq("tenantId", param("tenant")), not(in_list("status", ["DRAFT"]))]);
//! ```

use super::ast::{Clause, Condition, Operator, QueryElement};
use crate::value::Value;

/// Reference to a named query parameter.
pub fn param(name: impl Into<String>) -> Value {
    Value::Param(name.into())
}

pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> QueryElement {
    Condition::new(property, Operator::Eq, value).into()
}

pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> QueryElement {
    Condition::new(property, Operator::Ne, value).into()
}

pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> QueryElement {
    Condition::new(property, Operator::Gt, value).into()
}

pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> QueryElement {
    Condition::new(property, Operator::Ge, value).into()
}

pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> QueryElement {
    Condition::new(property, Operator::Lt, value).into()
}

pub fn le(property: impl Into<String>, value: impl Into<Value>) -> QueryElement {
    Condition::new(property, Operator::Le, value).into()
}

fn list_condition<V: Into<Value>>(
    property: impl Into<String>,
    op: Operator,
    values: impl IntoIterator<Item = V>,
) -> QueryElement {
    let values = Value::List(values.into_iter().map(Into::into).collect());
    Condition::new(property, op, values).into()
}

pub fn in_list<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> QueryElement {
    list_condition(property, Operator::In, values)
}

pub fn nin<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> QueryElement {
    list_condition(property, Operator::Nin, values)
}

pub fn range(
    property: impl Into<String>,
    lower: impl Into<Value>,
    upper: impl Into<Value>,
) -> QueryElement {
    Condition::range(property, lower, upper).into()
}

/// SQL-style pattern: `%` any run, `_` one character.
pub fn like(property: impl Into<String>, pattern: impl Into<Value>) -> QueryElement {
    Condition::new(property, Operator::Like, pattern).into()
}

/// The array holds every given value.
pub fn array_contains<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> QueryElement {
    list_condition(property, Operator::ArrayContains, values)
}

pub fn array_not_contains<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> QueryElement {
    list_condition(property, Operator::ArrayNotContains, values)
}

/// The array holds at least one of the given values.
pub fn array_overlaps<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> QueryElement {
    list_condition(property, Operator::ArrayOverlaps, values)
}

pub fn array_not_overlaps<V: Into<Value>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> QueryElement {
    list_condition(property, Operator::ArrayNotOverlaps, values)
}

/// `json_path` like `$.a.b`.
pub fn json_path_exists(property: impl Into<String>, json_path: impl Into<String>) -> QueryElement {
    Condition::new(property, Operator::JsonPathExists, json_path.into()).into()
}

/// The value at `json_path` equals `value`. Carried as `{path, value}`.
pub fn json_value_eq(
    property: impl Into<String>,
    json_path: impl Into<String>,
    value: impl Into<Value>,
) -> QueryElement {
    let body = [
        ("path".to_string(), Value::String(json_path.into())),
        ("value".to_string(), value.into()),
    ]
    .into_iter()
    .collect();
    Condition::new(property, Operator::JsonValueEq, Value::Map(body)).into()
}

pub fn and(elements: impl IntoIterator<Item = QueryElement>) -> QueryElement {
    QueryElement::Group {
        clause: Clause::And,
        elements: elements.into_iter().collect(),
    }
}

pub fn or(elements: impl IntoIterator<Item = QueryElement>) -> QueryElement {
    QueryElement::Group {
        clause: Clause::Or,
        elements: elements.into_iter().collect(),
    }
}

pub fn not(element: QueryElement) -> QueryElement {
    QueryElement::Not(Box::new(element))
}
