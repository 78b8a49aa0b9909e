//! Parameter substitution and structural cleanup of the filter tree.

use super::ast::{Condition, Query, QueryElement};
use crate::error::PlanningError;
use crate::value::Value;

/// Produce a fresh filter tree for one execution.
///
/// [`Value::Param`] references are replaced by `query.params` entries, also
/// inside lists and maps. Groups lose children that normalize to nothing;
/// an empty group is no predicate and a single-child group is its child.
pub fn normalize(query: &Query) -> Result<Option<QueryElement>, PlanningError> {
    match &query.filter {
        None => Ok(None),
        Some(filter) => normalize_element(filter, query),
    }
}

fn normalize_element(el: &QueryElement, query: &Query) -> Result<Option<QueryElement>, PlanningError> {
    match el {
        QueryElement::Condition(c) => Ok(Some(QueryElement::Condition(Condition {
            property: c.property.clone(),
            operator: c.operator,
            value: resolve(&c.value, query)?,
            lower: resolve(&c.lower, query)?,
            upper: resolve(&c.upper, query)?,
            not: c.not,
        }))),
        QueryElement::Not(child) => {
            Ok(normalize_element(child, query)?.map(|c| QueryElement::Not(Box::new(c))))
        }
        QueryElement::Group { clause, elements } => {
            let mut out = Vec::with_capacity(elements.len());
            for child in elements {
                if let Some(c) = normalize_element(child, query)? {
                    out.push(c);
                }
            }
            Ok(match out.len() {
                0 => None,
                1 => out.pop(),
                _ => Some(QueryElement::Group {
                    clause: *clause,
                    elements: out,
                }),
            })
        }
    }
}

fn resolve(v: &Value, query: &Query) -> Result<Value, PlanningError> {
    Ok(match v {
        Value::Param(name) => query.get_param(name)?.clone(),
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| resolve(item, query))
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(m) => Value::Map(
            m.iter()
                .map(|(k, item)| Ok((k.clone(), resolve(item, query)?)))
                .collect::<Result<_, PlanningError>>()?,
        ),
        other => other.clone(),
    })
}
