//! Named parameters in SQL text.
//!
//! A parameter is `:` followed by `[A-Za-z_][A-Za-z0-9_]*`. `::` is a cast,
//! and nothing inside a single-quoted literal (with `''` escapes) is a
//! parameter. The same scan collects binds for native view SQL and rewrites
//! markers into dialect placeholders at execution time.

use std::collections::BTreeMap;

use crate::dml::Bind;
use crate::error::PlanningError;
use crate::value::Value;

/// One `:name` occurrence; `start` is the byte offset of the colon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedParam<'a> {
    pub name: &'a str,
    pub start: usize,
    pub end: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_part(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Every parameter occurrence, in order of appearance.
pub fn scan(sql: &str) -> Vec<NamedParam<'_>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                if in_quote && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                in_quote = !in_quote;
            }
            b':' if !in_quote => {
                if bytes.get(i + 1) == Some(&b':') {
                    i += 2;
                    continue;
                }
                if bytes.get(i + 1).copied().is_some_and(is_ident_start) {
                    let mut end = i + 2;
                    while end < bytes.len() && is_ident_part(bytes[end]) {
                        end += 1;
                    }
                    out.push(NamedParam {
                        name: &sql[i + 1..end],
                        start: i,
                        end,
                    });
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    out
}

/// Binds for the parameters of `sql`, in order of appearance. A parameter
/// used twice is bound twice.
pub fn binds_for(sql: &str, params: &BTreeMap<String, Value>) -> Result<Vec<Bind>, PlanningError> {
    scan(sql)
        .into_iter()
        .map(|p| {
            let value = params
                .get(p.name)
                .ok_or_else(|| PlanningError::MissingParam(p.name.to_string()))?;
            Ok(Bind::new(value.clone(), infer_type_id(value)))
        })
        .collect()
}

/// Replace each parameter with `placeholder(n)` (1-based). Returns the new
/// text and the number of parameters replaced.
pub fn rewrite(sql: &str, placeholder: impl Fn(usize) -> String) -> (String, usize) {
    let params = scan(sql);
    let mut out = String::with_capacity(sql.len() + 16);
    let mut last = 0;
    for (i, p) in params.iter().enumerate() {
        out.push_str(&sql[last..p.start]);
        out.push_str(&placeholder(i + 1));
        last = p.end;
    }
    out.push_str(&sql[last..]);
    (out, params.len())
}

/// Logical type id inferred from a runtime parameter value.
pub fn infer_type_id(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::String(_) => "string",
        Value::Int(_) => "int",
        Value::Long(_) => "long",
        Value::Bool(_) => "bool",
        Value::Uuid(_) => "uuid",
        Value::Instant(_) => "instant",
        _ => "json",
    }
}
