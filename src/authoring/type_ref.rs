//! Field type references and their textual syntax.
//!
//! ```text
//! string            scalar (lower-cased unless it contains a '.')
//! ref(Customer)     reference to another entity
//! value(Address)    embedded value object
//! list<T> set<T> array<T>
//! map<K,V>          split on the first top-level comma
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthoringError;

/// Type of an entity field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Scalar(String),
    Ref(String),
    Value(String),
    List(Box<TypeRef>),
    Set(Box<TypeRef>),
    Array(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    pub fn scalar(id: impl Into<String>) -> Self {
        TypeRef::Scalar(id.into())
    }

    pub fn reference(entity: impl Into<String>) -> Self {
        TypeRef::Ref(entity.into())
    }

    pub fn list(elem: TypeRef) -> Self {
        TypeRef::List(Box::new(elem))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, TypeRef::Scalar(_))
    }

    /// Logical type id used when binding values of this type.
    pub fn type_id(&self) -> String {
        match self {
            TypeRef::Scalar(id) => id.clone(),
            TypeRef::Ref(_) => "ref".to_string(),
            TypeRef::Value(_) => "json".to_string(),
            TypeRef::List(e) => format!("list<{}>", e.type_id()),
            TypeRef::Set(e) => format!("set<{}>", e.type_id()),
            TypeRef::Array(e) => format!("array<{}>", e.type_id()),
            TypeRef::Map(k, v) => format!("map<{},{}>", k.type_id(), v.type_id()),
        }
    }

    /// Parse the textual form.
    pub fn parse(text: &str) -> Result<Self, AuthoringError> {
        let s = text.trim();
        let invalid = |msg: &str| AuthoringError::InvalidTypeRef(text.to_string(), msg.to_string());
        if s.is_empty() {
            return Err(invalid("empty type"));
        }

        if let Some(inner) = call_arg(s, "ref") {
            return Ok(TypeRef::Ref(non_blank(inner).ok_or_else(|| invalid("missing entity"))?));
        }
        if let Some(inner) = call_arg(s, "value") {
            return Ok(TypeRef::Value(non_blank(inner).ok_or_else(|| invalid("missing entity"))?));
        }

        for (prefix, ctor) in [
            ("list", TypeRef::List as fn(Box<TypeRef>) -> TypeRef),
            ("set", TypeRef::Set),
            ("array", TypeRef::Array),
        ] {
            if let Some(inner) = generic_arg(s, prefix) {
                return Ok(ctor(Box::new(TypeRef::parse(inner)?)));
            }
        }

        if let Some(inner) = generic_arg(s, "map") {
            let comma = top_level_comma(inner).ok_or_else(|| invalid("map needs <K,V>"))?;
            let key = TypeRef::parse(&inner[..comma])?;
            let value = TypeRef::parse(&inner[comma + 1..])?;
            return Ok(TypeRef::Map(Box::new(key), Box::new(value)));
        }

        if s.contains(['<', '>', '(', ')', ',']) {
            return Err(invalid("malformed type"));
        }
        if s.contains('.') {
            Ok(TypeRef::Scalar(s.to_string()))
        } else {
            Ok(TypeRef::Scalar(s.to_lowercase()))
        }
    }
}

fn call_arg<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = strip_prefix_ignore_case(s, name)?.trim_start();
    rest.strip_prefix('(')?.strip_suffix(')')
}

fn generic_arg<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = strip_prefix_ignore_case(s, name)?.trim_start();
    rest.strip_prefix('<')?.strip_suffix('>')
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Index of the first comma not nested inside `<...>`.
pub(crate) fn top_level_comma(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, ch) in s.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

impl FromStr for TypeRef {
    type Err = AuthoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeRef::parse(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = AuthoringError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TypeRef::parse(&s)
    }
}

impl From<TypeRef> for String {
    fn from(t: TypeRef) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Scalar(id) => f.write_str(id),
            TypeRef::Ref(e) => write!(f, "ref({e})"),
            TypeRef::Value(e) => write!(f, "value({e})"),
            TypeRef::List(e) => write!(f, "list<{e}>"),
            TypeRef::Set(e) => write!(f, "set<{e}>"),
            TypeRef::Array(e) => write!(f, "array<{e}>"),
            TypeRef::Map(k, v) => write!(f, "map<{k},{v}>"),
        }
    }
}
