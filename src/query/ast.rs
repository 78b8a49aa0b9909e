//! Query tree types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{PlanningError, WireError};
use crate::value::Value;

/// Default page size of the wire form.
pub const DEFAULT_LIMIT: u64 = 50;

/// Filter operators.
///
/// Array and JSON operators are dialect-restricted: a dialect that cannot
/// express one fails with [`PlanningError::UnsupportedOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Nin,
    Range,
    Like,
    ArrayContains,
    ArrayNotContains,
    ArrayOverlaps,
    ArrayNotOverlaps,
    JsonPathExists,
    JsonValueEq,
}

impl Operator {
    pub const ALL: [Operator; 16] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::In,
        Operator::Nin,
        Operator::Range,
        Operator::Like,
        Operator::ArrayContains,
        Operator::ArrayNotContains,
        Operator::ArrayOverlaps,
        Operator::ArrayNotOverlaps,
        Operator::JsonPathExists,
        Operator::JsonValueEq,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Gt => "GT",
            Operator::Ge => "GE",
            Operator::Lt => "LT",
            Operator::Le => "LE",
            Operator::In => "IN",
            Operator::Nin => "NIN",
            Operator::Range => "RANGE",
            Operator::Like => "LIKE",
            Operator::ArrayContains => "ARRAY_CONTAINS",
            Operator::ArrayNotContains => "ARRAY_NOT_CONTAINS",
            Operator::ArrayOverlaps => "ARRAY_OVERLAPS",
            Operator::ArrayNotOverlaps => "ARRAY_NOT_OVERLAPS",
            Operator::JsonPathExists => "JSON_PATH_EXISTS",
            Operator::JsonValueEq => "JSON_VALUE_EQ",
        }
    }

    /// Lower-cased name used as the canonical wire key.
    pub fn wire_name(self) -> String {
        self.name().to_ascii_lowercase()
    }

    /// Operand is a list of values.
    pub fn is_list_shaped(self) -> bool {
        matches!(
            self,
            Operator::In
                | Operator::Nin
                | Operator::ArrayContains
                | Operator::ArrayNotContains
                | Operator::ArrayOverlaps
                | Operator::ArrayNotOverlaps
        )
    }

    /// Restricted to dialects that opt in.
    pub fn is_dialect_restricted(self) -> bool {
        matches!(
            self,
            Operator::ArrayContains
                | Operator::ArrayNotContains
                | Operator::ArrayOverlaps
                | Operator::ArrayNotOverlaps
                | Operator::JsonPathExists
                | Operator::JsonValueEq
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Operator::ALL
            .into_iter()
            .find(|op| op.name() == upper)
            .ok_or_else(|| WireError::UnknownOperator(s.to_string()))
    }
}

/// A leaf predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub property: String,
    pub operator: Operator,
    pub value: Value,
    /// RANGE bounds.
    pub lower: Value,
    pub upper: Value,
    pub not: bool,
}

impl Condition {
    pub fn new(property: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            operator,
            value: value.into(),
            lower: Value::Null,
            upper: Value::Null,
            not: false,
        }
    }

    pub fn range(property: impl Into<String>, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            operator: Operator::Range,
            value: Value::Null,
            lower: lower.into(),
            upper: upper.into(),
            not: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.not = !self.not;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    And,
    Or,
}

impl Clause {
    pub fn flip(self) -> Self {
        match self {
            Clause::And => Clause::Or,
            Clause::Or => Clause::And,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Clause::And => "AND",
            Clause::Or => "OR",
        }
    }
}

impl FromStr for Clause {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Clause::And),
            "OR" => Ok(Clause::Or),
            other => Err(WireError::UnknownElement(format!("clause {other}"))),
        }
    }
}

/// Filter tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryElement {
    Condition(Condition),
    Group {
        clause: Clause,
        elements: Vec<QueryElement>,
    },
    Not(Box<QueryElement>),
}

impl QueryElement {
    /// Visit every condition, depth first.
    pub fn for_each_condition<'a>(&'a self, f: &mut impl FnMut(&'a Condition)) {
        match self {
            QueryElement::Condition(c) => f(c),
            QueryElement::Group { elements, .. } => {
                for e in elements {
                    e.for_each_condition(f);
                }
            }
            QueryElement::Not(child) => child.for_each_condition(f),
        }
    }
}

impl From<Condition> for QueryElement {
    fn from(c: Condition) -> Self {
        QueryElement::Condition(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn keyword(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub dir: SortDir,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Desc,
        }
    }
}

/// Pagination.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Offset { offset: u64, limit: u64 },
    /// Keyset page continuing after the given sort-key values. An empty
    /// `after` is the first page.
    Seek {
        limit: u64,
        after: BTreeMap<String, Value>,
    },
}

impl Page {
    pub fn offset(offset: u64, limit: u64) -> Self {
        Page::Offset { offset, limit }
    }

    pub fn seek(limit: u64) -> Self {
        Page::Seek {
            limit,
            after: BTreeMap::new(),
        }
    }

    pub fn limit(&self) -> u64 {
        match self {
            Page::Offset { limit, .. } | Page::Seek { limit, .. } => *limit,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::Offset {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// A query over one view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filter: Option<QueryElement>,
    pub page: Page,
    pub sort: Vec<SortField>,
    pub projection: Vec<String>,
    pub group_by: Vec<String>,
    /// Named parameters for [`Value::Param`] references and native view SQL.
    pub params: BTreeMap<String, Value>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(filter: impl Into<QueryElement>) -> Self {
        Self::new().filter(filter)
    }

    pub fn filter(mut self, filter: impl Into<QueryElement>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn sort(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    pub fn projection(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn group_by(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn get_param(&self, name: &str) -> Result<&Value, PlanningError> {
        self.params
            .get(name)
            .ok_or_else(|| PlanningError::MissingParam(name.to_string()))
    }
}
