//! Compiled document-store commands.

use std::fmt;

use crate::dml::DmlAst;
use crate::query::SortDir;
use crate::value::{Document, Value};

/// Driver command a statement runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Find,
    Count,
    InsertOne,
    UpdateOne,
    UpdateMany,
    DeleteMany,
    Aggregate,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Find => "FIND",
            StatementKind::Count => "COUNT",
            StatementKind::InsertOne => "INSERT_ONE",
            StatementKind::UpdateOne => "UPDATE_ONE",
            StatementKind::UpdateMany => "UPDATE_MANY",
            StatementKind::DeleteMany => "DELETE_MANY",
            StatementKind::Aggregate => "AGGREGATE",
        })
    }
}

/// One aggregation pipeline stage.
///
/// Stages taken from a view's native query are kept as [`Stage::Raw`]; the
/// stages appended for the caller's filter, sort and page are typed so that
/// sort order survives.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Raw(Document),
    Match(Document),
    Sort(Vec<(String, SortDir)>),
    Skip(u64),
    Limit(u64),
    /// `$count` into the named field.
    Count(String),
}

impl Stage {
    /// Stage operator name, e.g. `$match`. Raw stages report their first key.
    pub fn name(&self) -> &str {
        match self {
            Stage::Raw(doc) => doc.keys().next().map(String::as_str).unwrap_or(""),
            Stage::Match(_) => "$match",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Count(_) => "$count",
        }
    }
}

/// A compiled command against one collection.
///
/// Reads carry `filter` (find and count) or `pipeline` (aggregate). Writes
/// carry the planned `dml` plus the rendered documents: `filter` selects the
/// affected documents and `document` is the insert document or the update
/// document (`$set` / `$setOnInsert`).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStatement {
    pub kind: StatementKind,
    pub collection: String,
    pub filter: Document,
    pub pipeline: Vec<Stage>,
    pub sort: Vec<(String, SortDir)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub document: Option<Document>,
    pub dml: Option<DmlAst>,
    pub upsert: bool,
    /// Key known before execution (supplied by the caller).
    pub id_hint: Option<Value>,
}

impl DocumentStatement {
    pub fn new(kind: StatementKind, collection: impl Into<String>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            filter: Document::new(),
            pipeline: Vec::new(),
            sort: Vec::new(),
            skip: None,
            limit: None,
            document: None,
            dml: None,
            upsert: false,
            id_hint: None,
        }
    }
}
