//! Backend-neutral write statements.
//!
//! Column names are already mapped: relational column names for the SQL
//! family, document paths for the document family.

use crate::query::QueryElement;
use crate::value::Value;

/// A value paired with the logical type id used to encode and bind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub value: Value,
    pub type_id: String,
}

impl Bind {
    pub fn new(value: impl Into<Value>, type_id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            type_id: type_id.into(),
        }
    }
}

/// A mapped column and the value written into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBind {
    pub column: String,
    pub bind: Bind,
}

impl ColumnBind {
    pub fn new(column: impl Into<String>, bind: Bind) -> Self {
        Self {
            column: column.into(),
            bind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertAst {
    pub table: String,
    pub columns: Vec<ColumnBind>,
    /// Key columns whose generated values the caller wants back.
    pub returning: Vec<String>,
}

impl InsertAst {
    pub fn column(&self, name: &str) -> Option<&ColumnBind> {
        self.columns.iter().find(|c| c.column == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAst {
    pub table: String,
    pub sets: Vec<ColumnBind>,
    /// Property-level predicate; `None` updates every row.
    pub filter: Option<QueryElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteAst {
    pub table: String,
    pub filter: Option<QueryElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertAst {
    pub insert: InsertAst,
    pub conflict_columns: Vec<String>,
    /// Columns overwritten when the row already exists.
    pub update_columns: Vec<String>,
}

/// Any write statement.
#[derive(Debug, Clone, PartialEq)]
pub enum DmlAst {
    Insert(InsertAst),
    Update(UpdateAst),
    Delete(DeleteAst),
    Upsert(UpsertAst),
}

impl DmlAst {
    /// Short operation name used in logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            DmlAst::Insert(_) => "INSERT",
            DmlAst::Update(_) => "UPDATE",
            DmlAst::Delete(_) => "DELETE",
            DmlAst::Upsert(_) => "UPSERT",
        }
    }

    pub fn table(&self) -> &str {
        match self {
            DmlAst::Insert(a) => &a.table,
            DmlAst::Update(a) => &a.table,
            DmlAst::Delete(a) => &a.table,
            DmlAst::Upsert(a) => &a.insert.table,
        }
    }
}

impl From<InsertAst> for DmlAst {
    fn from(ast: InsertAst) -> Self {
        DmlAst::Insert(ast)
    }
}

impl From<UpdateAst> for DmlAst {
    fn from(ast: UpdateAst) -> Self {
        DmlAst::Update(ast)
    }
}

impl From<DeleteAst> for DmlAst {
    fn from(ast: DeleteAst) -> Self {
        DmlAst::Delete(ast)
    }
}

impl From<UpsertAst> for DmlAst {
    fn from(ast: UpsertAst) -> Self {
        DmlAst::Upsert(ast)
    }
}
