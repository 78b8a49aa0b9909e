//! Compiled SQL statements.

use std::fmt;

use crate::dml::Bind;

/// How a statement is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecKind {
    /// Returns rows.
    #[default]
    Query,
    /// Returns an affected-row count.
    Update,
    /// Returns an affected-row count plus generated keys.
    UpdateGeneratedKeys,
    /// Returns rows; the first column of the first row is the result.
    QueryOneValue,
}

impl fmt::Display for ExecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecKind::Query => "QUERY",
            ExecKind::Update => "UPDATE",
            ExecKind::UpdateGeneratedKeys => "UPDATE_GENERATED_KEYS",
            ExecKind::QueryOneValue => "QUERY_ONE_VALUE",
        })
    }
}

/// SQL text with `:name` markers and one bind per marker, in marker order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<Bind>,
    pub exec: ExecKind,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, binds: Vec<Bind>, exec: ExecKind) -> Self {
        Self {
            sql: sql.into(),
            binds,
            exec,
        }
    }

    pub fn query(sql: impl Into<String>, binds: Vec<Bind>) -> Self {
        Self::new(sql, binds, ExecKind::Query)
    }
}
