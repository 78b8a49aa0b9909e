//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting and boolean literals
//! - Positional placeholders: `$n` (Postgres) vs `?` (ANSI)
//! - Pagination: LIMIT/OFFSET vs OFFSET ... FETCH FIRST
//! - Insert returning and generated keys
//! - Upsert syntax
//! - Array and JSON operators
//!
//! # Usage
//!
//! ```ignore
//! use strata::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("order");  // "order"
//! ```
//!
//! # Operator Support
//!
//! | Feature | ANSI | PostgreSQL |
//! |---------|------|------------|
//! | ARRAY_CONTAINS / ARRAY_NOT_CONTAINS | ❌ | `@>` |
//! | ARRAY_OVERLAPS / ARRAY_NOT_OVERLAPS | ❌ | `&&` |
//! | JSON_PATH_EXISTS | ❌ | `#>` |
//! | JSON_VALUE_EQ | ❌ | `@>` (jsonb containment) |
//! | RETURNING | ❌ (generated keys) | ✓ |
//! | Upsert | ❌ | `ON CONFLICT ... DO UPDATE` |
//!
//! A dialect that cannot express an operator fails with
//! [`PlanningError::UnsupportedOperator`] naming itself.

mod ansi;
pub mod helpers;
mod postgres;

pub use ansi::Ansi;
pub use postgres::Postgres;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::statement::ExecKind;
use super::token::{Token, TokenStream};
use crate::dml::UpsertAst;
use crate::error::PlanningError;
use crate::query::{Operator, Page};

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging. Also the id that scopes user types
    /// and binders.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // Parameters and Pagination
    // =========================================================================

    /// Native placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_question(index)
    }

    /// Page clause without a leading space.
    fn emit_page(&self, page: &Page) -> TokenStream {
        helpers::emit_offset_fetch(page)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// How an insert is executed, given whether keys are wanted back.
    fn insert_exec_kind(&self, returning: bool) -> ExecKind {
        if returning {
            ExecKind::UpdateGeneratedKeys
        } else {
            ExecKind::Update
        }
    }

    /// Clause appended to an insert to return `columns`, without a leading
    /// space. Empty when the dialect reads generated keys instead.
    fn insert_returning(&self, _columns: &[String]) -> TokenStream {
        TokenStream::new()
    }

    /// Complete an upsert from the rendered plain insert.
    fn render_upsert(
        &self,
        _insert: TokenStream,
        _ast: &UpsertAst,
    ) -> Result<(TokenStream, ExecKind), PlanningError> {
        Err(PlanningError::UnsupportedUpsert(self.name().to_string()))
    }

    // =========================================================================
    // Array and JSON Operators
    // =========================================================================

    /// `expr` contains every element bound at `marker`.
    fn array_contains(&self, _expr: &str, _marker: Token) -> Result<TokenStream, PlanningError> {
        Err(self.unsupported(Operator::ArrayContains))
    }

    /// `expr` shares at least one element with the list bound at `marker`.
    fn array_overlaps(&self, _expr: &str, _marker: Token) -> Result<TokenStream, PlanningError> {
        Err(self.unsupported(Operator::ArrayOverlaps))
    }

    /// The JSON document at `expr` has a value at `segments`.
    fn json_path_exists(
        &self,
        _expr: &str,
        _segments: &[&str],
    ) -> Result<TokenStream, PlanningError> {
        Err(self.unsupported(Operator::JsonPathExists))
    }

    /// The JSON document at `expr` contains the fragment bound at `marker`.
    fn json_value_eq(&self, _expr: &str, _marker: Token) -> Result<TokenStream, PlanningError> {
        Err(self.unsupported(Operator::JsonValueEq))
    }

    fn unsupported(&self, op: Operator) -> PlanningError {
        PlanningError::UnsupportedOperator {
            op,
            dialect: self.name().to_string(),
        }
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Reference dialect: standard syntax, declines array/JSON operators
    /// and upsert.
    Ansi,
    #[default]
    Postgres,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Ansi => &Ansi,
            Dialect::Postgres => &Postgres,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn emit_page(&self, page: &Page) -> TokenStream {
        self.dialect().emit_page(page)
    }

    fn insert_exec_kind(&self, returning: bool) -> ExecKind {
        self.dialect().insert_exec_kind(returning)
    }

    fn insert_returning(&self, columns: &[String]) -> TokenStream {
        self.dialect().insert_returning(columns)
    }

    fn render_upsert(
        &self,
        insert: TokenStream,
        ast: &UpsertAst,
    ) -> Result<(TokenStream, ExecKind), PlanningError> {
        self.dialect().render_upsert(insert, ast)
    }

    fn array_contains(&self, expr: &str, marker: Token) -> Result<TokenStream, PlanningError> {
        self.dialect().array_contains(expr, marker)
    }

    fn array_overlaps(&self, expr: &str, marker: Token) -> Result<TokenStream, PlanningError> {
        self.dialect().array_overlaps(expr, marker)
    }

    fn json_path_exists(&self, expr: &str, segments: &[&str]) -> Result<TokenStream, PlanningError> {
        self.dialect().json_path_exists(expr, segments)
    }

    fn json_value_eq(&self, expr: &str, marker: Token) -> Result<TokenStream, PlanningError> {
        self.dialect().json_value_eq(expr, marker)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ansi" => Ok(Dialect::Ansi),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(format!("unknown SQL dialect: {other}")),
        }
    }
}
