//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Numbered placeholders (`$1`, `$2`, ...)
//! - RETURNING clause
//! - ON CONFLICT for upserts
//! - Array containment (`@>`) and overlap (`&&`)
//! - jsonb path lookup (`#>`) and containment (`@>`)

use super::helpers;
use super::SqlDialect;
use crate::dml::UpsertAst;
use crate::error::PlanningError;
use crate::query::Page;
use crate::sql::statement::ExecKind;
use crate::sql::token::{Token, TokenStream};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl Postgres {
    fn ident_list(&self, columns: &[String]) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.comma_separated(columns.iter().map(|c| Token::Ident(c.clone()).into()));
        ts
    }
}

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_keyword(b)
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_dollar(index)
    }

    fn emit_page(&self, page: &Page) -> TokenStream {
        helpers::emit_limit_offset_standard(page)
    }

    fn insert_exec_kind(&self, returning: bool) -> ExecKind {
        if returning {
            ExecKind::QueryOneValue
        } else {
            ExecKind::Update
        }
    }

    fn insert_returning(&self, columns: &[String]) -> TokenStream {
        let mut ts = TokenStream::new();
        if columns.is_empty() {
            return ts;
        }
        ts.push(Token::Returning)
            .space()
            .append(&self.ident_list(columns));
        ts
    }

    fn render_upsert(
        &self,
        insert: TokenStream,
        ast: &UpsertAst,
    ) -> Result<(TokenStream, ExecKind), PlanningError> {
        if ast.conflict_columns.is_empty() {
            return Err(PlanningError::NoConflictColumns(ast.insert.table.clone()));
        }
        // DO UPDATE needs at least one assignment.
        let updates = if ast.update_columns.is_empty() {
            &ast.conflict_columns
        } else {
            &ast.update_columns
        };

        let mut ts = insert;
        ts.space()
            .push(Token::On)
            .space()
            .push(Token::Conflict)
            .space()
            .append(&self.ident_list(&ast.conflict_columns).parenthesized())
            .space()
            .push(Token::Do)
            .space()
            .push(Token::Update)
            .space()
            .push(Token::Set)
            .space();
        ts.comma_separated(updates.iter().map(|c| {
            let mut set = TokenStream::new();
            set.push(Token::Ident(c.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .push(Token::Excluded)
                .push(Token::Dot)
                .push(Token::Ident(c.clone()));
            set
        }));

        let returning = self.insert_returning(&ast.insert.returning);
        if !returning.is_empty() {
            ts.space().append(&returning);
        }
        Ok((ts, self.insert_exec_kind(!ast.insert.returning.is_empty())))
    }

    fn array_contains(&self, expr: &str, marker: Token) -> Result<TokenStream, PlanningError> {
        Ok(helpers::binary_raw(expr, "@>", marker))
    }

    fn array_overlaps(&self, expr: &str, marker: Token) -> Result<TokenStream, PlanningError> {
        Ok(helpers::binary_raw(expr, "&&", marker))
    }

    fn json_path_exists(&self, expr: &str, segments: &[&str]) -> Result<TokenStream, PlanningError> {
        let path = format!("{{{}}}", segments.join(","));
        let mut ts = helpers::binary_raw(expr, "#>", Token::LitString(path));
        ts.space().push(Token::IsNotNull);
        Ok(ts)
    }

    fn json_value_eq(&self, expr: &str, marker: Token) -> Result<TokenStream, PlanningError> {
        Ok(helpers::binary_raw(expr, "@>", marker))
    }
}
