//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};
use crate::query::Page;

// =============================================================================
// Identifier and String Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: ANSI, Postgres
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote string with single quotes (standard SQL).
/// Used by: All dialects
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as the keywords TRUE/FALSE.
/// Used by: ANSI, Postgres
pub fn format_bool_keyword(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// Positional `?` placeholder.
/// Used by: ANSI
pub fn placeholder_question(_index: usize) -> String {
    "?".to_string()
}

/// Numbered `$n` placeholder.
/// Used by: Postgres
pub fn placeholder_dollar(index: usize) -> String {
    format!("${index}")
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ...; a seek page only limits.
/// Used by: Postgres
pub fn emit_limit_offset_standard(page: &Page) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Limit)
        .space()
        .push(Token::LitInt(clamp(page.limit())));

    if let Page::Offset { offset, .. } = page {
        ts.space()
            .push(Token::Offset)
            .space()
            .push(Token::LitInt(clamp(*offset)));
    }

    ts
}

/// Emit OFFSET ... ROWS FETCH FIRST ... ROWS ONLY (SQL:2008 style).
/// Used by: ANSI
pub fn emit_offset_fetch(page: &Page) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Page::Offset { offset, .. } = page {
        ts.push(Token::Offset)
            .space()
            .push(Token::LitInt(clamp(*offset)))
            .space()
            .push(Token::Rows)
            .space();
    }

    ts.push(Token::Fetch)
        .space()
        .push(Token::First)
        .space()
        .push(Token::LitInt(clamp(page.limit())))
        .space()
        .push(Token::Rows)
        .space()
        .push(Token::Only);

    ts
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// =============================================================================
// Operators
// =============================================================================

/// `lhs <op> rhs` with a dialect operator passed through verbatim.
pub fn binary_raw(lhs: &str, op: &str, rhs: Token) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Raw(lhs.to_string()))
        .space()
        .push(Token::Raw(op.to_string()))
        .space()
        .push(rhs);
    ts
}
