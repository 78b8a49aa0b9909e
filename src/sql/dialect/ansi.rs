//! ANSI SQL dialect - base reference implementation.
//!
//! This provides the ANSI SQL standard behavior as a reference: `?`
//! placeholders, OFFSET/FETCH pagination, and generated keys instead of
//! RETURNING. Array and JSON operators and upsert are declined through the
//! trait defaults.

use super::helpers;
use super::SqlDialect;

/// ANSI SQL dialect (reference implementation).
#[derive(Debug, Clone, Copy)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_keyword(b)
    }
}
