//! Tokens emitted by the SQL compiler.
//!
//! Statements are built as [`TokenStream`]s and serialized once per
//! dialect. Values never appear as literals: they travel as named
//! [`Token::Marker`]s with a bind list alongside.

use super::dialect::{Dialect, SqlDialect};

/// One element of compiled SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Query keywords
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    Fetch,
    First,
    Rows,
    Only,
    In,
    Between,
    Like,
    IsNull,
    IsNotNull,

    // Write keywords
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Returning,
    On,
    Conflict,
    Do,
    Excluded,

    // Punctuation and comparison
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    Space,

    /// Quoted per dialect.
    Ident(String),
    LitInt(i64),
    LitString(String),
    LitBool(bool),
    /// Named bind marker, rendered `:name`. Rewritten to the dialect
    /// placeholder only when the statement is executed.
    Marker(String),

    /// Emitted verbatim: mapped column expressions, native view SQL and
    /// dialect operators such as `@>`. Never carries caller values.
    Raw(String),
}

impl Token {
    /// Render for `dialect`. Only identifiers, string and boolean
    /// literals vary by dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::LitInt(n) => n.to_string(),
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).to_string(),
            Token::Marker(name) => format!(":{name}"),
            Token::Raw(s) => s.clone(),
            fixed => fixed.fixed_text().to_string(),
        }
    }

    fn fixed_text(&self) -> &'static str {
        match self {
            Token::Select => "SELECT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::As => "AS",
            Token::OrderBy => "ORDER BY",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::Fetch => "FETCH",
            Token::First => "FIRST",
            Token::Rows => "ROWS",
            Token::Only => "ONLY",
            Token::In => "IN",
            Token::Between => "BETWEEN",
            Token::Like => "LIKE",
            Token::IsNull => "IS NULL",
            Token::IsNotNull => "IS NOT NULL",
            Token::Insert => "INSERT",
            Token::Into => "INTO",
            Token::Values => "VALUES",
            Token::Update => "UPDATE",
            Token::Set => "SET",
            Token::Delete => "DELETE",
            Token::Returning => "RETURNING",
            Token::On => "ON",
            Token::Conflict => "CONFLICT",
            Token::Do => "DO",
            Token::Excluded => "EXCLUDED",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Star => "*",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Eq => "=",
            Token::Ne => "<>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Lte => "<=",
            Token::Gte => ">=",
            Token::Space => " ",
            Token::Ident(_)
            | Token::LitInt(_)
            | Token::LitString(_)
            | Token::LitBool(_)
            | Token::Marker(_)
            | Token::Raw(_) => "",
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend_from_slice(&other.tokens);
        self
    }

    /// Append `items` separated by `, `.
    pub fn comma_separated<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = TokenStream>,
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.push(Token::Comma).space();
            }
            self.append(&item);
        }
        self
    }

    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    /// Wrap the whole stream in parentheses.
    pub fn parenthesized(mut self) -> Self {
        self.tokens.insert(0, Token::LParen);
        self.tokens.push(Token::RParen);
        self
    }
}

impl From<Token> for TokenStream {
    fn from(token: Token) -> Self {
        Self {
            tokens: vec![token],
        }
    }
}
