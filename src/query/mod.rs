//! Query model: filter tree, sort, page, projection, group-by, and named
//! parameters.
//!
//! A [`Query`] is built per call, normalized into a fresh filter tree by
//! [`normalize`], validated, and compiled into exactly one native statement.

mod ast;
pub mod filters;
pub mod json_path;
mod normalize;
mod wire;

pub use ast::{
    Clause, Condition, Operator, Page, Query, QueryElement, SortDir, SortField, DEFAULT_LIMIT,
};
pub use normalize::normalize;
