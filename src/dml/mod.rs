//! Write statements and the planner that derives them from payloads.

mod ast;
mod planner;

pub use ast::{Bind, ColumnBind, DeleteAst, DmlAst, InsertAst, UpdateAst, UpsertAst};
pub use planner::{DmlPlanner, MappedDmlPlanner, PathPolicy};
