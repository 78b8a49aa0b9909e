//! The seam between the orchestrator and a backend family.
//!
//! A [`NativeDialect`] compiles a normalized filter plus sort and page into one
//! native statement, and renders planned writes. The SQL family implements it
//! in [`crate::sql::SqlCompiler`], the document family in
//! [`crate::document::DocumentDialect`].

use std::collections::BTreeMap;

use crate::authoring::{EntityAuthoring, ViewDef};
use crate::compile::PropertyTypeResolver;
use crate::dml::{DmlAst, PathPolicy};
use crate::error::Error;
use crate::query::{Page, QueryElement, SortField};
use crate::value::Value;

/// Compiles queries and writes into statements of one backend family.
pub trait NativeDialect: Send + Sync {
    type Statement: std::fmt::Debug;

    /// Dialect id used to scope user types and binders.
    fn id(&self) -> &str;

    /// How the write planner maps property paths to columns.
    fn path_policy(&self) -> PathPolicy {
        PathPolicy::SnakeCaseDefault
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_select(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<&QueryElement>,
        sort: &[SortField],
        page: &Page,
        params: &BTreeMap<String, Value>,
        types: &PropertyTypeResolver,
    ) -> Result<Self::Statement, Error>;

    fn merge_count(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<&QueryElement>,
        params: &BTreeMap<String, Value>,
        types: &PropertyTypeResolver,
    ) -> Result<Self::Statement, Error>;

    fn render_dml(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        ast: &DmlAst,
        types: &PropertyTypeResolver,
    ) -> Result<Self::Statement, Error>;
}
