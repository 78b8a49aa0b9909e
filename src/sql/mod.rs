//! SQL family: dialects, compilation, parameter binding and execution.
//!
//! ```text
//! Query / DmlAst
//!      │  SqlCompiler (dialect hooks)
//!      ▼
//! SqlStatement { sql with :bN markers, binds, exec }
//!      │  SqlBackend: rewrite markers, encode, bind
//!      ▼
//! SqlDriver (native placeholders + SqlArg list)
//! ```

pub mod backend;
pub mod binders;
mod compiler;
pub mod dialect;
pub mod params;
pub mod statement;
pub mod token;

pub use backend::{DriverResult, SqlBackend, SqlDriver, SqlRow, SqlTx};
pub use binders::{default_binders, BoundParams, PostgresBinders, SqlArg, SqlBinders};
pub use compiler::SqlCompiler;
pub use dialect::{Dialect, SqlDialect};
pub use statement::{ExecKind, SqlStatement};
pub use token::{Token, TokenStream};
