//! SQL execution over a blocking driver.
//!
//! [`SqlBackend`] rewrites `:name` markers into the dialect's placeholders,
//! encodes each bind through the user type registry, places it through the
//! binder registry, and hands the resulting arguments to a [`SqlDriver`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use super::binders::{BoundParams, SqlArg};
use super::dialect::{Dialect, SqlDialect};
use super::params;
use super::statement::{ExecKind, SqlStatement};
use crate::authoring::ViewDef;
use crate::bind::{BindContext, BinderRegistry, OpKind};
use crate::codec::UserTypeRegistry;
use crate::engine::backend::{Backend, RowSink};
pub use crate::engine::backend::DriverResult;
use crate::engine::handle::EngineHandle;
use crate::engine::row::{MapRow, ViewMappedRow};
use crate::error::{BackendError, Error, PlanningError};
use crate::value::Value;

/// One result row as `(label, value)` pairs in column order.
pub type SqlRow = Vec<(String, Value)>;

/// A blocking SQL connection source.
pub trait SqlDriver: Send + Sync {
    type Connection: Send;

    fn connect(&self, handle: &EngineHandle) -> DriverResult<Self::Connection>;
    fn begin(&self, conn: &mut Self::Connection) -> DriverResult<()>;
    fn commit(&self, conn: &mut Self::Connection) -> DriverResult<()>;
    fn rollback(&self, conn: &mut Self::Connection) -> DriverResult<()>;

    fn query(&self, conn: &mut Self::Connection, sql: &str, args: &[SqlArg]) -> DriverResult<Vec<SqlRow>>;

    /// Affected-row count.
    fn execute(&self, conn: &mut Self::Connection, sql: &str, args: &[SqlArg]) -> DriverResult<u64>;

    /// Execute and read back the first generated key.
    fn execute_returning_key(
        &self,
        conn: &mut Self::Connection,
        sql: &str,
        args: &[SqlArg],
    ) -> DriverResult<Option<Value>>;
}

/// An open SQL transaction.
#[derive(Debug)]
pub struct SqlTx<C> {
    conn: C,
}

/// [`Backend`] for one SQL dialect.
pub struct SqlBackend<Dr: SqlDriver> {
    driver: Dr,
    dialect: Dialect,
    user_types: Arc<UserTypeRegistry>,
    binders: Arc<BinderRegistry>,
}

impl<Dr: SqlDriver> std::fmt::Debug for SqlBackend<Dr> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlBackend")
            .field("dialect", &self.dialect)
            .field("binders", &self.binders)
            .finish()
    }
}

/// Executed form of a statement.
enum Outcome {
    Rows(Vec<SqlRow>),
    Count(u64),
    Key(Option<Value>),
}

impl Outcome {
    fn summary(&self) -> String {
        match self {
            Outcome::Rows(rows) => format!("{} rows", rows.len()),
            Outcome::Count(n) => format!("{n} affected"),
            Outcome::Key(Some(_)) => "key returned".into(),
            Outcome::Key(None) => "no key".into(),
        }
    }
}

impl<Dr: SqlDriver> SqlBackend<Dr> {
    pub fn new(
        driver: Dr,
        dialect: Dialect,
        user_types: Arc<UserTypeRegistry>,
        binders: Arc<BinderRegistry>,
    ) -> Self {
        Self {
            driver,
            dialect,
            user_types,
            binders,
        }
    }

    pub fn driver(&self) -> &Dr {
        &self.driver
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Native SQL text and arguments for `stmt`.
    pub fn prepare(&self, stmt: &SqlStatement, op: OpKind) -> Result<(String, Vec<SqlArg>), Error> {
        let (sql, markers) = params::rewrite(&stmt.sql, |n| self.dialect.placeholder(n));
        if markers != stmt.binds.len() {
            return Err(PlanningError::BindCountMismatch {
                markers,
                binds: stmt.binds.len(),
            }
            .into());
        }

        let mut bound = BoundParams::with_capacity(stmt.binds.len());
        for (i, bind) in stmt.binds.iter().enumerate() {
            let encoded = self.user_types.encode(&bind.type_id, &bind.value)?;
            trace!(
                index = i + 1,
                type_id = %bind.type_id,
                value_kind = %encoded.kind(),
                "bind"
            );
            let ctx = BindContext::position(op, i + 1);
            self.binders
                .bind(self.dialect.name(), &mut bound, &ctx, bind, &encoded)?;
        }
        Ok((sql, bound.into_args()))
    }

    fn run(
        &self,
        conn: &mut Dr::Connection,
        handle: &EngineHandle,
        op: &'static str,
        bind_op: OpKind,
        stmt: &SqlStatement,
    ) -> Result<Outcome, Error> {
        let (sql, args) = self.prepare(stmt, bind_op)?;
        debug!(
            op,
            exec_kind = %stmt.exec,
            bind_op = %bind_op,
            bind_count = args.len(),
            handle_id = %handle.id,
            schema = handle.namespace.as_deref().unwrap_or(""),
            sql = %sql,
            "executing statement"
        );

        let started = Instant::now();
        let outcome = match stmt.exec {
            ExecKind::Query => self.driver.query(conn, &sql, &args).map(Outcome::Rows),
            ExecKind::Update => self.driver.execute(conn, &sql, &args).map(Outcome::Count),
            ExecKind::UpdateGeneratedKeys => self
                .driver
                .execute_returning_key(conn, &sql, &args)
                .map(Outcome::Key),
            ExecKind::QueryOneValue => self.driver.query(conn, &sql, &args).map(|rows| {
                Outcome::Key(
                    rows.into_iter()
                        .next()
                        .and_then(|row| row.into_iter().next())
                        .map(|(_, v)| v)
                        .filter(|v| !v.is_null()),
                )
            }),
        }
        .map_err(|e| BackendError::new(op, e))?;

        debug!(
            op,
            duration_ms = started.elapsed().as_millis() as u64,
            result = %outcome.summary(),
            "statement done"
        );
        Ok(outcome)
    }

    /// Run `f` on the bound transaction's connection, or on a fresh one.
    fn with_conn<T>(
        &self,
        tx: Option<&mut SqlTx<Dr::Connection>>,
        handle: &EngineHandle,
        f: impl FnOnce(&mut Dr::Connection) -> Result<T, Error>,
    ) -> Result<T, Error> {
        match tx {
            Some(tx) => f(&mut tx.conn),
            None => {
                let mut conn = self
                    .driver
                    .connect(handle)
                    .map_err(|e| BackendError::new("connect", e))?;
                f(&mut conn)
            }
        }
    }

    fn write(
        &self,
        tx: &mut SqlTx<Dr::Connection>,
        handle: &EngineHandle,
        op: &'static str,
        bind_op: OpKind,
        stmt: &SqlStatement,
    ) -> Result<Outcome, Error> {
        self.run(&mut tx.conn, handle, op, bind_op, stmt)
    }
}

fn affected(outcome: Outcome) -> u64 {
    match outcome {
        Outcome::Count(n) => n,
        Outcome::Rows(rows) => rows.len() as u64,
        Outcome::Key(k) => u64::from(k.is_some()),
    }
}

fn key(outcome: Outcome) -> Option<Value> {
    match outcome {
        Outcome::Key(k) => k,
        _ => None,
    }
}

impl<Dr: SqlDriver> Backend for SqlBackend<Dr> {
    type Statement = SqlStatement;
    type Tx = SqlTx<Dr::Connection>;

    fn user_types(&self) -> &UserTypeRegistry {
        &self.user_types
    }

    fn begin(&self, handle: &EngineHandle) -> Result<Self::Tx, Error> {
        let mut conn = self
            .driver
            .connect(handle)
            .map_err(|e| BackendError::new("connect", e))?;
        self.driver
            .begin(&mut conn)
            .map_err(|e| BackendError::new("begin", e))?;
        Ok(SqlTx { conn })
    }

    fn commit(&self, mut tx: Self::Tx) -> Result<(), Error> {
        self.driver
            .commit(&mut tx.conn)
            .map_err(|e| BackendError::new("commit", e).into())
    }

    fn rollback(&self, mut tx: Self::Tx) -> Result<(), Error> {
        self.driver
            .rollback(&mut tx.conn)
            .map_err(|e| BackendError::new("rollback", e).into())
    }

    fn select(
        &self,
        tx: Option<&mut Self::Tx>,
        handle: &EngineHandle,
        view: &ViewDef,
        stmt: &SqlStatement,
        sink: &mut RowSink<'_>,
    ) -> Result<usize, Error> {
        let rows = self.with_conn(tx, handle, |conn| {
            match self.run(conn, handle, "select", OpKind::Filter, stmt)? {
                Outcome::Rows(rows) => Ok(rows),
                _ => Ok(Vec::new()),
            }
        })?;
        let n = rows.len();
        for row in rows {
            let doc: BTreeMap<String, Value> = row.into_iter().collect();
            let base = MapRow::new(doc, &self.user_types);
            sink(&ViewMappedRow::new(&base, view))?;
        }
        Ok(n)
    }

    fn count(&self, tx: Option<&mut Self::Tx>, handle: &EngineHandle, stmt: &SqlStatement) -> Result<u64, Error> {
        self.with_conn(tx, handle, |conn| {
            let rows = match self.run(conn, handle, "count", OpKind::Filter, stmt)? {
                Outcome::Rows(rows) => rows,
                _ => Vec::new(),
            };
            let value = rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .map(|(_, v)| v)
                .unwrap_or(Value::Long(0));
            let n = self.user_types.decode("long", &value)?;
            Ok(n.as_i64().map_or(0, |n| n.max(0) as u64))
        })
    }

    fn insert(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &SqlStatement) -> Result<Option<Value>, Error> {
        self.write(tx, handle, "insert", OpKind::Insert, stmt).map(key)
    }

    fn upsert(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &SqlStatement) -> Result<Option<Value>, Error> {
        self.write(tx, handle, "upsert", OpKind::UpsertSet, stmt).map(key)
    }

    fn update(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &SqlStatement) -> Result<u64, Error> {
        self.write(tx, handle, "update", OpKind::UpdateSet, stmt).map(affected)
    }

    fn delete(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &SqlStatement) -> Result<u64, Error> {
        self.write(tx, handle, "delete", OpKind::Filter, stmt).map(affected)
    }
}
