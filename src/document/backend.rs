//! Document-store execution over a blocking driver.
//!
//! Statements arrive fully rendered; this layer only dispatches them to the
//! [`DocumentDriver`] command matching their kind, inside the bound session
//! when one exists.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::dialect::COUNT_FIELD;
use super::row::DocumentRow;
use super::statement::{DocumentStatement, Stage, StatementKind};
use crate::authoring::ViewDef;
use crate::codec::UserTypeRegistry;
use crate::engine::backend::{Backend, DriverResult, RowSink};
use crate::engine::handle::EngineHandle;
use crate::engine::row::MapRow;
use crate::error::{BackendError, Error};
use crate::value::{Document, Value};

/// Result of an update command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Key of the document created by an upsert.
    pub upserted_id: Option<Value>,
}

/// A blocking document-store client.
///
/// Reads receive the transaction's session when one is bound and `None`
/// otherwise; writes always run in a session.
pub trait DocumentDriver: Send + Sync {
    type Session: Send;

    /// Open a session with a started transaction.
    fn start_session(&self, handle: &EngineHandle) -> DriverResult<Self::Session>;
    fn commit(&self, session: &mut Self::Session) -> DriverResult<()>;
    fn abort(&self, session: &mut Self::Session) -> DriverResult<()>;

    /// Run a find using the statement's filter, sort, skip and limit.
    fn find(
        &self,
        session: Option<&mut Self::Session>,
        handle: &EngineHandle,
        stmt: &DocumentStatement,
    ) -> DriverResult<Vec<Document>>;

    fn aggregate(
        &self,
        session: Option<&mut Self::Session>,
        handle: &EngineHandle,
        collection: &str,
        pipeline: &[Stage],
    ) -> DriverResult<Vec<Document>>;

    fn count(
        &self,
        session: Option<&mut Self::Session>,
        handle: &EngineHandle,
        collection: &str,
        filter: &Document,
    ) -> DriverResult<u64>;

    /// Insert and return the stored `_id`, if the store reports one.
    fn insert_one(
        &self,
        session: &mut Self::Session,
        handle: &EngineHandle,
        collection: &str,
        document: Document,
    ) -> DriverResult<Option<Value>>;

    fn update_one(
        &self,
        session: &mut Self::Session,
        handle: &EngineHandle,
        collection: &str,
        filter: &Document,
        update: &Document,
        upsert: bool,
    ) -> DriverResult<UpdateOutcome>;

    fn update_many(
        &self,
        session: &mut Self::Session,
        handle: &EngineHandle,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> DriverResult<UpdateOutcome>;

    /// Deleted document count.
    fn delete_many(
        &self,
        session: &mut Self::Session,
        handle: &EngineHandle,
        collection: &str,
        filter: &Document,
    ) -> DriverResult<u64>;
}

/// An open document-store transaction.
#[derive(Debug)]
pub struct DocumentTx<S> {
    session: S,
}

/// [`Backend`] for the document family.
pub struct DocumentBackend<Dr: DocumentDriver> {
    driver: Dr,
    user_types: Arc<UserTypeRegistry>,
}

impl<Dr: DocumentDriver> std::fmt::Debug for DocumentBackend<Dr> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBackend")
            .field("dialect", &self.user_types.dialect_id())
            .finish()
    }
}

impl<Dr: DocumentDriver> DocumentBackend<Dr> {
    pub fn new(driver: Dr, user_types: Arc<UserTypeRegistry>) -> Self {
        Self { driver, user_types }
    }

    pub fn driver(&self) -> &Dr {
        &self.driver
    }

    /// Log, time and wrap one driver call.
    fn call<T>(
        &self,
        op: &'static str,
        handle: &EngineHandle,
        stmt: &DocumentStatement,
        f: impl FnOnce() -> DriverResult<T>,
        summary: impl FnOnce(&T) -> String,
    ) -> Result<T, Error> {
        debug!(
            op,
            kind = %stmt.kind,
            collection = %stmt.collection,
            filter_keys = stmt.filter.len(),
            stages = stmt.pipeline.len(),
            handle_id = %handle.id,
            namespace = handle.namespace.as_deref().unwrap_or(""),
            "executing command"
        );
        let started = Instant::now();
        let out = f().map_err(|e| BackendError::new(op, e))?;
        debug!(
            op,
            duration_ms = started.elapsed().as_millis() as u64,
            result = %summary(&out),
            "command done"
        );
        Ok(out)
    }

    fn read(
        &self,
        session: Option<&mut Dr::Session>,
        handle: &EngineHandle,
        op: &'static str,
        stmt: &DocumentStatement,
    ) -> Result<Vec<Document>, Error> {
        self.call(
            op,
            handle,
            stmt,
            || match stmt.kind {
                StatementKind::Aggregate => {
                    self.driver
                        .aggregate(session, handle, &stmt.collection, &stmt.pipeline)
                }
                _ => self.driver.find(session, handle, stmt),
            },
            |docs| format!("{} documents", docs.len()),
        )
    }

    fn write_document<'s>(&self, stmt: &'s DocumentStatement) -> Result<&'s Document, Error> {
        stmt.document.as_ref().ok_or_else(|| {
            BackendError::new(
                stmt.kind.to_string(),
                format!("{} statement on '{}' carries no document", stmt.kind, stmt.collection),
            )
            .into()
        })
    }
}

impl<Dr: DocumentDriver> Backend for DocumentBackend<Dr> {
    type Statement = DocumentStatement;
    type Tx = DocumentTx<Dr::Session>;

    fn user_types(&self) -> &UserTypeRegistry {
        &self.user_types
    }

    fn begin(&self, handle: &EngineHandle) -> Result<Self::Tx, Error> {
        let session = self
            .driver
            .start_session(handle)
            .map_err(|e| BackendError::new("begin", e))?;
        Ok(DocumentTx { session })
    }

    fn commit(&self, mut tx: Self::Tx) -> Result<(), Error> {
        self.driver
            .commit(&mut tx.session)
            .map_err(|e| BackendError::new("commit", e).into())
    }

    fn rollback(&self, mut tx: Self::Tx) -> Result<(), Error> {
        self.driver
            .abort(&mut tx.session)
            .map_err(|e| BackendError::new("rollback", e).into())
    }

    fn select(
        &self,
        tx: Option<&mut Self::Tx>,
        handle: &EngineHandle,
        view: &ViewDef,
        stmt: &DocumentStatement,
        sink: &mut RowSink<'_>,
    ) -> Result<usize, Error> {
        let docs = self.read(tx.map(|t| &mut t.session), handle, "select", stmt)?;
        let n = docs.len();
        for doc in docs {
            let base = MapRow::new(doc, &self.user_types);
            sink(&DocumentRow::new(&base, view))?;
        }
        Ok(n)
    }

    fn count(&self, tx: Option<&mut Self::Tx>, handle: &EngineHandle, stmt: &DocumentStatement) -> Result<u64, Error> {
        let session = tx.map(|t| &mut t.session);
        if stmt.kind == StatementKind::Aggregate {
            let docs = self.read(session, handle, "count", stmt)?;
            let value = docs
                .first()
                .and_then(|d| d.get(COUNT_FIELD))
                .cloned()
                .unwrap_or(Value::Long(0));
            let n = self.user_types.decode("long", &value)?;
            return Ok(n.as_i64().map_or(0, |n| n.max(0) as u64));
        }
        self.call(
            "count",
            handle,
            stmt,
            || self.driver.count(session, handle, &stmt.collection, &stmt.filter),
            |n| format!("{n} documents"),
        )
    }

    fn insert(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &DocumentStatement) -> Result<Option<Value>, Error> {
        let document = self.write_document(stmt)?.clone();
        let inserted = self.call(
            "insert",
            handle,
            stmt,
            || self.driver.insert_one(&mut tx.session, handle, &stmt.collection, document),
            |id| if id.is_some() { "key returned".into() } else { "no key".into() },
        )?;
        Ok(stmt.id_hint.clone().or(inserted))
    }

    fn upsert(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &DocumentStatement) -> Result<Option<Value>, Error> {
        let update = self.write_document(stmt)?;
        let outcome = self.call(
            "upsert",
            handle,
            stmt,
            || {
                self.driver
                    .update_one(&mut tx.session, handle, &stmt.collection, &stmt.filter, update, true)
            },
            |o| format!("{} matched, {} modified", o.matched, o.modified),
        )?;
        Ok(stmt.id_hint.clone().or(outcome.upserted_id))
    }

    fn update(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &DocumentStatement) -> Result<u64, Error> {
        let update = self.write_document(stmt)?;
        let outcome = self.call(
            "update",
            handle,
            stmt,
            || match stmt.kind {
                StatementKind::UpdateOne => self.driver.update_one(
                    &mut tx.session,
                    handle,
                    &stmt.collection,
                    &stmt.filter,
                    update,
                    false,
                ),
                _ => self
                    .driver
                    .update_many(&mut tx.session, handle, &stmt.collection, &stmt.filter, update),
            },
            |o| format!("{} matched, {} modified", o.matched, o.modified),
        )?;
        Ok(outcome.modified)
    }

    fn delete(&self, tx: &mut Self::Tx, handle: &EngineHandle, stmt: &DocumentStatement) -> Result<u64, Error> {
        self.call(
            "delete",
            handle,
            stmt,
            || {
                self.driver
                    .delete_many(&mut tx.session, handle, &stmt.collection, &stmt.filter)
            },
            |n| format!("{n} deleted"),
        )
    }
}
