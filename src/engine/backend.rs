//! The execution seam between the orchestrator and a driver family.

use crate::authoring::ViewDef;
use crate::codec::UserTypeRegistry;
use crate::engine::handle::EngineHandle;
use crate::engine::row::RowAdapter;
use crate::error::Error;
use crate::value::Value;

/// Result of a driver call; failures are wrapped into
/// [`BackendError`](crate::error::BackendError) with the operation name.
pub type DriverResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Receives each row of a read.
pub type RowSink<'s> = dyn FnMut(&dyn RowAdapter) -> Result<(), Error> + 's;

/// Executes compiled statements.
///
/// Reads take an optional transaction and use a short-lived connection or
/// session when none is bound. Writes always run inside one; the
/// orchestrator opens it.
pub trait Backend: Send + Sync {
    type Statement: std::fmt::Debug;
    type Tx: Send;

    fn user_types(&self) -> &UserTypeRegistry;

    fn begin(&self, handle: &EngineHandle) -> Result<Self::Tx, Error>;
    fn commit(&self, tx: Self::Tx) -> Result<(), Error>;
    fn rollback(&self, tx: Self::Tx) -> Result<(), Error>;

    /// Stream rows to `sink`, adapted through `view`. Returns the row count.
    fn select(
        &self,
        tx: Option<&mut Self::Tx>,
        handle: &EngineHandle,
        view: &ViewDef,
        stmt: &Self::Statement,
        sink: &mut RowSink<'_>,
    ) -> Result<usize, Error>;

    fn count(
        &self,
        tx: Option<&mut Self::Tx>,
        handle: &EngineHandle,
        stmt: &Self::Statement,
    ) -> Result<u64, Error>;

    /// Execute an insert; the generated key, when one was requested and
    /// produced.
    fn insert(
        &self,
        tx: &mut Self::Tx,
        handle: &EngineHandle,
        stmt: &Self::Statement,
    ) -> Result<Option<Value>, Error>;

    fn upsert(
        &self,
        tx: &mut Self::Tx,
        handle: &EngineHandle,
        stmt: &Self::Statement,
    ) -> Result<Option<Value>, Error>;

    /// Affected rows.
    fn update(
        &self,
        tx: &mut Self::Tx,
        handle: &EngineHandle,
        stmt: &Self::Statement,
    ) -> Result<u64, Error>;

    fn delete(
        &self,
        tx: &mut Self::Tx,
        handle: &EngineHandle,
        stmt: &Self::Statement,
    ) -> Result<u64, Error>;
}
