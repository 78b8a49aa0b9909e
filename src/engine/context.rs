//! Explicit transaction binding.
//!
//! A [`TxContext`] is created by one engine and carries at most one open
//! transaction of that engine. Operations take the context by `&mut` and
//! join its transaction; a context created by another engine is treated as
//! carrying none. New transactions run their work in a fresh child context,
//! so the caller's binding is never replaced.

use uuid::Uuid;

/// Transaction binding of one caller for one engine.
#[derive(Debug)]
pub struct TxContext<X> {
    owner: Uuid,
    tx: Option<X>,
}

impl<X> TxContext<X> {
    pub(crate) fn new(owner: Uuid) -> Self {
        Self { owner, tx: None }
    }

    pub(crate) fn with_tx(owner: Uuid, tx: X) -> Self {
        Self {
            owner,
            tx: Some(tx),
        }
    }

    /// Id of the engine that created this context.
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Whether a transaction is bound.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// The bound transaction, if `engine` owns this context.
    pub(crate) fn tx_for(&mut self, engine: Uuid) -> Option<&mut X> {
        if self.owner != engine {
            return None;
        }
        self.tx.as_mut()
    }

    pub(crate) fn is_active_for(&self, engine: Uuid) -> bool {
        self.owner == engine && self.tx.is_some()
    }

    pub(crate) fn take_tx(&mut self) -> Option<X> {
        self.tx.take()
    }
}
