//! Transaction handle shared by the accessors of one bundle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use typedkv_core::{Error, Result};
use typedkv_storage::{Transaction, TxnMode};

/// Handle to the engine transaction of one [`update`](crate::Database::update)
/// or [`view`](crate::Database::view) call.
///
/// Cloning is cheap and every clone refers to the same transaction, so all
/// namespace accessors built from one handle observe each other's writes.
/// Once the enclosing call returns the handle is finished and every
/// operation through it fails with [`Error::Transaction`].
#[derive(Clone)]
pub struct Txn {
    mode: TxnMode,
    inner: Rc<RefCell<Option<Transaction>>>,
}

impl Txn {
    pub(crate) fn new(transaction: Transaction) -> Self {
        Self {
            mode: transaction.mode(),
            inner: Rc::new(RefCell::new(Some(transaction))),
        }
    }

    /// True inside [`view`](crate::Database::view).
    pub fn is_read_only(&self) -> bool {
        self.mode == TxnMode::ReadOnly
    }

    /// True once the enclosing call has returned.
    pub fn is_finished(&self) -> bool {
        self.inner.borrow().is_none()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Transaction) -> Result<R>) -> Result<R> {
        let guard = self.inner.borrow();
        let transaction = guard.as_ref().ok_or_else(finished)?;
        f(transaction)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Transaction) -> Result<R>) -> Result<R> {
        let mut guard = self.inner.borrow_mut();
        let transaction = guard.as_mut().ok_or_else(finished)?;
        f(transaction)
    }

    /// Detaches the transaction; later use of any clone fails.
    pub(crate) fn finish(&self) -> Result<Transaction> {
        self.inner.borrow_mut().take().ok_or_else(finished)
    }
}

impl fmt::Debug for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Txn")
            .field("mode", &self.mode)
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn finished() -> Error {
    Error::Transaction("transaction already finished".to_string())
}
