//! Transaction scopes.
//!
//! This module provides [`Transaction`], the revocable scope that every
//! provisional mutation in machina is attached to, together with the callback
//! types invoked when scopes close.
//!
//! # Lifecycle
//!
//! 1. **Open** - [`Transaction::open_outer`] opens the root scope of the current
//!    thread; [`Transaction::open_nested`] opens a child of an open scope.
//! 2. **Mutate** - participants register close callbacks on the scope they
//!    mutate in (usually through [`update_snapshots`](crate::update_snapshots)).
//! 3. **Close** - [`Transaction::commit`] or [`Transaction::abort`] consume the
//!    handle. Dropping an open handle aborts it.
//! 4. **Outer close** - once the root scope has closed, outer close callbacks
//!    run. This is where change listeners fire, exactly once per root.
//!
//! Only one outer transaction may be open per thread at a time; opening a
//! second one is a programming error.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

// ─────────────────────────────────────────────────────────────────────────────
// Identity & Results
// ─────────────────────────────────────────────────────────────────────────────

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static OUTER_OPEN: Cell<bool> = const { Cell::new(false) };
}

/// Identity of an outer transaction.
///
/// Every scope of a nested chain reports the id of its outermost scope, so two
/// callbacks can tell whether they belong to the same logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Returns the raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Outcome of a closed transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionResult {
    /// The scope was committed.
    Committed,
    /// The scope was aborted, explicitly or by being dropped.
    Aborted,
}

impl TransactionResult {
    /// Returns `true` if the scope was committed.
    #[must_use]
    pub fn was_committed(self) -> bool {
        self == Self::Committed
    }

    /// Returns `true` if the scope was aborted.
    #[must_use]
    pub fn was_aborted(self) -> bool {
        self == Self::Aborted
    }
}

/// Errors raised when opening transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// An outer transaction is already open on this thread.
    #[error("an outer transaction is already open on this thread; open a nested transaction instead")]
    OuterAlreadyOpen,
}

// ─────────────────────────────────────────────────────────────────────────────
// Journal
// ─────────────────────────────────────────────────────────────────────────────

/// Callback invoked when the scope it was registered on closes.
type CloseCallback = Box<dyn FnOnce(&CloseContext, TransactionResult)>;

/// Callback invoked once the outermost scope has closed.
type OuterCloseCallback = Box<dyn FnOnce(TransactionResult)>;

/// Per-scope bookkeeping.
#[derive(Default)]
struct Frame {
    close_callbacks: Vec<CloseCallback>,
}

/// State shared by every scope of one outer transaction.
struct Journal {
    id: TransactionId,
    /// One frame per open scope; index == nesting depth.
    frames: Vec<Frame>,
    outer_close_callbacks: Vec<OuterCloseCallback>,
}

impl Journal {
    fn push_close_callback(&mut self, depth: usize, callback: CloseCallback) {
        match self.frames.get_mut(depth) {
            Some(frame) => frame.close_callbacks.push(callback),
            None => panic!(
                "transaction scope at depth {depth} is not open ({} open scopes)",
                self.frames.len()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction
// ─────────────────────────────────────────────────────────────────────────────

/// A revocable mutation scope.
///
/// The lifetime `'p` ties a nested scope to the mutable borrow of its parent,
/// so a parent cannot be used (or closed) while one of its children is open.
///
/// # Example
///
/// ```
/// use machina_transaction::Transaction;
///
/// let mut outer = Transaction::open_outer();
/// assert_eq!(outer.nesting_depth(), 0);
///
/// let inner = outer.open_nested();
/// assert_eq!(inner.nesting_depth(), 1);
/// inner.commit();
///
/// outer.abort();
/// assert!(!Transaction::is_open());
/// ```
pub struct Transaction<'p> {
    journal: Rc<RefCell<Journal>>,
    depth: usize,
    closed: bool,
    _parent: PhantomData<&'p mut ()>,
}

impl Transaction<'static> {
    /// Opens the outer transaction of the current thread.
    ///
    /// # Panics
    ///
    /// Panics if an outer transaction is already open on this thread. Use
    /// [`open_nested`](Transaction::open_nested) on the open transaction, or
    /// [`try_open_outer`](Transaction::try_open_outer) to handle the error.
    #[must_use]
    pub fn open_outer() -> Self {
        match Self::try_open_outer() {
            Ok(transaction) => transaction,
            Err(err) => panic!("{err}"),
        }
    }

    /// Opens the outer transaction of the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::OuterAlreadyOpen`] if an outer transaction is
    /// already open on this thread.
    pub fn try_open_outer() -> Result<Self, TransactionError> {
        if OUTER_OPEN.with(Cell::get) {
            return Err(TransactionError::OuterAlreadyOpen);
        }
        OUTER_OPEN.with(|open| open.set(true));

        let id = TransactionId(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(%id, "opened outer transaction");

        Ok(Self {
            journal: Rc::new(RefCell::new(Journal {
                id,
                frames: vec![Frame::default()],
                outer_close_callbacks: Vec::new(),
            })),
            depth: 0,
            closed: false,
            _parent: PhantomData,
        })
    }
}

impl<'p> Transaction<'p> {
    /// Opens a nested transaction of `parent`, or an outer transaction if
    /// `parent` is `None`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is `None` and an outer transaction is already open.
    #[must_use]
    pub fn open<'a>(parent: Option<&'a mut Transaction<'_>>) -> Transaction<'a> {
        match parent {
            Some(parent) => parent.open_nested(),
            None => Transaction::open_outer(),
        }
    }

    /// Returns `true` if an outer transaction is open on the current thread.
    #[must_use]
    pub fn is_open() -> bool {
        OUTER_OPEN.with(Cell::get)
    }

    /// Opens a nested scope.
    ///
    /// Mutations made in the nested scope are undone if it aborts, and handed
    /// to `self` if it commits.
    #[must_use]
    pub fn open_nested(&mut self) -> Transaction<'_> {
        let depth = self.depth + 1;
        {
            let mut journal = self.journal.borrow_mut();
            debug_assert_eq!(journal.frames.len(), depth, "only the innermost scope may nest");
            journal.frames.push(Frame::default());
            tracing::trace!(id = %journal.id, depth, "opened nested transaction");
        }

        Transaction {
            journal: Rc::clone(&self.journal),
            depth,
            closed: false,
            _parent: PhantomData,
        }
    }

    /// Returns the nesting depth of this scope. The outer scope has depth 0.
    #[must_use]
    pub fn nesting_depth(&self) -> usize {
        self.depth
    }

    /// Returns the id of the outermost scope of this chain.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.journal.borrow().id
    }

    /// Registers a callback invoked when this scope closes.
    ///
    /// Callbacks run in registration order and receive a [`CloseContext`]
    /// describing the closing scope.
    pub fn add_close_callback<F>(&self, callback: F)
    where
        F: FnOnce(&CloseContext, TransactionResult) + 'static,
    {
        self.journal
            .borrow_mut()
            .push_close_callback(self.depth, Box::new(callback));
    }

    /// Registers a callback invoked after the outermost scope has closed.
    pub fn add_outer_close_callback<F>(&self, callback: F)
    where
        F: FnOnce(TransactionResult) + 'static,
    {
        self.journal
            .borrow_mut()
            .outer_close_callbacks
            .push(Box::new(callback));
    }

    /// Commits this scope.
    pub fn commit(mut self) {
        self.close(TransactionResult::Committed);
    }

    /// Aborts this scope, undoing every mutation made since it was opened.
    pub fn abort(mut self) {
        self.close(TransactionResult::Aborted);
    }

    fn close(&mut self, result: TransactionResult) {
        self.closed = true;

        let (id, callbacks) = {
            let mut journal = self.journal.borrow_mut();
            debug_assert_eq!(
                journal.frames.len(),
                self.depth + 1,
                "only the innermost scope may close"
            );
            let callbacks = journal
                .frames
                .last_mut()
                .map(|frame| core::mem::take(&mut frame.close_callbacks))
                .unwrap_or_default();
            (journal.id, callbacks)
        };

        tracing::trace!(
            %id,
            depth = self.depth,
            ?result,
            callbacks = callbacks.len(),
            "closing transaction"
        );

        let context = CloseContext {
            journal: Rc::clone(&self.journal),
            depth: self.depth,
        };
        for callback in callbacks {
            callback(&context, result);
        }

        self.journal.borrow_mut().frames.pop();

        if self.depth == 0 {
            OUTER_OPEN.with(|open| open.set(false));
            let outer_callbacks =
                core::mem::take(&mut self.journal.borrow_mut().outer_close_callbacks);
            for callback in outer_callbacks {
                callback(result);
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.close(TransactionResult::Aborted);
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id())
            .field("depth", &self.depth)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CloseContext
// ─────────────────────────────────────────────────────────────────────────────

/// View of a scope while its close callbacks run.
///
/// A closing scope can no longer be mutated, but its callbacks may hand work
/// over to the enclosing scope or to the end of the outer transaction.
pub struct CloseContext {
    journal: Rc<RefCell<Journal>>,
    depth: usize,
}

impl CloseContext {
    /// Returns the nesting depth of the closing scope.
    #[must_use]
    pub fn nesting_depth(&self) -> usize {
        self.depth
    }

    /// Returns the id of the outermost scope of this chain.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.journal.borrow().id
    }

    /// Registers a callback on the enclosing scope.
    ///
    /// # Panics
    ///
    /// Panics if the closing scope is the outer scope.
    pub fn add_parent_close_callback<F>(&self, callback: F)
    where
        F: FnOnce(&CloseContext, TransactionResult) + 'static,
    {
        assert!(self.depth > 0, "the outer transaction has no parent scope");
        self.journal
            .borrow_mut()
            .push_close_callback(self.depth - 1, Box::new(callback));
    }

    /// Registers a callback invoked after the outermost scope has closed.
    pub fn add_outer_close_callback<F>(&self, callback: F)
    where
        F: FnOnce(TransactionResult) + 'static,
    {
        self.journal
            .borrow_mut()
            .outer_close_callbacks
            .push(Box::new(callback));
    }
}

impl fmt::Debug for CloseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseContext")
            .field("id", &self.id())
            .field("depth", &self.depth)
            .finish()
    }
}
