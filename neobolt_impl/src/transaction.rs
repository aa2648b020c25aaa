//! Explicit transactions (spec.md §4.6): `Active` → (`MarkedForRollback`) → `Closed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::conn::ConnectionState;
use crate::error::{BoltError, BoltResult};
use crate::message::Message;
use crate::packstream::{Dict, Value};
use crate::pool::{Pool, PooledConnection};
use crate::result::{Completion, ResultStream};

/// Extra BEGIN parameters a caller may supply (spec.md §4.6).
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    pub timeout: Option<Duration>,
    pub metadata: Option<Dict>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    MarkedForRollback,
    Closed,
}

fn failure_to_error(metadata: &Dict) -> BoltError {
    let code = metadata
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("Neo.DatabaseError.General.UnknownError")
        .to_owned();
    let message = metadata
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_owned();
    BoltError::from_server_failure(code, message)
}

/// The connection/pool a `Transaction` holds, plus the flag that makes "roll it back and release
/// the connection" an operation that runs exactly once however it's triggered: `commit`,
/// `rollback`, `Drop`, or [`force_close`] reaching it first from [`crate::session::Session::close`].
struct TxShared {
    conn: PooledConnection,
    pool: Pool,
    claimed: AtomicBool,
}

impl TxShared {
    /// Tries to become the one caller responsible for finishing this transaction. Returns `true`
    /// exactly once across every `Transaction`/`TransactionHandle` pointing at this `TxShared`.
    fn claim(&self) -> bool {
        self.claimed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }
}

/// ROLLBACK (or RESET, if the connection already failed) and release, used by both
/// [`Transaction`]'s `Drop` and [`force_close`] — the only difference between those two callers is
/// how the resulting future is driven, not what it does.
async fn rollback_and_release(shared: Arc<TxShared>) {
    {
        let mut core = shared.conn.lock().await;
        match core.state() {
            ConnectionState::Failed => {
                let _ = core.reset().await;
            }
            ConnectionState::TxReady | ConnectionState::TxStreaming => {
                if core.send(Message::Rollback).await.is_ok() {
                    let _ = core.receive().await;
                }
            }
            _ => {}
        }
    }
    shared.pool.release(shared.conn.clone()).await;
}

/// A reference to an open [`Transaction`]'s connection, kept by the [`crate::session::Session`]
/// that created it so [`force_close`] can roll it back if the session is closed while the
/// transaction is still live (spec.md §4.6: "Session closure closes any open transaction
/// (rollback) and returns the connection"). Harmless to hold past the transaction's own
/// commit/rollback/drop — `TxShared::claimed` makes a stale handle's `force_close` a no-op.
pub(crate) struct TransactionHandle {
    shared: Arc<TxShared>,
}

/// Rolls back and releases `handle`'s transaction unless it already finished by some other path.
/// Called by [`crate::session::Session::close`].
pub(crate) async fn force_close(handle: TransactionHandle) {
    if handle.shared.claim() {
        rollback_and_release(handle.shared).await;
    }
}

/// An explicit, BEGIN'd transaction holding exclusive use of one pooled connection until it
/// commits or rolls back.
pub struct Transaction {
    shared: Arc<TxShared>,
    state: TxState,
    failure_marker: Arc<AtomicBool>,
    bookmark: Option<String>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").field("state", &self.state).finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) fn new(conn: PooledConnection, pool: Pool) -> (Self, TransactionHandle) {
        let shared = Arc::new(TxShared {
            conn,
            pool,
            claimed: AtomicBool::new(false),
        });
        let handle = TransactionHandle {
            shared: Arc::clone(&shared),
        };
        let tx = Self {
            shared,
            state: TxState::Active,
            failure_marker: Arc::new(AtomicBool::new(false)),
            bookmark: None,
        };
        (tx, handle)
    }

    /// Refreshes `self.state` from the shared failure flag a spawned [`ResultStream`] may have
    /// set after a PULL FAILURE (spec.md §4.6: "any error during `tx.run` moves the transaction
    /// to `MarkedForRollback`").
    fn sync_state(&mut self) {
        if self.state == TxState::Active && self.failure_marker.load(Ordering::Relaxed) {
            self.state = TxState::MarkedForRollback;
        }
    }

    fn require_active(&mut self) -> BoltResult<()> {
        self.sync_state();
        match self.state {
            TxState::Active => Ok(()),
            TxState::MarkedForRollback => Err(BoltError::TransactionMarkedForRollback),
            TxState::Closed => Err(BoltError::SessionClosed),
        }
    }

    /// Sends RUN then returns a [`ResultStream`] bound to this transaction's connection. Any
    /// FAILURE surfacing while that stream is later pulled marks this transaction for rollback.
    pub async fn run(&mut self, query: impl Into<String>, parameters: Dict) -> BoltResult<ResultStream> {
        self.require_active()?;
        let query = query.into();
        let result = {
            let mut core = self.shared.conn.lock().await;
            core.send(Message::Run {
                query,
                parameters,
                extra: Dict::new(),
            })
            .await?;
            let resp = core.receive().await?;
            drop(core);
            match resp.terminal {
                Message::Success { metadata } => {
                    let keys = metadata
                        .get("fields")
                        .and_then(Value::as_list)
                        .map(|fields| fields.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                        .unwrap_or_default();
                    Ok(keys)
                }
                Message::Failure { metadata } => Err(failure_to_error(&metadata)),
                other => Err(BoltError::protocol(format!("expected SUCCESS or FAILURE for RUN, got {other:?}"))),
            }
        };
        match result {
            Ok(keys) => Ok(
                ResultStream::new(self.shared.conn.clone(), Completion::BorrowedByTransaction, keys)
                    .with_failure_marker(Arc::clone(&self.failure_marker)),
            ),
            Err(e) => {
                self.state = TxState::MarkedForRollback;
                Err(e)
            }
        }
    }

    /// Sends COMMIT, extracts the resulting bookmark, releases the connection, and returns the
    /// bookmark (spec.md §4.6 — "append it to the session's bookmark list" happens at the
    /// [`crate::session::Session`] layer using this return value).
    ///
    /// If a network error aborts the exchange with `?` before reaching the cleanup below, `state`
    /// is left `Active` and the connection is neither released nor claimed — this transaction's
    /// own `Drop` picks it up from there, same as any other unfinished transaction.
    pub async fn commit(&mut self) -> BoltResult<Option<String>> {
        self.sync_state();
        if self.state == TxState::MarkedForRollback {
            return Err(BoltError::TransactionMarkedForRollback);
        }
        if self.state == TxState::Closed {
            return Err(BoltError::SessionClosed);
        }
        let outcome = {
            let mut core = self.shared.conn.lock().await;
            core.send(Message::Commit).await?;
            let resp = core.receive().await?;
            drop(core);
            match resp.terminal {
                Message::Success { metadata } => Ok(metadata.get("bookmark").and_then(Value::as_str).map(str::to_owned)),
                Message::Failure { metadata } => Err(failure_to_error(&metadata)),
                other => Err(BoltError::protocol(format!("expected SUCCESS or FAILURE for COMMIT, got {other:?}"))),
            }
        };
        self.state = TxState::Closed;
        // If `Session::close` already force-closed this transaction concurrently, it already
        // released the connection — don't release it twice.
        if self.shared.claim() {
            self.shared.pool.release(self.shared.conn.clone()).await;
        }
        let bookmark = outcome?;
        self.bookmark = bookmark.clone();
        Ok(bookmark)
    }

    /// Rolls the transaction back and releases the connection. Works from `Active` or
    /// `MarkedForRollback`.
    ///
    /// A prior FAILURE on this connection leaves it in `Failed`, where ROLLBACK is not a legal
    /// message (spec.md §4.4's state table allows only RESET/GOODBYE there) — the server already
    /// discarded the transaction when it emitted the FAILURE, so recovery is RESET, not ROLLBACK.
    pub async fn rollback(&mut self) -> BoltResult<()> {
        if self.state == TxState::Closed {
            return Err(BoltError::SessionClosed);
        }
        let outcome = {
            let mut core = self.shared.conn.lock().await;
            if core.state() == ConnectionState::Failed {
                core.reset().await
            } else {
                core.send(Message::Rollback).await?;
                let resp = core.receive().await?;
                match resp.terminal {
                    Message::Success { .. } => Ok(()),
                    Message::Failure { metadata } => Err(failure_to_error(&metadata)),
                    other => Err(BoltError::protocol(format!("expected SUCCESS or FAILURE for ROLLBACK, got {other:?}"))),
                }
            }
        };
        self.state = TxState::Closed;
        if self.shared.claim() {
            self.shared.pool.release(self.shared.conn.clone()).await;
        }
        outcome
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }
}

/// Best-effort cleanup for a transaction dropped without `commit()`/`rollback()` (e.g. an early
/// `?` return past a `session.begin()`), mirroring [`crate::result::ResultStream`]'s Drop but
/// going one step further: a transaction's connection is never released anywhere else on the
/// happy path, so simply abandoning it here (as `ResultStream` abandons an unfinished stream)
/// would leak one slot of `crate::pool::Pool`'s capacity forever, not just this one connection.
///
/// When a Tokio runtime is reachable (the ordinary case — this driver is async-native, and the
/// blocking facade's `Transaction<'a>` only ever holds this type from inside its own dedicated
/// runtime or a borrow of one that does), a task is spawned to ROLLBACK (or RESET, if the
/// connection already failed) and hand the connection back to `release`. With no runtime
/// reachable at all, there's no way to drive the socket, so the connection is simply dropped and
/// `Pool`'s bookkeeping is corrected synchronously instead, so `total_connections` doesn't lose a
/// slot permanently.
impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TxState::Closed {
            return;
        }
        if !self.shared.claim() {
            // `Session::close` (or a concurrently-racing commit/rollback) already claimed this
            // transaction and is finishing it; nothing left for us to do.
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(&self.shared);
                handle.spawn(rollback_and_release(shared));
            }
            Err(_) => {
                warn!("transaction dropped without commit/rollback and no runtime is reachable to roll it back; abandoning its connection");
                self.shared.pool.abandon(self.shared.conn.clone());
            }
        }
    }
}
