//! Sessions: auto-commit `run`, explicit transactions via `begin`, and retrying managed
//! transactions via `execute_read`/`execute_write` (spec.md §4.6).

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// The future shape a managed-transaction closure must return: boxed and bound to the
/// borrowed `&mut Transaction`'s own lifetime, since a plain generic `Fut: Future` can't express
/// "the future may borrow from its argument" (there's no single concrete `Fut` type that would
/// work for every call otherwise — see `execute_managed`'s `for<'tx>` bound).
pub type TransactionFuture<'tx, T> = Pin<Box<dyn Future<Output = BoltResult<T>> + Send + 'tx>>;

use rand::Rng;
use tokio::time::sleep;

use crate::error::{BoltError, BoltResult};
use crate::message::{begin_extra, Message};
use crate::packstream::{Dict, Value};
use crate::pool::Pool;
use crate::result::{Completion, ResultStream};
use crate::transaction::{force_close, Transaction, TransactionConfig, TransactionHandle};

/// Which half of the cluster a session's work should be routed to. The core has no cluster
/// routing table (out of scope per spec.md §1); this only shapes the BEGIN/RUN `mode` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl Default for AccessMode {
    fn default() -> Self {
        Self::Write
    }
}

/// Session-scoped defaults (spec.md §4.6).
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub database: Option<String>,
    pub access_mode: AccessMode,
    pub initial_bookmarks: Vec<String>,
}

/// How long `execute_read`/`execute_write` keep retrying a Transient failure before giving up
/// (spec.md §4.6 "added" retry policy).
pub const MAX_TRANSACTION_RETRY_TIME: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_millis(250);
const RETRY_JITTER: Duration = Duration::from_millis(100);

/// `RETRY_DELAY` plus a random jitter, so concurrently retrying sessions don't all wake and
/// re-`BEGIN` on the same tick after a shared Transient failure (e.g. a leader election).
fn jittered_retry_delay() -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..RETRY_JITTER.as_millis() as u64);
    RETRY_DELAY + Duration::from_millis(jitter_ms)
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

fn extract_keys(metadata: &Dict) -> Vec<String> {
    metadata
        .get("fields")
        .and_then(Value::as_list)
        .map(|fields| fields.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Serializes a caller's operations onto a single borrowed connection at a time and tracks the
/// last commit bookmark for causal consistency (spec.md §4.6).
///
/// A `Session` is not `Sync`-safe to use concurrently from multiple tasks by design — spec.md §5
/// states plainly that "operations on the same session must be serialized by the user"; taking
/// every mutating method as `&mut self` lets the borrow checker hold callers to that contract
/// instead of only documenting it.
pub struct Session {
    pool: Pool,
    config: SessionConfig,
    bookmarks: Vec<String>,
    closed: bool,
    /// The most recently `begin`'d transaction's handle, kept so `close` can force it closed if
    /// the caller never called `commit`/`rollback` (spec.md §4.6). Left in place once that
    /// transaction finishes on its own — `TransactionHandle`'s claim flag makes a stale handle's
    /// force-close a no-op, so there's nothing to gain by clearing it early.
    open_transaction: Option<TransactionHandle>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.config.database)
            .field("access_mode", &self.config.access_mode)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(pool: Pool, config: SessionConfig) -> Self {
        let bookmarks = config.initial_bookmarks.clone();
        Self {
            pool,
            config,
            bookmarks,
            closed: false,
            open_transaction: None,
        }
    }

    #[must_use]
    pub fn bookmarks(&self) -> &[String] {
        &self.bookmarks
    }

    fn ensure_open(&self) -> BoltResult<()> {
        if self.closed {
            Err(BoltError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Runs `query` in auto-commit mode: acquires a connection, sends RUN then the caller drives
    /// PULL by consuming the returned stream, which releases the connection on completion
    /// (spec.md §4.6).
    pub async fn run(&mut self, query: impl Into<String>, parameters: Dict) -> BoltResult<ResultStream> {
        self.ensure_open()?;
        let conn = self.pool.acquire().await?;
        let extra = begin_extra(
            &self.bookmarks,
            None,
            None,
            self.config.access_mode == AccessMode::Write,
            self.config.database.as_deref(),
        );
        let query = query.into();
        let keys = {
            let mut core = conn.lock().await;
            core.send(Message::Run { query, parameters, extra }).await?;
            let resp = core.receive().await?;
            drop(core);
            match resp.terminal {
                Message::Success { metadata } => extract_keys(&metadata),
                Message::Failure { metadata } => {
                    self.pool.release(conn).await;
                    return Err(failure_to_error(&metadata));
                }
                other => {
                    self.pool.release(conn).await;
                    return Err(BoltError::protocol(format!("expected SUCCESS or FAILURE for RUN, got {other:?}")));
                }
            }
        };
        Ok(ResultStream::new(conn, Completion::ReleaseToPool(self.pool.clone()), keys))
    }

    /// Begins an explicit transaction (spec.md §4.6).
    pub async fn begin(&mut self, config: Option<TransactionConfig>) -> BoltResult<Transaction> {
        self.ensure_open()?;
        let config = config.unwrap_or_default();
        let conn = self.pool.acquire().await?;
        let extra = begin_extra(
            &self.bookmarks,
            config.timeout,
            config.metadata.clone(),
            self.config.access_mode == AccessMode::Write,
            self.config.database.as_deref(),
        );
        {
            let mut core = conn.lock().await;
            core.send(Message::Begin { extra }).await?;
            let resp = core.receive().await?;
            drop(core);
            match resp.terminal {
                Message::Success { .. } => {}
                Message::Failure { metadata } => {
                    self.pool.release(conn).await;
                    return Err(failure_to_error(&metadata));
                }
                other => {
                    self.pool.release(conn).await;
                    return Err(BoltError::protocol(format!("expected SUCCESS or FAILURE for BEGIN, got {other:?}")));
                }
            }
        }
        let (tx, handle) = Transaction::new(conn, self.pool.clone());
        self.open_transaction = Some(handle);
        Ok(tx)
    }

    /// Runs `work` inside a retried write transaction, committing on `Ok` and rolling back on
    /// `Err`, retrying the whole closure on Transient failures up to
    /// [`MAX_TRANSACTION_RETRY_TIME`] (spec.md §4.6).
    pub async fn execute_write<F, T>(&mut self, work: F) -> BoltResult<T>
    where
        F: for<'tx> Fn(&'tx mut Transaction) -> TransactionFuture<'tx, T>,
    {
        self.execute_managed(AccessMode::Write, work).await
    }

    /// As [`Self::execute_write`], but begins a read-mode transaction.
    pub async fn execute_read<F, T>(&mut self, work: F) -> BoltResult<T>
    where
        F: for<'tx> Fn(&'tx mut Transaction) -> TransactionFuture<'tx, T>,
    {
        self.execute_managed(AccessMode::Read, work).await
    }

    async fn execute_managed<F, T>(&mut self, mode: AccessMode, work: F) -> BoltResult<T>
    where
        F: for<'tx> Fn(&'tx mut Transaction) -> TransactionFuture<'tx, T>,
    {
        self.ensure_open()?;
        let deadline = Instant::now() + MAX_TRANSACTION_RETRY_TIME;
        loop {
            let saved_mode = self.config.access_mode;
            self.config.access_mode = mode;
            let begun = self.begin(None).await;
            self.config.access_mode = saved_mode;
            let mut tx = begun?;

            match work(&mut tx).await {
                Ok(value) => match tx.commit().await {
                    Ok(bookmark) => {
                        if let Some(b) = bookmark {
                            self.bookmarks.push(b);
                        }
                        return Ok(value);
                    }
                    Err(e) if e.is_transient() && Instant::now() < deadline => {
                        sleep(jittered_retry_delay()).await;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                Err(e) => {
                    let _ = tx.rollback().await;
                    if e.is_transient() && Instant::now() < deadline {
                        sleep(jittered_retry_delay()).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Closes the session: an auto-commit `run` already released its connection by the time it
    /// completes, so the only outstanding state to close here is a `begin`'d transaction the
    /// caller never committed or rolled back. Per spec.md §4.6 ("Session closure closes any open
    /// transaction (rollback) and returns the connection"), that transaction is rolled back and
    /// its connection released before this returns — a no-op if it already finished on its own.
    pub async fn close(mut self) {
        self.closed = true;
        if let Some(handle) = self.open_transaction.take() {
            force_close(handle).await;
        }
    }
}
