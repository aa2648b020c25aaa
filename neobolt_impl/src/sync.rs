//! Blocking facade over the `tokio`-native engine (spec.md §1's "added" crate-shape note): owns
//! a small dedicated multi-thread runtime and blocks on it per call, the same shape the
//! teacher's `hdbconnect` sync crate uses over its impl crate's async engine.

use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

pub use crate::conn::{AuthToken, ConnectionAddr, ConnectionConfiguration, ConnectionStatistics, Encryption};
pub use crate::error::{BoltError, DatabaseErrorKind};
use crate::error::BoltResult;
pub use crate::graph::{
    Date, DateTime, DateTimeZoneId, Duration as TemporalDuration, LocalDateTime, LocalTime, Node,
    Path, Point2D, Point3D, Relationship, Time, UnboundRelationship,
};
pub use crate::packstream::{Dict, Registry, Structure, Value};
use crate::pool::Pool as EnginePool;
pub use crate::pool::PoolConfig;
pub use crate::pool::PoolStatistics;
pub use crate::result::{Record, Summary};
use crate::result::ResultStream as EngineResultStream;
pub use crate::session::AccessMode;
use crate::session::{Session as EngineSession, SessionConfig, TransactionFuture};
use crate::transaction::Transaction as EngineTransaction;
pub use crate::transaction::TransactionConfig;

fn new_runtime() -> std::io::Result<Runtime> {
    Builder::new_multi_thread().worker_threads(2).enable_all().build()
}

/// A bounded pool of blocking-facade connections. Mirrors [`crate::pool::Pool`] one for one;
/// see its documentation for acquire/release/eviction semantics.
pub struct Pool {
    runtime: Arc<Runtime>,
    inner: EnginePool,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pool").field(&self.inner).finish()
    }
}

impl Pool {
    /// Builds the dedicated runtime and the pool together. The runtime outlives every `Session`/
    /// `Transaction`/`ResultStream` this pool hands out, via a shared `Arc`.
    pub fn new(addr: ConnectionAddr, auth: AuthToken, conn_config: ConnectionConfiguration, pool_config: PoolConfig) -> BoltResult<Self> {
        let runtime = new_runtime().map_err(BoltError::connection)?;
        // `EnginePool::new` spawns its background maintenance task via `tokio::spawn`, which
        // panics unless a runtime context is entered; this dedicated runtime has never run a
        // future at this point, so we enter it explicitly rather than via `block_on`.
        let inner = {
            let _guard = runtime.enter();
            EnginePool::new(addr, auth, conn_config, pool_config)
        };
        Ok(Self {
            runtime: Arc::new(runtime),
            inner,
        })
    }

    #[must_use]
    pub fn address(&self) -> &ConnectionAddr {
        self.inner.address()
    }

    #[must_use]
    pub fn statistics(&self) -> PoolStatistics {
        self.runtime.block_on(self.inner.statistics())
    }

    pub fn shutdown(&self) {
        self.runtime.block_on(self.inner.shutdown());
    }

    #[must_use]
    pub fn session(&self, config: SessionConfig) -> Session {
        Session {
            runtime: Arc::clone(&self.runtime),
            inner: EngineSession::new(self.inner.clone(), config),
        }
    }
}

/// A session borrowed against the pool's dedicated runtime (spec.md §4.6).
pub struct Session {
    runtime: Arc<Runtime>,
    inner: EngineSession,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Session").field(&self.inner).finish()
    }
}

impl Session {
    #[must_use]
    pub fn bookmarks(&self) -> &[String] {
        self.inner.bookmarks()
    }

    pub fn run(&mut self, query: impl Into<String>, parameters: Dict) -> BoltResult<ResultStream> {
        let runtime = Arc::clone(&self.runtime);
        let stream = self.runtime.block_on(self.inner.run(query, parameters))?;
        Ok(ResultStream { runtime, inner: stream })
    }

    pub fn begin(&mut self, config: Option<TransactionConfig>) -> BoltResult<Transaction<'static>> {
        let runtime = Arc::clone(&self.runtime);
        let tx = self.runtime.block_on(self.inner.begin(config))?;
        Ok(Transaction::from_owned(runtime, tx))
    }

    /// Runs `work` inside a retried write transaction. Unlike the async engine's version, `work`
    /// is a plain blocking closure; the sync `Transaction` it's handed wraps calls back into the
    /// runtime via [`tokio::task::block_in_place`], which is why `Pool::new` asks for a
    /// multi-thread runtime rather than a single-threaded one.
    pub fn execute_write<F, T>(&mut self, work: F) -> BoltResult<T>
    where
        F: Fn(&mut Transaction<'_>) -> BoltResult<T>,
        T: Send + 'static,
    {
        let runtime = Arc::clone(&self.runtime);
        self.runtime.block_on(self.inner.execute_write(bridge(&runtime, &work)))
    }

    /// As [`Self::execute_write`], but begins a read-mode transaction.
    pub fn execute_read<F, T>(&mut self, work: F) -> BoltResult<T>
    where
        F: Fn(&mut Transaction<'_>) -> BoltResult<T>,
        T: Send + 'static,
    {
        let runtime = Arc::clone(&self.runtime);
        self.runtime.block_on(self.inner.execute_read(bridge(&runtime, &work)))
    }

    pub fn close(self) {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.close());
    }
}

/// Adapts a blocking `Fn(&mut Transaction) -> BoltResult<T>` into the
/// `for<'tx> Fn(&'tx mut EngineTransaction) -> TransactionFuture<'tx, T>` shape
/// `EngineSession::execute_write`/`execute_read` expect, running the blocking closure via
/// `block_in_place` so its own calls back into the runtime don't panic with a nested `block_on`.
/// The returned future never actually awaits anything — `work` already ran to completion
/// synchronously by the time it's constructed — so it carries no real borrow of `async_tx`.
fn bridge<'w, F, T>(runtime: &'w Arc<Runtime>, work: &'w F) -> impl for<'tx> Fn(&'tx mut EngineTransaction) -> TransactionFuture<'tx, T> + 'w
where
    F: Fn(&mut Transaction<'_>) -> BoltResult<T>,
    T: Send + 'static,
{
    move |async_tx: &mut EngineTransaction| {
        let mut wrapped = Transaction::from_borrowed(Arc::clone(runtime), async_tx);
        let result = tokio::task::block_in_place(|| work(&mut wrapped));
        Box::pin(future::ready(result)) as Pin<Box<dyn Future<Output = BoltResult<T>> + Send>>
    }
}

enum TxHandle<'a> {
    Owned(EngineTransaction),
    Borrowed(&'a mut EngineTransaction),
}

impl<'a> TxHandle<'a> {
    fn get_mut(&mut self) -> &mut EngineTransaction {
        match self {
            Self::Owned(t) => t,
            Self::Borrowed(t) => t,
        }
    }
}

/// A BEGIN'd transaction bound to the owning pool's dedicated runtime.
pub struct Transaction<'a> {
    runtime: Arc<Runtime>,
    handle: TxHandle<'a>,
}

impl Transaction<'static> {
    fn from_owned(runtime: Arc<Runtime>, inner: EngineTransaction) -> Self {
        Self {
            runtime,
            handle: TxHandle::Owned(inner),
        }
    }
}

impl<'a> Transaction<'a> {
    fn from_borrowed(runtime: Arc<Runtime>, inner: &'a mut EngineTransaction) -> Self {
        Self {
            runtime,
            handle: TxHandle::Borrowed(inner),
        }
    }

    pub fn run(&mut self, query: impl Into<String>, parameters: Dict) -> BoltResult<ResultStream> {
        let runtime = Arc::clone(&self.runtime);
        let stream = self.runtime.block_on(self.handle.get_mut().run(query, parameters))?;
        Ok(ResultStream { runtime, inner: stream })
    }

    pub fn commit(mut self) -> BoltResult<Option<String>> {
        self.runtime.block_on(self.handle.get_mut().commit())
    }

    pub fn rollback(mut self) -> BoltResult<()> {
        self.runtime.block_on(self.handle.get_mut().rollback())
    }

    #[must_use]
    pub fn is_active(&mut self) -> bool {
        self.handle.get_mut().is_active()
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}

/// A lazy or materialized record sequence bound to the owning pool's dedicated runtime.
pub struct ResultStream {
    runtime: Arc<Runtime>,
    inner: EngineResultStream,
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResultStream").field(&self.inner).finish()
    }
}

impl ResultStream {
    #[must_use]
    pub fn keys(&self) -> &[String] {
        self.inner.keys()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&Summary> {
        self.inner.summary()
    }

    pub fn next(&mut self) -> BoltResult<Option<Record>> {
        self.runtime.block_on(self.inner.next())
    }

    pub fn collect(self) -> BoltResult<(Vec<Record>, Summary)> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.collect())
    }

    pub fn single(self) -> BoltResult<Record> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.single())
    }

    pub fn first_or_none(self) -> BoltResult<Option<Record>> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.first_or_none())
    }

    pub fn close(self) -> BoltResult<Summary> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.close())
    }
}
