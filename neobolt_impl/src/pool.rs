//! The bounded connection pool (spec.md §4.5): acquire/release with FIFO waiter queueing, idle
//! eviction, and background minimum-size maintenance.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::conn::{AuthToken, ConnectionAddr, ConnectionConfiguration, ConnectionCore, ConnectionState};
use crate::error::{BoltError, BoltResult, PoolError};
use crate::packstream::Registry;

/// A connection loaned out of the pool to at most one caller at a time (spec.md §3's
/// "Pooled connection").
pub type PooledConnection = Arc<Mutex<ConnectionCore>>;

/// Pool sizing and timeout knobs, per spec.md §4.5.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: usize,
    pub min_size: usize,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub max_idle_time: Duration,
    /// How often the idle-eviction sweep runs; not part of spec.md's named fields, but needed
    /// to drive §4.5's periodic task.
    pub eviction_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            min_size: 0,
            connect_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(60),
            max_idle_time: Duration::from_secs(3600),
            eviction_interval: Duration::from_secs(60),
        }
    }
}

struct State {
    idle: VecDeque<PooledConnection>,
    total: usize,
    closed: bool,
    /// Callers currently parked in [`Pool::acquire`]'s wait branch, incremented/decremented
    /// around the `notified().await` below (spec.md §4.5 "added" statistics).
    waiters: usize,
}

struct Shared {
    addr: ConnectionAddr,
    auth: AuthToken,
    conn_config: ConnectionConfiguration,
    pool_config: PoolConfig,
    registry: Registry,
    state: Mutex<State>,
    notify: Notify,
    maintenance: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.maintenance.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// A bounded pool of Bolt connections to one address.
///
/// Cheaply `Clone`able: every clone shares the same connection set, so handing one out to a
/// [`crate::session::Session`] or [`crate::transaction::Transaction`] doesn't copy any state. The
/// background maintenance task is aborted once the last clone is dropped.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("addr", &self.shared.addr).finish_non_exhaustive()
    }
}

/// A snapshot of the pool's occupancy, mirroring [`crate::conn::ConnectionStatistics`]'s
/// snapshot pattern for a single connection (spec.md §4.5 "Statistics").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatistics {
    pub total_connections: usize,
    pub idle_connections: usize,
    pub waiters_queued: usize,
}

impl Pool {
    /// Creates a pool and starts its background idle-eviction / min-size-maintenance task.
    ///
    /// Per spec.md §4.1/§5, the structure registry must be fully populated before the first
    /// connection opens; this uses [`Registry::global`], so any custom structures should be
    /// registered before calling this.
    #[must_use]
    pub fn new(addr: ConnectionAddr, auth: AuthToken, conn_config: ConnectionConfiguration, pool_config: PoolConfig) -> Self {
        let shared = Arc::new(Shared {
            addr,
            auth,
            conn_config,
            pool_config,
            registry: Registry::global().clone(),
            state: Mutex::new(State {
                idle: VecDeque::new(),
                total: 0,
                closed: false,
                waiters: 0,
            }),
            notify: Notify::new(),
            maintenance: std::sync::Mutex::new(None),
        });
        let maintenance = tokio::spawn(Self::maintenance_loop(Arc::clone(&shared)));
        *shared.maintenance.lock().expect("maintenance lock poisoned") = Some(maintenance);
        Self { shared }
    }

    /// Opens a [`crate::session::Session`] against this pool (spec.md §4.6).
    #[must_use]
    pub fn session(&self, config: crate::session::SessionConfig) -> crate::session::Session {
        crate::session::Session::new(self.clone(), config)
    }

    async fn maintenance_loop(shared: Arc<Shared>) {
        let mut ticker = interval(shared.pool_config.eviction_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if Self::evict_idle_once(&shared).await {
                return;
            }
            Self::maintain_min_size(&shared).await;
        }
    }

    /// Closes idle connections that have exceeded `max_idle_time`, provided `total > min_size`.
    /// Returns `true` if the pool was found closed (signalling the maintenance loop to exit).
    async fn evict_idle_once(shared: &Arc<Shared>) -> bool {
        let mut to_close = Vec::new();
        {
            let mut state = shared.state.lock().await;
            if state.closed {
                return true;
            }
            let mut keep = VecDeque::with_capacity(state.idle.len());
            while let Some(conn) = state.idle.pop_front() {
                let expired = {
                    let core = conn.lock().await;
                    core.idle_for() >= shared.pool_config.max_idle_time
                };
                if expired && state.total > shared.pool_config.min_size {
                    state.total -= 1;
                    to_close.push(conn);
                } else {
                    keep.push_back(conn);
                }
            }
            state.idle = keep;
        }
        for conn in to_close {
            conn.lock().await.close().await;
        }
        false
    }

    async fn maintain_min_size(shared: &Arc<Shared>) {
        let deficit = {
            let mut state = shared.state.lock().await;
            if state.closed {
                return;
            }
            let deficit = shared.pool_config.min_size.saturating_sub(state.total);
            state.total += deficit;
            deficit
        };
        for _ in 0..deficit {
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                match Self::open_connection(&shared).await {
                    Ok(conn) => {
                        let mut state = shared.state.lock().await;
                        if state.closed {
                            drop(state);
                            conn.lock().await.close().await;
                        } else {
                            state.idle.push_back(conn);
                            drop(state);
                            shared.notify.notify_one();
                        }
                    }
                    Err(e) => {
                        warn!("background min-size connection creation failed: {e}");
                        let mut state = shared.state.lock().await;
                        state.total -= 1;
                    }
                }
            });
        }
    }

    async fn open_connection(shared: &Arc<Shared>) -> BoltResult<PooledConnection> {
        let mut core = ConnectionCore::connect(&shared.addr, &shared.conn_config, shared.registry.clone()).await?;
        core.authenticate(&shared.auth).await?;
        Ok(Arc::new(Mutex::new(core)))
    }

    /// Acquires a connection per spec.md §4.5's three-step algorithm: reuse an idle one,
    /// else create one (if under `max_size`), else queue and wait up to `acquire_timeout`.
    pub async fn acquire(&self) -> BoltResult<PooledConnection> {
        let deadline = Instant::now() + self.shared.pool_config.acquire_timeout;
        loop {
            let notified = {
                let mut state = self.shared.state.lock().await;
                if state.closed {
                    return Err(PoolError::Closed.into());
                }

                while let Some(candidate) = state.idle.pop_front() {
                    let healthy = {
                        let mut core = candidate.lock().await;
                        match core.ensure_ready().await {
                            Ok(()) => core.is_reusable(),
                            Err(_) => false,
                        }
                    };
                    if healthy {
                        return Ok(candidate);
                    }
                    state.total -= 1;
                }

                if state.total < self.shared.pool_config.max_size {
                    state.total += 1;
                    drop(state);
                    match self.create_connection().await {
                        Ok(conn) => return Ok(conn),
                        Err(e) => {
                            let mut state = self.shared.state.lock().await;
                            state.total -= 1;
                            if state.total == 0 {
                                // No other connections exist to eventually serve a waiter, so
                                // surfacing this error immediately is the only option (spec.md
                                // §4.5 step 2).
                                return Err(e);
                            }
                            // Other connections are alive; queue behind them instead of failing
                            // this acquire outright.
                            state.waiters += 1;
                            self.shared.notify.notified()
                        }
                    }
                } else {
                    // Registering the `Notified` future while still holding `state`'s lock pairs
                    // with `release`'s `notify_one` (also taken under the same lock), so a release
                    // that happens between here and the `.await` below is never missed.
                    state.waiters += 1;
                    self.shared.notify.notified()
                }
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            let timed_out = remaining.is_zero() || timeout(remaining, notified).await.is_err();
            self.shared.state.lock().await.waiters -= 1;
            if timed_out {
                return Err(PoolError::AcquireTimeout(self.shared.pool_config.acquire_timeout).into());
            }
        }
    }

    async fn create_connection(&self) -> BoltResult<PooledConnection> {
        Self::open_connection(&self.shared).await
    }

    /// Returns a loaned connection to the pool, or hands it straight to a waiter (spec.md §4.5).
    ///
    /// A `Defunct` connection is discarded and closed; a `Failed` one is discarded too — repair
    /// is left to whichever later `acquire` call creates a replacement, per spec.md §4.5. (The
    /// RESET that recovers a `Failed` connection happens one layer up, on the *session's* next
    /// use of a connection it still holds across a transaction — see `crate::transaction`.)
    pub async fn release(&self, conn: PooledConnection) {
        let mut state = self.shared.state.lock().await;
        if state.closed {
            state.total -= 1;
            drop(state);
            conn.lock().await.close().await;
            self.shared.notify.notify_one();
            return;
        }

        let discard = {
            let core = conn.lock().await;
            matches!(core.state(), ConnectionState::Defunct | ConnectionState::Failed)
        };

        if discard {
            state.total -= 1;
            drop(state);
            conn.lock().await.close().await;
        } else {
            state.idle.push_back(conn);
            drop(state);
        }
        self.shared.notify.notify_one();
        Self::maintain_min_size(&self.shared).await;
    }

    /// Marks the pool closed, fails all waiters, and closes every connection concurrently
    /// (spec.md §4.5).
    pub async fn shutdown(&self) {
        let idle = {
            let mut state = self.shared.state.lock().await;
            state.closed = true;
            state.idle.drain(..).collect::<Vec<_>>()
        };
        if let Some(handle) = self.shared.maintenance.lock().expect("maintenance lock poisoned").as_ref() {
            handle.abort();
        }
        self.shared.notify.notify_waiters();

        let handles: Vec<_> = idle
            .into_iter()
            .map(|conn| tokio::spawn(async move { conn.lock().await.close().await }))
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    #[must_use]
    pub fn address(&self) -> &ConnectionAddr {
        &self.shared.addr
    }

    pub async fn statistics(&self) -> PoolStatistics {
        let state = self.shared.state.lock().await;
        PoolStatistics {
            total_connections: state.total,
            idle_connections: state.idle.len(),
            waiters_queued: state.waiters,
        }
    }

    /// Synchronously corrects `total_connections` bookkeeping for a connection that can't be
    /// routed through the ordinary async [`Self::release`] — used by [`crate::transaction::Transaction`]'s
    /// `Drop` when dropped outside any reachable Tokio runtime. `state`'s lock is a
    /// [`tokio::sync::Mutex`], whose `try_lock` works from plain synchronous code, unlike
    /// `.lock().await`. The connection itself is simply dropped; closing its socket doesn't need
    /// a runtime the way sending Bolt messages over it would.
    pub(crate) fn abandon(&self, conn: PooledConnection) {
        drop(conn);
        match self.shared.state.try_lock() {
            Ok(mut state) => {
                state.total = state.total.saturating_sub(1);
                drop(state);
                self.shared.notify.notify_one();
            }
            Err(_) => {
                warn!("pool state contended while abandoning a dropped transaction's connection; total_connections may over-count until the next eviction sweep");
            }
        }
    }
}
