//! The result of a RUN: keys, a lazily-pulled record sequence, and a completion summary
//! (spec.md §4.7).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use debug_ignore::DebugIgnore;
use serde::{Deserialize, Serialize};

use crate::error::{BoltError, BoltResult};
use crate::message::{pull_extra, Message};
use crate::packstream::{Dict, Value};
use crate::pool::{Pool, PooledConnection};

/// One row of a [`ResultStream`], carrying a shared reference to the field names it was
/// produced with (spec.md §4.7's "Field-level accessors").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    keys: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Record {
    fn new(keys: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        Self { keys, values }
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[must_use]
    pub fn get_by_key(&self, key: &str) -> Option<&Value> {
        let index = self.keys.iter().position(|k| k == key)?;
        self.values.get(index)
    }
}

/// Completion metadata attached to a PULL's terminal SUCCESS (spec.md §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    metadata: Dict,
}

impl Summary {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// The bookmark COMMIT attaches to its SUCCESS, if this summary came from one.
    #[must_use]
    pub fn bookmark(&self) -> Option<&str> {
        self.metadata.get("bookmark").and_then(Value::as_str)
    }
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

/// What becomes of the stream's connection once it finishes (or is abandoned).
pub(crate) enum Completion {
    /// An auto-commit `session.run`: the connection returns to the pool on completion.
    ReleaseToPool(Pool),
    /// Inside an explicit transaction: the transaction itself keeps the connection.
    BorrowedByTransaction,
}

/// A lazy or materialized sequence of records keyed by field name (spec.md §3, §4.7).
///
/// Dropping a stream before it completes abandons its connection rather than returning it to
/// the pool — resolving spec.md §9 Open Question (b) in favor of the documented "safe choice".
pub struct ResultStream {
    conn: PooledConnection,
    completion: Completion,
    keys: Arc<Vec<String>>,
    /// Already-pulled rows awaiting consumption. Wrapped the way the teacher hides its LOB byte
    /// buffers from `Debug` (`debug_ignore::DebugIgnore`) — a backlog of records is just as
    /// unhelpful to print.
    buffered: DebugIgnore<VecDeque<Vec<Value>>>,
    summary: Option<Summary>,
    done: bool,
    /// Set when a FAILURE arrives for this stream's PULL, so an owning [`crate::transaction::Transaction`]
    /// can notice and move itself to `MarkedForRollback` even though the failure surfaced here,
    /// not from `tx.run` itself (spec.md §4.6).
    failure_marker: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("keys", &self.keys)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl ResultStream {
    pub(crate) fn new(conn: PooledConnection, completion: Completion, keys: Vec<String>) -> Self {
        Self {
            conn,
            completion,
            keys: Arc::new(keys),
            buffered: DebugIgnore::from(VecDeque::new()),
            summary: None,
            done: false,
            failure_marker: None,
        }
    }

    /// Attaches a shared flag that gets set if this stream's PULL ends in FAILURE, so a
    /// transaction holding the same flag can move itself to `MarkedForRollback`.
    pub(crate) fn with_failure_marker(mut self, marker: Arc<AtomicBool>) -> Self {
        self.failure_marker = Some(marker);
        self
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The completion summary, available once the stream has fully drained.
    #[must_use]
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    async fn pull_more(&mut self) -> BoltResult<()> {
        let mut core = self.conn.lock().await;
        core.send(Message::Pull { extra: pull_extra(-1) }).await?;
        let resp = core.receive().await?;
        drop(core);
        self.buffered.extend(resp.records);
        match resp.terminal {
            Message::Success { metadata } => {
                self.summary = Some(Summary { metadata });
                self.done = true;
                self.release().await;
                Ok(())
            }
            Message::Failure { metadata } => {
                self.done = true;
                if let Some(marker) = &self.failure_marker {
                    marker.store(true, Ordering::Relaxed);
                }
                self.release().await;
                Err(failure_to_error(&metadata))
            }
            other => {
                self.done = true;
                Err(BoltError::protocol(format!("expected SUCCESS or FAILURE for PULL, got {other:?}")))
            }
        }
    }

    async fn release(&mut self) {
        if let Completion::ReleaseToPool(pool) = &self.completion {
            pool.release(self.conn.clone()).await;
        }
    }

    /// Pulls and returns the next record, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> BoltResult<Option<Record>> {
        if let Some(values) = self.buffered.pop_front() {
            return Ok(Some(Record::new(Arc::clone(&self.keys), values)));
        }
        if self.done {
            return Ok(None);
        }
        self.pull_more().await?;
        Ok(self.buffered.pop_front().map(|values| Record::new(Arc::clone(&self.keys), values)))
    }

    /// Drains every remaining record into a `Vec`, along with the completion summary.
    pub async fn collect(mut self) -> BoltResult<(Vec<Record>, Summary)> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        let summary = self.summary.clone().unwrap_or_default();
        Ok((records, summary))
    }

    /// Requires exactly one record; an error if the stream yields zero or more than one.
    pub async fn single(mut self) -> BoltResult<Record> {
        let first = self
            .next()
            .await?
            .ok_or_else(|| BoltError::protocol("expected exactly one record, got none"))?;
        if self.next().await?.is_some() {
            return Err(BoltError::protocol("expected exactly one record, got more than one"));
        }
        Ok(first)
    }

    /// Returns the first record if any, discarding the rest of the stream.
    pub async fn first_or_none(mut self) -> BoltResult<Option<Record>> {
        let first = self.next().await?;
        while self.next().await?.is_some() {}
        Ok(first)
    }

    /// Discards any unread records and finalizes the stream, returning the connection to the
    /// pool (for auto-commit streams) rather than abandoning it.
    pub async fn close(mut self) -> BoltResult<Summary> {
        while !self.done {
            self.pull_more().await?;
            self.buffered.clear();
        }
        Ok(self.summary.clone().unwrap_or_default())
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        if !self.done {
            warn!("ResultStream dropped before completion; its connection is abandoned, not returned to the pool");
            if let Completion::ReleaseToPool(pool) = &self.completion {
                pool.abandon(self.conn.clone());
            }
        }
    }
}
