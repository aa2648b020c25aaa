//! Synchronous Rust driver for Bolt graph databases.
//!
//! `neobolt` provides a lean, fast Rust API for talking to a graph database over the Bolt
//! binary protocol. It is written completely in Rust and speaks Bolt v5.x directly — no native
//! client library, no FFI.
//!
//! This crate is a thin blocking facade: it owns a small dedicated Tokio runtime and blocks on
//! it per call, so callers who don't want to pull in an async runtime of their own can still use
//! the driver from ordinary synchronous code. For usecases where you already run inside
//! `tokio`, you might prefer this driver's asynchronous sibling,
//! [`neobolt_async`](https://docs.rs/neobolt_async). The two crates share almost all of their
//! implementation and expose a near-identical API.
//!
//! ```rust,no_run
//! use neobolt::{AuthToken, ConnectionAddr, ConnectionConfiguration, Pool, PoolConfig, SessionConfig, Dict};
//!
//! # fn main() -> neobolt::BoltResult<()> {
//! let auth = AuthToken::Basic {
//!     principal: "neo4j".into(),
//!     credentials: "password".into(),
//!     realm: None,
//! };
//! let pool = Pool::new(
//!     ConnectionAddr::plaintext("localhost", 7687),
//!     auth,
//!     ConnectionConfiguration::default(),
//!     PoolConfig::default(),
//! )?;
//! let mut session = pool.session(SessionConfig::default());
//! let mut result = session.run("RETURN 1 AS n", Dict::new())?;
//! while let Some(record) = result.next()? {
//!     println!("{:?}", record.get(0));
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Provides some statistics about the use of a concrete connection.
///
/// A snapshot of the statistics can be obtained from [`ConnectionStatistics`] via a connection
/// that is currently checked out of the pool.
pub use neobolt_impl::ConnectionStatistics;

/// A collection of settings that influence the runtime behavior of a connection.
pub use neobolt_impl::ConnectionConfiguration;

pub use neobolt_impl::{
    BoltError, BoltResult, ConnectionAddr, DatabaseErrorKind, Date, DateTime, DateTimeZoneId,
    Encryption, Node, Path, Point2D, Point3D, Registry, Relationship, Structure, TemporalDuration,
    UnboundRelationship,
};
pub use neobolt_impl::packstream::{Dict, Value};

pub use neobolt_impl::sync::{
    AccessMode, AuthToken, Pool, PoolConfig, PoolStatistics, Record, ResultStream, Session,
    SessionConfig, Summary, Transaction, TransactionConfig,
};

/// Decoded structures for the graph and temporal/spatial value shapes Bolt defines on the wire
/// (spec.md §6's "Well-known structure tags"). Out of scope: typed field accessors and OGM code
/// generation — callers pattern-match on [`Value`] and these structs directly.
pub mod types {
    pub use neobolt_impl::{LocalDateTime, LocalTime, Time};
}
