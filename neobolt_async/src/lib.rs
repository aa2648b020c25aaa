//! Asynchronous Rust driver for Bolt graph databases.
//!
//! `neobolt_async` is written completely in Rust; its asynchronous model is based on
//! [`tokio`](https://crates.io/crates/tokio). It provides a lean, fast API for talking to a
//! graph database over the Bolt binary protocol directly, with no native client library and no
//! FFI.
//!
//! For usecases where you don't need an asynchronous driver, you might want to use
//! `neobolt_async`'s synchronous sibling, [`neobolt`](https://docs.rs/neobolt). The two drivers
//! have a very similar API and share most of their implementation.
//!
//! ```rust,no_run
//! use neobolt_async::{AuthToken, ConnectionAddr, ConnectionConfiguration, Pool, PoolConfig, SessionConfig, Dict};
//!
//! # async fn doc() -> neobolt_async::BoltResult<()> {
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
//! );
//! let mut session = pool.session(SessionConfig::default());
//! let mut result = session.run("RETURN 1 AS n", Dict::new()).await?;
//! while let Some(record) = result.next().await? {
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
    AuthToken, BoltError, BoltResult, ConnectionAddr, DatabaseErrorKind, Date, DateTime,
    DateTimeZoneId, Encryption, Node, Path, Point2D, Point3D, Registry, Relationship, Structure,
    TemporalDuration, UnboundRelationship,
};
pub use neobolt_impl::packstream::{Dict, Value};

pub use neobolt_impl::a_sync::{
    AccessMode, Pool, PoolConfig, PoolStatistics, Record, ResultStream, Session, SessionConfig,
    Summary, Transaction, TransactionConfig, TransactionFuture,
};

/// Decoded structures for the graph and temporal/spatial value shapes Bolt defines on the wire
/// (spec.md §6's "Well-known structure tags"). Out of scope: typed field accessors and OGM code
/// generation — callers pattern-match on [`Value`] and these structs directly.
pub mod types {
    pub use neobolt_impl::{LocalDateTime, LocalTime, Time};
}
