//! Do not use this crate directly.
//!
//! This is the implementation crate for `neobolt` and `neobolt_async`.
//!
//! If you need a synchronous driver, use `neobolt`.
//!
//! If you need an asynchronous driver, use `neobolt_async`.

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate log;

pub mod packstream;

mod error;
mod framer;
mod graph;
mod message;

pub mod conn;
mod pool;
mod result;
mod session;
mod transaction;

#[cfg(feature = "async")]
pub mod a_sync;
#[cfg(feature = "sync")]
pub mod sync;

pub use crate::error::{BoltError, BoltResult, DatabaseErrorKind};
pub use crate::graph::{
    Date, DateTime, DateTimeZoneId, Duration as TemporalDuration, LocalDateTime, LocalTime, Node,
    Path, Point2D, Point3D, Relationship, Time, UnboundRelationship,
};
pub use crate::packstream::{Registry, Structure, Value};

pub use crate::conn::{
    AuthToken, ConnectionAddr, ConnectionConfiguration, ConnectionStatistics, Encryption,
};
pub use crate::pool::{Pool, PoolConfig, PoolStatistics};
pub use crate::result::{Record, ResultStream, Summary};
pub use crate::session::{AccessMode, Session, SessionConfig};
pub use crate::transaction::{Transaction, TransactionConfig};
