//! Thin async re-export surface consumed by `neobolt_async` (spec.md §1). The engine is already
//! written against `tokio`, so this module has no adapting to do — it just re-exports the types
//! an async caller is meant to use directly.

pub use crate::conn::{AuthToken, ConnectionAddr, ConnectionConfiguration, ConnectionStatistics, Encryption};
pub use crate::error::{BoltError, BoltResult, DatabaseErrorKind};
pub use crate::graph::{
    Date, DateTime, DateTimeZoneId, Duration as TemporalDuration, LocalDateTime, LocalTime, Node,
    Path, Point2D, Point3D, Relationship, Time, UnboundRelationship,
};
pub use crate::packstream::{Dict, Registry, Structure, Value};
pub use crate::pool::{Pool, PoolConfig, PoolStatistics};
pub use crate::result::{Record, ResultStream, Summary};
pub use crate::session::{AccessMode, Session, SessionConfig, TransactionFuture};
pub use crate::transaction::{Transaction, TransactionConfig};
