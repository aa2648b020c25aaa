use std::time::Duration;
use thiserror::Error;

/// A list specifying categories of [`BoltError`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BoltError {
    /// Malformed `PackStream` bytes, an unexpected message, or an unregistered structure tag.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server returned a FAILURE for a query.
    #[error("database error [{code}]: {message}")]
    Database {
        /// The server-supplied error code, e.g. `Neo.ClientError.Statement.SyntaxError`.
        code: String,
        /// The server-supplied human-readable message.
        message: String,
        /// Coarse classification of `code`, used to decide retry eligibility.
        kind: DatabaseErrorKind,
    },

    /// A transport-level failure: TCP/TLS error, lost socket, or a request deadline expiring.
    #[error("connection error: {source}")]
    Connection {
        /// The causing I/O error.
        #[source]
        source: std::io::Error,
        /// Whether this error represents an expired deadline rather than a hard I/O failure.
        timed_out: bool,
    },

    /// The pool could not satisfy an acquire request.
    #[error("pool error: {0}")]
    Pool(PoolError),

    /// An operation was attempted on a session or transaction that is no longer usable.
    #[error("session is closed")]
    SessionClosed,

    /// `commit` was called on a transaction that a previous error marked for rollback.
    #[error("transaction is marked for rollback and must be rolled back")]
    TransactionMarkedForRollback,

    /// Low-level I/O error that isn't otherwise classified as a connection failure.
    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Subcategory of [`BoltError::Pool`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolError {
    /// `acquire_timeout` elapsed before a connection became available.
    #[error("timed out waiting {0:?} for a pooled connection")]
    AcquireTimeout(Duration),
    /// The pool has been shut down and is no longer accepting work.
    #[error("the connection pool is closed")]
    Closed,
}

/// Classification of a server [`BoltError::Database`] failure, derived from its `code` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Caused by a mistake in the request itself (bad Cypher, constraint violation, ...).
    Client,
    /// Safe to retry the whole unit of work; used by managed transactions.
    Transient,
    /// Server-side or internal failure, not attributable to the request.
    Database,
}

impl DatabaseErrorKind {
    /// Classifies a server error `code` by its dotted prefix, per spec.md §7.
    #[must_use]
    pub fn classify(code: &str) -> Self {
        if code.contains("Security.Unauthorized") {
            // Callers should route this to `BoltError::Auth` before constructing
            // a `Database` variant; kept here only as a defensive fallback.
            Self::Client
        } else if code.contains(".Transient") || code.contains("TransientError") {
            Self::Transient
        } else if code.contains(".ClientError") {
            Self::Client
        } else {
            Self::Database
        }
    }
}

/// Abbreviation of `Result<T, BoltError>`.
pub type BoltResult<T> = std::result::Result<T, BoltError>;

impl BoltError {
    /// Builds a [`BoltError::Database`] from a server error code and message, classifying it
    /// and routing `...Security.Unauthorized` codes to [`BoltError::Auth`] as spec.md §7 requires.
    #[must_use]
    pub fn from_server_failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        if code.starts_with("Neo.ClientError.Security.Unauthorized") {
            return Self::Auth(message.into());
        }
        let kind = DatabaseErrorKind::classify(&code);
        Self::Database {
            code,
            message: message.into(),
            kind,
        }
    }

    /// True if this error was classified as [`DatabaseErrorKind::Transient`], the only kind
    /// managed transactions are permitted to retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database {
                kind: DatabaseErrorKind::Transient,
                ..
            }
        )
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub(crate) fn timeout(source: std::io::Error) -> Self {
        Self::Connection {
            source,
            timed_out: true,
        }
    }

    pub(crate) fn connection(source: std::io::Error) -> Self {
        Self::Connection {
            source,
            timed_out: false,
        }
    }
}

impl From<PoolError> for BoltError {
    fn from(e: PoolError) -> Self {
        Self::Pool(e)
    }
}
