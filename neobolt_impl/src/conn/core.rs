//! The connection engine (spec.md §4.4): owns the socket, drives the handshake and
//! authentication, tracks the server-state machine, and correlates requests with responses.
//!
//! Per spec.md §5, a connection is only ever driven by the one caller that currently holds it
//! (borrowed from the pool by a session, or temporarily by an active [`crate::result::ResultStream`]).
//! That exclusive-ownership contract means the "cooperative event loop owning a mailbox" framing
//! in spec.md §5/§9 can be realized as a plain `&mut self` async API instead of a spawned actor
//! task with channels — there is never a second caller for the mailbox to arbitrate between.
//! This simplification is recorded as an Open Question resolution in DESIGN.md.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::error::{BoltError, BoltResult};
use crate::framer::ChunkDecoder;
use crate::message::Message;
use crate::packstream::{self, Dict, Registry, Value};

use super::addr::{ConnectionAddr, Encryption};
use super::auth::AuthToken;
use super::configuration::ConnectionConfiguration;
use super::handshake::{self, BoltVersion};
use super::state::ConnectionState;
use super::statistics::{ConnectionStatistics, StatisticsCounters};

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Which request kind is waiting at the head of the pending queue; drives both legality checks
/// and the state transition applied once its terminal response arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingKind {
    Hello,
    Logon,
    Logoff,
    Begin,
    Run,
    Pull,
    Discard,
    Commit,
    Rollback,
    Reset,
    Goodbye,
}

fn pending_kind_for(msg: &Message) -> PendingKind {
    match msg {
        Message::Hello { .. } => PendingKind::Hello,
        Message::Logon { .. } => PendingKind::Logon,
        Message::Logoff => PendingKind::Logoff,
        Message::Begin { .. } => PendingKind::Begin,
        Message::Run { .. } => PendingKind::Run,
        Message::Pull { .. } => PendingKind::Pull,
        Message::Discard { .. } => PendingKind::Discard,
        Message::Commit => PendingKind::Commit,
        Message::Rollback => PendingKind::Rollback,
        Message::Reset => PendingKind::Reset,
        Message::Goodbye => PendingKind::Goodbye,
        Message::Success { .. } | Message::Ignored | Message::Failure { .. } | Message::Record { .. } => {
            unreachable!("server-only messages are never sent")
        }
    }
}

/// The terminal response to one request, plus any RECORDs that arrived while it was at the
/// head of the pending queue (spec.md §4.4's "RECORDs belong to the current RUN/PULL").
#[derive(Debug)]
pub(crate) struct Response {
    pub kind: PendingKind,
    pub terminal: Message,
    pub records: Vec<Vec<Value>>,
}

/// Extracts `{code, message}` from a FAILURE's metadata dict and classifies it per spec.md §7.
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

fn expect_success(terminal: Message) -> BoltResult<Dict> {
    match terminal {
        Message::Success { metadata } => Ok(metadata),
        Message::Failure { metadata } => Err(failure_to_error(&metadata)),
        other => Err(BoltError::protocol(format!("expected SUCCESS, got {other:?}"))),
    }
}

/// The engine behind a single Bolt TCP/TLS connection.
pub struct ConnectionCore {
    stream: Box<dyn AsyncStream>,
    decoder: ChunkDecoder,
    pending_bodies: VecDeque<Vec<u8>>,
    pending: VecDeque<PendingKind>,
    state: ConnectionState,
    bolt_version: BoltVersion,
    registry: Registry,
    config: ConnectionConfiguration,
    stats: Arc<StatisticsCounters>,
    created_at: Instant,
    last_used_at: Instant,
}

impl std::fmt::Debug for ConnectionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCore")
            .field("state", &self.state)
            .field("bolt_version", &self.bolt_version)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl ConnectionCore {
    /// Opens the TCP/TLS socket and performs the version-negotiation handshake (spec.md §4.4).
    /// Leaves the connection in [`ConnectionState::Authenticating`]; call [`Self::authenticate`]
    /// next.
    pub async fn connect(
        addr: &ConnectionAddr,
        config: &ConnectionConfiguration,
        registry: Registry,
    ) -> BoltResult<Self> {
        let tcp = timeout(config.connect_timeout(), TcpStream::connect((addr.host.as_str(), addr.port)))
            .await
            .map_err(|_| BoltError::timeout(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")))?
            .map_err(BoltError::connection)?;
        let _ = tcp.set_nodelay(true);

        let stream: Box<dyn AsyncStream> = match addr.encryption {
            Encryption::Off => Box::new(tcp),
            Encryption::Tls | Encryption::TlsInsecure => {
                let tls_config = Arc::new(super::tls::client_config(addr.encryption));
                let connector = TlsConnector::from(tls_config);
                let server_name = ServerName::try_from(addr.host.as_str())
                    .map_err(|_| BoltError::protocol("invalid DNS name for TLS"))?;
                let tls_stream = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(BoltError::connection)?;
                Box::new(tls_stream)
            }
        };

        let mut core = Self {
            stream,
            decoder: ChunkDecoder::new(),
            pending_bodies: VecDeque::new(),
            pending: VecDeque::new(),
            state: ConnectionState::Negotiating,
            bolt_version: BoltVersion::new(5, 0),
            registry,
            config: config.clone(),
            stats: StatisticsCounters::shared(),
            created_at: Instant::now(),
            last_used_at: Instant::now(),
        };
        core.perform_handshake().await?;
        core.state = ConnectionState::Authenticating;
        Ok(core)
    }

    async fn perform_handshake(&mut self) -> BoltResult<()> {
        let mut bytes = Vec::with_capacity(20);
        bytes.extend_from_slice(&handshake::MAGIC_PREAMBLE);
        bytes.extend_from_slice(&handshake::build_negotiation_block(&handshake::default_proposals()));
        let result = timeout(self.config.connect_timeout(), async {
            self.stream.write_all(&bytes).await?;
            self.stream.flush().await?;
            let mut reply = [0u8; 4];
            self.stream.read_exact(&mut reply).await?;
            Ok::<[u8; 4], io::Error>(reply)
        })
        .await;
        let reply = match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.state = ConnectionState::Defunct;
                return Err(BoltError::connection(e));
            }
            Err(_) => {
                self.state = ConnectionState::Defunct;
                return Err(BoltError::timeout(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "handshake timed out",
                )));
            }
        };
        match handshake::parse_agreed_version(reply) {
            Some(v) => {
                self.bolt_version = v;
                Ok(())
            }
            None => {
                self.state = ConnectionState::Defunct;
                Err(BoltError::protocol(
                    "server rejected every proposed Bolt version",
                ))
            }
        }
    }

    /// Sends HELLO then LOGON (no credentials inline in HELLO, matching Bolt v5+), per spec.md
    /// §4.4. Leaves the connection `Ready` on success.
    pub async fn authenticate(&mut self, auth: &AuthToken) -> BoltResult<()> {
        let hello_extra = Dict::new()
            .with("user_agent", Value::String(self.config.user_agent().to_owned()))
            .with("bolt_agent", Value::String(self.config.bolt_agent().to_owned()));
        self.send(Message::Hello { extra: hello_extra }).await?;
        let resp = self.receive().await?;
        expect_success(resp.terminal)?;

        self.send(Message::Logon { auth: auth.to_dict() }).await?;
        let resp = self.receive().await?;
        expect_success(resp.terminal)?;
        Ok(())
    }

    /// Writes one message's chunked, `PackStream`-encoded bytes and enqueues it as in-flight.
    ///
    /// Per spec.md §5, multiple `send`s may be issued back-to-back before any `receive` (strict
    /// pipelining); the pending queue preserves FIFO order for [`Self::receive`].
    pub async fn send(&mut self, msg: Message) -> BoltResult<()> {
        if self.state.is_terminal() {
            return Err(BoltError::protocol("connection is defunct"));
        }
        if !self.state.may_send(&msg) {
            return Err(BoltError::protocol(format!(
                "{msg:?} is not a legal message from state {:?}",
                self.state
            )));
        }
        let kind = pending_kind_for(&msg);
        trace!("sending {kind:?} from state {:?}", self.state);
        let encoded = packstream::encode(&Value::Structure(msg.into_structure()));
        let framed = crate::framer::encode_chunks(&encoded);

        let result = timeout(self.config.request_timeout(), self.stream.write_all(&framed)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.state = ConnectionState::Defunct;
                return Err(BoltError::connection(e));
            }
            Err(_) => {
                self.state = ConnectionState::Defunct;
                return Err(BoltError::timeout(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "send timed out",
                )));
            }
        }
        self.pending.push_back(kind);
        self.stats.note_request_sent();
        self.last_used_at = Instant::now();
        Ok(())
    }

    /// Reads from the socket until the terminal response for the request at the head of the
    /// pending queue arrives, gathering any RECORDs that preceded it (spec.md §4.4, invariant 6).
    pub async fn receive(&mut self) -> BoltResult<Response> {
        let kind = *self
            .pending
            .front()
            .ok_or_else(|| BoltError::protocol("no request is in flight"))?;
        let mut records = Vec::new();
        loop {
            let msg = self.read_message().await?;
            match msg {
                Message::Record { data } => {
                    self.stats.note_record_received();
                    records.push(data);
                }
                terminal => {
                    self.pending.pop_front();
                    self.apply_transition(kind, &terminal);
                    self.last_used_at = Instant::now();
                    return Ok(Response { kind, terminal, records });
                }
            }
        }
    }

    fn apply_transition(&mut self, kind: PendingKind, terminal: &Message) {
        if matches!(terminal, Message::Failure { .. }) {
            self.state = ConnectionState::Failed;
            return;
        }
        if matches!(terminal, Message::Ignored) {
            // server was already Failed; our mirrored state is unaffected
            return;
        }
        self.state = match (self.state, kind) {
            (_, PendingKind::Hello) => ConnectionState::Authenticating,
            (_, PendingKind::Logon | PendingKind::Reset) => ConnectionState::Ready,
            (ConnectionState::Ready, PendingKind::Begin) => ConnectionState::TxReady,
            (ConnectionState::Ready, PendingKind::Run) => ConnectionState::Streaming,
            (ConnectionState::TxReady, PendingKind::Run) => ConnectionState::TxStreaming,
            (ConnectionState::TxReady, PendingKind::Commit | PendingKind::Rollback) => {
                ConnectionState::Ready
            }
            (ConnectionState::Streaming, PendingKind::Pull | PendingKind::Discard) => {
                ConnectionState::Ready
            }
            (ConnectionState::TxStreaming, PendingKind::Pull | PendingKind::Discard) => {
                ConnectionState::TxReady
            }
            (state, _) => state,
        };
    }

    async fn read_message(&mut self) -> BoltResult<Message> {
        loop {
            if let Some(body) = self.pending_bodies.pop_front() {
                let (value, _) = packstream::decode(&body, &self.registry)
                    .map_err(|e| BoltError::protocol(e.to_string()))?;
                let Value::Structure(s) = value else {
                    self.state = ConnectionState::Defunct;
                    return Err(BoltError::protocol("message body was not a structure"));
                };
                return Message::from_structure(s).map_err(|e| {
                    self.state = ConnectionState::Defunct;
                    BoltError::protocol(e)
                });
            }

            let mut buf = [0u8; 8192];
            let read_result = timeout(self.config.request_timeout(), self.stream.read(&mut buf)).await;
            let n = match read_result {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    self.state = ConnectionState::Defunct;
                    return Err(BoltError::connection(e));
                }
                Err(_) => {
                    self.state = ConnectionState::Defunct;
                    return Err(BoltError::timeout(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "request timed out",
                    )));
                }
            };
            if n == 0 {
                self.state = ConnectionState::Defunct;
                return Err(BoltError::connection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection",
                )));
            }
            let completed = self.decoder.push_bytes(&buf[..n]);
            self.pending_bodies.extend(completed);
        }
    }

    /// Sends RESET and awaits its SUCCESS, recovering a `Failed` connection (spec.md §4.4).
    pub async fn reset(&mut self) -> BoltResult<()> {
        self.send(Message::Reset).await?;
        let resp = self.receive().await?;
        self.stats.note_reset();
        match expect_success(resp.terminal) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.state = ConnectionState::Defunct;
                Err(e)
            }
        }
    }

    /// Performs the implicit RESET spec.md §4.4 mandates before a `Failed` connection is reused.
    pub async fn ensure_ready(&mut self) -> BoltResult<()> {
        if self.state.needs_reset() {
            self.reset().await
        } else {
            Ok(())
        }
    }

    /// Sends GOODBYE (best-effort) and marks the connection `Defunct`.
    pub async fn close(&mut self) {
        if !self.state.is_terminal() && self.state.may_send(&Message::Goodbye) {
            let _ = self.send(Message::Goodbye).await;
        }
        self.state = ConnectionState::Defunct;
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn bolt_version(&self) -> BoltVersion {
        self.bolt_version
    }

    #[must_use]
    pub fn statistics(&self) -> ConnectionStatistics {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used_at.elapsed()
    }

    /// Whether this connection may still be handed back into the idle pool (spec.md §4.5).
    #[must_use]
    pub fn is_reusable(&self) -> bool {
        !matches!(self.state, ConnectionState::Defunct)
    }
}
