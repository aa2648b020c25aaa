/// How the driver should wrap its TCP socket, per spec.md §6.
///
/// The URI parser that would normally produce this triple is out of scope for this crate
/// (spec.md §1); callers hand the driver an already-resolved [`ConnectionAddr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// Plaintext TCP.
    Off,
    /// TLS with full certificate validation against the platform trust store.
    Tls,
    /// TLS that accepts a self-signed (or otherwise unverified) server certificate.
    TlsInsecure,
}

/// A resolved host/port/encryption triple, as produced by the (out of scope) URI parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAddr {
    pub host: String,
    pub port: u16,
    pub encryption: Encryption,
}

impl ConnectionAddr {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, encryption: Encryption) -> Self {
        Self {
            host: host.into(),
            port,
            encryption,
        }
    }

    #[must_use]
    pub fn plaintext(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, Encryption::Off)
    }
}
