use std::time::Duration;

// docu is written at re-exports of the frontend crates (neobolt/lib.rs, neobolt_async/lib.rs)
#[derive(Debug, Clone)]
pub struct ConnectionConfiguration {
    connect_timeout: Duration,
    request_timeout: Duration,
    user_agent: String,
    bolt_agent: String,
}

impl Default for ConnectionConfiguration {
    fn default() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("neobolt/{}", env!("CARGO_PKG_VERSION")),
            bolt_agent: format!("neobolt/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ConnectionConfiguration {
    /// Default time allowed for the TCP/TLS handshake and the Bolt version negotiation.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default deadline for any single outstanding request, per spec.md §4.4.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
    /// Sets the connect timeout.
    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }
    /// Builder-method for setting the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
    /// Sets the per-request timeout.
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }
    /// Builder-method for setting the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the `user_agent` string sent in HELLO.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
    /// Builder-method for overriding the `user_agent` string sent in HELLO.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the `bolt_agent` string sent in HELLO (v5+ only).
    pub fn bolt_agent(&self) -> &str {
        &self.bolt_agent
    }
    /// Builder-method for overriding the `bolt_agent` string sent in HELLO.
    #[must_use]
    pub fn with_bolt_agent(mut self, bolt_agent: impl Into<String>) -> Self {
        self.bolt_agent = bolt_agent.into();
        self
    }
}
