use crate::message::Message;

/// The server states the driver mirrors, and the finite set of messages legal from each
/// (spec.md §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Negotiating,
    Authenticating,
    Ready,
    Streaming,
    TxReady,
    TxStreaming,
    Failed,
    Defunct,
}

impl ConnectionState {
    /// Whether `msg` is legal to *send* from this state, per the transition table in spec.md §4.4.
    #[must_use]
    pub fn may_send(self, msg: &Message) -> bool {
        use ConnectionState::{Authenticating, Defunct, Failed, Negotiating, Ready, Streaming, TxReady, TxStreaming};
        match self {
            Self::Disconnected => false,
            Negotiating => false, // handshake bytes aren't Bolt messages
            Authenticating => matches!(msg, Message::Logon { .. } | Message::Hello { .. }),
            Ready => matches!(
                msg,
                Message::Run { .. } | Message::Begin { .. } | Message::Goodbye | Message::Reset
            ),
            TxReady => matches!(
                msg,
                Message::Run { .. }
                    | Message::Commit
                    | Message::Rollback
                    | Message::Goodbye
                    | Message::Reset
            ),
            Streaming => matches!(
                msg,
                Message::Pull { .. } | Message::Discard { .. } | Message::Goodbye | Message::Reset
            ),
            TxStreaming => matches!(
                msg,
                Message::Pull { .. } | Message::Discard { .. } | Message::Goodbye | Message::Reset
            ),
            Failed => matches!(msg, Message::Reset | Message::Goodbye),
            Defunct => false,
        }
    }

    /// True once no further protocol traffic is possible on this connection.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Defunct)
    }

    /// True when the connection requires an implicit RESET before reuse (spec.md §4.4).
    #[must_use]
    pub fn needs_reset(self) -> bool {
        matches!(self, Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_allows_run_and_begin_only() {
        let extra = crate::packstream::Dict::new();
        assert!(ConnectionState::Ready.may_send(&Message::Begin { extra: extra.clone() }));
        assert!(ConnectionState::Ready.may_send(&Message::Run {
            query: String::new(),
            parameters: extra.clone(),
            extra: extra.clone(),
        }));
        assert!(!ConnectionState::Ready.may_send(&Message::Commit));
        assert!(!ConnectionState::Ready.may_send(&Message::Pull { extra }));
    }

    #[test]
    fn failed_allows_only_reset_and_goodbye() {
        assert!(ConnectionState::Failed.may_send(&Message::Reset));
        assert!(ConnectionState::Failed.may_send(&Message::Goodbye));
        assert!(!ConnectionState::Failed.may_send(&Message::Commit));
    }

    #[test]
    fn defunct_is_terminal() {
        assert!(ConnectionState::Defunct.is_terminal());
        assert!(!ConnectionState::Ready.is_terminal());
    }
}
