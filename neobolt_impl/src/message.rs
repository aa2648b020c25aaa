//! Bolt message envelopes (spec.md §4.3): each one is a `PackStream` [`Structure`] with a fixed
//! tag and field shape.

use crate::packstream::{Dict, Registry, Structure, Value};

pub mod tags {
    pub const HELLO: u8 = 0x01;
    pub const GOODBYE: u8 = 0x02;
    pub const RESET: u8 = 0x0F;
    pub const RUN: u8 = 0x10;
    pub const BEGIN: u8 = 0x11;
    pub const COMMIT: u8 = 0x12;
    pub const ROLLBACK: u8 = 0x13;
    pub const DISCARD: u8 = 0x2F;
    pub const PULL: u8 = 0x3F;
    pub const LOGON: u8 = 0x6A;
    pub const LOGOFF: u8 = 0x6B;
    pub const SUCCESS: u8 = 0x70;
    pub const IGNORED: u8 = 0x7E;
    pub const FAILURE: u8 = 0x7F;
    pub const RECORD: u8 = 0x71;
}

/// One request or response on the wire, already unwrapped from its `Value::Structure` shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello { extra: Dict },
    Logon { auth: Dict },
    Logoff,
    Goodbye,
    Begin { extra: Dict },
    Run { query: String, parameters: Dict, extra: Dict },
    Pull { extra: Dict },
    Discard { extra: Dict },
    Commit,
    Rollback,
    Reset,
    Success { metadata: Dict },
    Ignored,
    Failure { metadata: Dict },
    Record { data: Vec<Value> },
}

impl Message {
    /// Whether this message, received from the server, is a *terminal* response (pops the
    /// request queue) rather than a RECORD feeding the active result (spec.md §4.4).
    #[must_use]
    pub fn is_terminal_response(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Ignored | Self::Failure { .. })
    }

    #[must_use]
    pub fn into_structure(self) -> Structure {
        match self {
            Self::Hello { extra } => Structure::new(tags::HELLO, vec![Value::Dict(extra)]),
            Self::Logon { auth } => Structure::new(tags::LOGON, vec![Value::Dict(auth)]),
            Self::Logoff => Structure::new(tags::LOGOFF, vec![]),
            Self::Goodbye => Structure::new(tags::GOODBYE, vec![]),
            Self::Begin { extra } => Structure::new(tags::BEGIN, vec![Value::Dict(extra)]),
            Self::Run {
                query,
                parameters,
                extra,
            } => Structure::new(
                tags::RUN,
                vec![
                    Value::String(query),
                    Value::Dict(parameters),
                    Value::Dict(extra),
                ],
            ),
            Self::Pull { extra } => Structure::new(tags::PULL, vec![Value::Dict(extra)]),
            Self::Discard { extra } => Structure::new(tags::DISCARD, vec![Value::Dict(extra)]),
            Self::Commit => Structure::new(tags::COMMIT, vec![]),
            Self::Rollback => Structure::new(tags::ROLLBACK, vec![]),
            Self::Reset => Structure::new(tags::RESET, vec![]),
            Self::Success { metadata } => Structure::new(tags::SUCCESS, vec![Value::Dict(metadata)]),
            Self::Ignored => Structure::new(tags::IGNORED, vec![]),
            Self::Failure { metadata } => Structure::new(tags::FAILURE, vec![Value::Dict(metadata)]),
            Self::Record { data } => Structure::new(tags::RECORD, vec![Value::List(data)]),
        }
    }

    pub fn from_structure(s: Structure) -> Result<Self, String> {
        let Structure { tag, mut fields } = s;
        let dict_field = |fields: &mut Vec<Value>, idx: usize| -> Result<Dict, String> {
            match fields.get(idx) {
                Some(Value::Dict(_)) => match fields.remove(idx) {
                    Value::Dict(d) => Ok(d),
                    _ => unreachable!(),
                },
                _ => Err(format!("expected a dict at field {idx}")),
            }
        };
        match tag {
            tags::SUCCESS => Ok(Self::Success {
                metadata: dict_field(&mut fields, 0)?,
            }),
            tags::IGNORED => Ok(Self::Ignored),
            tags::FAILURE => Ok(Self::Failure {
                metadata: dict_field(&mut fields, 0)?,
            }),
            tags::RECORD => {
                let data = match fields.into_iter().next() {
                    Some(Value::List(items)) => items,
                    _ => return Err("RECORD missing its data list".into()),
                };
                Ok(Self::Record { data })
            }
            other => Err(format!("unexpected server message tag 0x{other:02X}")),
        }
    }
}

/// Registers every Bolt message tag and its fixed field count into `registry`.
///
/// A message envelope is itself a `PackStream` [`Structure`] (spec.md §4.3), so it goes through
/// exactly the same registry-backed `decode` path as a Node or a Point — without this, decoding
/// any server response would fail with `UnregisteredTag` before `Message::from_structure` ever
/// saw it. Called alongside `crate::graph::register_builtin` wherever the registry is seeded.
pub(crate) fn register_builtin(registry: &Registry) {
    use tags::*;
    let _ = registry.register(HELLO, vec![1]);
    let _ = registry.register(GOODBYE, vec![0]);
    let _ = registry.register(RESET, vec![0]);
    let _ = registry.register(RUN, vec![3]);
    let _ = registry.register(BEGIN, vec![1]);
    let _ = registry.register(COMMIT, vec![0]);
    let _ = registry.register(ROLLBACK, vec![0]);
    let _ = registry.register(DISCARD, vec![1]);
    let _ = registry.register(PULL, vec![1]);
    let _ = registry.register(LOGON, vec![1]);
    let _ = registry.register(LOGOFF, vec![0]);
    let _ = registry.register(SUCCESS, vec![1]);
    let _ = registry.register(IGNORED, vec![0]);
    let _ = registry.register(FAILURE, vec![1]);
    let _ = registry.register(RECORD, vec![1]);
}

/// Builds the `extra` dict for a PULL/DISCARD message: `{n: count}`, default fetch-all (`-1`).
#[must_use]
pub fn pull_extra(n: i64) -> Dict {
    Dict::new().with("n", Value::Int(n))
}

/// Builds the `extra` dict for a BEGIN message.
#[must_use]
pub fn begin_extra(
    bookmarks: &[String],
    tx_timeout: Option<std::time::Duration>,
    tx_metadata: Option<Dict>,
    mode_write: bool,
    database: Option<&str>,
) -> Dict {
    let mut extra = Dict::new();
    if !bookmarks.is_empty() {
        extra.insert(
            "bookmarks",
            Value::List(bookmarks.iter().cloned().map(Value::String).collect()),
        );
    }
    if let Some(timeout) = tx_timeout {
        extra.insert("tx_timeout", Value::Int(timeout.as_millis() as i64));
    }
    if let Some(metadata) = tx_metadata {
        extra.insert("tx_metadata", Value::Dict(metadata));
    }
    if !mode_write {
        extra.insert("mode", Value::String("r".into()));
    }
    if let Some(db) = database {
        extra.insert("db", Value::String(db.into()));
    }
    extra
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_round_trips_through_structure() {
        let msg = Message::Run {
            query: "RETURN 1".into(),
            parameters: Dict::new(),
            extra: Dict::new(),
        };
        let s = msg.clone().into_structure();
        assert_eq!(s.tag, tags::RUN);
        assert_eq!(s.fields.len(), 3);
    }

    #[test]
    fn success_round_trips_from_structure() {
        let metadata = Dict::new().with("fields", Value::List(vec![Value::String("n".into())]));
        let s = Structure::new(tags::SUCCESS, vec![Value::Dict(metadata.clone())]);
        let msg = Message::from_structure(s).unwrap();
        assert_eq!(msg, Message::Success { metadata });
    }

    #[test]
    fn pull_extra_defaults_to_fetch_all() {
        let extra = pull_extra(-1);
        assert_eq!(extra.get("n"), Some(&Value::Int(-1)));
    }

    /// Every message tag must decode through the same registry-backed path as a domain
    /// structure (spec.md §4.3) — a regression test for the bug where only graph/temporal tags
    /// were registered and every server response failed with `UnregisteredTag`.
    #[test]
    fn every_message_tag_decodes_through_the_registry() {
        let registry = Registry::new();
        register_builtin(&registry);
        for msg in [
            Message::Hello { extra: Dict::new() },
            Message::Logon { auth: Dict::new() },
            Message::Logoff,
            Message::Goodbye,
            Message::Begin { extra: Dict::new() },
            Message::Run {
                query: "RETURN 1".into(),
                parameters: Dict::new(),
                extra: Dict::new(),
            },
            Message::Pull { extra: Dict::new() },
            Message::Discard { extra: Dict::new() },
            Message::Commit,
            Message::Rollback,
            Message::Reset,
            Message::Success { metadata: Dict::new() },
            Message::Ignored,
            Message::Failure { metadata: Dict::new() },
            Message::Record { data: vec![Value::Int(1)] },
        ] {
            let encoded = crate::packstream::encode(&Value::Structure(msg.into_structure()));
            let (decoded, consumed) = crate::packstream::decode(&encoded, &registry).unwrap();
            assert_eq!(consumed, encoded.len());
            assert!(matches!(decoded, Value::Structure(_)));
        }
    }
}
