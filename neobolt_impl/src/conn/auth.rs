use secstr::SecUtf8;

use crate::packstream::{Dict, Value};

/// One of the authentication schemes Bolt's LOGON message supports, per spec.md §6.
///
/// Credentials are held as [`SecUtf8`], the same type the teacher's `ConnectParams` uses for its
/// HANA password: it zeroizes on drop and its `Debug` prints a redacted placeholder instead of
/// the secret, so deriving `Debug` on this enum can't leak a credential into a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthToken {
    /// No credentials at all.
    None,
    /// Username/password, with an optional realm.
    Basic {
        principal: String,
        credentials: SecUtf8,
        realm: Option<String>,
    },
    /// An opaque bearer token (e.g. an SSO-issued access token).
    Bearer { credentials: SecUtf8 },
    /// A Kerberos ticket.
    Kerberos { credentials: SecUtf8 },
    /// Any other scheme, carried as free-form properties.
    Custom {
        scheme: String,
        properties: Dict,
    },
}

impl AuthToken {
    /// Builds the `auth` dict sent in a LOGON message.
    #[must_use]
    pub fn to_dict(&self) -> Dict {
        match self {
            Self::None => Dict::new().with("scheme", Value::String("none".into())),
            Self::Basic {
                principal,
                credentials,
                realm,
            } => {
                let mut d = Dict::new()
                    .with("scheme", Value::String("basic".into()))
                    .with("principal", Value::String(principal.clone()))
                    .with("credentials", Value::String(credentials.unsecure().to_owned()));
                if let Some(realm) = realm {
                    d.insert("realm", Value::String(realm.clone()));
                }
                d
            }
            Self::Bearer { credentials } => Dict::new()
                .with("scheme", Value::String("bearer".into()))
                .with("credentials", Value::String(credentials.unsecure().to_owned())),
            Self::Kerberos { credentials } => Dict::new()
                .with("scheme", Value::String("kerberos".into()))
                .with("credentials", Value::String(credentials.unsecure().to_owned())),
            Self::Custom { scheme, properties } => {
                let mut d = Dict::new().with("scheme", Value::String(scheme.clone()));
                for (k, v) in properties.iter() {
                    d.insert(k.clone(), v.clone());
                }
                d
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_omits_realm_when_absent() {
        let token = AuthToken::Basic {
            principal: "neo4j".into(),
            credentials: "secret".into(),
            realm: None,
        };
        let dict = token.to_dict();
        assert!(dict.get("realm").is_none());
        assert_eq!(dict.get("principal"), Some(&Value::String("neo4j".into())));
    }

    #[test]
    fn none_scheme_carries_no_principal() {
        let dict = AuthToken::None.to_dict();
        assert_eq!(dict.get("scheme"), Some(&Value::String("none".into())));
        assert!(dict.get("principal").is_none());
    }

    #[test]
    fn debug_does_not_print_the_password() {
        let token = AuthToken::Basic {
            principal: "neo4j".into(),
            credentials: "hunter2".into(),
            realm: None,
        };
        assert!(!format!("{token:?}").contains("hunter2"));
    }
}
