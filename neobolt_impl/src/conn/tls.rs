//! TLS client configuration for the two encrypted transport modes spec.md §6 names: full
//! certificate validation against the platform trust store, and acceptance of a self-signed
//! (unverified) server certificate.

use rustls::client::{ServerCertVerified, ServerCertVerifier, ServerName};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore};
use std::sync::Arc;

use super::addr::Encryption;

/// Builds the `rustls` client configuration implied by `encryption`.
///
/// # Panics
/// Panics if called with [`Encryption::Off`]; callers are expected to only reach this function
/// once they've already decided TLS is in play.
#[must_use]
pub fn client_config(encryption: Encryption) -> ClientConfig {
    match encryption {
        Encryption::Off => unreachable!("client_config called for a plaintext connection"),
        Encryption::Tls => {
            let mut root_store = RootCertStore::empty();
            root_store.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
                OwnedTrustAnchor::from_subject_spki_name_constraints(
                    ta.subject,
                    ta.spki,
                    ta.name_constraints,
                )
            }));
            ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        Encryption::TlsInsecure => ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
            .with_no_client_auth(),
    }
}

/// A verifier that accepts any server certificate, for [`Encryption::TlsInsecure`].
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
