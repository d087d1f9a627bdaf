//! Trust roots and rustls client configuration.

use std::sync::Arc;

use log::warn;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};

use crate::error::HttpcError;

/// Build the trust store for a session.
///
/// A non-empty `ca_path` is preferred. If the file cannot be read the
/// embedded roots are used instead; a file that is read but holds no usable
/// certificate is an error.
pub fn load_roots(ca_path: Option<&str>) -> Result<RootCertStore, HttpcError> {
    if let Some(path) = ca_path.filter(|p| !p.trim().is_empty()) {
        match std::fs::read(path) {
            Ok(pem) => return roots_from_pem(&pem, path),
            Err(e) => warn!("trust file {path} unreadable ({e}), using embedded roots"),
        }
    }
    Ok(embedded_roots())
}

/// The bundled default trust anchors.
pub fn embedded_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

/// Parse every PEM certificate in `pem`. Unparsable certificates are
/// skipped as long as at least one is accepted.
pub fn roots_from_pem(pem: &[u8], source: &str) -> Result<RootCertStore, HttpcError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| HttpcError::Certificate(format!("failed to parse {source}: {e}")))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(HttpcError::Certificate(format!(
            "no usable certificates in {source} ({ignored} rejected)"
        )));
    }
    if ignored > 0 {
        warn!("{source}: skipped {ignored} invalid certificates");
    }
    Ok(roots)
}

/// Client configuration with mandatory peer verification against `roots`.
pub fn client_config(roots: RootCertStore) -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Arc::new(config)
}
