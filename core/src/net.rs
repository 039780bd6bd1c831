/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Courier, an HTTP client library.
 *
 * Courier is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Courier is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Courier.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS client configuration: root store selection, certificate verification modes,
//! and the rustls connector used by the HTTP connector.
//!
//! The root store is chosen once when a session is built. Verification can still be
//! turned off, or pinned to a CA bundle, per request; each mode gets its own
//! connector and its own pool key.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;

use crate::config::Verify;
use crate::error::{Error, Result};

/// Where trusted root certificates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootStore {
    /// Platform certificate store only.
    Native,
    /// Mozilla roots compiled into the binary.
    WebPki,
    /// Platform store, falling back to the Mozilla roots when it is empty or unreadable.
    #[default]
    NativeThenWebPki,
}

/// Build a root certificate store for `source`.
fn build_root_store(source: RootStore) -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if matches!(source, RootStore::Native | RootStore::NativeThenWebPki) {
        if let Ok(certs) = rustls_native_certs::load_native_certs() {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
    }
    if source == RootStore::WebPki || (source == RootStore::NativeThenWebPki && root_store.is_empty()) {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Root store holding only the certificates of a PEM bundle.
fn bundle_root_store(path: &Path) -> Result<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| Error::Tls(format!("cannot read CA bundle {}: {}", path.display(), e)))?;
    for cert in certs {
        let cert = cert.map_err(|e| Error::Tls(format!("bad certificate in {}: {}", path.display(), e)))?;
        root_store
            .add(cert)
            .map_err(|e| Error::Tls(format!("bad certificate in {}: {}", path.display(), e)))?;
    }
    if root_store.is_empty() {
        return Err(Error::Tls(format!("no certificates in {}", path.display())));
    }
    Ok(root_store)
}

/// TLS client config for HTTP/1.1 (ALPN `http/1.1`).
pub fn http_client_config(roots: RootStore, verify: &Verify) -> Result<Arc<ClientConfig>> {
    let mut config = match verify {
        Verify::Enabled => ClientConfig::builder()
            .with_root_certificates(build_root_store(roots))
            .with_no_client_auth(),
        Verify::CaBundle(path) => ClientConfig::builder()
            .with_root_certificates(bundle_root_store(path)?)
            .with_no_client_auth(),
        Verify::Disabled => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth(),
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

/// Connectors per verification mode, built on first use.
pub struct TlsConnectors {
    roots: RootStore,
    connectors: Mutex<HashMap<Verify, TlsConnector>>,
}

impl TlsConnectors {
    pub fn new(roots: RootStore) -> Self {
        Self {
            roots,
            connectors: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, verify: &Verify) -> Result<TlsConnector> {
        let mut connectors = self.connectors.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(connector) = connectors.get(verify) {
            return Ok(connector.clone());
        }
        let connector = TlsConnector::from(http_client_config(self.roots, verify)?);
        connectors.insert(verify.clone(), connector.clone());
        Ok(connector)
    }

    /// TLS handshake over an established TCP stream (direct or through a proxy tunnel).
    pub async fn handshake(
        &self,
        verify: &Verify,
        host: &str,
        tcp: TcpStream,
    ) -> Result<TlsStream<TcpStream>> {
        let connector = self.get(verify)?;
        let server_name = ServerName::try_from(host)
            .map_err(|_| Error::Tls(format!("invalid server name {:?}", host)))?
            .to_owned();
        connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| tls_error(host, e))
    }
}

/// Handshake failures caused by certificates are TLS errors; everything else is a connection error.
fn tls_error(host: &str, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::InvalidData {
        Error::Tls(format!("{}: {}", host, e))
    } else {
        Error::connection(host, e)
    }
}

/// Verifier used when verification is disabled.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webpki_store_is_populated() {
        assert!(!build_root_store(RootStore::WebPki).is_empty());
    }

    #[test]
    fn missing_bundle_is_a_tls_error() {
        let verify = Verify::CaBundle("/nonexistent/courier-ca.pem".into());
        assert!(matches!(
            http_client_config(RootStore::WebPki, &verify),
            Err(Error::Tls(_))
        ));
    }

    #[test]
    fn connectors_are_cached_per_mode() {
        let connectors = TlsConnectors::new(RootStore::WebPki);
        connectors.get(&Verify::Disabled).unwrap();
        connectors.get(&Verify::Disabled).unwrap();
        connectors.get(&Verify::Enabled).unwrap();
        assert_eq!(connectors.connectors.lock().unwrap().len(), 2);
    }

    #[test]
    fn alpn_is_http11_only() {
        let config = http_client_config(RootStore::WebPki, &Verify::Enabled).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }
}
