// Outbound transport seam and shared TLS settings.
//
// The correlator only needs "hand this text to the wire", so that is all
// the `Transport` trait asks for. The WebSocket client implements it;
// tests implement it with a recording stub.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::Error;

/// Something that can put a serialized JSON-RPC message on the wire.
///
/// `send` only enqueues; it fails when the connection is down so the
/// caller can settle its pending call immediately.
pub trait Transport: Send + Sync {
    fn send(&self, text: String) -> Result<(), Error>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, text: String) -> Result<(), Error> {
        (**self).send(text)
    }
}

/// TLS verification mode for `wss://` endpoints.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the bundled webpki root certificates.
    System,
    /// Trust only the CA certificates in the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed edges on a LAN).
    DangerAcceptInvalid,
}

/// Shared transport configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Upper bound on the WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a rustls client config for the chosen TLS mode.
    ///
    /// Returns `None` for [`TlsMode::System`], which lets tungstenite use
    /// its own webpki-roots connector.
    pub fn build_tls(&self) -> Result<Option<Arc<ClientConfig>>, Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        match &self.tls {
            TlsMode::System => Ok(None),
            TlsMode::CustomCa(path) => {
                let mut roots = RootCertStore::empty();
                let certs = CertificateDer::pem_file_iter(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                for cert in certs {
                    let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                    roots
                        .add(cert)
                        .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                }

                let config = ClientConfig::builder_with_provider(provider)
                    .with_safe_default_protocol_versions()
                    .map_err(|e| Error::Tls(e.to_string()))?
                    .with_root_certificates(roots)
                    .with_no_client_auth();
                Ok(Some(Arc::new(config)))
            }
            TlsMode::DangerAcceptInvalid => {
                let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
                    .with_safe_default_protocol_versions()
                    .map_err(|e| Error::Tls(e.to_string()))?
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
                    .with_no_client_auth();
                Ok(Some(Arc::new(config)))
            }
        }
    }
}

// ── Certificate verifier for DangerAcceptInvalid ─────────────────────

/// Skips chain validation but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
