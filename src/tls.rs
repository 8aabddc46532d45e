//! TLS utilities for serving the job API over HTTPS.
//!
//! Loads the server certificate chain and private key named in
//! [`TlsConfig`] into a rustls configuration for `axum-server`.

use std::path::PathBuf;

use axum_server::tls_rustls::RustlsConfig;
use tokio::fs;

use crate::config::TlsConfig;

/// Error type for TLS configuration issues.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("HTTPS is required but no certificate or key is configured")]
    NotConfigured,

    #[error("Server certificate path not configured")]
    MissingCert,

    #[error("Private key path not configured")]
    MissingKey,

    #[error("Server certificate not found: {0}")]
    CertNotFound(PathBuf),

    #[error("Private key not found: {0}")]
    KeyNotFound(PathBuf),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid certificate or key: {0}")]
    InvalidPem(#[source] std::io::Error),
}

/// Certificate material ready for the HTTPS listener.
#[derive(Clone)]
pub struct TlsIdentity {
    config: RustlsConfig,
}

impl TlsIdentity {
    /// Load the certificate and key from the paths in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either path is not configured
    /// - Either file does not exist or cannot be read
    /// - The PEM data does not hold a certificate chain and exactly one key
    pub async fn load(config: &TlsConfig) -> Result<Self, TlsError> {
        let cert_path = config.cert_path.as_ref().ok_or(TlsError::MissingCert)?;
        let key_path = config.key_path.as_ref().ok_or(TlsError::MissingKey)?;

        if !cert_path.exists() {
            return Err(TlsError::CertNotFound(cert_path.clone()));
        }
        if !key_path.exists() {
            return Err(TlsError::KeyNotFound(key_path.clone()));
        }

        let cert_pem = fs::read(cert_path).await?;
        let key_pem = fs::read(key_path).await?;

        let config = RustlsConfig::from_pem(cert_pem, key_pem)
            .await
            .map_err(TlsError::InvalidPem)?;

        Ok(Self { config })
    }

    /// Decide how the listener is served: HTTPS with the loaded identity,
    /// or plaintext (`None`) when `allow_insecure` permits falling back.
    pub async fn resolve(config: &TlsConfig) -> Result<Option<Self>, TlsError> {
        if !config.is_complete() {
            if config.allow_insecure {
                tracing::warn!("TLS not configured, running in insecure mode");
                return Ok(None);
            }
            return Err(TlsError::NotConfigured);
        }

        match Self::load(config).await {
            Ok(identity) => {
                tracing::info!("TLS certificate loaded");
                Ok(Some(identity))
            }
            Err(e) if config.allow_insecure => {
                tracing::warn!(
                    error = %e,
                    "TLS certificate loading failed, running in insecure mode"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn rustls_config(&self) -> RustlsConfig {
        self.config.clone()
    }
}
