use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// TLS configuration for the HTTPS listener.
///
/// HTTPS is the default. Plaintext is only served when `allow_insecure` is set.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Serve HTTPS. If false, the certificate settings are ignored.
    pub enabled: bool,

    /// Path to the server certificate chain (PEM format).
    pub cert_path: Option<PathBuf>,

    /// Path to the server private key (PEM format).
    /// Must match the certificate.
    pub key_path: Option<PathBuf>,

    /// Fall back to plaintext HTTP when the certificate material is
    /// missing or unusable. For development only.
    pub allow_insecure: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cert_path: Some(PathBuf::from("cert.pem")),
            key_path: Some(PathBuf::from("key.pem")),
            allow_insecure: false,
        }
    }
}

impl TlsConfig {
    /// Plaintext configuration, used by tests and `--insecure`.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            cert_path: None,
            key_path: None,
            allow_insecure: true,
        }
    }

    /// Check if TLS is enabled with both certificate and key configured.
    pub fn is_complete(&self) -> bool {
        self.enabled && self.cert_path.is_some() && self.key_path.is_some()
    }
}

/// Settings for spawned processes.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Time a stopped process gets between SIGTERM and SIGKILL.
    pub stop_grace_period_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            stop_grace_period_ms: 2000,
        }
    }
}

impl LauncherConfig {
    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_millis(self.stop_grace_period_ms)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub tls: TlsConfig,
    pub launcher: LauncherConfig,
    /// JSON file mapping bearer tokens to role names. The built-in
    /// development tokens are used when unset.
    pub tokens_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            tls: TlsConfig::default(),
            launcher: LauncherConfig::default(),
            tokens_path: None,
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_stop_grace_period_ms(mut self, ms: u64) -> Self {
        self.launcher.stop_grace_period_ms = ms;
        self
    }

    pub fn with_tokens_path(mut self, path: PathBuf) -> Self {
        self.tokens_path = Some(path);
        self
    }
}
