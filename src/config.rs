//! Connection configuration (§6.2).

use std::sync::Arc;

/// TLS configuration for a [`crate::connection::Connection`].
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
    pub ca_path: Option<String>,
    pub verify_hostname: Option<String>,
    pub verify_peer: bool,
}

impl TlsConfig {
    pub fn new(cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            ca_path: None,
            verify_hostname: None,
            verify_peer: false,
        }
    }

    pub fn with_ca(mut self, ca_path: impl Into<String>) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    pub fn with_verify_peer(mut self, verify_hostname: impl Into<String>) -> Self {
        self.verify_peer = true;
        self.verify_hostname = Some(verify_hostname.into());
        self
    }
}

/// Connection configuration (§6.2).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u32,
    pub timeout_ms: u32,
    pub tls: Option<Arc<TlsConfig>>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        Self {
            host: host.into(),
            port,
            timeout_ms: 5000,
            tls: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(Arc::new(tls));
        self
    }
}
