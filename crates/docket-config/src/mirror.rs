//! Upstream mirror connection settings.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Where and how to reach the mirror server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MirrorEndpoint {
    /// `host:port` of the mirror.
    pub addr: String,
    /// TLS material; plain TCP when absent.
    pub tls: Option<MirrorTls>,
}

impl MirrorEndpoint {
    /// Plain TCP endpoint.
    #[must_use]
    pub fn plain(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            tls: None,
        }
    }

    /// Host part of the address, without brackets for IPv6 literals.
    #[must_use]
    pub fn host(&self) -> &str {
        let host = self
            .addr
            .rsplit_once(':')
            .map_or(self.addr.as_str(), |(host, _)| host);
        host.trim_start_matches('[').trim_end_matches(']')
    }
}

/// PEM files used to secure the mirror connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MirrorTls {
    /// CA bundle used to verify the mirror.
    pub ca_file: Utf8PathBuf,
    /// Client certificate chain presented to the mirror.
    pub cert_file: Option<Utf8PathBuf>,
    /// Private key for the client certificate.
    pub key_file: Option<Utf8PathBuf>,
}
