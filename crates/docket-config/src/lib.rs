//! Configuration for the docket server.
//!
//! Settings are read from command-line flags with `DOCKET_*` environment
//! variables as fallbacks, then validated as a whole so that impossible
//! combinations (a mirror-using mode without a mirror, half a client
//! certificate) are rejected before the server starts.

mod defaults;
mod logging;
mod mirror;
mod mode;
mod socket;

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{DEFAULT_LOG_FILTER, DEFAULT_PORT, default_listen_endpoint, default_log_format};
pub use logging::{LogFormat, LogFormatParseError};
pub use mirror::{MirrorEndpoint, MirrorTls};
pub use mode::{Mode, ModeParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser, Serialize, Deserialize)]
#[command(
    name = "docketd",
    version,
    about = "Wire-protocol server core for a document database"
)]
pub struct Config {
    /// Endpoint accepting client connections (`tcp://host:port` or `unix:///path`).
    #[arg(long, env = "DOCKET_LISTEN", default_value_t = default_listen_endpoint())]
    pub listen: SocketEndpoint,
    /// Who answers requests: local-only, mirror-only, dual-prefer-local or dual-prefer-mirror.
    #[arg(long, env = "DOCKET_MODE", default_value_t = Mode::LocalOnly)]
    pub mode: Mode,
    /// Mirror server address as `host:port`.
    #[arg(long, env = "DOCKET_MIRROR_ADDR")]
    pub mirror_addr: Option<String>,
    /// PEM client certificate chain presented to the mirror.
    #[arg(long, env = "DOCKET_MIRROR_TLS_CERT_FILE")]
    pub mirror_tls_cert_file: Option<Utf8PathBuf>,
    /// PEM private key matching the client certificate.
    #[arg(long, env = "DOCKET_MIRROR_TLS_KEY_FILE")]
    pub mirror_tls_key_file: Option<Utf8PathBuf>,
    /// PEM CA bundle used to verify the mirror; enables TLS.
    #[arg(long, env = "DOCKET_MIRROR_TLS_CA_FILE")]
    pub mirror_tls_ca_file: Option<Utf8PathBuf>,
    /// Tracing filter directive, e.g. `info,docketd::router=debug`.
    #[arg(long, env = "DOCKET_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
    /// Log output format.
    #[arg(long, env = "DOCKET_LOG_FORMAT", default_value_t = default_log_format())]
    pub log_format: LogFormat,
    /// Directory receiving raw captures of client byte streams.
    #[arg(long, env = "DOCKET_CAPTURE_DIR")]
    pub capture_dir: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            mode: Mode::LocalOnly,
            mirror_addr: None,
            mirror_tls_cert_file: None,
            mirror_tls_key_file: None,
            mirror_tls_ca_file: None,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            capture_dir: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.uses_mirror() && self.mirror_addr.is_none() {
            return Err(ConfigError::MissingMirror { mode: self.mode });
        }
        if let Some(addr) = &self.mirror_addr
            && !addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        {
            return Err(ConfigError::InvalidMirrorAddress { addr: addr.clone() });
        }
        if self.mirror_tls_cert_file.is_some() != self.mirror_tls_key_file.is_some() {
            return Err(ConfigError::IncompleteClientCertificate);
        }
        if self.mirror_tls_cert_file.is_some() && self.mirror_tls_ca_file.is_none() {
            return Err(ConfigError::MissingCaFile);
        }
        Ok(())
    }

    /// Endpoint accepting client connections.
    #[must_use]
    pub const fn listen(&self) -> &SocketEndpoint {
        &self.listen
    }

    /// Routing mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Mirror settings, when a mirror address is configured.
    #[must_use]
    pub fn mirror(&self) -> Option<MirrorEndpoint> {
        let addr = self.mirror_addr.clone()?;
        let tls = self.mirror_tls_ca_file.clone().map(|ca_file| MirrorTls {
            ca_file,
            cert_file: self.mirror_tls_cert_file.clone(),
            key_file: self.mirror_tls_key_file.clone(),
        });
        Some(MirrorEndpoint { addr, tls })
    }

    /// Tracing filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Capture directory, when captures are enabled.
    #[must_use]
    pub fn capture_dir(&self) -> Option<&Utf8Path> {
        self.capture_dir.as_deref()
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line or environment parsing failed; also covers `--help` and `--version`.
    #[error(transparent)]
    Cli(#[from] clap::Error),
    /// A mirror-using mode was selected without a mirror address.
    #[error("mode '{mode}' requires --mirror-addr")]
    MissingMirror {
        /// Selected mode.
        mode: Mode,
    },
    /// The mirror address is not `host:port`.
    #[error("invalid mirror address '{addr}': expected host:port")]
    InvalidMirrorAddress {
        /// Configured address.
        addr: String,
    },
    /// Only one of the client certificate and key was configured.
    #[error("--mirror-tls-cert-file and --mirror-tls-key-file must be given together")]
    IncompleteClientCertificate,
    /// A client certificate was configured without a CA bundle.
    #[error("mirror TLS requires --mirror-tls-ca-file")]
    MissingCaFile,
}
