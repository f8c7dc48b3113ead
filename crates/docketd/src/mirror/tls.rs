//! TLS client setup for the mirror connection.

use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::sync::Arc;

use camino::Utf8Path;
use docket_config::MirrorTls;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use super::MirrorError;

pub(super) type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Wraps `tcp` in TLS and completes the handshake.
pub(super) fn handshake(
    host: &str,
    settings: &MirrorTls,
    tcp: TcpStream,
) -> Result<TlsStream, MirrorError> {
    let config = client_config(settings)?;
    let server_name =
        ServerName::try_from(host.to_owned()).map_err(|_| MirrorError::InvalidServerName {
            host: host.to_owned(),
        })?;
    let connection = ClientConnection::new(Arc::new(config), server_name)?;
    let mut stream = StreamOwned::new(connection, tcp);
    while stream.conn.is_handshaking() {
        stream
            .conn
            .complete_io(&mut stream.sock)
            .map_err(|source| MirrorError::Handshake { source })?;
    }
    Ok(stream)
}

pub(super) fn client_config(settings: &MirrorTls) -> Result<ClientConfig, MirrorError> {
    let mut roots = RootCertStore::empty();
    for certificate in load_certificates(&settings.ca_file)? {
        roots.add(certificate)?;
    }
    let builder = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots);

    match (&settings.cert_file, &settings.key_file) {
        (Some(cert_file), Some(key_file)) => Ok(builder.with_client_auth_cert(
            load_certificates(cert_file)?,
            load_private_key(key_file)?,
        )?),
        _ => Ok(builder.with_no_client_auth()),
    }
}

fn open(path: &Utf8Path) -> Result<BufReader<File>, MirrorError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| MirrorError::Pem {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certificates(path: &Utf8Path) -> Result<Vec<CertificateDer<'static>>, MirrorError> {
    rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| MirrorError::Pem {
            path: path.to_path_buf(),
            source,
        })
}

fn load_private_key(path: &Utf8Path) -> Result<PrivateKeyDer<'static>, MirrorError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| MirrorError::Pem {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| MirrorError::MissingKey {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn settings(ca_file: Utf8PathBuf) -> MirrorTls {
        MirrorTls {
            ca_file,
            cert_file: None,
            key_file: None,
        }
    }

    #[test]
    fn missing_ca_file_is_reported_with_its_path() {
        let error = client_config(&settings(Utf8PathBuf::from("/nonexistent/ca.pem")))
            .expect_err("config fails");
        assert!(
            matches!(&error, MirrorError::Pem { path, .. } if path.as_str() == "/nonexistent/ca.pem"),
            "{error}"
        );
    }

    #[test]
    fn key_file_without_key_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let key = Utf8PathBuf::from_path_buf(dir.path().join("empty.key")).expect("utf8 path");
        std::fs::write(&key, "not a pem file\n").expect("write key file");

        let error = load_private_key(&key).expect_err("no key present");

        assert!(matches!(error, MirrorError::MissingKey { .. }), "{error}");
    }

    #[test]
    fn empty_ca_bundle_builds_a_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ca = Utf8PathBuf::from_path_buf(dir.path().join("ca.pem")).expect("utf8 path");
        std::fs::write(&ca, "").expect("write ca file");

        assert!(client_config(&settings(ca)).is_ok());
    }
}
