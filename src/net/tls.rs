//! TLS configuration and certificate loading.
//!
//! Trust material for a client lives in `<trust_dir>/<host>.<n>.pem`, root
//! first, numbered from 0 without gaps. A server identity is
//! `<ssl_dir>/<host>.crt` plus `<ssl_dir>/<host>.key`. Provisioning those
//! files is somebody else's job; this module only reads them.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use crate::error::TlsError;

static PROVIDER: OnceCell<Arc<CryptoProvider>> = OnceCell::new();

/// Process-wide crypto provider. Safe to call any number of times; the
/// provider is built on first use and shared afterwards.
pub fn init() -> Arc<CryptoProvider> {
    PROVIDER
        .get_or_init(|| Arc::new(rustls::crypto::ring::default_provider()))
        .clone()
}

pub fn trust_path(dir: &Path, host: &str, index: usize) -> PathBuf {
    dir.join(format!("{host}.{index}.pem"))
}

/// Loads the ordered trust chain for `host`. Loading stops at the first
/// missing index; a missing index 0 is an error.
pub fn load_trust_chain(dir: &Path, host: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut chain = Vec::new();

    for index in 0.. {
        let path = trust_path(dir, host, index);
        if !path.exists() {
            if index == 0 {
                return Err(TlsError::MissingTrustRoot { path });
            }
            break;
        }
        let certs = read_certs(&path)?;
        tracing::debug!(path = %path.display(), count = certs.len(), "loaded trust certificates");
        chain.extend(certs);
    }

    Ok(chain)
}

/// Certificate chain and private key a server presents for `host`.
pub fn load_identity(
    dir: &Path,
    host: &str,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), TlsError> {
    let cert_path = dir.join(format!("{host}.crt"));
    let key_path = dir.join(format!("{host}.key"));

    let certs = read_certs(&cert_path)?;
    let mut reader = open(&key_path)?;
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Pem {
            path: key_path.clone(),
            source,
        })?
        .ok_or(TlsError::NoPrivateKey(key_path))?;

    Ok((certs, key))
}

pub fn client_config(trust_dir: &Path, host: &str) -> Result<ClientConfig, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_trust_chain(trust_dir, host)? {
        roots.add(cert)?;
    }

    let config = ClientConfig::builder_with_provider(init())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

pub fn server_config(ssl_dir: &Path, host: &str) -> Result<ServerConfig, TlsError> {
    let (certs, key) = load_identity(ssl_dir, host)?;

    let config = ServerConfig::builder_with_provider(init())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Pem {
            path: path.to_path_buf(),
            source,
        })
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificate(path.to_path_buf()));
    }
    Ok(certs)
}
