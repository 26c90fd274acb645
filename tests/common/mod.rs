//! Shared setup for the loopback tests: a throwaway PKI for `localhost`
//! and a server bound to an OS-assigned port.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use tlsnet::{AsyncStd, Handler, Locator, NetConfig, Server};

static NEXT: AtomicUsize = AtomicUsize::new(0);

/// Writes a root and a `localhost` leaf signed by it into a fresh
/// directory, laid out the way the engine looks for them:
/// `trust/localhost.0.pem`, `ssl/localhost.crt`, `ssl/localhost.key`.
pub fn pki() -> Arc<NetConfig> {
    let dir = std::env::temp_dir().join(format!(
        "tlsnet-it-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    ));
    let trust_dir = dir.join("trust");
    let ssl_dir = dir.join("ssl");
    std::fs::create_dir_all(&trust_dir).unwrap();
    std::fs::create_dir_all(&ssl_dir).unwrap();

    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "tlsnet test root");
    let ca_key = KeyPair::generate().unwrap();
    let ca = ca_params.self_signed(&ca_key).unwrap();

    let mut leaf_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    leaf_params
        .distinguished_name
        .push(DnType::CommonName, "localhost");
    let leaf_key = KeyPair::generate().unwrap();
    let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

    std::fs::write(trust_dir.join("localhost.0.pem"), ca.pem()).unwrap();
    std::fs::write(ssl_dir.join("localhost.crt"), leaf.pem() + &ca.pem()).unwrap();
    std::fs::write(ssl_dir.join("localhost.key"), leaf_key.serialize_pem()).unwrap();

    Arc::new(NetConfig {
        trust_dir,
        ssl_dir,
        connect_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        ..NetConfig::default()
    })
}

/// Starts `handler` on `https://localhost:0/` and returns the locator of
/// the bound server.
pub async fn serve<H: Handler>(config: Arc<NetConfig>, handler: H) -> Locator {
    let bind: Locator = "https://localhost:0/".parse().unwrap();
    let server = Server::bind(&bind, config).await.unwrap();
    let locator = server.locator().clone();
    drop(server.listen(handler, AsyncStd));
    locator
}
