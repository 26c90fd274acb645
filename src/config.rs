use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<NetConfig> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Directory holding client trust chains, `<host>.<n>.pem`.
    pub trust_dir: PathBuf,
    /// Directory holding server identities, `<host>.crt` and `<host>.key`.
    pub ssl_dir: PathBuf,

    pub buffer_size: usize,
    pub max_request_line: usize,
    pub max_header_line: usize,
    /// Bound on a whole header block, status line and trailers included.
    pub max_header_size: usize,
    pub max_chunk_line: usize,
    pub max_body_size: usize,

    #[serde(deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub write_timeout: Duration,

    pub server_name: String,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            trust_dir: PathBuf::from("trust"),
            ssl_dir: PathBuf::from("ssl"),

            buffer_size: 4096,
            max_request_line: 4096,
            max_header_line: 8192,
            max_header_size: 64 * 1024,
            max_chunk_line: 64,
            max_body_size: 8 * 1024 * 1024, // 8 MB

            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),

            server_name: "tlsnet/0.1".to_string(),
            user_agent: "tlsnet/0.1".to_string(),
        }
    }
}

/// Read-side bounds a [`Connection`](crate::net::connection::Connection)
/// carries so that message parsing does not need the whole config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub buffer_size: usize,
    pub max_header_line: usize,
    pub max_header_size: usize,
    pub max_chunk_line: usize,
    pub max_body_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        NetConfig::default().limits()
    }
}

impl NetConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to read config, using defaults");
                return NetConfig::default();
            }
        };

        match toml::from_str::<NetConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to parse config, using defaults");
                NetConfig::default()
            }
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            buffer_size: self.buffer_size.max(1),
            max_header_line: self.max_header_line,
            max_header_size: self.max_header_size,
            max_chunk_line: self.max_chunk_line,
            max_body_size: self.max_body_size,
        }
    }
}

/// Installs the process-wide configuration. Returns the rejected value when
/// one is already installed.
pub fn set_config(cfg: NetConfig) -> Result<(), NetConfig> {
    CONFIG.set(cfg)
}

/// Process-wide configuration, defaults when [`set_config`] was never called.
pub fn config() -> &'static NetConfig {
    CONFIG.get_or_init(NetConfig::default)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: NetConfig = toml::from_str(
            r#"
            trust_dir = "/etc/tlsnet/trust"
            read_timeout = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.trust_dir, PathBuf::from("/etc/tlsnet/trust"));
        assert_eq!(cfg.read_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.ssl_dir, PathBuf::from("ssl"));
        assert_eq!(cfg.max_chunk_line, 64);
    }

    #[test]
    fn header_block_bound_follows_config() {
        let cfg: NetConfig = toml::from_str("max_header_size = 1024").unwrap();
        assert_eq!(cfg.limits().max_header_size, 1024);
        assert_eq!(Limits::default().max_header_size, 64 * 1024);
    }

    #[test]
    fn second_install_is_rejected() {
        set_config(NetConfig::default()).ok();
        let rejected = set_config(NetConfig {
            server_name: "other".to_string(),
            ..NetConfig::default()
        });
        assert_eq!(rejected.map_err(|cfg| cfg.server_name), Err("other".to_string()));
        assert_eq!(config().server_name, "tlsnet/0.1");
    }

    #[test]
    fn negative_duration_is_rejected() {
        assert!(toml::from_str::<NetConfig>("write_timeout = -1.0").is_err());
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = NetConfig::from_file("/nonexistent/tlsnet.toml");
        assert_eq!(cfg.server_name, NetConfig::default().server_name);
    }
}
