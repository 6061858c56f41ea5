//! # Configuration Management
//!
//! This module holds everything a node is configured with at startup:
//! - `NodeConfig`: who this node is, who its peers are, and which directory it
//!   replicates. Immutable once built.
//! - `SyncSettings`: runtime tuning (poll interval, send timeout, bind host,
//!   optional filesystem-watch nudge).
//! - Loaders for the plain-text peers file and the TOML node file.
//!
//! Nothing here is re-read after startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Identity and peer set of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    self_address: String,
    peers: BTreeSet<String>,
    sync_dir: PathBuf,
}

impl NodeConfig {
    /// Build a node configuration. The node's own address is dropped from the
    /// peer set so it never sends to itself.
    pub fn new(
        self_address: impl Into<String>,
        peers: impl IntoIterator<Item = String>,
        sync_dir: impl Into<PathBuf>,
    ) -> Self {
        let self_address = self_address.into();
        let mut peers: BTreeSet<String> = peers.into_iter().collect();

        if peers.remove(&self_address) {
            warn!("Peer list contains this node ({}), ignoring it", self_address);
        }

        Self {
            self_address,
            peers,
            sync_dir: sync_dir.into(),
        }
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    pub fn sync_dir(&self) -> &Path {
        &self.sync_dir
    }
}

/// Runtime tuning for the sync loops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSettings {
    /// Delay between detection cycles.
    pub poll_interval: Duration,
    /// Upper bound on resolving and sending to one peer.
    pub send_timeout: Duration,
    /// Address the receive socket binds to.
    pub bind_host: IpAddr,
    /// Run an extra detection cycle once filesystem activity settles.
    pub watch: bool,
    /// Quiet period after the last reported activity before that cycle runs.
    pub watch_debounce: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            watch: false,
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
        }
    }
}

impl SyncSettings {
    pub fn bind_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_host, port)
    }

    /// Address peers should use for this node. An unspecified bind host is
    /// advertised as loopback.
    pub fn advertised_address(&self, port: u16) -> String {
        let host = if self.bind_host.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.bind_host
        };
        SocketAddr::new(host, port).to_string()
    }
}

/// Reject port 0; a node needs a fixed port its peers can address.
pub fn validate_port(port: u16) -> Result<u16, ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port.to_string()));
    }
    Ok(port)
}

/// Check that a peer entry looks like `host:port`.
pub fn parse_peer(entry: &str) -> Result<String, ConfigError> {
    let entry = entry.trim();
    let valid = match entry.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && port.parse::<u16>().map_or(false, |p| p != 0)
        }
        None => false,
    };

    if !valid {
        return Err(ConfigError::InvalidPeer(entry.to_string()));
    }
    Ok(entry.to_string())
}

/// Parse peers file content: one `host:port` per line, `#` comments and
/// blank lines ignored.
pub fn parse_peers(content: &str) -> Result<BTreeSet<String>, ConfigError> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_peer)
        .collect()
}

/// Load the peers file.
pub async fn load_peers(path: &Path) -> Result<BTreeSet<String>, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::PeersFile {
            path: path.to_path_buf(),
            source,
        })?;
    parse_peers(&content)
}

/// On-disk TOML form of a node's configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeFile {
    pub listen_port: u16,
    pub sync_dir: PathBuf,
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default)]
    pub peers_file: Option<PathBuf>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub send_timeout_ms: Option<u64>,
    #[serde(default)]
    pub watch: bool,
    #[serde(default)]
    pub watch_debounce_ms: Option<u64>,
}

impl NodeFile {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::ConfigFile {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content)
    }

    /// Resolve into a node configuration, settings and listening port.
    /// Relative `sync_dir` and `peers_file` paths are taken relative to
    /// `base_dir`, normally the directory holding the node file.
    pub async fn resolve(
        self,
        base_dir: &Path,
    ) -> Result<(NodeConfig, SyncSettings, u16), ConfigError> {
        let port = validate_port(self.listen_port)?;

        let mut settings = SyncSettings::default();
        if let Some(host) = &self.host {
            settings.bind_host = host
                .parse()
                .map_err(|_| ConfigError::InvalidHost(host.clone()))?;
        }
        if let Some(ms) = self.poll_interval_ms {
            settings.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = self.send_timeout_ms {
            settings.send_timeout = Duration::from_millis(ms.max(1));
        }
        settings.watch = self.watch;
        if let Some(ms) = self.watch_debounce_ms {
            settings.watch_debounce = Duration::from_millis(ms);
        }

        let mut peers = self
            .peers
            .iter()
            .map(|p| parse_peer(p))
            .collect::<Result<BTreeSet<_>, _>>()?;
        if let Some(peers_file) = &self.peers_file {
            peers.extend(load_peers(&base_dir.join(peers_file)).await?);
        }

        let sync_dir = base_dir.join(&self.sync_dir);
        let config = NodeConfig::new(settings.advertised_address(port), peers, sync_dir);
        Ok((config, settings, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_self_address_removed_from_peers() {
        let config = NodeConfig::new(
            "127.0.0.1:5000",
            vec!["127.0.0.1:5000".to_string(), "127.0.0.1:5001".to_string()],
            "/tmp/sync",
        );

        assert_eq!(config.peers().len(), 1);
        assert!(config.peers().contains("127.0.0.1:5001"));
        assert_eq!(config.sync_dir(), Path::new("/tmp/sync"));
    }

    #[test]
    fn test_parse_peers_skips_comments_and_duplicates() {
        let peers = parse_peers(
            "# lab nodes\n127.0.0.1:5001\n\n  127.0.0.1:5002  \n127.0.0.1:5001\nnode-b.local:6000\n",
        )
        .unwrap();

        assert_eq!(
            peers.into_iter().collect::<Vec<_>>(),
            vec!["127.0.0.1:5001", "127.0.0.1:5002", "node-b.local:6000"]
        );
    }

    #[test]
    fn test_parse_peer_rejects_malformed_entries() {
        for bad in ["localhost", ":5000", "host:", "host:0", "host:70000", "host:abc"] {
            assert_matches!(parse_peer(bad), Err(ConfigError::InvalidPeer(_)), "{}", bad);
        }
        assert_eq!(parse_peer("[::1]:5000").unwrap(), "[::1]:5000");
    }

    #[test]
    fn test_validate_port() {
        assert_eq!(validate_port(5000).unwrap(), 5000);
        assert_matches!(validate_port(0), Err(ConfigError::InvalidPort(_)));
    }

    #[test]
    fn test_advertised_address() {
        let settings = SyncSettings::default();
        assert_eq!(settings.advertised_address(4000), "127.0.0.1:4000");
        assert_eq!(settings.bind_addr(4000).to_string(), "0.0.0.0:4000");

        let settings = SyncSettings {
            bind_host: "192.168.1.20".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(settings.advertised_address(4000), "192.168.1.20:4000");
    }

    #[tokio::test]
    async fn test_missing_peers_file() {
        let temp_dir = TempDir::new().unwrap();
        assert_matches!(
            load_peers(&temp_dir.path().join("nodes.txt")).await,
            Err(ConfigError::PeersFile { .. })
        );
    }

    #[tokio::test]
    async fn test_node_file_resolution() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("nodes.txt"), "127.0.0.1:7002\n").unwrap();

        let file = NodeFile::parse(
            r#"
            listen_port = 7001
            sync_dir = "/srv/shared"
            peers = ["127.0.0.1:7003"]
            peers_file = "nodes.txt"
            poll_interval_ms = 500
            watch = true
            watch_debounce_ms = 50
            "#,
        )
        .unwrap();

        let (config, settings, port) = file.resolve(temp_dir.path()).await.unwrap();

        assert_eq!(port, 7001);
        assert_eq!(config.self_address(), "127.0.0.1:7001");
        assert_eq!(config.peers().len(), 2);
        assert_eq!(config.sync_dir(), Path::new("/srv/shared"));
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.send_timeout, DEFAULT_SEND_TIMEOUT);
        assert!(settings.watch);
        assert_eq!(settings.watch_debounce, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_node_file_rejects_bad_values() {
        let temp_dir = TempDir::new().unwrap();

        let file = NodeFile::parse("listen_port = 0\nsync_dir = \"d\"\n").unwrap();
        assert_matches!(
            file.resolve(temp_dir.path()).await,
            Err(ConfigError::InvalidPort(_))
        );

        let file = NodeFile::parse("listen_port = 1\nsync_dir = \"d\"\nhost = \"nope\"\n").unwrap();
        assert_matches!(
            file.resolve(temp_dir.path()).await,
            Err(ConfigError::InvalidHost(_))
        );

        assert_matches!(NodeFile::parse("sync_dir = \"d\""), Err(ConfigError::Toml(_)));
    }
}
