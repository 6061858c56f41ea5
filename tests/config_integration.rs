//! Integration tests for configuration loading
//!
//! These tests verify that peers files and TOML node files are read from
//! disk and resolved into a node configuration correctly.

use peersync::config::{self, NodeFile};
use peersync::error::ConfigError;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;

#[tokio::test]
async fn test_peers_file_loading() {
    let temp_dir = TempDir::new().unwrap();
    let peers_path = temp_dir.path().join("nodes.txt");
    fs::write(
        &peers_path,
        "# office\n192.168.1.10:5000\n\n   192.168.1.11:5000\r\nlocalhost:5002\n",
    )
    .await
    .unwrap();

    let peers = config::load_peers(&peers_path).await.unwrap();
    assert_eq!(peers.len(), 3);
    assert!(peers.contains("192.168.1.11:5000"));
    assert!(peers.contains("localhost:5002"));
}

#[tokio::test]
async fn test_peers_file_with_bad_entry_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let peers_path = temp_dir.path().join("nodes.txt");
    fs::write(&peers_path, "192.168.1.10:5000\n192.168.1.11\n").await.unwrap();

    match config::load_peers(&peers_path).await {
        Err(ConfigError::InvalidPeer(entry)) => assert_eq!(entry, "192.168.1.11"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_node_file_relative_paths() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("nodes.txt"), "127.0.0.1:6001\n127.0.0.1:6000\n")
        .await
        .unwrap();
    let node_path = temp_dir.path().join("node.toml");
    fs::write(
        &node_path,
        r#"
listen_port = 6000
sync_dir = "shared"
peers_file = "nodes.txt"
host = "127.0.0.1"
send_timeout_ms = 250
"#,
    )
    .await
    .unwrap();

    let file = NodeFile::load(&node_path).await.unwrap();
    let (node, settings, port) = file.resolve(temp_dir.path()).await.unwrap();

    assert_eq!(port, 6000);
    assert_eq!(node.sync_dir(), temp_dir.path().join("shared"));
    // The node's own address is not a peer
    assert_eq!(node.peers().iter().collect::<Vec<_>>(), vec!["127.0.0.1:6001"]);
    assert_eq!(settings.send_timeout, Duration::from_millis(250));
    assert_eq!(settings.poll_interval, config::DEFAULT_POLL_INTERVAL);
    assert!(!settings.watch);
}

#[tokio::test]
async fn test_node_file_missing() {
    let result = NodeFile::load(Path::new("/nonexistent/peersync/node.toml")).await;
    assert!(matches!(result, Err(ConfigError::ConfigFile { .. })));
}

#[tokio::test]
async fn test_node_file_with_missing_peers_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = NodeFile::parse("listen_port = 6000\nsync_dir = \"shared\"\npeers_file = \"gone.txt\"\n").unwrap();

    let result = file.resolve(temp_dir.path()).await;
    assert!(matches!(result, Err(ConfigError::PeersFile { .. })));
}
