//! Shared helpers for the node-level integration tests.

#![allow(dead_code)]

use peersync::transport::UdpTransport;
use peersync::{NodeConfig, SyncNode, SyncSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct RunningNode {
    pub address: String,
    pub dir: TempDir,
    pub node: Option<SyncNode>,
}

pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        poll_interval: Duration::from_millis(50),
        send_timeout: Duration::from_millis(500),
        bind_host: "127.0.0.1".parse().unwrap(),
        ..Default::default()
    }
}

/// Bind `count` loopback transports, then build one node per transport with
/// every other node as a peer.
pub async fn mesh(count: usize, settings: SyncSettings) -> Vec<RunningNode> {
    mesh_seeded(count, settings, |_, _| {}).await
}

/// Like [`mesh`], but `seed` can fill each directory before its baseline scan.
pub async fn mesh_seeded<F: Fn(usize, &Path)>(
    count: usize,
    settings: SyncSettings,
    seed: F,
) -> Vec<RunningNode> {
    let mut transports = Vec::new();
    for _ in 0..count {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), settings.send_timeout)
            .await
            .unwrap();
        transports.push(transport);
    }
    let addresses: Vec<String> = transports.iter().map(|t| t.local_addr().to_string()).collect();

    let mut nodes = Vec::new();
    for (i, transport) in transports.into_iter().enumerate() {
        let dir = TempDir::new().unwrap();
        seed(i, dir.path());
        let peers = addresses.iter().filter(|a| **a != addresses[i]).cloned();
        let config = NodeConfig::new(addresses[i].clone(), peers, dir.path());
        let node = SyncNode::new(config, settings.clone(), Arc::new(transport))
            .await
            .unwrap();
        nodes.push(RunningNode {
            address: addresses[i].clone(),
            dir,
            node: Some(node),
        });
    }
    nodes
}

pub fn start(node: &mut RunningNode, shutdown: watch::Receiver<bool>) -> JoinHandle<anyhow::Result<()>> {
    let node = node.node.take().expect("node already started");
    tokio::spawn(node.run(shutdown))
}

/// Place a file into `dir` in one step so a scan never sees it half written.
pub fn drop_file(dir: &Path, name: &str, content: &[u8]) {
    let staging = TempDir::new_in(dir.parent().unwrap()).unwrap();
    let staged = staging.path().join(name);
    std::fs::write(&staged, content).unwrap();
    std::fs::rename(&staged, dir.join(name)).unwrap();
}

pub async fn wait_until<F: Fn() -> bool>(condition: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

pub fn read(dir: &Path, name: &str) -> Option<Vec<u8>> {
    std::fs::read(dir.join(name)).ok()
}
