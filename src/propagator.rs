//! # Peer Propagator
//!
//! Fans one encoded message out to every configured peer. Each peer is an
//! independent best-effort attempt: a failure is logged and the remaining
//! peers are still tried. Nothing is retried and no peer health is tracked.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::transport::Transport;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

pub struct PeerPropagator {
    transport: Arc<dyn Transport>,
    peers: Vec<String>,
}

impl PeerPropagator {
    pub fn new(transport: Arc<dyn Transport>, peers: impl IntoIterator<Item = String>) -> Self {
        Self {
            transport,
            peers: peers.into_iter().collect(),
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Send `payload` to every peer, in order. Never fails as a whole.
    pub async fn broadcast(&self, payload: &[u8]) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for peer in &self.peers {
            match self.transport.send(peer, payload).await {
                Ok(_) => {
                    debug!("Operation sent to peer {}", peer);
                    report.delivered.push(peer.clone());
                }
                Err(e) => {
                    warn!("Failed to reach peer {}: {}", peer, e);
                    report.failed.push(peer.clone());
                }
            }
        }

        report
    }
}
