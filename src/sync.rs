//! # Sync Node
//!
//! Owns one node's components and runs its two long-lived loops:
//!
//! - the **poll loop**: detect local changes, encode them, broadcast them;
//! - the **receive loop**: take datagrams off the socket, decode them, apply
//!   them to the sync directory.
//!
//! Both loops share only [`KnownFiles`]. Neither loop stops on a steady-state
//! error; only the shutdown signal ends them.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::applier::ReplicationApplier;
use crate::config::{NodeConfig, SyncSettings};
use crate::detector::ChangeDetector;
use crate::directory::{LocalDirectory, SyncDirectory};
use crate::event::SyncEvent;
use crate::known_files::KnownFiles;
use crate::propagator::PeerPropagator;
use crate::protocol;
use crate::error::TransportError;
use crate::transport::{Datagram, Transport, UdpTransport};
use crate::watcher::DirectoryWatcher;

/// Counters kept by a running node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub events_detected: u64,
    pub events_untransmittable: u64,
    pub messages_sent: u64,
    pub send_failures: u64,
    pub datagrams_received: u64,
    pub datagrams_rejected: u64,
    pub events_applied: u64,
    pub apply_failures: u64,
}

pub struct SyncNode {
    config: Arc<NodeConfig>,
    settings: SyncSettings,
    known: KnownFiles,
    detector: ChangeDetector,
    applier: Arc<ReplicationApplier>,
    propagator: PeerPropagator,
    transport: Arc<dyn Transport>,
    stats: Arc<RwLock<SyncStats>>,
}

impl SyncNode {
    /// Create the sync directory if needed, bind the node's UDP port and
    /// build the node. Bind failure is returned, never swallowed.
    pub async fn bind(config: NodeConfig, settings: SyncSettings, port: u16) -> Result<Self> {
        tokio::fs::create_dir_all(config.sync_dir())
            .await
            .with_context(|| format!("cannot create sync directory {}", config.sync_dir().display()))?;

        let transport = UdpTransport::bind(settings.bind_addr(port), settings.send_timeout).await?;
        info!("Listening for peers on {}", transport.local_addr());

        Self::new(config, settings, Arc::new(transport)).await
    }

    /// Build a node on an already-bound transport and take the baseline scan.
    pub async fn new(
        config: NodeConfig,
        settings: SyncSettings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let dir: Arc<dyn SyncDirectory> = Arc::new(LocalDirectory::new(config.sync_dir()));
        let known = KnownFiles::new();

        let detector = ChangeDetector::new(dir.clone(), known.clone());
        detector
            .baseline()
            .await
            .with_context(|| format!("initial scan of {} failed", config.sync_dir().display()))?;

        let applier = Arc::new(ReplicationApplier::new(dir, known.clone()));
        let propagator = PeerPropagator::new(transport.clone(), config.peers().iter().cloned());

        Ok(Self {
            config: Arc::new(config),
            settings,
            known,
            detector,
            applier,
            propagator,
            transport,
            stats: Arc::new(RwLock::new(SyncStats::default())),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn known_files(&self) -> &KnownFiles {
        &self.known
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Live counters that stay readable after `run` takes the node.
    pub fn stats_handle(&self) -> Arc<RwLock<SyncStats>> {
        self.stats.clone()
    }

    /// Run both loops until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Node {} syncing {} with {} peer(s): {:?}",
            self.config.self_address(),
            self.config.sync_dir().display(),
            self.config.peers().len(),
            self.config.peers()
        );

        let nudge = Arc::new(Notify::new());
        let _watcher = if self.settings.watch {
            match DirectoryWatcher::start(self.config.sync_dir(), nudge.clone()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!("Filesystem watch unavailable, polling only: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let receiver = tokio::spawn(receive_loop(
            self.transport.clone(),
            self.applier.clone(),
            self.stats.clone(),
            shutdown.clone(),
        ));

        self.poll_loop(&nudge, &mut shutdown).await;

        if let Err(e) = receiver.await {
            error!("Receive loop ended abnormally: {}", e);
        }

        info!("Sync node stopped. Final stats: {:?}", self.stats());
        Ok(())
    }

    async fn poll_loop(&self, nudge: &Notify, shutdown: &mut watch::Receiver<bool>) {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is immediate and the baseline already covers it.
        ticker.tick().await;

        info!("Polling every {:?}", self.settings.poll_interval);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
                _ = nudge.notified() => {
                    debug!("Directory activity reported, waiting for it to settle");
                    if !self.settle(nudge, &mut ticker, shutdown).await {
                        break;
                    }
                }
            }
            self.run_cycle().await;
        }

        info!("Poll loop stopped");
    }

    /// Wait until no nudge has arrived for `watch_debounce`, so a burst of
    /// writes is picked up by one cycle. The regular tick still wins, so a
    /// file written continuously is scanned at least once per interval.
    /// Returns `false` on shutdown.
    async fn settle(
        &self,
        nudge: &Notify,
        ticker: &mut Interval,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return false,
                _ = ticker.tick() => return true,
                _ = nudge.notified() => continue,
                _ = sleep(self.settings.watch_debounce) => return true,
            }
        }
    }

    /// One detection cycle plus broadcast of whatever it found.
    /// Returns the number of local changes detected, announced or not.
    pub async fn run_cycle(&self) -> usize {
        let outcome = self.detector.poll_cycle().await;

        if !outcome.oversized.is_empty() {
            let mut stats = self.stats.write();
            stats.events_detected += outcome.oversized.len() as u64;
            stats.events_untransmittable += outcome.oversized.len() as u64;
        }
        for event in &outcome.events {
            self.broadcast_event(event).await;
        }
        outcome.detected()
    }

    async fn broadcast_event(&self, event: &SyncEvent) {
        self.stats.write().events_detected += 1;

        let payload = match protocol::encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot transmit {}: {}", event, e);
                self.stats.write().events_untransmittable += 1;
                return;
            }
        };

        info!("Broadcasting {} to {} peer(s)", event, self.propagator.peers().len());
        let report = self.propagator.broadcast(&payload).await;

        let mut stats = self.stats.write();
        stats.messages_sent += report.delivered.len() as u64;
        stats.send_failures += report.failed.len() as u64;
    }
}

async fn receive_loop(
    transport: Arc<dyn Transport>,
    applier: Arc<ReplicationApplier>,
    stats: Arc<RwLock<SyncStats>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Network listener active, waiting for datagrams...");

    loop {
        if *shutdown.borrow() {
            break;
        }
        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = transport.recv() => received,
        };

        match received {
            Ok(datagram) => handle_datagram(&applier, &stats, datagram).await,
            Err(e @ TransportError::Oversized { .. }) => {
                warn!("{}", e);
                let mut stats = stats.write();
                stats.datagrams_received += 1;
                stats.datagrams_rejected += 1;
            }
            Err(e) => warn!("Error receiving datagram: {}", e),
        }
    }

    info!("Receive loop stopped");
}

/// Decode and apply one inbound datagram. Malformed datagrams are dropped.
pub(crate) async fn handle_datagram(
    applier: &ReplicationApplier,
    stats: &RwLock<SyncStats>,
    datagram: Datagram,
) {
    stats.write().datagrams_received += 1;
    debug!("Received {} bytes from {}", datagram.len(), datagram.source);

    let event = match protocol::decode(datagram.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!("Discarding malformed datagram from {}: {}", datagram.source, e);
            stats.write().datagrams_rejected += 1;
            return;
        }
    };

    info!("Remote {} from {}", event, datagram.source);
    let applied = applier.apply(&event).await.is_ok();

    let mut stats = stats.write();
    if applied {
        stats.events_applied += 1;
    } else {
        stats.apply_failures += 1;
    }
}
