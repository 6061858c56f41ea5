//! # peersync
//!
//! Keeps one flat directory identical across a fixed set of peer processes.
//!
//! Each node periodically diffs its directory against what it last saw and
//! broadcasts the differences as small UDP datagrams. Peers apply what they
//! receive and record it as already known, so replicated files are never
//! echoed back as local changes.
//!
//! ## Features
//!
//! - **Poll-and-diff detection**: creations, modifications and deletions
//!   derived from consecutive directory snapshots
//! - **Binary-safe wire format**: `CREATE|name|bytes` and `DELETE|name`
//! - **Best-effort fan-out**: one failing peer never blocks the others
//! - **Loop suppression**: a single shared map of known modification times
//! - **Optional watch nudge**: filesystem notifications trigger an early scan
//!
//! ## Core Modules
//!
//! - [`config`] - Node identity, peers file and TOML node file
//! - [`directory`] - Filesystem access used by detection and replication
//! - [`known_files`] - Shared known-state map
//! - [`detector`] - Change detection by snapshot diffing
//! - [`protocol`] - Wire encoding of [`SyncEvent`]s
//! - [`transport`] - UDP send and receive
//! - [`propagator`] - Fan-out to every configured peer
//! - [`applier`] - Replication of received events
//! - [`sync`] - The node runtime tying the loops together
//! - [`cli`] - Command-line interface
//!
//! ## Quick Start
//!
//! ```bash
//! # Two nodes on one machine
//! echo 127.0.0.1:5001 > a.peers
//! echo 127.0.0.1:5000 > b.peers
//! peersync run 5000 a.peers ./dir-a &
//! peersync run 5001 b.peers ./dir-b
//! ```

pub mod applier;
pub mod cli;
pub mod config;
pub mod detector;
pub mod directory;
pub mod error;
pub mod event;
pub mod known_files;
pub mod propagator;
pub mod protocol;
pub mod sync;
pub mod transport;
pub mod watcher;

pub use config::{NodeConfig, SyncSettings};
pub use event::SyncEvent;
pub use known_files::KnownFiles;
pub use sync::{SyncNode, SyncStats};
