//! # Error Types
//!
//! Typed errors for the seams where callers need to tell failures apart.
//! Local filesystem failures stay as `std::io::Error`; bootstrap code wraps
//! everything in `anyhow`.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Startup configuration failures. These are fatal: the node never starts
/// its loops when one is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid listening port: {0}")]
    InvalidPort(String),

    #[error("cannot read peer list {path}: {source}")]
    PeersFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid peer address '{0}', expected host:port")]
    InvalidPeer(String),

    #[error("cannot read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid bind host '{0}'")]
    InvalidHost(String),
}

/// Reasons a datagram cannot be decoded, or an event cannot be encoded.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unrecognized command '{0}'")]
    UnknownCommand(String),

    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid filename '{0}'")]
    InvalidFilename(String),

    #[error("filename is not valid UTF-8")]
    NonUtf8Filename,

    #[error("message of {size} bytes exceeds the {limit} byte datagram limit")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Datagram transport failures. Everything except `Bind` is reported per
/// call and never stops a loop.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot resolve peer {peer}: {source}")]
    Resolve {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("peer {0} resolved to no usable address")]
    NoAddress(String),

    #[error("send to {peer} timed out after {timeout:?}")]
    Timeout { peer: String, timeout: Duration },

    #[error("send to {peer} failed: {source}")]
    Send {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("dropped datagram from {peer} larger than {limit} bytes")]
    Oversized { peer: SocketAddr, limit: usize },
}
