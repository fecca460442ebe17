//! Error types

use std::io;
use thiserror::Error;

/// Transport error
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure on the underlying stream
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Malformed length-prefixed packet
    #[error("framing error: {0}")]
    Framing(String),

    /// Startup packet requested a protocol version other than 3.0
    #[error("unsupported protocol version {major}.{minor}")]
    ProtocolVersionUnsupported {
        /// Requested major version
        major: u16,
        /// Requested minor version
        minor: u16,
    },

    /// A complete frame could not be decoded as a frontend message
    #[error("decode error: {0}")]
    Decode(io::Error),

    /// Peer closed the stream at a message boundary
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Short, static label for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Framing(_) => "framing",
            Error::ProtocolVersionUnsupported { .. } => "version",
            Error::Decode(_) => "decode",
            Error::ConnectionClosed => "closed",
            Error::Config(_) => "config",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
