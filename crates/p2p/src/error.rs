//! Error types for the transport layer.

use std::io;
use thiserror::Error;

/// Result type alias for the transport layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the transport layer.
///
/// Only [`Error::Bind`], [`Error::Dial`], [`Error::AlreadyListening`] and
/// [`Error::UnsupportedProtocol`] ever reach the caller of a transport
/// operation. Everything else is scoped to a single connection and ends that
/// connection's task.
#[derive(Error, Debug)]
pub enum Error {
    /// Listener setup failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Outbound connection could not be opened
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The transport is already accepting connections
    #[error("transport is already listening on {0}")]
    AlreadyListening(String),

    /// Handshake hook refused the peer
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// `OnPeer` hook refused the peer
    #[error("peer rejected: {0}")]
    PeerRejected(String),

    /// The decoder could not read a unit from the connection
    #[error("decode error: {0}")]
    Decode(#[source] io::Error),

    /// Writing to or reading raw bytes from a peer failed
    #[error("transmission error: {0}")]
    Transmission(#[from] io::Error),

    /// The peer connection has already been closed
    #[error("peer connection closed")]
    PeerClosed,

    /// Transient accept failure (logged, never returned)
    #[error("accept error: {0}")]
    Accept(#[source] io::Error),

    /// Frame header announced more bytes than the codec accepts
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Structured encoding/decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// No transport is registered under this protocol name
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}

impl Error {
    /// Returns true if the error only concerns one connection.
    ///
    /// Such errors end the connection's task and are logged; they never
    /// affect the transport or its other connections.
    pub fn is_connection_scoped(&self) -> bool {
        matches!(
            self,
            Self::HandshakeRejected(_)
                | Self::PeerRejected(_)
                | Self::Decode(_)
                | Self::Transmission(_)
                | Self::PeerClosed
                | Self::FrameTooLarge { .. }
                | Self::Serialization(_)
        )
    }
}
