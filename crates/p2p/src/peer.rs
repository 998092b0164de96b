//! Peer abstraction.
//!
//! A peer is one live connection, whatever the protocol underneath. The
//! transport hands peers to the handshake and `OnPeer` hooks; applications
//! keep them around to reply and to consume raw streams.

use crate::error::Result;
use async_trait::async_trait;

/// One live connection to a remote node.
///
/// `send` may be called from any task, concurrently with the transport's own
/// read loop. Concurrent sends are each written whole, but their relative
/// order is whatever order they take the write lock in; callers that need
/// ordering across tasks must serialize themselves.
#[async_trait]
pub trait Peer: Send + Sync + 'static {
    /// Remote address of the connection, as used for [`crate::Rpc::from`].
    fn remote_addr(&self) -> &str;

    /// True if this node dialed the connection, false if it accepted it.
    fn is_outbound(&self) -> bool;

    /// Write `data` to the wire as one unit.
    ///
    /// Fails with [`crate::Error::Transmission`] when the OS rejects the
    /// write or the peer was already closed.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Read raw bytes from the connection.
    ///
    /// Only meant for handshakes and for consuming a stream after the
    /// transport delivered a stream-start [`crate::Rpc`]. Returns 0 on EOF.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Fill `buf` completely from the connection.
    async fn read_exact(&self, buf: &mut [u8]) -> Result<()>;

    /// Signal that the application finished consuming a stream session.
    ///
    /// Must be called exactly once per stream-start message received from
    /// this peer. A call without a pending stream is a caller bug; it is
    /// logged and otherwise ignored.
    fn close_stream(&self);

    /// Close the connection. Later reads fail with
    /// [`crate::Error::PeerClosed`], later sends with a transmission error.
    async fn close(&self);

    /// True once the connection was closed, locally or because the
    /// transport's connection handler ended.
    fn is_closed(&self) -> bool;

    /// Resolves once the connection is closed.
    async fn closed(&self);
}
