//! Core decoder trait definitions.

use crate::error::Result;
use crate::message::Rpc;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Byte source a decoder reads from: the read side of one connection.
pub type Source<'a> = dyn AsyncRead + Unpin + Send + 'a;

/// Interprets the byte stream of a connection as a sequence of [`Rpc`]s.
///
/// Decoders are stateless and shared by every connection of a transport;
/// all per-connection state lives in the bytes themselves.
#[async_trait]
pub trait Decoder: Send + Sync + 'static {
    /// Runs one decoding pass over `source`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(rpc))` when a unit was decoded. The `from` field is left
    ///   empty; the transport fills it in.
    /// - `Ok(None)` when nothing was decoded but the decoder does not
    ///   consider it a failure.
    /// - `Err(_)` when the connection can no longer be decoded.
    async fn decode(&self, source: &mut Source<'_>) -> Result<Option<Rpc>>;

    /// Returns the name of this decoder.
    fn name(&self) -> &'static str;
}
