//! Per-connection hooks run before a peer starts delivering messages.
//!
//! The transport runs the [`Handshake`] first and the [`OnPeer`] hook second.
//! Either one can refuse the connection by returning an error, in which case
//! the connection is closed before anything is decoded from it.

use crate::error::Result;
use crate::peer::Peer;
use async_trait::async_trait;
use std::sync::Arc;

/// Negotiation executed on every new connection.
///
/// Implementations may read from and write to the peer; whatever they do not
/// consume is left for the decoder.
#[async_trait]
pub trait Handshake: Send + Sync + 'static {
    async fn handshake(&self, peer: &dyn Peer) -> Result<()>;
}

/// Handshake that accepts every peer without exchanging anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopHandshake;

#[async_trait]
impl Handshake for NopHandshake {
    async fn handshake(&self, _peer: &dyn Peer) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<F> Handshake for F
where
    F: Fn(&dyn Peer) -> Result<()> + Send + Sync + 'static,
{
    async fn handshake(&self, peer: &dyn Peer) -> Result<()> {
        (self)(peer)
    }
}

/// Accept/reject and registration hook, run after a successful handshake.
///
/// This is where applications record peers they want to address later
/// (replies, stream consumption, shutdown). The transport itself keeps no
/// peer set.
#[async_trait]
pub trait OnPeer: Send + Sync + 'static {
    async fn on_peer(&self, peer: Arc<dyn Peer>) -> Result<()>;
}

#[async_trait]
impl<F> OnPeer for F
where
    F: Fn(Arc<dyn Peer>) -> Result<()> + Send + Sync + 'static,
{
    async fn on_peer(&self, peer: Arc<dyn Peer>) -> Result<()> {
        (self)(peer)
    }
}
