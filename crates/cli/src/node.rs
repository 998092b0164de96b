//! A running demo node.
//!
//! The transport keeps no peer set of its own, so the node records every
//! registered peer in a [`PeerRegistry`] from its `OnPeer` hook and drops it
//! again once the connection closes. The registry is what lets the node serve
//! stream messages and close every connection on shutdown.

use crate::config::{CliConfig, DecoderKind};
use anyhow::Context;
use dashmap::DashMap;
use p2p::{message_frame, BincodeDecoder, Peer, Rpc, Transport};
use std::sync::Arc;

/// Largest chunk read from a peer per stream message.
const STREAM_CHUNK: usize = 64 * 1024;

/// Registered peers keyed by remote address.
pub type PeerRegistry = Arc<DashMap<String, Arc<dyn Peer>>>;

/// A transport plus the application state around it.
pub struct Node {
    transport: Box<dyn Transport>,
    peers: PeerRegistry,
}

impl Node {
    /// Build the transport, listen and dial as configured.
    ///
    /// Failed dials are logged and skipped; a failed bind aborts startup.
    pub async fn start(config: &CliConfig) -> anyhow::Result<Self> {
        let peers = PeerRegistry::default();
        let greeting = match &config.send {
            Some(text) => Some(encode_message(config.decoder, text)?),
            None => None,
        };

        let registry = peers.clone();
        let on_peer = move |peer: Arc<dyn Peer>| -> p2p::Result<()> {
            tracing::info!(addr = %peer.remote_addr(), outbound = peer.is_outbound(), "peer registered");
            if peer.is_outbound() {
                if let Some(frame) = greeting.clone() {
                    let peer = peer.clone();
                    tokio::spawn(async move {
                        if let Err(err) = peer.send(&frame).await {
                            tracing::warn!(addr = %peer.remote_addr(), error = %err, "greeting failed");
                        }
                    });
                }
            }
            registry.insert(peer.remote_addr().to_string(), peer.clone());

            let registry = registry.clone();
            tokio::spawn(async move {
                peer.closed().await;
                // A reconnect from the same address may already own the slot.
                registry.remove_if(peer.remote_addr(), |_, entry| Arc::ptr_eq(entry, &peer));
                tracing::debug!(addr = %peer.remote_addr(), "peer unregistered");
            });
            Ok(())
        };

        let opts = config.transport_opts().with_on_peer(on_peer);
        let transport = p2p::new_transport(opts, &config.protocol)?;

        if !config.no_listen {
            transport
                .listen_and_accept()
                .await
                .with_context(|| format!("cannot listen on {}", config.listen))?;
        }

        for addr in &config.dial {
            if let Err(err) = transport.dial(addr).await {
                tracing::warn!(%addr, error = %err, "dial failed");
            }
        }

        Ok(Self { transport, peers })
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Consume messages until Ctrl-C, then shut down.
    pub async fn run_until_shutdown(self) -> anyhow::Result<()> {
        let consumer = self.transport.consume();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                rpc = consumer.recv() => match rpc {
                    Some(rpc) => self.handle_rpc(rpc),
                    None => break,
                },
            }
        }
        self.shutdown().await
    }

    fn handle_rpc(&self, rpc: Rpc) {
        if rpc.stream {
            self.serve_stream(&rpc.from);
            return;
        }
        tracing::info!(
            from = %rpc.from,
            len = rpc.payload.len(),
            "message: {}",
            String::from_utf8_lossy(&rpc.payload)
        );
    }

    /// Hand a stream session to its own task so other peers keep flowing.
    fn serve_stream(&self, from: &str) {
        let Some(peer) = self.peers.get(from).map(|entry| entry.value().clone()) else {
            tracing::warn!(%from, "stream from unregistered peer");
            return;
        };
        tokio::spawn(drain_stream(peer));
    }

    /// Close the listener and every registered connection.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.transport.close().await?;

        let peers: Vec<_> = self.peers.iter().map(|entry| entry.value().clone()).collect();
        self.peers.clear();
        for peer in peers {
            peer.close().await;
        }
        tracing::info!("node stopped");
        Ok(())
    }
}

/// Read one chunk of stream data from `peer` and close the session.
async fn drain_stream(peer: Arc<dyn Peer>) {
    let from = peer.remote_addr();
    let mut buf = vec![0u8; STREAM_CHUNK];
    match peer.read(&mut buf).await {
        Ok(n) => tracing::info!(%from, bytes = n, "stream received"),
        Err(err) => tracing::warn!(%from, error = %err, "stream read failed"),
    }
    peer.close_stream();
}

/// Encode `text` as one message for the selected decoder.
fn encode_message(decoder: DecoderKind, text: &str) -> p2p::Result<Vec<u8>> {
    match decoder {
        DecoderKind::Default => Ok(message_frame(text.as_bytes()).to_vec()),
        DecoderKind::Bincode => {
            let frame = BincodeDecoder::encode(&Rpc::message(text.as_bytes().to_vec()))?;
            Ok(frame.to_vec())
        }
    }
}
