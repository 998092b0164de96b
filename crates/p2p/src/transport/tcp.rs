//! TCP-based transport implementation.
//!
//! One task accepts connections; every accepted or dialed connection gets its
//! own task that runs the hooks and then decodes messages into the shared
//! queue until the connection ends.
//!
//! # Connection lifecycle
//!
//! ```text
//! accept/dial -> handshake -> on_peer -> read loop -> closed
//!                    |           |           |
//!                    +-----------+-----------+--> closed on error
//! ```
//!
//! The queue is bounded: when the consumer falls behind, every connection
//! task blocks on its next push, which in turn stops reading from the socket.

use crate::error::{Error, Result};
use crate::handshake::{Handshake, OnPeer};
use crate::metrics;
use crate::message::Rpc;
use crate::options::TransportOpts;
use crate::peer::Peer;
use crate::transport::peer::TcpPeer;
use crate::transport::traits::{Consumer, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// TCP transport: one listener, any number of connections, one queue.
pub struct TcpTransport {
    shared: Arc<Shared>,
    consumer: Consumer,
    listener: Mutex<Option<Listening>>,
}

/// State every connection task needs.
struct Shared {
    opts: TransportOpts,
    rpc_tx: mpsc::Sender<Rpc>,
}

/// A running accept loop.
struct Listening {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TcpTransport {
    /// Create a transport. Nothing is bound until
    /// [`Transport::listen_and_accept`] is called.
    pub fn new(opts: TransportOpts) -> Self {
        let (rpc_tx, rpc_rx) = mpsc::channel(opts.queue_capacity.max(1));

        Self {
            shared: Arc::new(Shared { opts, rpc_tx }),
            consumer: Consumer::new(rpc_rx),
            listener: Mutex::new(None),
        }
    }

    /// The options this transport was built with.
    pub fn opts(&self) -> &TransportOpts {
        &self.shared.opts
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn addr(&self) -> &str {
        &self.shared.opts.listen_addr
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().as_ref().map(|l| l.local_addr)
    }

    async fn dial(&self, addr: &str) -> Result<()> {
        let stream = TcpStream::connect(addr).await.map_err(|source| Error::Dial {
            addr: addr.to_string(),
            source,
        })?;

        tracing::debug!(addr, "dialed peer");
        tokio::spawn(self.shared.clone().handle_connection(stream, true));
        Ok(())
    }

    async fn listen_and_accept(&self) -> Result<()> {
        if let Some(addr) = self.local_addr() {
            return Err(Error::AlreadyListening(addr.to_string()));
        }

        let addr = &self.shared.opts.listen_addr;
        let bind_error = |source| Error::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(self.shared.clone(), listener, shutdown_rx));

        let mut slot = self.listener.lock();
        if let Some(current) = slot.as_ref() {
            // Lost a race with a concurrent call; keep the first listener.
            task.abort();
            return Err(Error::AlreadyListening(current.local_addr.to_string()));
        }
        *slot = Some(Listening {
            local_addr,
            shutdown,
            task,
        });
        drop(slot);

        tracing::info!(addr = %local_addr, "listening");
        Ok(())
    }

    fn consume(&self) -> Consumer {
        self.consumer.clone()
    }

    async fn close(&self) -> Result<()> {
        let listening = self.listener.lock().take();
        if let Some(listening) = listening {
            let _ = listening.shutdown.send(());
            // The listener is dropped with the task.
            let _ = listening.task.await;
            tracing::info!(addr = %listening.local_addr, "listener closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("opts", &self.shared.opts)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

async fn accept_loop(
    shared: Arc<Shared>,
    listener: TcpListener,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            // Fires on close() and when the transport is dropped.
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "accepted connection");
                    tokio::spawn(shared.clone().handle_connection(stream, false));
                }
                Err(err) => {
                    metrics::record_accept_error();
                    let err = Error::Accept(err);
                    tracing::warn!(error = %err, "transient accept failure");
                }
            }
        }
    }
    tracing::debug!("accept loop stopped");
}

impl Shared {
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, outbound: bool) {
        let peer = match TcpPeer::new(stream, outbound) {
            Ok(peer) => Arc::new(peer),
            Err(err) => {
                tracing::debug!(error = %err, outbound, "connection dropped before setup");
                return;
            }
        };

        metrics::record_connection(outbound);
        let addr = peer.remote_addr().to_string();

        match self.run_peer(&peer).await {
            Ok(()) => tracing::debug!(%addr, outbound, "connection ended"),
            Err(err @ Error::HandshakeRejected(_)) => {
                metrics::record_rejection("handshake");
                tracing::warn!(%addr, outbound, error = %err, "handshake failed");
            }
            Err(err @ Error::PeerRejected(_)) => {
                metrics::record_rejection("on_peer");
                tracing::warn!(%addr, outbound, error = %err, "peer rejected");
            }
            Err(err) => {
                metrics::record_decode_error();
                tracing::debug!(%addr, outbound, error = %err, "error decoding message");
            }
        }

        peer.close().await;
        peer.release().await;
        metrics::record_disconnect();
    }

    async fn run_peer(&self, peer: &Arc<TcpPeer>) -> Result<()> {
        if let Some(handshake) = &self.opts.handshake {
            run_handshake(handshake.as_ref(), peer.as_ref()).await?;
        }

        if let Some(on_peer) = &self.opts.on_peer {
            run_on_peer(on_peer.as_ref(), peer.clone()).await?;
        }

        self.read_loop(peer).await
    }

    async fn read_loop(&self, peer: &TcpPeer) -> Result<()> {
        let decoder = self.opts.decoder.as_ref();

        loop {
            let Some((decoded, exhausted)) = peer.decode_next(decoder).await else {
                return Ok(());
            };

            let mut rpc = match decoded? {
                Some(rpc) => rpc,
                None if exhausted => return Ok(()),
                None => continue,
            };
            rpc.from = peer.remote_addr().to_string();

            let stream = rpc.stream;
            // Only an `on_peer` hook hands out the peer that can end a stream
            // session; without one, decoding carries on past the marker.
            let park = stream && self.opts.on_peer.is_some();
            if park {
                // Counted before the push so a fast close_stream is never lost.
                peer.open_stream();
            }

            if self.rpc_tx.send(rpc).await.is_err() {
                // Transport dropped along with its consumer.
                return Ok(());
            }
            metrics::record_rpc(stream);

            if park {
                tracing::debug!(addr = %peer.remote_addr(), "stream opened, waiting for close_stream");
                if !peer.wait_streams_closed().await {
                    return Ok(());
                }
                tracing::debug!(addr = %peer.remote_addr(), "stream closed, resuming read loop");
            }
        }
    }
}

async fn run_handshake(handshake: &dyn Handshake, peer: &TcpPeer) -> Result<()> {
    handshake.handshake(peer).await.map_err(|err| match err {
        Error::HandshakeRejected(_) => err,
        other => Error::HandshakeRejected(other.to_string()),
    })
}

async fn run_on_peer(on_peer: &dyn OnPeer, peer: Arc<TcpPeer>) -> Result<()> {
    on_peer.on_peer(peer).await.map_err(|err| match err {
        Error::PeerRejected(_) => err,
        other => Error::PeerRejected(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = TcpTransport::new(TransportOpts::new("127.0.0.1:0"));
        assert_eq!(transport.addr(), "127.0.0.1:0");
        assert!(transport.local_addr().is_none());
        assert!(transport.consume().try_recv().is_none());
    }

    #[tokio::test]
    async fn test_listen_and_close() {
        let transport = TcpTransport::new(TransportOpts::new("127.0.0.1:0"));
        transport.listen_and_accept().await.unwrap();

        let bound = transport.local_addr().unwrap();
        assert_ne!(bound.port(), 0);

        transport.close().await.unwrap();
        assert!(transport.local_addr().is_none());
        assert!(TcpStream::connect(bound).await.is_err());
    }

    #[tokio::test]
    async fn test_listen_twice_rejected() {
        let transport = TcpTransport::new(TransportOpts::new("127.0.0.1:0"));
        transport.listen_and_accept().await.unwrap();

        let err = transport.listen_and_accept().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyListening(_)));

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_error_reported() {
        let first = TcpTransport::new(TransportOpts::new("127.0.0.1:0"));
        first.listen_and_accept().await.unwrap();
        let taken = first.local_addr().unwrap().to_string();

        let second = TcpTransport::new(TransportOpts::new(taken));
        let err = second.listen_and_accept().await.unwrap_err();
        assert!(matches!(err, Error::Bind { .. }));
    }

    #[tokio::test]
    async fn test_dial_error_reported() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let transport = TcpTransport::new(TransportOpts::new("127.0.0.1:0"));
        let err = transport.dial(&addr).await.unwrap_err();
        assert!(matches!(err, Error::Dial { .. }));
    }
}
