//! Transport layer abstractions.

use crate::error::Result;
use crate::message::Rpc;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A way for one node to reach others and be reached.
///
/// This trait allows different transport implementations behind the same
/// call sites; [`crate::new_transport`] picks one by protocol name.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The configured listen address.
    fn addr(&self) -> &str;

    /// The address actually bound, if the transport is listening.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Open an outbound connection to `addr`.
    ///
    /// Returns as soon as the connection is established; handshake and
    /// registration run in the background.
    async fn dial(&self, addr: &str) -> Result<()>;

    /// Bind the listen address and start accepting connections.
    ///
    /// Returns once the listener is bound; bind failures are reported here.
    async fn listen_and_accept(&self) -> Result<()>;

    /// The receiving end of the shared message queue.
    fn consume(&self) -> Consumer;

    /// Stop accepting connections and release the listener.
    ///
    /// Connections that are already open are left alone; applications that
    /// need them closed track peers through the `OnPeer` hook. Closing a
    /// transport that is not listening is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Receive-only handle to a transport's message queue.
///
/// Clones share one queue: every message is delivered to exactly one
/// `recv` call across all clones.
#[derive(Clone, Debug)]
pub struct Consumer {
    rx: Arc<Mutex<mpsc::Receiver<Rpc>>>,
}

impl Consumer {
    pub(crate) fn new(rx: mpsc::Receiver<Rpc>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Wait for the next message.
    ///
    /// Returns `None` only once the transport and all its connection tasks
    /// are gone.
    pub async fn recv(&self) -> Option<Rpc> {
        self.rx.lock().await.recv().await
    }

    /// Take the next message if one is already queued.
    ///
    /// Also returns `None` while another clone is waiting in [`recv`], even
    /// if messages are queued: that clone holds the receiver and gets them.
    ///
    /// [`recv`]: Consumer::recv
    pub fn try_recv(&self) -> Option<Rpc> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}
