//! Transport configuration.

use crate::decoder::{Decoder, DefaultDecoder};
use crate::handshake::{Handshake, OnPeer};
use std::fmt;
use std::sync::Arc;

/// Default capacity of the shared queue of decoded messages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Options shared by every transport protocol.
///
/// Cheap to clone: hooks and decoder are reference counted. A transport
/// takes its own copy at construction, so later changes to an options value
/// never affect a running transport.
#[derive(Clone)]
pub struct TransportOpts {
    /// Local address to listen on, e.g. `"127.0.0.1:3000"`.
    pub listen_addr: String,
    /// Negotiation run on every new connection. `None` skips it.
    pub handshake: Option<Arc<dyn Handshake>>,
    /// Strategy turning connection bytes into messages.
    pub decoder: Arc<dyn Decoder>,
    /// Accept/registration hook run after the handshake. `None` accepts all.
    ///
    /// Stream mode needs this hook: it is the only way the application gets
    /// the peer it reads a stream from. Without it, stream-start messages are
    /// still delivered but the connection keeps decoding.
    pub on_peer: Option<Arc<dyn OnPeer>>,
    /// Number of decoded messages buffered before connections stall.
    pub queue_capacity: usize,
}

impl TransportOpts {
    /// Options for `listen_addr` with the default decoder and no hooks.
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            handshake: None,
            decoder: Arc::new(DefaultDecoder),
            on_peer: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_handshake(mut self, handshake: impl Handshake) -> Self {
        self.handshake = Some(Arc::new(handshake));
        self
    }

    pub fn with_decoder(mut self, decoder: impl Decoder) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    pub fn with_on_peer(mut self, on_peer: impl OnPeer) -> Self {
        self.on_peer = Some(Arc::new(on_peer));
        self
    }

    /// Set the queue capacity. Values below 1 are raised to 1.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

impl fmt::Debug for TransportOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOpts")
            .field("listen_addr", &self.listen_addr)
            .field("handshake", &self.handshake.is_some())
            .field("decoder", &self.decoder.name())
            .field("on_peer", &self.on_peer.is_some())
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}
