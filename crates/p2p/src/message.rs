//! Message envelope passed between peers.
//!
//! Every unit decoded from a connection becomes an [`Rpc`]. The transport
//! never looks inside the payload; it only stamps the origin address before
//! handing the value to the application.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Control byte announcing a regular message.
pub const INCOMING_MESSAGE: u8 = 0x1;

/// Control byte announcing that the connection switches to raw-stream mode.
pub const INCOMING_STREAM: u8 = 0x2;

/// A message received from a peer.
///
/// Exactly one of `payload` and `stream` is meaningful: when `stream` is set
/// the payload is empty and the bytes that follow on the connection belong to
/// the application, which reads them straight from the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rpc {
    /// Remote address of the connection the message arrived on.
    pub from: String,
    /// Opaque message body.
    pub payload: Bytes,
    /// True if the connection is now in raw-stream mode.
    pub stream: bool,
}

impl Rpc {
    /// A regular message carrying `payload`.
    pub fn message(payload: impl Into<Bytes>) -> Self {
        Self {
            from: String::new(),
            payload: payload.into(),
            stream: false,
        }
    }

    /// The marker for the start of a raw stream.
    pub fn stream_start() -> Self {
        Self {
            from: String::new(),
            payload: Bytes::new(),
            stream: true,
        }
    }
}

/// Build a message frame for the default wire format: `[0x1] ++ payload`.
pub fn message_frame(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(payload.len() + 1);
    frame.put_u8(INCOMING_MESSAGE);
    frame.put_slice(payload);
    frame.freeze()
}

/// Build the one-byte frame that switches a connection to stream mode.
pub fn stream_frame() -> Bytes {
    Bytes::from_static(&[INCOMING_STREAM])
}
