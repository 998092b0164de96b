//! Pluggable peer-to-peer transport.
//!
//! This crate provides the connection layer a peer-to-peer application is
//! built on:
//! - Dialing and accepting connections, one task per connection
//! - Per-connection handshake and registration hooks
//! - Decoder strategies telling messages apart from raw streams
//! - A single bounded queue where the application consumes messages
//!
//! # Example
//!
//! ```no_run
//! use p2p::{message_frame, new_transport, TransportOpts};
//!
//! # async fn run() -> p2p::Result<()> {
//! let server = new_transport(TransportOpts::new("127.0.0.1:3000"), "tcp")?;
//! server.listen_and_accept().await?;
//!
//! let client = new_transport(TransportOpts::new("127.0.0.1:4000"), "tcp")?;
//! client.dial("127.0.0.1:3000").await?;
//!
//! let rpc = server.consume().recv().await;
//! # let _ = (rpc, message_frame(b"hello"));
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod error;
pub mod handshake;
pub mod message;
pub mod metrics;
pub mod options;
pub mod peer;
pub mod transport;

pub use decoder::{BincodeDecoder, Decoder, DefaultDecoder};
pub use error::{Error, Result};
pub use handshake::{Handshake, NopHandshake, OnPeer};
pub use message::{message_frame, stream_frame, Rpc, INCOMING_MESSAGE, INCOMING_STREAM};
pub use options::{TransportOpts, DEFAULT_QUEUE_CAPACITY};
pub use peer::Peer;
pub use transport::{new_transport, Consumer, Protocol, TcpPeer, TcpTransport, Transport};
