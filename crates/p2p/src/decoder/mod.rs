//! Decoder strategies.
//!
//! A decoder turns the bytes of one live connection into [`crate::Rpc`]
//! values, one per call. The transport picks its decoder from
//! [`crate::TransportOpts`], so both ends of a connection must agree on it.

pub mod framed;
pub mod structured;
pub mod traits;

pub use framed::{DefaultDecoder, MAX_PAYLOAD_SIZE};
pub use structured::{BincodeDecoder, MAX_FRAME_SIZE};
pub use traits::Decoder;
