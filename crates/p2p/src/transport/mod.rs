//! Transport layer for peer-to-peer communication.
//!
//! [`Transport`] is protocol agnostic; [`TcpTransport`] is the one
//! implementation today and [`new_transport`] selects implementations by
//! protocol name.

pub mod factory;
pub mod peer;
pub mod tcp;
pub mod traits;

pub use factory::{new_transport, Protocol};
pub use peer::TcpPeer;
pub use tcp::TcpTransport;
pub use traits::{Consumer, Transport};
