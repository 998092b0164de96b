//! Transport selection by protocol name.

use crate::error::{Error, Result};
use crate::options::TransportOpts;
use crate::transport::tcp::TcpTransport;
use crate::transport::traits::Transport;
use std::fmt;
use std::str::FromStr;

/// Protocols a transport can be built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
}

impl Protocol {
    /// Name used to select this protocol.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
        }
    }

    /// Build a transport speaking this protocol.
    pub fn build(self, opts: TransportOpts) -> Box<dyn Transport> {
        match self {
            Protocol::Tcp => Box::new(TcpTransport::new(opts)),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            other => Err(Error::UnsupportedProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build a transport for `protocol`.
///
/// # Errors
///
/// [`Error::UnsupportedProtocol`] carrying the requested name when no
/// transport is registered for it.
pub fn new_transport(opts: TransportOpts, protocol: &str) -> Result<Box<dyn Transport>> {
    Ok(protocol.parse::<Protocol>()?.build(opts))
}
