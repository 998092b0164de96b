//! Demo node for the p2p transport.
//!
//! Provides:
//! - Command line configuration
//! - Logging setup
//! - A peer registry fed by the `OnPeer` hook
//! - A consume loop printing messages and draining streams

pub mod config;
pub mod node;

pub use config::{CliConfig, DecoderKind};
pub use node::{Node, PeerRegistry};
