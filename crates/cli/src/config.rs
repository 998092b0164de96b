//! Command line configuration.

use crate::node::Node;
use clap::{Parser, ValueEnum};
use p2p::{BincodeDecoder, DefaultDecoder, TransportOpts, DEFAULT_QUEUE_CAPACITY};

/// Decoder selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DecoderKind {
    /// Control byte followed by up to 1028 payload bytes
    Default,
    /// Length-delimited bincode values
    Bincode,
}

/// Run a p2p node: listen, dial peers, print what arrives.
#[derive(Parser, Debug, Clone)]
#[command(name = "p2p-node", version, about)]
pub struct CliConfig {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    pub listen: String,

    /// Do not accept inbound connections
    #[arg(long)]
    pub no_listen: bool,

    /// Peer to dial at startup (repeatable)
    #[arg(short, long)]
    pub dial: Vec<String>,

    /// Transport protocol
    #[arg(long, default_value = "tcp")]
    pub protocol: String,

    /// Wire decoder; both ends must agree
    #[arg(long, value_enum, default_value_t = DecoderKind::Default)]
    pub decoder: DecoderKind,

    /// Capacity of the incoming message queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Message sent to every dialed peer once it is registered
    #[arg(short, long)]
    pub send: Option<String>,
}

impl CliConfig {
    /// Transport options described by this configuration, without hooks.
    pub fn transport_opts(&self) -> TransportOpts {
        let opts = TransportOpts::new(self.listen.clone()).with_queue_capacity(self.queue_capacity);
        match self.decoder {
            DecoderKind::Default => opts.with_decoder(DefaultDecoder),
            DecoderKind::Bincode => opts.with_decoder(BincodeDecoder),
        }
    }

    /// Start the node and run until interrupted.
    pub async fn run(self) -> anyhow::Result<()> {
        let node = Node::start(&self).await?;
        node.run_until_shutdown().await
    }
}
