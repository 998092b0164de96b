//! Transport metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported until the
//! application installs a recorder.
//!
//! ## Counters
//! - `p2p_connections_total` - Connections by direction (inbound, outbound)
//! - `p2p_rejected_peers_total` - Refused connections by stage (handshake, on_peer)
//! - `p2p_rpcs_total` - Decoded messages by kind (message, stream)
//! - `p2p_decode_errors_total` - Connections ended by a decode error
//! - `p2p_accept_errors_total` - Transient accept failures
//!
//! ## Gauges
//! - `p2p_active_connections` - Connection tasks currently running

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "p2p_connections_total";
    pub const REJECTED_PEERS_TOTAL: &str = "p2p_rejected_peers_total";
    pub const RPCS_TOTAL: &str = "p2p_rpcs_total";
    pub const DECODE_ERRORS_TOTAL: &str = "p2p_decode_errors_total";
    pub const ACCEPT_ERRORS_TOTAL: &str = "p2p_accept_errors_total";
    pub const ACTIVE_CONNECTIONS: &str = "p2p_active_connections";
}

fn direction(outbound: bool) -> &'static str {
    if outbound {
        "outbound"
    } else {
        "inbound"
    }
}

/// Record a new connection entering its handler.
pub fn record_connection(outbound: bool) {
    counter!(names::CONNECTIONS_TOTAL, "direction" => direction(outbound)).increment(1);
    gauge!(names::ACTIVE_CONNECTIONS).increment(1.0);
}

/// Record a connection handler exiting.
pub fn record_disconnect() {
    gauge!(names::ACTIVE_CONNECTIONS).decrement(1.0);
}

/// Record a peer refused by one of the hooks.
pub fn record_rejection(stage: &'static str) {
    counter!(names::REJECTED_PEERS_TOTAL, "stage" => stage).increment(1);
}

/// Record a message handed to the consumer.
pub fn record_rpc(stream: bool) {
    let kind = if stream { "stream" } else { "message" };
    counter!(names::RPCS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_decode_error() {
    counter!(names::DECODE_ERRORS_TOTAL).increment(1);
}

pub fn record_accept_error() {
    counter!(names::ACCEPT_ERRORS_TOTAL).increment(1);
}
