use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use alloy_primitives::Address;
use clap::Parser;
use tracing::Level;

/// Dev-chain builder key used by the original examples. Override with
/// `BUILDER_PRIVATE_KEY` for anything beyond a local devnet.
const DEFAULT_BUILDER_KEY: &str =
    "9b6fa7074578db9ce7752ac85bf5c0acd071c7115f8fc02abdd435918edd4b62";

#[derive(Parser, Debug, Clone)]
#[command(name = "op-relay-bridge")]
#[command(about = "Bridges confidential-compute chain events to an OP proposer's builder API")]
pub struct RelayBridgeArgs {
    /// Missing or malformed address is a startup-fatal configuration
    /// error.
    #[arg(
        long,
        env = "CONTRACT_ADDR",
        help = "Address of the block-builder contract to listen to"
    )]
    pub contract_address: Address,

    #[arg(
        long,
        env = "CHAIN_WS_URL",
        default_value = "ws://127.0.0.1:8546",
        help = "WebSocket JSON-RPC endpoint of the confidential compute chain"
    )]
    pub chain_ws_url: String,

    #[arg(
        long,
        env = "BUILDER_PRIVATE_KEY",
        default_value = DEFAULT_BUILDER_KEY,
        hide_env_values = true,
        help = "Private key signing build and submit transactions"
    )]
    pub builder_private_key: String,

    #[arg(
        long,
        env = "RELAY_URL",
        default_value = "http://127.0.0.1:18585",
        help = "Relay URL passed to the block-submission action"
    )]
    pub relay_url: String,

    #[arg(
        long,
        env = "RELAY_LISTEN_ADDR",
        default_value = "0.0.0.0:18585",
        help = "Address the relay HTTP server listens on"
    )]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = "RECONNECT_DELAY_SECONDS",
        default_value = "5",
        help = "Delay between log subscription reconnect attempts"
    )]
    pub reconnect_delay_seconds: u64,

    #[arg(
        long,
        env = "ACTION_TIMEOUT_SECONDS",
        default_value = "20",
        help = "Upper bound on a single on-chain action, send to receipt"
    )]
    pub action_timeout_seconds: u64,

    #[arg(
        long,
        env = "DEDUP_CAPACITY",
        default_value = "1024",
        help = "Size of the recently-actioned bid window"
    )]
    pub dedup_capacity: NonZeroUsize,

    #[arg(
        long,
        env = "METRICS_PORT",
        help = "Port to serve Prometheus metrics on, disabled when unset"
    )]
    pub metrics_port: Option<u16>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: Level,

    /// Format for logs, can be json or text
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl RelayBridgeArgs {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_seconds)
    }
}
