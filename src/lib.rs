#![doc = include_str!("../README.md")]

pub mod cache;
pub mod chain;
pub mod cli;
pub mod dispatcher;
pub mod events;
pub mod listener;
pub mod metrics;
pub mod server;
pub mod types;

pub use cache::PayloadCache;
pub use chain::{AlloyChainClient, ChainClient, ChainError, TxReceipt};
pub use cli::RelayBridgeArgs;
pub use dispatcher::{ActionDispatcher, ActionError, ActionKind};
pub use events::{BidFields, BidId, DecodeError, DecodedEvent, TopicTable};
pub use listener::{EventListener, LogSource, WsLogSource};
pub use metrics::Metrics;
pub use server::RelayServer;
pub use types::{
    BidInfo, BidTrace, BuilderPubkey, CachedPayload, GetPayloadResponse, SubmitBlockRequest,
};
