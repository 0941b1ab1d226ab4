use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Bytes, B256};
use alloy_sol_types::{sol, SolCall};
use lru::LruCache;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::chain::{ChainClient, ChainError};
use crate::events::{BidId, DecodedEvent};
use crate::metrics::Metrics;

sol! {
    interface IBlockBuilder {
        /// Trigger a block build for the given condition and bid.
        function buildBlock(uint64 blockHeight, bytes16 bidId) external;

        /// Post a built block for the given bid to a relay.
        function postBlockToRelay(string relayUrl, bytes16 bidId) external;
    }
}

/// The follow-up on-chain action a decoded event maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Build,
    Submit,
}

/// Errors from a single dispatched action.
///
/// Always recoverable: a failed action for one bid is logged and never
/// blocks processing of subsequent independent events.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    #[error("action timed out after {0:?}")]
    Timeout(Duration),
}

/// Routes decoded events to exactly one follow-up on-chain action.
///
/// Bundle and bid events trigger a `buildBlock` call carrying the event's
/// decryption condition and bid id; builder-bid events trigger a
/// `postBlockToRelay` call naming the configured relay URL. Events are
/// consumed from the listener's queue in arrival order, so actions are
/// issued in that order too; each send is bounded by `action_timeout`.
///
/// A bounded LRU of already-actioned `(kind, bid id)` pairs makes
/// dispatch idempotent under event redelivery.
pub struct ActionDispatcher<C> {
    chain: Arc<C>,
    relay_url: String,
    action_timeout: Duration,
    actioned: LruCache<(ActionKind, BidId), ()>,
    metrics: Arc<Metrics>,
}

impl<C: ChainClient> ActionDispatcher<C> {
    pub fn new(
        chain: Arc<C>,
        relay_url: String,
        action_timeout: Duration,
        dedup_capacity: NonZeroUsize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            chain,
            relay_url,
            action_timeout,
            actioned: LruCache::new(dedup_capacity),
            metrics,
        }
    }

    /// Consume events until the listener side of the channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<DecodedEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("event channel closed, dispatcher stopping");
    }

    async fn handle_event(&mut self, event: DecodedEvent) {
        let kind = match &event {
            DecodedEvent::NewBundle(_) | DecodedEvent::Bid(_) => ActionKind::Build,
            DecodedEvent::BuilderBid { .. } | DecodedEvent::NewBuilderBid { .. } => {
                ActionKind::Submit
            }
        };
        let bid_id = event.bid_id();

        if self.actioned.put((kind, bid_id), ()).is_some() {
            self.metrics.duplicate_events.increment(1);
            debug!(bid_id = %bid_id, ?kind, "event already actioned, skipping");
            return;
        }

        let calldata = match kind {
            ActionKind::Build => {
                self.metrics.build_actions.increment(1);
                Bytes::from(
                    IBlockBuilder::buildBlockCall {
                        blockHeight: event.decryption_condition(),
                        bidId: bid_id,
                    }
                    .abi_encode(),
                )
            }
            ActionKind::Submit => {
                self.metrics.submit_actions.increment(1);
                Bytes::from(
                    IBlockBuilder::postBlockToRelayCall {
                        relayUrl: self.relay_url.clone(),
                        bidId: bid_id,
                    }
                    .abi_encode(),
                )
            }
        };

        info!(
            bid_id = %bid_id,
            event = event.signature(),
            ?kind,
            "dispatching action"
        );

        match self.send_action(calldata).await {
            Ok(receipt) => {
                info!(bid_id = %bid_id, tx_hash = %receipt.tx_hash, ?kind, "action confirmed");
            }
            Err(err) => {
                self.metrics.action_failures.increment(1);
                error!(bid_id = %bid_id, ?kind, error = %err, "action failed");
            }
        }
    }

    async fn send_action(&self, calldata: Bytes) -> Result<crate::chain::TxReceipt, ActionError> {
        let receipt = tokio::time::timeout(
            self.action_timeout,
            self.chain.send_transaction(calldata, None),
        )
        .await
        .map_err(|_| ActionError::Timeout(self.action_timeout))??;

        if !receipt.success {
            return Err(ActionError::Reverted {
                tx_hash: receipt.tx_hash,
            });
        }
        Ok(receipt)
    }
}
