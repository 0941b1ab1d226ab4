use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Log};
use anyhow::Context;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{DecodeError, DecodedEvent, TopicTable};
use crate::metrics::Metrics;

/// The log-subscription transport, abstracted so tests can drive the
/// listener with synthetic streams.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Open a log stream filtered to the given contract address.
    async fn subscribe(&self, contract: Address) -> anyhow::Result<BoxStream<'static, Log>>;
}

/// [`LogSource`] over an alloy pubsub (WebSocket) provider.
#[derive(Debug, Clone)]
pub struct WsLogSource<P> {
    provider: P,
}

impl<P> WsLogSource<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider + 'static> LogSource for WsLogSource<P> {
    async fn subscribe(&self, contract: Address) -> anyhow::Result<BoxStream<'static, Log>> {
        let filter = Filter::new().address(contract);
        let sub = self.provider.subscribe_logs(&filter).await?;
        Ok(sub.into_stream().boxed())
    }
}

/// Owns the log subscription and runs the decode loop.
///
/// Each inbound log is decoded by topic and handed to the dispatcher over
/// an unbounded channel, so a slow on-chain action never stalls decoding.
/// Decode failures are logged and skipped. A failure to open the initial
/// subscription is fatal; a stream that ends mid-run is retried after
/// `reconnect_delay`.
pub struct EventListener<S> {
    source: S,
    contract: Address,
    topics: TopicTable,
    dispatch: mpsc::UnboundedSender<DecodedEvent>,
    reconnect_delay: Duration,
    metrics: Arc<Metrics>,
}

impl<S: LogSource> EventListener<S> {
    pub fn new(
        source: S,
        contract: Address,
        dispatch: mpsc::UnboundedSender<DecodedEvent>,
        reconnect_delay: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            contract,
            topics: TopicTable::default(),
            dispatch,
            reconnect_delay,
            metrics,
        }
    }

    /// Run until cancelled or the dispatcher side of the channel closes.
    pub async fn run(&self, token: CancellationToken) -> anyhow::Result<()> {
        let mut stream = self
            .source
            .subscribe(self.contract)
            .await
            .context("opening log subscription")?;
        info!(contract = %self.contract, "listening for contract events");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("listener shutting down");
                    return Ok(());
                }
                maybe_log = stream.next() => match maybe_log {
                    Some(log) => {
                        if !self.handle_log(log) {
                            info!("dispatcher gone, listener stopping");
                            return Ok(());
                        }
                    }
                    None => {
                        match self.resubscribe(&token).await {
                            Some(new_stream) => stream = new_stream,
                            None => return Ok(()),
                        }
                    }
                }
            }
        }
    }

    /// Decode and forward one log. Returns `false` once the dispatcher
    /// channel is closed.
    fn handle_log(&self, log: Log) -> bool {
        match self.topics.decode(&log.inner) {
            Ok(event) => {
                self.metrics.events_decoded.increment(1);
                debug!(
                    bid_id = %event.bid_id(),
                    event = event.signature(),
                    "event received"
                );
                self.dispatch.send(event).is_ok()
            }
            Err(DecodeError::UnknownEventKind(topic)) => {
                self.metrics.unknown_event_topics.increment(1);
                warn!(topic = %topic, "log with unknown event kind, skipping");
                true
            }
            Err(err) => {
                self.metrics.malformed_events.increment(1);
                warn!(error = %err, "failed to decode event, skipping");
                true
            }
        }
    }

    /// Reopen the subscription after the stream ended, retrying with a
    /// fixed delay. Returns `None` on cancellation.
    async fn resubscribe(&self, token: &CancellationToken) -> Option<BoxStream<'static, Log>> {
        loop {
            self.metrics.subscription_reconnects.increment(1);
            warn!(
                delay_secs = self.reconnect_delay.as_secs(),
                "log subscription ended, reconnecting"
            );

            tokio::select! {
                _ = token.cancelled() => return None,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }

            match self.source.subscribe(self.contract).await {
                Ok(stream) => {
                    info!(contract = %self.contract, "log subscription reopened");
                    return Some(stream);
                }
                Err(err) => warn!(error = %err, "resubscribe failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BidEvent, BidId, NewBuilderBidEvent};
    use alloy_primitives::{b256, bytes, LogData, B256};
    use alloy_sol_types::SolEvent;
    use anyhow::anyhow;
    use futures_util::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct QueuedLogSource {
        streams: Mutex<VecDeque<Vec<Log>>>,
    }

    impl QueuedLogSource {
        fn new(streams: Vec<Vec<Log>>) -> Self {
            Self {
                streams: Mutex::new(streams.into()),
            }
        }
    }

    #[async_trait]
    impl LogSource for QueuedLogSource {
        async fn subscribe(&self, _contract: Address) -> anyhow::Result<BoxStream<'static, Log>> {
            match self.streams.lock().unwrap().pop_front() {
                Some(logs) => Ok(stream::iter(logs).boxed()),
                None => Err(anyhow!("no more streams")),
            }
        }
    }

    fn rpc_log(topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(topics, data.into()),
            },
            ..Default::default()
        }
    }

    fn bid_log(bid: u8, condition: u64) -> Log {
        let ev = BidEvent {
            bidId: BidId::from([bid; 16]),
            decryptionCondition: condition,
            allowedPeekers: vec![],
        };
        rpc_log(vec![BidEvent::SIGNATURE_HASH], ev.encode_data())
    }

    fn listener(
        source: QueuedLogSource,
        dispatch: mpsc::UnboundedSender<DecodedEvent>,
    ) -> EventListener<QueuedLogSource> {
        EventListener::new(
            source,
            Address::ZERO,
            dispatch,
            Duration::from_millis(10),
            Arc::new(Metrics::default()),
        )
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<DecodedEvent>) -> DecodedEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn forwards_events_and_survives_decode_errors() {
        let builder_bid = NewBuilderBidEvent {
            bidId: BidId::from([0x22; 16]),
            decryptionCondition: 7,
            allowedPeekers: vec![],
            builderBid: bytes!("0102"),
        };
        let unknown =
            b256!("deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef");
        let logs = vec![
            bid_log(0x11, 5),
            rpc_log(vec![unknown], vec![]),
            rpc_log(vec![BidEvent::SIGNATURE_HASH], vec![0x01]), // malformed
            rpc_log(
                vec![NewBuilderBidEvent::SIGNATURE_HASH],
                builder_bid.encode_data(),
            ),
        ];

        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let listener = listener(QueuedLogSource::new(vec![logs]), tx);
        let run_token = token.clone();
        let handle = tokio::spawn(async move { listener.run(run_token).await });

        // Only the two well-formed events come through, in order.
        match recv(&mut rx).await {
            DecodedEvent::Bid(f) => {
                assert_eq!(f.bid_id, BidId::from([0x11; 16]));
                assert_eq!(f.decryption_condition, 5);
            }
            other => panic!("expected Bid, got {other:?}"),
        }
        match recv(&mut rx).await {
            DecodedEvent::NewBuilderBid { fields, envelope } => {
                assert_eq!(fields.bid_id, BidId::from([0x22; 16]));
                assert_eq!(envelope, bytes!("0102"));
            }
            other => panic!("expected NewBuilderBid, got {other:?}"),
        }

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_stream_ends() {
        let streams = vec![vec![bid_log(0x01, 1)], vec![bid_log(0x02, 2)]];

        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let listener = listener(QueuedLogSource::new(streams), tx);
        let run_token = token.clone();
        let handle = tokio::spawn(async move { listener.run(run_token).await });

        assert_eq!(recv(&mut rx).await.bid_id(), BidId::from([0x01; 16]));
        assert_eq!(recv(&mut rx).await.bid_id(), BidId::from([0x02; 16]));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn startup_subscription_failure_is_fatal() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let listener = listener(QueuedLogSource::new(vec![]), tx);
        let err = listener.run(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("log subscription"));
    }
}
