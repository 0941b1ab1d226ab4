use metrics::Counter;
use metrics_derive::Metrics;

/// Collected metrics for the relay bridge.
#[derive(Metrics)]
#[metrics(scope = "relay_bridge")]
pub struct Metrics {
    /// Logs decoded into typed events.
    #[metric(describe = "Logs decoded into typed events")]
    pub events_decoded: Counter,

    /// Logs whose leading topic matched no known event kind.
    #[metric(describe = "Logs whose leading topic matched no known event kind")]
    pub unknown_event_topics: Counter,

    /// Logs that matched a known topic but failed to ABI-decode.
    #[metric(describe = "Logs that matched a known topic but failed to ABI-decode")]
    pub malformed_events: Counter,

    /// Duplicate events suppressed by the idempotency window.
    #[metric(describe = "Duplicate events suppressed by the idempotency window")]
    pub duplicate_events: Counter,

    /// Block-build actions issued on chain.
    #[metric(describe = "Block-build actions issued on chain")]
    pub build_actions: Counter,

    /// Block-submission actions issued on chain.
    #[metric(describe = "Block-submission actions issued on chain")]
    pub submit_actions: Counter,

    /// Actions that failed, reverted, or timed out.
    #[metric(describe = "Actions that failed, reverted, or timed out")]
    pub action_failures: Counter,

    /// Subscription reconnect attempts.
    #[metric(describe = "Subscription reconnect attempts")]
    pub subscription_reconnects: Counter,

    /// Builder payloads stored in the cache.
    #[metric(describe = "Builder payloads stored in the cache")]
    pub payloads_stored: Counter,

    /// get_payload requests served from the cache.
    #[metric(describe = "get_payload requests served from the cache")]
    pub payload_hits: Counter,

    /// get_payload requests for an unknown parent hash.
    #[metric(describe = "get_payload requests for an unknown parent hash")]
    pub payload_misses: Counter,

    /// get_payload requests rejected for a malformed parent hash.
    #[metric(describe = "get_payload requests rejected for a malformed parent hash")]
    pub invalid_payload_requests: Counter,
}
