use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, FixedBytes, Log, LogData, B256};
use alloy_sol_types::{sol, SolEvent};
use thiserror::Error;

/// Opaque 16-byte identifier correlating a bid with its built counterpart.
pub type BidId = FixedBytes<16>;

sol! {
    /// A confidential bundle landed on chain and is ready to be built against.
    event NewBundleEvent(bytes16 bidId, uint64 decryptionCondition, address[] allowedPeekers);

    /// A bid was registered for an upcoming block.
    event BidEvent(bytes16 bidId, uint64 decryptionCondition, address[] allowedPeekers);

    /// A builder produced a block for a previously registered bid.
    event BuilderBidEvent(bytes16 bidId, uint64 decryptionCondition, address[] allowedPeekers, bytes builderBid);

    /// A builder produced a block for a newly matched bundle.
    event NewBuilderBidEvent(bytes16 bidId, uint64 decryptionCondition, address[] allowedPeekers, bytes builderBid);
}

/// Errors from decoding a raw log into a [`DecodedEvent`].
///
/// Both variants are recoverable: the listener logs them and moves on to
/// the next log.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The leading topic does not match any known event signature.
    #[error("unknown event kind, topic {0}")]
    UnknownEventKind(B256),

    /// The log carries no topics at all.
    #[error("log has no topics")]
    MissingTopic,

    /// The data payload does not ABI-decode against the event's schema.
    #[error("malformed data for event {signature}: {source}")]
    MalformedEventData {
        signature: &'static str,
        source: alloy_sol_types::Error,
    },
}

/// Fields shared by every event variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidFields {
    pub bid_id: BidId,
    pub decryption_condition: u64,
    pub allowed_peekers: Vec<Address>,
}

/// A typed on-chain event, demultiplexed by leading topic hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    NewBundle(BidFields),
    Bid(BidFields),
    BuilderBid { fields: BidFields, envelope: Bytes },
    NewBuilderBid { fields: BidFields, envelope: Bytes },
}

impl DecodedEvent {
    pub fn bid_id(&self) -> BidId {
        match self {
            DecodedEvent::NewBundle(f) | DecodedEvent::Bid(f) => f.bid_id,
            DecodedEvent::BuilderBid { fields, .. }
            | DecodedEvent::NewBuilderBid { fields, .. } => fields.bid_id,
        }
    }

    pub fn decryption_condition(&self) -> u64 {
        match self {
            DecodedEvent::NewBundle(f) | DecodedEvent::Bid(f) => f.decryption_condition,
            DecodedEvent::BuilderBid { fields, .. }
            | DecodedEvent::NewBuilderBid { fields, .. } => fields.decryption_condition,
        }
    }

    /// Canonical event signature of the variant, used for logging.
    pub fn signature(&self) -> &'static str {
        match self {
            DecodedEvent::NewBundle(_) => NewBundleEvent::SIGNATURE,
            DecodedEvent::Bid(_) => BidEvent::SIGNATURE,
            DecodedEvent::BuilderBid { .. } => BuilderBidEvent::SIGNATURE,
            DecodedEvent::NewBuilderBid { .. } => NewBuilderBidEvent::SIGNATURE,
        }
    }
}

type DecodeFn = fn(&LogData) -> Result<DecodedEvent, DecodeError>;

/// Lookup table from leading topic hash to a typed decoder.
///
/// Built once at startup from the `sol!` event definitions above; adding a
/// new event kind is one more entry here plus a [`DecodedEvent`] variant.
pub struct TopicTable {
    table: HashMap<B256, DecodeFn>,
}

impl Default for TopicTable {
    fn default() -> Self {
        let mut table: HashMap<B256, DecodeFn> = HashMap::new();
        table.insert(NewBundleEvent::SIGNATURE_HASH, decode_new_bundle);
        table.insert(BidEvent::SIGNATURE_HASH, decode_bid);
        table.insert(BuilderBidEvent::SIGNATURE_HASH, decode_builder_bid);
        table.insert(NewBuilderBidEvent::SIGNATURE_HASH, decode_new_builder_bid);
        Self { table }
    }
}

impl TopicTable {
    /// Decode a raw log into a typed event.
    ///
    /// Pure: no side effects, no state. The variant is selected solely by
    /// the log's leading topic hash.
    pub fn decode(&self, log: &Log<LogData>) -> Result<DecodedEvent, DecodeError> {
        let topic = log.data.topics().first().ok_or(DecodeError::MissingTopic)?;
        let decode = self
            .table
            .get(topic)
            .ok_or(DecodeError::UnknownEventKind(*topic))?;
        decode(&log.data)
    }

    /// Whether the table recognizes the given topic hash.
    pub fn contains(&self, topic: &B256) -> bool {
        self.table.contains_key(topic)
    }
}

fn decode_new_bundle(data: &LogData) -> Result<DecodedEvent, DecodeError> {
    let ev = NewBundleEvent::decode_log_data(data).map_err(|source| {
        DecodeError::MalformedEventData {
            signature: NewBundleEvent::SIGNATURE,
            source,
        }
    })?;
    Ok(DecodedEvent::NewBundle(BidFields {
        bid_id: ev.bidId,
        decryption_condition: ev.decryptionCondition,
        allowed_peekers: ev.allowedPeekers,
    }))
}

fn decode_bid(data: &LogData) -> Result<DecodedEvent, DecodeError> {
    let ev =
        BidEvent::decode_log_data(data).map_err(|source| DecodeError::MalformedEventData {
            signature: BidEvent::SIGNATURE,
            source,
        })?;
    Ok(DecodedEvent::Bid(BidFields {
        bid_id: ev.bidId,
        decryption_condition: ev.decryptionCondition,
        allowed_peekers: ev.allowedPeekers,
    }))
}

fn decode_builder_bid(data: &LogData) -> Result<DecodedEvent, DecodeError> {
    let ev = BuilderBidEvent::decode_log_data(data).map_err(|source| {
        DecodeError::MalformedEventData {
            signature: BuilderBidEvent::SIGNATURE,
            source,
        }
    })?;
    Ok(DecodedEvent::BuilderBid {
        fields: BidFields {
            bid_id: ev.bidId,
            decryption_condition: ev.decryptionCondition,
            allowed_peekers: ev.allowedPeekers,
        },
        envelope: ev.builderBid,
    })
}

fn decode_new_builder_bid(data: &LogData) -> Result<DecodedEvent, DecodeError> {
    let ev = NewBuilderBidEvent::decode_log_data(data).map_err(|source| {
        DecodeError::MalformedEventData {
            signature: NewBuilderBidEvent::SIGNATURE,
            source,
        }
    })?;
    Ok(DecodedEvent::NewBuilderBid {
        fields: BidFields {
            bid_id: ev.bidId,
            decryption_condition: ev.decryptionCondition,
            allowed_peekers: ev.allowedPeekers,
        },
        envelope: ev.builderBid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, bytes, Address};
    use alloy_sol_types::SolEvent;

    fn test_log(topics: Vec<B256>, data: Vec<u8>) -> Log<LogData> {
        Log {
            address: Address::ZERO,
            data: LogData::new_unchecked(topics, data.into()),
        }
    }

    fn encode<E: SolEvent>(ev: &E) -> Log<LogData> {
        test_log(vec![E::SIGNATURE_HASH], ev.encode_data())
    }

    #[test]
    fn decodes_bid_event() {
        let table = TopicTable::default();
        let ev = BidEvent {
            bidId: BidId::from([0x11; 16]),
            decryptionCondition: 5,
            allowedPeekers: vec![address!("dceef22333b11ad2cab54be2a8ece08ee64d919c")],
        };

        let decoded = table.decode(&encode(&ev)).unwrap();
        match decoded {
            DecodedEvent::Bid(fields) => {
                assert_eq!(fields.bid_id, BidId::from([0x11; 16]));
                assert_eq!(fields.decryption_condition, 5);
                assert_eq!(
                    fields.allowed_peekers,
                    vec![address!("dceef22333b11ad2cab54be2a8ece08ee64d919c")]
                );
            }
            other => panic!("expected Bid, got {other:?}"),
        }
    }

    #[test]
    fn decodes_builder_bid_event_with_envelope() {
        let table = TopicTable::default();
        let ev = NewBuilderBidEvent {
            bidId: BidId::from([0x22; 16]),
            decryptionCondition: 10,
            allowedPeekers: vec![],
            builderBid: bytes!("0102"),
        };

        let decoded = table.decode(&encode(&ev)).unwrap();
        match decoded {
            DecodedEvent::NewBuilderBid { fields, envelope } => {
                assert_eq!(fields.bid_id, BidId::from([0x22; 16]));
                assert_eq!(envelope, bytes!("0102"));
            }
            other => panic!("expected NewBuilderBid, got {other:?}"),
        }
    }

    #[test]
    fn unknown_topic_is_an_error_not_a_panic() {
        let table = TopicTable::default();
        let bogus = b256!("deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef");
        let log = test_log(vec![bogus], vec![]);

        match table.decode(&log) {
            Err(DecodeError::UnknownEventKind(topic)) => assert_eq!(topic, bogus),
            other => panic!("expected UnknownEventKind, got {other:?}"),
        }
        assert!(!table.contains(&bogus));
    }

    #[test]
    fn missing_topic_is_an_error() {
        let table = TopicTable::default();
        let log = test_log(vec![], vec![]);
        assert!(matches!(table.decode(&log), Err(DecodeError::MissingTopic)));
    }

    #[test]
    fn truncated_data_is_malformed_not_fatal() {
        let table = TopicTable::default();
        let ev = BidEvent {
            bidId: BidId::from([0x33; 16]),
            decryptionCondition: 7,
            allowedPeekers: vec![],
        };
        let mut data = ev.encode_data();
        data.truncate(data.len() / 2);
        let log = test_log(vec![BidEvent::SIGNATURE_HASH], data);

        match table.decode(&log) {
            Err(DecodeError::MalformedEventData { signature, .. }) => {
                assert_eq!(signature, BidEvent::SIGNATURE);
            }
            other => panic!("expected MalformedEventData, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_all_variants() {
        let table = TopicTable::default();
        let peekers = vec![
            address!("b5feafbdd752ad52afb7e1bd2e40432a485bbb7f"),
            address!("dceef22333b11ad2cab54be2a8ece08ee64d919c"),
        ];

        let bundle = NewBundleEvent {
            bidId: BidId::from([0x01; 16]),
            decryptionCondition: 1,
            allowedPeekers: peekers.clone(),
        };
        let bid = BidEvent {
            bidId: BidId::from([0x02; 16]),
            decryptionCondition: 2,
            allowedPeekers: peekers.clone(),
        };
        let builder_bid = BuilderBidEvent {
            bidId: BidId::from([0x03; 16]),
            decryptionCondition: 3,
            allowedPeekers: peekers.clone(),
            builderBid: bytes!("deadbeef"),
        };
        let new_builder_bid = NewBuilderBidEvent {
            bidId: BidId::from([0x04; 16]),
            decryptionCondition: 4,
            allowedPeekers: peekers.clone(),
            builderBid: bytes!("cafe"),
        };

        // Decode each, then re-encode from the decoded fields and compare
        // the raw data payloads byte for byte.
        let decoded = table.decode(&encode(&bundle)).unwrap();
        let DecodedEvent::NewBundle(f) = &decoded else {
            panic!("wrong variant");
        };
        let reencoded = NewBundleEvent {
            bidId: f.bid_id,
            decryptionCondition: f.decryption_condition,
            allowedPeekers: f.allowed_peekers.clone(),
        };
        assert_eq!(reencoded.encode_data(), bundle.encode_data());

        let decoded = table.decode(&encode(&bid)).unwrap();
        let DecodedEvent::Bid(f) = &decoded else {
            panic!("wrong variant");
        };
        let reencoded = BidEvent {
            bidId: f.bid_id,
            decryptionCondition: f.decryption_condition,
            allowedPeekers: f.allowed_peekers.clone(),
        };
        assert_eq!(reencoded.encode_data(), bid.encode_data());

        let decoded = table.decode(&encode(&builder_bid)).unwrap();
        let DecodedEvent::BuilderBid { fields, envelope } = &decoded else {
            panic!("wrong variant");
        };
        let reencoded = BuilderBidEvent {
            bidId: fields.bid_id,
            decryptionCondition: fields.decryption_condition,
            allowedPeekers: fields.allowed_peekers.clone(),
            builderBid: envelope.clone(),
        };
        assert_eq!(reencoded.encode_data(), builder_bid.encode_data());

        let decoded = table.decode(&encode(&new_builder_bid)).unwrap();
        let DecodedEvent::NewBuilderBid { fields, envelope } = &decoded else {
            panic!("wrong variant");
        };
        let reencoded = NewBuilderBidEvent {
            bidId: fields.bid_id,
            decryptionCondition: fields.decryption_condition,
            allowedPeekers: fields.allowed_peekers.clone(),
            builderBid: envelope.clone(),
        };
        assert_eq!(reencoded.encode_data(), new_builder_bid.encode_data());
    }
}
