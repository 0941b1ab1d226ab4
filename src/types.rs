use alloy_primitives::{Bytes, FixedBytes, B256, U256};
use alloy_rpc_types_engine::ExecutionPayloadV1;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// BLS public key of the builder that produced a payload.
pub type BuilderPubkey = FixedBytes<48>;

/// Bid metadata accompanying a submitted block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidTrace {
    pub slot: u64,
    pub parent_hash: B256,
    pub block_hash: B256,
    pub builder_pubkey: BuilderPubkey,
    pub value: U256,
}

/// A builder's submit-block request as POSTed to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitBlockRequest {
    pub message: BidTrace,
    pub execution_payload: ExecutionPayloadV1,
    pub signature: Bytes,
}

/// A cached builder payload, keyed in the cache by `parent_hash`.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    pub parent_hash: B256,
    pub received_at: DateTime<Utc>,
    pub value: U256,
    pub payload: ExecutionPayloadV1,
    pub block_hash: B256,
    pub block_number: u64,
    pub builder_pubkey: BuilderPubkey,
}

impl From<SubmitBlockRequest> for CachedPayload {
    fn from(req: SubmitBlockRequest) -> Self {
        let received_at = DateTime::from_timestamp(req.execution_payload.timestamp as i64, 0)
            .unwrap_or_else(Utc::now);
        Self {
            parent_hash: req.execution_payload.parent_hash,
            received_at,
            value: req.message.value,
            block_hash: req.message.block_hash,
            block_number: req.message.slot,
            builder_pubkey: req.message.builder_pubkey,
            payload: req.execution_payload,
        }
    }
}

/// Derived bid metadata served alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidInfo {
    pub block_hash: B256,
    pub parent_hash: B256,
    pub builder_pubkey: BuilderPubkey,
    pub block_number: u64,
}

/// Response body for `GET /eth/v1/builder/get_payload/{parent_hash}`.
///
/// Value, payload and bid info are copied verbatim from the cached entry;
/// this layer performs no consistency validation of the payload itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPayloadResponse {
    pub value: U256,
    pub payload: ExecutionPayloadV1,
    pub bid_info: BidInfo,
}

impl From<&CachedPayload> for GetPayloadResponse {
    fn from(cached: &CachedPayload) -> Self {
        Self {
            value: cached.value,
            payload: cached.payload.clone(),
            bid_info: BidInfo {
                block_hash: cached.block_hash,
                parent_hash: cached.parent_hash,
                builder_pubkey: cached.builder_pubkey,
                block_number: cached.block_number,
            },
        }
    }
}

pub mod test_utils {
    //! Fixture builders shared by unit and integration tests.

    use super::*;
    use alloy_primitives::{Address, Bloom};

    /// A minimal but well-formed submit-block request for tests.
    pub fn submit_block_request(parent_hash: B256, value: u64) -> SubmitBlockRequest {
        let block_hash = B256::from([0xbb; 32]);
        SubmitBlockRequest {
            message: BidTrace {
                slot: 42,
                parent_hash,
                block_hash,
                builder_pubkey: BuilderPubkey::from([0xcc; 48]),
                value: U256::from(value),
            },
            execution_payload: ExecutionPayloadV1 {
                parent_hash,
                fee_recipient: Address::ZERO,
                state_root: B256::ZERO,
                receipts_root: B256::ZERO,
                logs_bloom: Bloom::ZERO,
                prev_randao: B256::ZERO,
                block_number: 42,
                gas_limit: 30_000_000,
                gas_used: 21_000,
                timestamp: 1_700_000_000,
                extra_data: Bytes::new(),
                base_fee_per_gas: U256::from(7u64),
                block_hash,
                transactions: vec![],
            },
            signature: Bytes::from(vec![0u8; 96]),
        }
    }
}
