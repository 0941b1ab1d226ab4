use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from submitting a state-changing call to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The transaction could not be sent or its receipt could not be
    /// fetched.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call carried confidential inputs the transport cannot encode.
    #[error("confidential inputs are not supported by this transport")]
    UnsupportedConfidentialInputs,
}

/// Receipt of a submitted transaction.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: B256,
    /// Execution status: `false` means the transaction reverted.
    pub success: bool,
}

/// Signing and submission of state-changing calls to the confidential
/// compute chain.
///
/// The dispatcher is written against this trait; production wires in
/// [`AlloyChainClient`], tests wire in a recording mock.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Sign and send `calldata` to the bridge contract and wait for the
    /// receipt.
    ///
    /// `confidential_inputs` is the confidential byte blob accompanying a
    /// confidential compute request; both relay actions currently send
    /// none.
    async fn send_transaction(
        &self,
        calldata: Bytes,
        confidential_inputs: Option<Bytes>,
    ) -> Result<TxReceipt, ChainError>;
}

/// [`ChainClient`] backed by an alloy provider with a wallet filler.
///
/// The provider handles nonce, gas, and chain-id fills; signing uses the
/// wallet configured at construction in `main`.
#[derive(Debug, Clone)]
pub struct AlloyChainClient<P> {
    provider: P,
    contract: Address,
}

impl<P> AlloyChainClient<P> {
    pub fn new(provider: P, contract: Address) -> Self {
        Self { provider, contract }
    }
}

#[async_trait]
impl<P: Provider> ChainClient for AlloyChainClient<P> {
    async fn send_transaction(
        &self,
        calldata: Bytes,
        confidential_inputs: Option<Bytes>,
    ) -> Result<TxReceipt, ChainError> {
        // The standard execution transport has no envelope for
        // confidential inputs; neither relay action needs one today.
        if confidential_inputs.is_some() {
            return Err(ChainError::UnsupportedConfidentialInputs);
        }

        let tx = TransactionRequest::default()
            .with_to(self.contract)
            .with_input(calldata);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
        })
    }
}
