//! Alloy-based EVM client implementation.
//!
//! This implementation uses the Alloy library to submit and inspect
//! transactions on EVM-compatible blockchains. The provider is configured
//! with a wallet so submissions are signed with the settlement key.

use crate::{ClientError, EthClient};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{hex, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest as RpcTransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use settler_types::{SignedTransaction, TransactionReceipt, TransactionRequest};
use std::sync::Arc;

/// Alloy-based EVM client.
pub struct AlloyClient {
	/// The Alloy provider for blockchain interaction.
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	/// The chain ID this client is configured for.
	chain_id: u64,
}

impl AlloyClient {
	/// Creates a new AlloyClient instance.
	///
	/// Configures an Alloy provider with the specified RPC URL and signer
	/// for transaction submission on the given chain.
	pub fn new(rpc_url: &str, chain_id: u64, mut signer: PrivateKeySigner) -> Result<Self, ClientError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ClientError::Network(format!("Invalid RPC URL: {}", e)))?;

		// Set the chain ID on the signer
		signer = signer.with_chain_id(Some(chain_id));

		let wallet = EthereumWallet::from(signer);

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Self {
			provider: Arc::new(provider),
			chain_id,
		})
	}

	fn to_rpc_request(&self, tx: &TransactionRequest) -> RpcTransactionRequest {
		RpcTransactionRequest::default()
			.with_chain_id(self.chain_id)
			.with_nonce(tx.nonce)
			.with_to(tx.to)
			.with_value(tx.value)
			.with_input(tx.data.clone())
			.with_gas_limit(tx.gas_limit as u128)
			.with_max_fee_per_gas(tx.gas_fee_cap.saturating_to::<u128>())
			.with_max_priority_fee_per_gas(tx.gas_tip_cap.saturating_to::<u128>())
	}
}

#[async_trait]
impl EthClient for AlloyClient {
	async fn send_transaction(&self, tx: &SignedTransaction) -> Result<(), ClientError> {
		let request = self.to_rpc_request(&tx.request);

		// Send transaction - the provider's wallet will handle signing
		let pending_tx = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| ClientError::Network(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = *pending_tx.tx_hash();
		tracing::info!(tx_hash = %hex::encode(tx_hash), "Submitted transaction");

		Ok(())
	}

	async fn transaction_by_hash(
		&self,
		hash: B256,
	) -> Result<(TransactionRequest, bool), ClientError> {
		let tx = self
			.provider
			.get_transaction_by_hash(hash)
			.await
			.map_err(|e| ClientError::Network(format!("Failed to get transaction: {}", e)))?
			.ok_or(ClientError::NotFound)?;

		let is_pending = tx.block_number.is_none();
		let request = TransactionRequest {
			nonce: tx.nonce,
			gas_fee_cap: U256::from(tx.max_fee_per_gas.unwrap_or(tx.gas_price.unwrap_or_default())),
			gas_tip_cap: U256::from(tx.max_priority_fee_per_gas.unwrap_or_default()),
			gas_limit: tx.gas as u64,
			to: tx.to.unwrap_or_default(),
			value: tx.value,
			data: tx.input,
			chain_id: tx.chain_id.unwrap_or(self.chain_id),
		};

		Ok((request, is_pending))
	}

	async fn transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ClientError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| ClientError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			tx_hash: receipt.transaction_hash,
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
		}))
	}

	async fn gas_price(&self) -> Result<U256, ClientError> {
		let gas_price = self
			.provider
			.get_gas_price()
			.await
			.map_err(|e| ClientError::Network(format!("Failed to get gas price: {}", e)))?;

		Ok(U256::from(gas_price))
	}
}
