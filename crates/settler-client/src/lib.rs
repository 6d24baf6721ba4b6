//! Blockchain access for the settlement core.
//!
//! This crate defines the client interface the settlement core submits and
//! inspects transactions through, a signer interface for producing signed
//! transactions, and the gas price monitor that bounds submitted fee caps.

use async_trait::async_trait;
use settler_types::{SignedTransaction, TransactionReceipt, TransactionRequest};
use alloy_primitives::{B256, U256};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

pub mod gas;
pub mod signer;

pub use gas::GasPriceMonitor;
pub use signer::{LocalSigner, SignerError, TxSigner};

/// Errors that can occur during blockchain client operations.
#[derive(Debug, Error)]
pub enum ClientError {
	/// The requested transaction or receipt is unknown to the node.
	#[error("not found")]
	NotFound,
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
}

/// Trait defining the interface for blockchain clients.
///
/// Implementations submit signed transactions and answer the lookups the
/// submission pipeline needs for stall detection and replacement.
#[async_trait]
pub trait EthClient: Send + Sync {
	/// Submits a signed transaction to the network.
	async fn send_transaction(&self, tx: &SignedTransaction) -> Result<(), ClientError>;

	/// Fetches a transaction by hash.
	///
	/// Returns the transaction and whether it is still pending. A transaction
	/// unknown to the node yields `ClientError::NotFound`.
	async fn transaction_by_hash(
		&self,
		hash: B256,
	) -> Result<(TransactionRequest, bool), ClientError>;

	/// Fetches the receipt for a transaction, if it has been mined.
	async fn transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ClientError>;

	/// Current gas price suggested by the node, in wei.
	async fn gas_price(&self) -> Result<U256, ClientError>;
}
