//! Outbound transaction types for the submission pipeline.
//!
//! These model the dynamic-fee transactions the settlement core submits,
//! plus the receipt events fanned out to subscribers once a transaction
//! confirms or is given up on.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// An outbound dynamic-fee transaction.
///
/// Requests are immutable except through replacement, which produces a new
/// request with bumped fee caps and therefore a new hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
	/// Account nonce. A replacement reuses the nonce of the original.
	pub nonce: u64,
	/// Maximum total fee per gas unit.
	pub gas_fee_cap: U256,
	/// Maximum priority fee per gas unit.
	pub gas_tip_cap: U256,
	/// Gas limit.
	pub gas_limit: u64,
	/// Recipient contract or account.
	pub to: Address,
	/// Value transferred with the call.
	pub value: U256,
	/// Call payload.
	pub data: Bytes,
	/// Chain the transaction targets.
	pub chain_id: u64,
}

impl TransactionRequest {
	/// Hash over the canonical field encoding.
	///
	/// Every field participates, so bumping either fee cap yields a distinct
	/// hash while leaving nonce, recipient, value, and payload untouched.
	pub fn signing_hash(&self) -> B256 {
		let mut buf = Vec::with_capacity(32 * 6 + 20 + 8 * 3 + self.data.len());
		buf.extend_from_slice(&self.chain_id.to_be_bytes());
		buf.extend_from_slice(&self.nonce.to_be_bytes());
		buf.extend_from_slice(&self.gas_fee_cap.to_be_bytes::<32>());
		buf.extend_from_slice(&self.gas_tip_cap.to_be_bytes::<32>());
		buf.extend_from_slice(&self.gas_limit.to_be_bytes());
		buf.extend_from_slice(self.to.as_slice());
		buf.extend_from_slice(&self.value.to_be_bytes::<32>());
		buf.extend_from_slice(&self.data);
		keccak256(&buf)
	}
}

/// A transaction request together with its signature and hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
	/// The signed request.
	pub request: TransactionRequest,
	/// Signature over the request's signing hash.
	pub signature: Bytes,
	/// The request's signing hash, used to correlate receipts.
	pub hash: B256,
}

/// Receipt for a transaction included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// Hash of the included transaction (a replacement's hash when the
	/// replacement was the one mined).
	pub tx_hash: B256,
	/// Block the transaction was included in.
	pub block_number: u64,
	/// Whether execution succeeded.
	pub success: bool,
}

/// Receipt event published to subscribers for one logical transaction.
///
/// `origin_tx_hash` is always the hash of the first submitted transaction,
/// even when the receipt belongs to a fee-bumped replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEvent {
	/// Hash of the first submission for this logical transaction.
	pub origin_tx_hash: B256,
	/// The receipt, when one was obtained.
	pub receipt: Option<TransactionReceipt>,
	/// The terminal error, when the transaction was given up on.
	pub error: Option<String>,
}
