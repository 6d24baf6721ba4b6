//! FIFO of in-flight transactions.
//!
//! Each entry tracks the hash of its first submission so the eventual
//! receipt can be correlated by subscribers even after fee-bumped
//! replacements.

use alloy_primitives::B256;
use settler_types::SignedTransaction;
use std::collections::VecDeque;

/// One logical in-flight transaction.
#[derive(Debug, Clone)]
pub(crate) struct PendingTransaction {
	/// Hash of the first submission for this logical transaction.
	pub origin_tx_hash: B256,
	/// The currently submitted transaction, updated on replacement.
	pub tx: SignedTransaction,
}

/// FIFO of in-flight transactions; only the head is ever waited upon.
#[derive(Debug, Default)]
pub(crate) struct TransactionQueue(VecDeque<PendingTransaction>);

impl TransactionQueue {
	/// Appends a freshly submitted transaction.
	pub fn add(&mut self, tx: SignedTransaction) {
		self.0.push_back(PendingTransaction {
			origin_tx_hash: tx.hash,
			tx,
		});
	}

	/// The oldest in-flight transaction, if any.
	pub fn peek(&self) -> Option<PendingTransaction> {
		self.0.front().cloned()
	}

	/// Removes and returns the oldest in-flight transaction.
	pub fn pop(&mut self) -> Option<PendingTransaction> {
		self.0.pop_front()
	}

	/// Swaps the head's transaction for its replacement, keeping the
	/// origin hash.
	pub fn replace_head(&mut self, tx: SignedTransaction) {
		if let Some(head) = self.0.front_mut() {
			head.tx = tx;
		}
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes, U256};
	use settler_types::TransactionRequest;

	fn signed_tx(nonce: u64) -> SignedTransaction {
		let request = TransactionRequest {
			nonce,
			gas_fee_cap: U256::from(1000u64),
			gas_tip_cap: U256::from(100u64),
			gas_limit: 1_000_000,
			to: Address::repeat_byte(0x11),
			value: U256::from(100u64),
			data: Bytes::new(),
			chain_id: 1,
		};
		SignedTransaction {
			hash: request.signing_hash(),
			request,
			signature: Bytes::from(vec![0u8; 65]),
		}
	}

	#[test]
	fn test_queue_fifo() {
		let mut q = TransactionQueue::default();
		let tx = signed_tx(1);
		q.add(tx.clone());
		assert_eq!(q.len(), 1);
		assert_eq!(q.peek().unwrap().tx.hash, tx.hash);
		assert_eq!(q.pop().unwrap().tx.hash, tx.hash);
		assert_eq!(q.len(), 0);

		let mut q = TransactionQueue::default();
		assert!(q.pop().is_none());
		assert!(q.peek().is_none());
	}

	#[test]
	fn test_replace_head_keeps_origin_hash() {
		let mut q = TransactionQueue::default();
		let original = signed_tx(1);
		q.add(original.clone());

		let mut replacement = original.clone();
		replacement.request.gas_fee_cap = U256::from(1110u64);
		replacement.hash = replacement.request.signing_hash();
		q.replace_head(replacement.clone());

		let head = q.peek().unwrap();
		assert_eq!(head.origin_tx_hash, original.hash);
		assert_eq!(head.tx.hash, replacement.hash);
	}
}
