//! Transaction signing.
//!
//! The submission pipeline signs every transaction it submits, including
//! fee-bumped replacements. The signer interface keeps key handling out of
//! the pipeline itself.

use alloy_primitives::Bytes;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use settler_types::{SignedTransaction, TransactionRequest};
use thiserror::Error;

/// Errors that can occur during signing operations.
#[derive(Debug, Error)]
pub enum SignerError {
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Trait defining the interface for transaction signers.
pub trait TxSigner: Send + Sync {
	/// Signs a transaction request, producing a submittable transaction.
	fn sign_transaction(&self, tx: &TransactionRequest) -> Result<SignedTransaction, SignerError>;
}

/// Signer backed by a local private key.
pub struct LocalSigner {
	signer: PrivateKeySigner,
}

impl LocalSigner {
	/// Creates a signer from a hex-encoded private key.
	pub fn new(private_key: &str) -> Result<Self, SignerError> {
		let signer: PrivateKeySigner = private_key
			.parse()
			.map_err(|e| SignerError::InvalidKey(format!("Invalid private key: {}", e)))?;
		Ok(Self { signer })
	}
}

impl TxSigner for LocalSigner {
	fn sign_transaction(&self, tx: &TransactionRequest) -> Result<SignedTransaction, SignerError> {
		let hash = tx.signing_hash();
		let signature = self
			.signer
			.sign_hash_sync(&hash)
			.map_err(|e| SignerError::SigningFailed(e.to_string()))?;

		Ok(SignedTransaction {
			request: tx.clone(),
			signature: Bytes::from(signature.as_bytes().to_vec()),
			hash,
		})
	}
}
