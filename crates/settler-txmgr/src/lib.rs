//! Serialized transaction submission pipeline.
//!
//! The manager signs and submits outbound transactions, then drives each one
//! to a terminal state: it waits for inclusion with a timeout, replaces a
//! stalled transaction with a fee-bumped copy up to a bounded number of
//! times, and publishes exactly one receipt event per accepted transaction,
//! keyed by the hash of the first submission.

use alloy_primitives::{B256, U256};
use settler_client::{ClientError, EthClient, GasPriceMonitor, SignerError, TxSigner};
use settler_types::{ReceiptEvent, SignedTransaction, TransactionReceipt, TransactionRequest};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Notify};

pub mod bus;
mod queue;

pub use bus::ReceiptBus;

use queue::{PendingTransaction, TransactionQueue};

/// How often the wait loop polls for a receipt.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Buffered receipt events per subscriber.
const RECEIPT_BUS_CAPACITY: usize = 64;

/// Errors that can occur in the transaction manager.
#[derive(Debug, Error)]
pub enum TxManagerError {
	/// The transaction to replace already mined; its receipt will surface
	/// on the next wait.
	#[error("trying to replace a transaction that has been mined")]
	ReplacingMinedTx,
	/// The transaction was not included before the configured timeout.
	#[error("timed out waiting for transaction inclusion")]
	Timeout,
	/// The bumped fee caps exceed the configured gas price ceiling.
	#[error("replacement gas price exceeds max gas price suggested={suggested} max={max}")]
	ReplacementGasExceedsMax { suggested: U256, max: U256 },
	/// A blockchain client call failed.
	#[error(transparent)]
	Client(#[from] ClientError),
	/// Signing failed.
	#[error(transparent)]
	Signer(#[from] SignerError),
}

/// Applies a percentage price bump, truncating toward zero:
/// `⌊amount · (100 + price_bump) / 100⌋`.
pub fn apply_price_bump(amount: U256, price_bump: u64) -> U256 {
	amount * U256::from(100 + price_bump) / U256::from(100u64)
}

/// Builds the fee-bumped replacement for a stalled transaction.
///
/// Nonce, gas limit, value, recipient, and payload are preserved; both fee
/// caps are bumped by `price_bump` percent.
pub fn new_replacement_tx(tx: &TransactionRequest, price_bump: u64) -> TransactionRequest {
	let mut replacement = tx.clone();
	replacement.gas_fee_cap = apply_price_bump(tx.gas_fee_cap, price_bump);
	replacement.gas_tip_cap = apply_price_bump(tx.gas_tip_cap, price_bump);
	replacement
}

struct Inner {
	client: Arc<dyn EthClient>,
	signer: Arc<dyn TxSigner>,
	gas_price_monitor: Arc<GasPriceMonitor>,

	tx_timeout: Duration,
	max_replacements: u32,
	price_bump: u64,

	queue: Mutex<TransactionQueue>,
	enqueued: Notify,
	bus: ReceiptBus,
	quit: watch::Sender<bool>,
}

/// Serialized submission pipeline for outbound transactions.
///
/// Cloning is cheap; all clones share the same queue and check-tx task.
#[derive(Clone)]
pub struct TransactionManager {
	inner: Arc<Inner>,
}

impl TransactionManager {
	/// Creates a new TransactionManager.
	pub fn new(
		client: Arc<dyn EthClient>,
		signer: Arc<dyn TxSigner>,
		gas_price_monitor: Arc<GasPriceMonitor>,
		tx_timeout: Duration,
		max_replacements: u32,
		price_bump: u64,
	) -> Self {
		let (quit, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner {
				client,
				signer,
				gas_price_monitor,
				tx_timeout,
				max_replacements,
				price_bump,
				queue: Mutex::new(TransactionQueue::default()),
				enqueued: Notify::new(),
				bus: ReceiptBus::new(RECEIPT_BUS_CAPACITY),
				quit,
			}),
		}
	}

	/// Signs and submits a transaction.
	///
	/// On success the transaction joins the in-flight queue and its origin
	/// hash is returned; the eventual receipt event carries the same hash.
	/// On failure the submission error is returned and nothing is queued.
	pub async fn send_transaction(
		&self,
		tx: TransactionRequest,
	) -> Result<B256, TxManagerError> {
		let adjusted = self.new_adjusted_tx(tx);
		let signed = self.inner.signer.sign_transaction(&adjusted)?;

		if let Err(e) = self.inner.client.send_transaction(&signed).await {
			tracing::error!(
				tx_hash = %signed.hash,
				nonce = adjusted.nonce,
				gas_fee_cap = %adjusted.gas_fee_cap,
				gas_tip_cap = %adjusted.gas_tip_cap,
				error = %e,
				"Failed to submit transaction"
			);
			return Err(e.into());
		}

		tracing::info!(
			tx_hash = %signed.hash,
			nonce = adjusted.nonce,
			gas_fee_cap = %adjusted.gas_fee_cap,
			gas_tip_cap = %adjusted.gas_tip_cap,
			"Submitted transaction"
		);

		let origin_tx_hash = signed.hash;
		self.inner.queue.lock().unwrap().add(signed);
		self.inner.enqueued.notify_one();
		Ok(origin_tx_hash)
	}

	/// Registers a sink for all future receipt events.
	///
	/// Dropping the receiver unsubscribes.
	pub fn subscribe(&self) -> broadcast::Receiver<ReceiptEvent> {
		self.inner.bus.subscribe()
	}

	/// Starts the check-tx task.
	pub fn start(&self) {
		let manager = self.clone();
		let mut quit = self.inner.quit.subscribe();
		tokio::spawn(async move {
			loop {
				let head = tokio::select! {
					head = manager.next_head() => head,
					_ = quit.changed() => return,
				};
				tokio::select! {
					_ = manager.check_tx(head) => {}
					_ = quit.changed() => return,
				}
			}
		});
	}

	/// Stops the check-tx task. Idempotent.
	pub fn stop(&self) {
		let _ = self.inner.quit.send(true);
	}

	/// Clamps the fee cap of an initial submission to the gas price ceiling.
	///
	/// Without a ceiling, or with a ceiling at or above the fee cap, the
	/// transaction is returned unchanged.
	fn new_adjusted_tx(&self, tx: TransactionRequest) -> TransactionRequest {
		match self.inner.gas_price_monitor.max_gas_price() {
			Some(max) if tx.gas_fee_cap > max => {
				let mut adjusted = tx;
				adjusted.gas_fee_cap = max;
				adjusted
			}
			_ => tx,
		}
	}

	/// Waits for the queue to be non-empty and returns its head.
	async fn next_head(&self) -> PendingTransaction {
		loop {
			if let Some(head) = self.inner.queue.lock().unwrap().peek() {
				return head;
			}
			self.inner.enqueued.notified().await;
		}
	}

	/// Drives the queue head to a terminal state and publishes its receipt
	/// event.
	async fn check_tx(&self, head: PendingTransaction) {
		let origin_tx_hash = head.origin_tx_hash;
		let mut current = head.tx;

		let mut result = self.wait(&current).await;
		let mut replacements = 0;
		while result.is_err() && replacements < self.inner.max_replacements {
			replacements += 1;
			match self.replace(&current).await {
				Ok(replacement) => {
					self.inner
						.queue
						.lock()
						.unwrap()
						.replace_head(replacement.clone());
					current = replacement;
					result = self.wait(&current).await;
				}
				Err(TxManagerError::ReplacingMinedTx) => {
					// The original mined; its receipt surfaces on the next wait
					result = self.wait(&current).await;
				}
				Err(e) => {
					result = Err(e);
					break;
				}
			}
		}

		self.inner.queue.lock().unwrap().pop();

		match result {
			Ok(receipt) => {
				self.publish(origin_tx_hash, Some(receipt), None);
			}
			Err(e) => {
				tracing::error!(
					origin_tx_hash = %origin_tx_hash,
					replacements,
					error = %e,
					"Transaction failed"
				);
				self.publish(origin_tx_hash, None, Some(e.to_string()));
			}
		}
	}

	/// Waits for the transaction to be included, polling for its receipt
	/// until `tx_timeout` elapses.
	async fn wait(&self, tx: &SignedTransaction) -> Result<TransactionReceipt, TxManagerError> {
		let poll = async {
			loop {
				match self.inner.client.transaction_receipt(tx.hash).await {
					Ok(Some(receipt)) => return Ok(receipt),
					Ok(None) | Err(ClientError::NotFound) => {}
					Err(e) => return Err(TxManagerError::from(e)),
				}
				tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
			}
		};

		match tokio::time::timeout(self.inner.tx_timeout, poll).await {
			Ok(result) => result,
			Err(_) => Err(TxManagerError::Timeout),
		}
	}

	/// Submits a fee-bumped replacement for a stalled transaction.
	///
	/// Fails with [`TxManagerError::ReplacingMinedTx`] when the original
	/// already mined, and with
	/// [`TxManagerError::ReplacementGasExceedsMax`] when the bumped caps
	/// break the gas price ceiling.
	async fn replace(&self, tx: &SignedTransaction) -> Result<SignedTransaction, TxManagerError> {
		match self.inner.client.transaction_by_hash(tx.hash).await {
			Ok((_, is_pending)) => {
				if !is_pending {
					return Err(TxManagerError::ReplacingMinedTx);
				}
			}
			// A transaction the node no longer knows is eligible for
			// replacement
			Err(ClientError::NotFound) => {}
			Err(e) => return Err(e.into()),
		}

		let replacement = new_replacement_tx(&tx.request, self.inner.price_bump);

		if let Some(max) = self.inner.gas_price_monitor.max_gas_price() {
			let suggested = replacement.gas_fee_cap.max(replacement.gas_tip_cap);
			if suggested > max {
				return Err(TxManagerError::ReplacementGasExceedsMax { suggested, max });
			}
		}

		let signed = self.inner.signer.sign_transaction(&replacement)?;
		if let Err(e) = self.inner.client.send_transaction(&signed).await {
			tracing::error!(
				tx_hash = %signed.hash,
				error = %e,
				"Failed to submit replacement transaction"
			);
			return Err(e.into());
		}

		tracing::info!(
			tx_hash = %tx.hash,
			replacement_tx_hash = %signed.hash,
			gas_fee_cap = %replacement.gas_fee_cap,
			gas_tip_cap = %replacement.gas_tip_cap,
			"Submitted replacement transaction"
		);

		Ok(signed)
	}

	fn publish(&self, origin_tx_hash: B256, receipt: Option<TransactionReceipt>, error: Option<String>) {
		self.inner.bus.publish(ReceiptEvent {
			origin_tx_hash,
			receipt,
			error,
		});
	}
}
