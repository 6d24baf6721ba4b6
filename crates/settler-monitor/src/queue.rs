//! Per-sender ticket queue gated by new-block events.
//!
//! Queued tickets live in the ticket store; the queue's watcher task pops at
//! most one stored ticket per block event and forwards it to the consumer,
//! preserving FIFO order. Rate-limiting attempts to one per block keeps
//! retries from stampeding while max float is temporarily insufficient.

use crate::MonitorError;
use alloy_primitives::Address;
use settler_store::TicketStore;
use settler_types::SignedTicket;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};

/// Block-gated FIFO of winning tickets for one sender.
pub struct TicketQueue {
	sender: Address,
	store: Arc<dyn TicketStore>,
	redeemable_tx: mpsc::UnboundedSender<SignedTicket>,
	redeemable_rx: Mutex<Option<mpsc::UnboundedReceiver<SignedTicket>>>,
	quit: watch::Sender<bool>,
}

impl TicketQueue {
	/// Creates a queue for the given sender over the shared ticket store.
	pub fn new(store: Arc<dyn TicketStore>, sender: Address) -> Self {
		let (redeemable_tx, redeemable_rx) = mpsc::unbounded_channel();
		let (quit, _) = watch::channel(false);
		Self {
			sender,
			store,
			redeemable_tx,
			redeemable_rx: Mutex::new(Some(redeemable_rx)),
			quit,
		}
	}

	/// Starts the block watcher task.
	///
	/// On every block event the watcher pops the sender's oldest stored
	/// ticket, if any, and emits it on the redeemable channel.
	pub fn start(&self, mut blocks: broadcast::Receiver<u64>) {
		let sender = self.sender;
		let store = Arc::clone(&self.store);
		let redeemable = self.redeemable_tx.clone();
		let mut quit = self.quit.subscribe();

		tokio::spawn(async move {
			loop {
				tokio::select! {
					block = blocks.recv() => match block {
						Ok(_) => match store.pop(sender).await {
							Ok(Some(ticket)) => {
								// A dropped receiver means the consumer exited
								if redeemable.send(ticket).is_err() {
									return;
								}
							}
							Ok(None) => {}
							Err(e) => {
								tracing::error!(sender = %sender, error = %e, "Failed to pop queued ticket");
							}
						},
						Err(broadcast::error::RecvError::Lagged(skipped)) => {
							tracing::warn!(sender = %sender, skipped, "Block subscription lagged");
						}
						Err(broadcast::error::RecvError::Closed) => return,
					},
					_ = quit.changed() => return,
				}
			}
		});
	}

	/// Appends a ticket to the persistent queue.
	///
	/// A ticket returned by the consumer re-enters through here as a fresh
	/// enqueue, so eventual delivery is preserved.
	pub async fn add(&self, ticket: &SignedTicket) -> Result<(), MonitorError> {
		self.store.append(self.sender, ticket).await?;
		Ok(())
	}

	/// Takes the consuming end of the redeemable sequence.
	///
	/// The sequence is infinite and non-restartable: this returns `Some` on
	/// the first call only.
	pub fn redeemable(&self) -> Option<mpsc::UnboundedReceiver<SignedTicket>> {
		self.redeemable_rx.lock().unwrap().take()
	}

	/// Stops the block watcher; no further tickets are emitted. Idempotent.
	pub fn stop(&self) {
		let _ = self.quit.send(true);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Bytes, B256, U256};
	use settler_store::implementations::memory::MemoryTicketStore;
	use settler_types::Ticket;
	use std::time::Duration;

	fn ticket(sender: Address, nonce: u64) -> SignedTicket {
		SignedTicket {
			ticket: Ticket {
				recipient: Address::repeat_byte(0x01),
				sender,
				face_value: U256::from(30u64),
				win_prob: U256::MAX,
				sender_nonce: nonce,
				recipient_rand_hash: B256::repeat_byte(0x02),
				creation_round: 1,
				creation_round_block_hash: B256::repeat_byte(0x03),
			},
			sig: Bytes::from(vec![0xaa; 65]),
			recipient_rand: U256::from(nonce),
		}
	}

	async fn recv_ticket(rx: &mut mpsc::UnboundedReceiver<SignedTicket>) -> SignedTicket {
		tokio::time::timeout(Duration::from_secs(1), rx.recv())
			.await
			.expect("expected a redeemable ticket")
			.expect("redeemable channel closed")
	}

	#[tokio::test(start_paused = true)]
	async fn test_emits_one_ticket_per_block_in_fifo_order() {
		let store = Arc::new(MemoryTicketStore::new());
		let sender = Address::repeat_byte(0x10);
		let queue = TicketQueue::new(store.clone(), sender);
		let (blocks, _) = broadcast::channel(16);

		queue.start(blocks.subscribe());
		let mut redeemable = queue.redeemable().unwrap();

		for nonce in 0..3 {
			queue.add(&ticket(sender, nonce)).await.unwrap();
		}

		// One emission per block, oldest first
		for nonce in 0..3u64 {
			blocks.send(100 + nonce).unwrap();
			let emitted = recv_ticket(&mut redeemable).await;
			assert_eq!(emitted.ticket.sender_nonce, nonce);
		}

		// No queued tickets left; another block emits nothing
		blocks.send(200).unwrap();
		tokio::task::yield_now().await;
		assert!(redeemable.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_blocks_without_tickets_emit_nothing() {
		let store = Arc::new(MemoryTicketStore::new());
		let sender = Address::repeat_byte(0x11);
		let queue = TicketQueue::new(store, sender);
		let (blocks, _) = broadcast::channel(16);

		queue.start(blocks.subscribe());
		let mut redeemable = queue.redeemable().unwrap();

		blocks.send(1).unwrap();
		tokio::task::yield_now().await;
		assert!(redeemable.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_re_added_ticket_is_delivered_again() {
		let store = Arc::new(MemoryTicketStore::new());
		let sender = Address::repeat_byte(0x12);
		let queue = TicketQueue::new(store, sender);
		let (blocks, _) = broadcast::channel(16);

		queue.start(blocks.subscribe());
		let mut redeemable = queue.redeemable().unwrap();

		queue.add(&ticket(sender, 7)).await.unwrap();
		blocks.send(1).unwrap();
		let emitted = recv_ticket(&mut redeemable).await;

		// Consumer hands the ticket back; the next block re-delivers it
		queue.add(&emitted).await.unwrap();
		blocks.send(2).unwrap();
		let emitted = recv_ticket(&mut redeemable).await;
		assert_eq!(emitted.ticket.sender_nonce, 7);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stop_drains_no_further_events() {
		let store = Arc::new(MemoryTicketStore::new());
		let sender = Address::repeat_byte(0x13);
		let queue = TicketQueue::new(store, sender);
		let (blocks, _) = broadcast::channel(16);

		queue.start(blocks.subscribe());
		let mut redeemable = queue.redeemable().unwrap();

		queue.add(&ticket(sender, 0)).await.unwrap();
		queue.stop();
		queue.stop(); // idempotent
		tokio::task::yield_now().await;

		// The watcher may already be gone, so the send can have no receivers
		let _ = blocks.send(1);
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(redeemable.try_recv().is_err());
	}

	#[test]
	fn test_redeemable_is_non_restartable() {
		let store = Arc::new(MemoryTicketStore::new());
		let queue = TicketQueue::new(store, Address::repeat_byte(0x14));
		assert!(queue.redeemable().is_some());
		assert!(queue.redeemable().is_none());
	}
}
