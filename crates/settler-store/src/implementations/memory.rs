//! In-memory ticket store implementation.
//!
//! This module provides a memory-based implementation of the TicketStore
//! trait, useful for testing and development scenarios where persistence is
//! not required.

use crate::{StoreError, TicketStore};
use alloy_primitives::Address;
use async_trait::async_trait;
use settler_types::SignedTicket;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// In-memory ticket store.
///
/// Queues live in a HashMap of per-sender deques, providing fast access but
/// no persistence across restarts.
#[derive(Default)]
pub struct MemoryTicketStore {
	queues: RwLock<HashMap<Address, VecDeque<SignedTicket>>>,
}

impl MemoryTicketStore {
	/// Creates a new MemoryTicketStore instance.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
	async fn append(&self, sender: Address, ticket: &SignedTicket) -> Result<(), StoreError> {
		let mut queues = self.queues.write().await;
		queues.entry(sender).or_default().push_back(ticket.clone());
		Ok(())
	}

	async fn head(&self, sender: Address) -> Result<Option<SignedTicket>, StoreError> {
		let queues = self.queues.read().await;
		Ok(queues.get(&sender).and_then(|q| q.front().cloned()))
	}

	async fn pop(&self, sender: Address) -> Result<Option<SignedTicket>, StoreError> {
		let mut queues = self.queues.write().await;
		let popped = queues.get_mut(&sender).and_then(|q| q.pop_front());
		if let Some(q) = queues.get(&sender) {
			if q.is_empty() {
				queues.remove(&sender);
			}
		}
		Ok(popped)
	}

	async fn count(&self, sender: Address) -> Result<usize, StoreError> {
		let queues = self.queues.read().await;
		Ok(queues.get(&sender).map(|q| q.len()).unwrap_or(0))
	}

	async fn senders(&self) -> Result<Vec<Address>, StoreError> {
		let queues = self.queues.read().await;
		Ok(queues.keys().copied().collect())
	}
}
