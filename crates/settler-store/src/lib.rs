//! Ticket persistence for the settlement core.
//!
//! This crate provides the durable queue of pending winning tickets,
//! supporting different backend implementations such as in-memory storage
//! for tests and file-based storage for crash-safe operation.

use alloy_primitives::Address;
use async_trait::async_trait;
use settler_types::SignedTicket;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during ticket store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Durable per-sender FIFO of pending winning tickets.
///
/// The store owns all durable state in the settlement core: whatever it
/// reports after a restart re-enters the sender's queue in original order.
#[async_trait]
pub trait TicketStore: Send + Sync {
	/// Appends a ticket to the sender's queue.
	async fn append(&self, sender: Address, ticket: &SignedTicket) -> Result<(), StoreError>;

	/// Returns the sender's oldest queued ticket without removing it.
	async fn head(&self, sender: Address) -> Result<Option<SignedTicket>, StoreError>;

	/// Removes and returns the sender's oldest queued ticket.
	async fn pop(&self, sender: Address) -> Result<Option<SignedTicket>, StoreError>;

	/// Number of tickets queued for the sender.
	async fn count(&self, sender: Address) -> Result<usize, StoreError>;

	/// Senders that currently have queued tickets.
	///
	/// Used on startup to resume draining queues that survived a restart.
	async fn senders(&self) -> Result<Vec<Address>, StoreError>;
}
