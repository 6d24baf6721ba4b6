//! Sender monitoring and max-float accounting for the settlement core.
//!
//! This crate tracks remote senders whose winning tickets this recipient
//! redeems against a shared on-chain reserve. Each cached sender gets a
//! block-gated ticket queue and a consumer task that drives redemption
//! attempts under max-float accounting: a ticket is only redeemed while the
//! sender's reserve allocation covers its face value, and the face value is
//! held as pending from submission until the redemption settles.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use settler_store::StoreError;
use settler_types::{SenderInfo, SignedTicket};
use thiserror::Error;
use tokio::sync::broadcast;

mod metrics;
pub mod monitor;
pub mod queue;

pub use monitor::SenderMonitor;
pub use queue::TicketQueue;

/// Error reported by a [`Broker`] implementation.
#[derive(Debug, Error)]
pub enum BrokerError {
	/// The redemption transaction could not be signed or submitted.
	#[error("transaction submission failed: {0}")]
	Submission(String),
	/// The redemption transaction failed to confirm.
	#[error("transaction confirmation failed: {0}")]
	Confirmation(String),
}

/// Error reported by a [`SenderManager`] implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ManagerError(pub String);

/// Errors that can occur during sender monitoring operations.
#[derive(Debug, Error)]
pub enum MonitorError {
	/// A float restore asked for more than the sender's pending amount.
	#[error("cannot subtract from insufficient pending amount")]
	InsufficientPending,
	/// The sender has no claimable reserve left, or the reserve is zero.
	#[error("max float is zero for sender {0}")]
	ZeroMaxFloat(Address),
	/// The sender's max float does not cover the ticket's face value.
	#[error("insufficient max float sender={sender} face_value={face_value} max_float={max_float}")]
	InsufficientMaxFloat {
		sender: Address,
		face_value: U256,
		max_float: U256,
	},
	/// The sender's deposit and reserve unlock before a redemption could
	/// be attempted.
	#[error("deposit and reserve for sender {0} is set to unlock soon")]
	SenderUnlockSoon(Address),
	/// A sender manager lookup failed.
	#[error("sender manager error: {0}")]
	SenderManager(#[from] ManagerError),
	/// A broker call failed.
	#[error(transparent)]
	Broker(#[from] BrokerError),
	/// A ticket store operation failed.
	#[error("ticket store error: {0}")]
	Store(#[from] StoreError),
	/// Both the redemption attempt and the restoring float adjustment failed.
	#[error("redemption failed ({redeem}); float restore failed ({restore})")]
	FloatRestore {
		redeem: Box<MonitorError>,
		restore: Box<MonitorError>,
	},
}

/// Submits ticket redemptions to the reserve contract.
#[async_trait]
pub trait Broker: Send + Sync {
	/// Submits a redemption transaction for a winning ticket.
	///
	/// Returns a handle for the submitted transaction. Submission errors are
	/// reported immediately.
	async fn redeem_winning_ticket(&self, ticket: &SignedTicket) -> Result<B256, BrokerError>;

	/// Blocks until the redemption transaction confirms or fails.
	///
	/// On success, returns the amount actually redeemed, which may be below
	/// the ticket's face value when the reserve could not cover it in full.
	async fn check_tx(&self, tx: B256) -> Result<U256, BrokerError>;
}

/// Provides cached on-chain sender state.
#[async_trait]
pub trait SenderManager: Send + Sync {
	/// Fetches the sender's reserve state and withdraw round.
	async fn get_sender_info(&self, addr: Address) -> Result<SenderInfo, ManagerError>;

	/// Amount the claimant has already claimed from the sender's reserve.
	async fn claimed_reserve(&self, addr: Address, claimant: Address)
		-> Result<U256, ManagerError>;

	/// Purges any cached state for the sender.
	async fn clear(&self, addr: Address);
}

/// Provides round state and new-block notifications.
pub trait TimeManager: Send + Sync {
	/// The last initialized round.
	fn last_initialized_round(&self) -> u64;

	/// Current size of the transcoder pool the reserve is split across.
	fn transcoder_pool_size(&self) -> u64;

	/// Subscribes to new-block events.
	fn subscribe_blocks(&self) -> broadcast::Receiver<u64>;
}
