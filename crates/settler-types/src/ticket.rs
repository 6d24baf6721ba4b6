//! Probabilistic payment ticket types.
//!
//! A ticket is a signed promise from a sender: if the ticket turns out to be
//! a winner under the probabilistic payment scheme, the recipient may redeem
//! its face value against the sender's on-chain reserve.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A probabilistic payment ticket.
///
/// Tickets are immutable once created. Besides the monetary fields, a ticket
/// carries the winner-selection parameters the reserve contract needs to
/// verify a redemption; the settlement core treats those as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
	/// Address of the recipient entitled to redeem the ticket.
	pub recipient: Address,
	/// Address of the sender whose reserve backs the ticket.
	pub sender: Address,
	/// Value paid out on redemption, in the chain's smallest currency unit.
	pub face_value: U256,
	/// Winning probability encoded as a fixed-point fraction.
	pub win_prob: U256,
	/// Monotonic per-recipientRand nonce chosen by the sender.
	pub sender_nonce: u64,
	/// Commitment to the recipient's random value.
	pub recipient_rand_hash: B256,
	/// Round the ticket parameters were created in.
	pub creation_round: u64,
	/// Block hash of the creation round, binding the ticket to one chain.
	pub creation_round_block_hash: B256,
}

/// A winning ticket together with the material needed to redeem it on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTicket {
	/// The ticket itself.
	pub ticket: Ticket,
	/// Sender's signature over the ticket.
	pub sig: Bytes,
	/// Pre-image of `ticket.recipient_rand_hash`, revealed at redemption.
	pub recipient_rand: U256,
}

impl SignedTicket {
	/// Address of the remote sender that issued the ticket.
	pub fn sender(&self) -> Address {
		self.ticket.sender
	}

	/// Face value redeemed if the ticket wins.
	pub fn face_value(&self) -> U256 {
		self.ticket.face_value
	}
}

/// On-chain reserve state for one sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
	/// Funds remaining in the reserve.
	pub funds_remaining: U256,
	/// Funds already claimed from the reserve in the current round.
	pub claimed_in_current_round: U256,
}

/// Sender state fetched from the reserve contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
	/// The sender's reserve.
	pub reserve: Reserve,
	/// Round in which the sender's deposit and reserve unlock; zero when no
	/// withdrawal has been requested.
	pub withdraw_round: u64,
}
