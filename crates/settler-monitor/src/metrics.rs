//! Redemption metric events.
//!
//! Emitted as structured tracing events so any subscriber-side exporter can
//! turn them into counters.

use alloy_primitives::{Address, U256};

/// Records a failed redemption attempt for a sender.
pub(crate) fn ticket_redemption_error(sender: Address) {
	tracing::warn!(sender = %sender, "Ticket redemption error");
}

/// Records a confirmed redemption and the amount redeemed.
pub(crate) fn value_redeemed(sender: Address, amount: U256) {
	tracing::info!(sender = %sender, amount = %amount, "Value redeemed");
}
