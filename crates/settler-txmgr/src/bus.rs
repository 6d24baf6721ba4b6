//! Receipt event fan-out.
//!
//! Every published event is delivered to every live subscriber in
//! publication order. The channel buffer is bounded: a subscriber that falls
//! further behind than the buffer observes a lag error and loses the oldest
//! events rather than blocking publication.

use settler_types::ReceiptEvent;
use tokio::sync::broadcast;

/// Fan-out bus for receipt events.
#[derive(Clone)]
pub struct ReceiptBus {
	sender: broadcast::Sender<ReceiptEvent>,
}

impl ReceiptBus {
	/// Creates a bus whose subscribers may buffer up to `capacity` events.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Registers a sink for all future receipt events.
	///
	/// Dropping the receiver unsubscribes.
	pub fn subscribe(&self) -> broadcast::Receiver<ReceiptEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to every live subscriber.
	pub fn publish(&self, event: ReceiptEvent) {
		// A send with no subscribers is not an error
		let _ = self.sender.send(event);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::B256;

	fn event(byte: u8) -> ReceiptEvent {
		ReceiptEvent {
			origin_tx_hash: B256::repeat_byte(byte),
			receipt: None,
			error: None,
		}
	}

	#[tokio::test]
	async fn test_every_subscriber_receives_in_order() {
		let bus = ReceiptBus::new(16);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		bus.publish(event(1));
		bus.publish(event(2));

		for sink in [&mut first, &mut second] {
			assert_eq!(sink.recv().await.unwrap().origin_tx_hash, B256::repeat_byte(1));
			assert_eq!(sink.recv().await.unwrap().origin_tx_hash, B256::repeat_byte(2));
		}
	}

	#[tokio::test]
	async fn test_late_subscriber_sees_only_future_events() {
		let bus = ReceiptBus::new(16);
		bus.publish(event(1));

		let mut sink = bus.subscribe();
		bus.publish(event(2));
		assert_eq!(sink.recv().await.unwrap().origin_tx_hash, B256::repeat_byte(2));
	}

	#[tokio::test]
	async fn test_publish_without_subscribers_is_ok() {
		let bus = ReceiptBus::new(16);
		bus.publish(event(1));
	}
}
