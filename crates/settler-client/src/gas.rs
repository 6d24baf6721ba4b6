//! Gas price monitoring.
//!
//! The monitor caches the node's suggested gas price, clamped below by a
//! configured floor, and exposes the optional ceiling the submission
//! pipeline enforces on fee caps.

use crate::EthClient;
use alloy_primitives::U256;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;

/// Caches the current gas price and holds the configured bounds.
pub struct GasPriceMonitor {
	min_gas_price: RwLock<U256>,
	max_gas_price: RwLock<Option<U256>>,
	gas_price: RwLock<U256>,
	quit: watch::Sender<bool>,
}

impl GasPriceMonitor {
	/// Creates a monitor with the given floor and optional ceiling.
	///
	/// The cached price starts at the floor until the first refresh.
	pub fn new(min_gas_price: U256, max_gas_price: Option<U256>) -> Self {
		let (quit, _) = watch::channel(false);
		Self {
			min_gas_price: RwLock::new(min_gas_price),
			max_gas_price: RwLock::new(max_gas_price),
			gas_price: RwLock::new(min_gas_price),
			quit,
		}
	}

	/// Current cached gas price.
	pub fn gas_price(&self) -> U256 {
		*self.gas_price.read().unwrap()
	}

	/// Configured gas price floor.
	pub fn min_gas_price(&self) -> U256 {
		*self.min_gas_price.read().unwrap()
	}

	/// Configured fee-cap ceiling, if any.
	pub fn max_gas_price(&self) -> Option<U256> {
		*self.max_gas_price.read().unwrap()
	}

	/// Updates the fee-cap ceiling.
	pub fn set_max_gas_price(&self, max: Option<U256>) {
		*self.max_gas_price.write().unwrap() = max;
	}

	/// Records a freshly observed gas price, clamped to the floor.
	pub fn update_gas_price(&self, price: U256) {
		let floor = self.min_gas_price();
		*self.gas_price.write().unwrap() = price.max(floor);
	}

	/// Starts the refresh task, polling the client at the given interval.
	pub fn start(self: &Arc<Self>, client: Arc<dyn EthClient>, poll_interval: Duration) {
		let monitor = Arc::clone(self);
		let mut quit = self.quit.subscribe();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(poll_interval);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						match client.gas_price().await {
							Ok(price) => monitor.update_gas_price(price),
							Err(e) => {
								tracing::warn!(error = %e, "Failed to refresh gas price");
							}
						}
					}
					_ = quit.changed() => return,
				}
			}
		});
	}

	/// Stops the refresh task. Stop is idempotent.
	pub fn stop(&self) {
		let _ = self.quit.send(true);
	}
}
