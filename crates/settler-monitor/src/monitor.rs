//! Remote sender cache and redemption loop.
//!
//! The monitor lazily caches state for every remote sender it is asked
//! about, enforces max-float accounting over the sender's shared reserve,
//! and runs one consumer task per sender that drives redemption attempts
//! for queued winning tickets.
//!
//! The cache mutex guards only the sender map and each `pending_amount`;
//! network and store I/O always happens outside it.

use crate::{
	metrics, Broker, ManagerError, MonitorError, SenderManager, TicketQueue, TimeManager,
};
use alloy_primitives::{Address, U256};
use settler_store::TicketStore;
use settler_types::SignedTicket;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Cached state for one remote sender.
struct RemoteSender {
	/// Sum of the face values of tickets currently pending redemption
	/// on-chain.
	pending_amount: U256,
	queue: Arc<TicketQueue>,
	done: watch::Sender<bool>,
	last_access: Instant,
}

struct Inner {
	claimant: Address,
	cleanup_interval: Duration,
	ttl: Duration,

	senders: Mutex<HashMap<Address, RemoteSender>>,

	broker: Arc<dyn Broker>,
	sender_manager: Arc<dyn SenderManager>,
	time_manager: Arc<dyn TimeManager>,
	store: Arc<dyn TicketStore>,

	quit: watch::Sender<bool>,
}

/// Monitors remote senders and drives ticket redemption.
///
/// Cloning is cheap; all clones share the same cache and tasks.
#[derive(Clone)]
pub struct SenderMonitor {
	inner: Arc<Inner>,
}

impl SenderMonitor {
	/// Creates a new SenderMonitor.
	///
	/// `claimant` is the address reserve allocations are claimed under;
	/// senders idle for longer than `ttl` are evicted by a cleanup pass
	/// every `cleanup_interval`.
	pub fn new(
		claimant: Address,
		broker: Arc<dyn Broker>,
		sender_manager: Arc<dyn SenderManager>,
		time_manager: Arc<dyn TimeManager>,
		store: Arc<dyn TicketStore>,
		cleanup_interval: Duration,
		ttl: Duration,
	) -> Self {
		let (quit, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner {
				claimant,
				cleanup_interval,
				ttl,
				senders: Mutex::new(HashMap::new()),
				broker,
				sender_manager,
				time_manager,
				store,
				quit,
			}),
		}
	}

	/// Starts the background tasks.
	///
	/// Senders with tickets persisted from a previous run are re-cached so
	/// their queues resume draining in original order, then the cleanup loop
	/// runs until [`SenderMonitor::stop`].
	pub async fn start(&self) -> Result<(), MonitorError> {
		for sender in self.inner.store.senders().await? {
			self.ensure_cache(sender);
		}

		let monitor = self.clone();
		let mut quit = self.inner.quit.subscribe();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(monitor.inner.cleanup_interval);
			// The first tick completes immediately
			ticker.tick().await;
			loop {
				tokio::select! {
					_ = ticker.tick() => monitor.cleanup().await,
					_ = quit.changed() => return,
				}
			}
		});

		Ok(())
	}

	/// Signals every background task to exit gracefully. Idempotent.
	pub fn stop(&self) {
		let _ = self.inner.quit.send(true);
	}

	/// Adds a ticket to the queue for a remote sender.
	pub async fn queue_ticket(&self, ticket: SignedTicket) -> Result<(), MonitorError> {
		let queue = self.ensure_cache(ticket.sender());
		queue.add(&ticket).await
	}

	/// Adds to a remote sender's max float by releasing pending funds.
	///
	/// Fails without modifying state when `amount` exceeds the sender's
	/// pending amount.
	pub fn add_float(&self, addr: Address, amount: U256) -> Result<(), MonitorError> {
		self.ensure_cache(addr);

		let mut senders = self.inner.senders.lock().unwrap();
		let Some(remote) = senders.get_mut(&addr) else {
			return Err(MonitorError::InsufficientPending);
		};

		// Subtracting from the pending amount adds to max float
		if remote.pending_amount < amount {
			return Err(MonitorError::InsufficientPending);
		}
		remote.pending_amount -= amount;
		Ok(())
	}

	/// Subtracts from a remote sender's max float by marking funds pending.
	pub fn sub_float(&self, addr: Address, amount: U256) {
		self.ensure_cache(addr);

		let mut senders = self.inner.senders.lock().unwrap();
		if let Some(remote) = senders.get_mut(&addr) {
			// Adding to the pending amount subtracts from max float
			remote.pending_amount = remote.pending_amount.saturating_add(amount);
		}
	}

	/// Returns a remote sender's current max float.
	///
	/// Max float is the sender's reserve allocation minus its pending
	/// amount, saturating at zero.
	pub async fn max_float(&self, addr: Address) -> Result<U256, MonitorError> {
		self.ensure_cache(addr);

		let reserve_alloc = self.reserve_alloc(addr).await?;
		let pending = {
			let senders = self.inner.senders.lock().unwrap();
			senders
				.get(&addr)
				.map(|remote| remote.pending_amount)
				.unwrap_or_default()
		};
		Ok(reserve_alloc.saturating_sub(pending))
	}

	/// Checks whether the sender's unlock period ends after the next round.
	///
	/// Accepting tickets from a sender whose reserve unlocks sooner risks the
	/// reserve being withdrawn before a redemption can be attempted.
	pub async fn validate_sender(&self, addr: Address) -> Result<(), MonitorError> {
		let info = self.inner.sender_manager.get_sender_info(addr).await.map_err(|e| {
			ManagerError(format!("could not get sender info for {}: {}", addr, e))
		})?;
		let max_withdraw_round = self.inner.time_manager.last_initialized_round() + 1;
		if info.withdraw_round != 0 && info.withdraw_round <= max_withdraw_round {
			return Err(MonitorError::SenderUnlockSoon(addr));
		}
		Ok(())
	}

	/// The sender's share of its reserve, net of what this claimant already
	/// claimed: `(remaining + claimedThisRound) / poolSize − claimed`.
	async fn reserve_alloc(&self, addr: Address) -> Result<U256, MonitorError> {
		let info = self.inner.sender_manager.get_sender_info(addr).await?;
		let claimed = self
			.inner
			.sender_manager
			.claimed_reserve(addr, self.inner.claimant)
			.await?;

		let pool_size = self.inner.time_manager.transcoder_pool_size();
		if pool_size == 0 {
			return Ok(U256::ZERO);
		}

		let reserve = info
			.reserve
			.funds_remaining
			.saturating_add(info.reserve.claimed_in_current_round);
		Ok((reserve / U256::from(pool_size)).saturating_sub(claimed))
	}

	/// Ensures the sender is cached, refreshing its last-access time, and
	/// returns its ticket queue.
	fn ensure_cache(&self, addr: Address) -> Arc<TicketQueue> {
		let mut senders = self.inner.senders.lock().unwrap();
		let remote = senders.entry(addr).or_insert_with(|| self.cache(addr));
		remote.last_access = Instant::now();
		Arc::clone(&remote.queue)
	}

	/// Builds the cache entry for a sender: starts its ticket queue and
	/// spawns its consumer task.
	fn cache(&self, addr: Address) -> RemoteSender {
		let queue = Arc::new(TicketQueue::new(Arc::clone(&self.inner.store), addr));
		queue.start(self.inner.time_manager.subscribe_blocks());

		let (done, done_rx) = watch::channel(false);
		if let Some(redeemable) = queue.redeemable() {
			let monitor = self.clone();
			let consumer_queue = Arc::clone(&queue);
			tokio::spawn(async move {
				monitor
					.consumer_loop(addr, consumer_queue, redeemable, done_rx)
					.await;
			});
		}

		RemoteSender {
			pending_amount: U256::ZERO,
			queue,
			done,
			last_access: Instant::now(),
		}
	}

	/// Consumes redeemable tickets for one sender until eviction or stop.
	async fn consumer_loop(
		&self,
		addr: Address,
		queue: Arc<TicketQueue>,
		mut redeemable: mpsc::UnboundedReceiver<SignedTicket>,
		mut done: watch::Receiver<bool>,
	) {
		let mut quit = self.inner.quit.subscribe();
		loop {
			if *quit.borrow() {
				queue.stop();
				return;
			}
			tokio::select! {
				ticket = redeemable.recv() => match ticket {
					Some(ticket) => {
						if let Err(err) = self.redeem_winning_ticket(&ticket).await {
							tracing::error!(sender = %addr, error = %err, "Error redeeming ticket");
						}
					}
					None => return,
				},
				_ = done.changed() => {
					// Evicted: tell the ticket queue to exit as well
					queue.stop();
					return;
				}
				_ = quit.changed() => {
					queue.stop();
					return;
				}
			}
		}
	}

	/// Attempts to redeem one winning ticket.
	///
	/// Insufficient-float outcomes re-queue the ticket for a later block;
	/// broker failures do not, and the sender must re-submit.
	async fn redeem_winning_ticket(&self, ticket: &SignedTicket) -> Result<(), MonitorError> {
		let sender = ticket.sender();
		let face_value = ticket.face_value();

		let max_float = self.max_float(sender).await?;

		// No claimable reserve left, or the reserve is zero
		if max_float.is_zero() {
			self.queue_ticket(ticket.clone()).await?;
			return Err(MonitorError::ZeroMaxFloat(sender));
		}

		// Queue the ticket to be retried once other in-flight redemptions
		// have settled
		if max_float < face_value {
			self.queue_ticket(ticket.clone()).await?;
			return Err(MonitorError::InsufficientMaxFloat {
				sender,
				face_value,
				max_float,
			});
		}

		// The face value is pending until the redemption transaction
		// confirms on-chain
		self.sub_float(sender, face_value);

		let attempt = self.attempt_redemption(ticket).await;

		// Release the pending amount on every path out of the attempt: the
		// redemption either settled on-chain or was never submitted. A
		// confirmed redemption releases what was actually redeemed.
		let restore_amount = match &attempt {
			Ok(redeemed) => (*redeemed).min(face_value),
			Err(_) => face_value,
		};
		let restore = self.add_float(sender, restore_amount);

		match (attempt, restore) {
			(Ok(_), Ok(())) => Ok(()),
			(Ok(_), Err(restore)) => Err(restore),
			(Err(redeem), Ok(())) => Err(redeem),
			(Err(redeem), Err(restore)) => Err(MonitorError::FloatRestore {
				redeem: Box::new(redeem),
				restore: Box::new(restore),
			}),
		}
	}

	/// Submits the redemption and waits for it to settle.
	///
	/// Returns the amount actually redeemed.
	async fn attempt_redemption(&self, ticket: &SignedTicket) -> Result<U256, MonitorError> {
		let sender = ticket.sender();

		let tx = match self.inner.broker.redeem_winning_ticket(ticket).await {
			Ok(tx) => tx,
			Err(e) => {
				metrics::ticket_redemption_error(sender);
				return Err(e.into());
			}
		};

		match self.inner.broker.check_tx(tx).await {
			Ok(redeemed) => {
				metrics::value_redeemed(sender, redeemed);
				Ok(redeemed)
			}
			Err(e) => {
				metrics::ticket_redemption_error(sender);
				Err(e.into())
			}
		}
	}

	/// Evicts senders idle for longer than the ttl.
	///
	/// Eviction signals the sender's consumer via `done` and purges any
	/// state the sender manager cached for the address.
	async fn cleanup(&self) {
		let evicted: Vec<(Address, RemoteSender)> = {
			let mut senders = self.inner.senders.lock().unwrap();
			let expired: Vec<Address> = senders
				.iter()
				.filter(|(_, remote)| remote.last_access.elapsed() > self.inner.ttl)
				.map(|(addr, _)| *addr)
				.collect();
			expired
				.into_iter()
				.filter_map(|addr| senders.remove(&addr).map(|remote| (addr, remote)))
				.collect()
		};

		for (addr, remote) in evicted {
			tracing::debug!(sender = %addr, "Evicting idle sender");
			let _ = remote.done.send(true);
			self.inner.sender_manager.clear(addr).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Broker, BrokerError, SenderManager, TimeManager};
	use alloy_primitives::{Bytes, B256};
	use async_trait::async_trait;
	use settler_store::implementations::memory::MemoryTicketStore;
	use settler_types::{Reserve, SenderInfo, Ticket};
	use tokio::sync::broadcast;

	fn ticket(sender: Address, face_value: u64) -> SignedTicket {
		SignedTicket {
			ticket: Ticket {
				recipient: Address::repeat_byte(0x01),
				sender,
				face_value: U256::from(face_value),
				win_prob: U256::MAX,
				sender_nonce: 1,
				recipient_rand_hash: B256::repeat_byte(0x02),
				creation_round: 1,
				creation_round_block_hash: B256::repeat_byte(0x03),
			},
			sig: Bytes::from(vec![0xaa; 65]),
			recipient_rand: U256::from(5u64),
		}
	}

	#[derive(Default)]
	struct StubBrokerState {
		redeem_err: Option<String>,
		check_tx_err: Option<String>,
		redeemed_amount: Option<U256>,
		redemptions: Vec<SignedTicket>,
	}

	#[derive(Default)]
	struct StubBroker {
		state: Mutex<StubBrokerState>,
	}

	#[async_trait]
	impl Broker for StubBroker {
		async fn redeem_winning_ticket(
			&self,
			ticket: &SignedTicket,
		) -> Result<B256, BrokerError> {
			let mut state = self.state.lock().unwrap();
			if let Some(err) = &state.redeem_err {
				return Err(BrokerError::Submission(err.clone()));
			}
			state.redemptions.push(ticket.clone());
			Ok(B256::repeat_byte(0x42))
		}

		async fn check_tx(&self, _tx: B256) -> Result<U256, BrokerError> {
			let state = self.state.lock().unwrap();
			if let Some(err) = &state.check_tx_err {
				return Err(BrokerError::Confirmation(err.clone()));
			}
			Ok(state.redeemed_amount.unwrap_or(U256::from(30u64)))
		}
	}

	struct StubSenderManagerState {
		info: SenderInfo,
		claimed: U256,
		cleared: Vec<Address>,
	}

	struct StubSenderManager {
		state: Mutex<StubSenderManagerState>,
	}

	impl StubSenderManager {
		fn with_reserve(funds_remaining: u64) -> Self {
			Self {
				state: Mutex::new(StubSenderManagerState {
					info: SenderInfo {
						reserve: Reserve {
							funds_remaining: U256::from(funds_remaining),
							claimed_in_current_round: U256::ZERO,
						},
						withdraw_round: 0,
					},
					claimed: U256::ZERO,
					cleared: Vec::new(),
				}),
			}
		}
	}

	#[async_trait]
	impl SenderManager for StubSenderManager {
		async fn get_sender_info(&self, _addr: Address) -> Result<SenderInfo, ManagerError> {
			Ok(self.state.lock().unwrap().info.clone())
		}

		async fn claimed_reserve(
			&self,
			_addr: Address,
			_claimant: Address,
		) -> Result<U256, ManagerError> {
			Ok(self.state.lock().unwrap().claimed)
		}

		async fn clear(&self, addr: Address) {
			self.state.lock().unwrap().cleared.push(addr);
		}
	}

	struct StubTimeManager {
		round: Mutex<u64>,
		pool_size: Mutex<u64>,
		blocks: broadcast::Sender<u64>,
	}

	impl StubTimeManager {
		fn new(pool_size: u64) -> Self {
			let (blocks, _) = broadcast::channel(16);
			Self {
				round: Mutex::new(100),
				pool_size: Mutex::new(pool_size),
				blocks,
			}
		}
	}

	impl TimeManager for StubTimeManager {
		fn last_initialized_round(&self) -> u64 {
			*self.round.lock().unwrap()
		}

		fn transcoder_pool_size(&self) -> u64 {
			*self.pool_size.lock().unwrap()
		}

		fn subscribe_blocks(&self) -> broadcast::Receiver<u64> {
			self.blocks.subscribe()
		}
	}

	struct Harness {
		monitor: SenderMonitor,
		broker: Arc<StubBroker>,
		sender_manager: Arc<StubSenderManager>,
		time_manager: Arc<StubTimeManager>,
		store: Arc<MemoryTicketStore>,
	}

	fn harness(funds_remaining: u64, pool_size: u64) -> Harness {
		let broker = Arc::new(StubBroker::default());
		let sender_manager = Arc::new(StubSenderManager::with_reserve(funds_remaining));
		let time_manager = Arc::new(StubTimeManager::new(pool_size));
		let store = Arc::new(MemoryTicketStore::new());
		let monitor = SenderMonitor::new(
			Address::repeat_byte(0x01),
			broker.clone(),
			sender_manager.clone(),
			time_manager.clone(),
			store.clone(),
			Duration::from_secs(10),
			Duration::from_secs(60),
		);
		Harness {
			monitor,
			broker,
			sender_manager,
			time_manager,
			store,
		}
	}

	async fn settle() {
		// Let spawned tasks observe channel activity
		for _ in 0..20 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_add_float_requires_sufficient_pending() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);

		let err = h.monitor.add_float(sender, U256::from(1u64)).unwrap_err();
		assert!(matches!(err, MonitorError::InsufficientPending));

		h.monitor.sub_float(sender, U256::from(10u64));
		let err = h.monitor.add_float(sender, U256::from(11u64)).unwrap_err();
		assert!(matches!(err, MonitorError::InsufficientPending));

		// The failed attempts left the pending amount untouched
		h.monitor.add_float(sender, U256::from(10u64)).unwrap();
		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(1000u64)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_max_float_subtracts_pending() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);

		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(1000u64)
		);

		h.monitor.sub_float(sender, U256::from(300u64));
		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(700u64)
		);

		// Pending beyond the allocation saturates at zero
		h.monitor.sub_float(sender, U256::from(10_000u64));
		assert_eq!(h.monitor.max_float(sender).await.unwrap(), U256::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn test_reserve_alloc_splits_pool_and_subtracts_claimed() {
		let h = harness(1000, 4);
		let sender = Address::repeat_byte(0x10);

		// (1000 + 0) / 4 - 0
		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(250u64)
		);

		{
			let mut state = h.sender_manager.state.lock().unwrap();
			state.info.reserve.claimed_in_current_round = U256::from(200u64);
			state.claimed = U256::from(100u64);
		}
		// (1000 + 200) / 4 - 100
		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(200u64)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_zero_pool_size_means_zero_max_float() {
		let h = harness(1000, 0);
		let sender = Address::repeat_byte(0x10);
		assert_eq!(h.monitor.max_float(sender).await.unwrap(), U256::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn test_validate_sender_rounds() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);

		// No withdrawal requested
		h.monitor.validate_sender(sender).await.unwrap();

		// Unlocks at the next round: rejected
		h.sender_manager.state.lock().unwrap().info.withdraw_round = 101;
		let err = h.monitor.validate_sender(sender).await.unwrap_err();
		assert!(matches!(err, MonitorError::SenderUnlockSoon(_)));

		// Must strictly exceed lastInitializedRound + 1
		h.sender_manager.state.lock().unwrap().info.withdraw_round = 102;
		h.monitor.validate_sender(sender).await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn test_happy_redemption_restores_float_and_drains_store() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);
		h.broker.state.lock().unwrap().redeemed_amount = Some(U256::from(30u64));

		h.monitor.queue_ticket(ticket(sender, 30)).await.unwrap();
		h.time_manager.blocks.send(1).unwrap();
		settle().await;

		let redemptions = h.broker.state.lock().unwrap().redemptions.clone();
		assert_eq!(redemptions.len(), 1);
		assert_eq!(redemptions[0].face_value(), U256::from(30u64));

		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(1000u64)
		);
		assert_eq!(h.store.count(sender).await.unwrap(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_insufficient_max_float_requeues_until_reserve_grows() {
		let h = harness(10, 1);
		let sender = Address::repeat_byte(0x10);

		h.monitor.queue_ticket(ticket(sender, 30)).await.unwrap();
		h.time_manager.blocks.send(1).unwrap();
		settle().await;

		// Not redeemed, still queued, float untouched
		assert!(h.broker.state.lock().unwrap().redemptions.is_empty());
		assert_eq!(h.store.count(sender).await.unwrap(), 1);
		assert_eq!(h.monitor.max_float(sender).await.unwrap(), U256::from(10u64));

		// The reserve grows; a later block lets redemption proceed
		h.sender_manager
			.state
			.lock()
			.unwrap()
			.info
			.reserve
			.funds_remaining = U256::from(1000u64);
		h.time_manager.blocks.send(2).unwrap();
		settle().await;

		assert_eq!(h.broker.state.lock().unwrap().redemptions.len(), 1);
		assert_eq!(h.store.count(sender).await.unwrap(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_zero_max_float_requeues() {
		let h = harness(1000, 0);
		let sender = Address::repeat_byte(0x10);

		h.monitor.queue_ticket(ticket(sender, 30)).await.unwrap();
		h.time_manager.blocks.send(1).unwrap();
		settle().await;

		assert!(h.broker.state.lock().unwrap().redemptions.is_empty());
		assert_eq!(h.store.count(sender).await.unwrap(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_broker_failure_restores_float_without_requeue() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);
		h.broker.state.lock().unwrap().check_tx_err = Some("tx reverted".into());

		h.monitor.queue_ticket(ticket(sender, 30)).await.unwrap();
		h.time_manager.blocks.send(1).unwrap();
		settle().await;

		// Float fully restored, ticket not re-queued
		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(1000u64)
		);
		assert_eq!(h.store.count(sender).await.unwrap(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_partial_redemption_keeps_shortfall_pending() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);
		h.broker.state.lock().unwrap().redeemed_amount = Some(U256::from(20u64));

		h.monitor.queue_ticket(ticket(sender, 30)).await.unwrap();
		h.time_manager.blocks.send(1).unwrap();
		settle().await;

		// 30 went pending, 20 was redeemed and released; 10 stays pending
		assert_eq!(
			h.monitor.max_float(sender).await.unwrap(),
			U256::from(990u64)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_ttl_eviction() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);

		h.monitor.start().await.unwrap();
		h.monitor.queue_ticket(ticket(sender, 30)).await.unwrap();
		assert!(h.monitor.inner.senders.lock().unwrap().contains_key(&sender));

		tokio::time::sleep(Duration::from_secs(75)).await;
		settle().await;

		assert!(!h.monitor.inner.senders.lock().unwrap().contains_key(&sender));
		assert_eq!(h.sender_manager.state.lock().unwrap().cleared, vec![sender]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_access_resets_ttl() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);

		h.monitor.start().await.unwrap();
		h.monitor.sub_float(sender, U256::ZERO);

		// Keep touching the sender before the ttl elapses
		for _ in 0..3 {
			tokio::time::sleep(Duration::from_secs(40)).await;
			h.monitor.sub_float(sender, U256::ZERO);
		}

		assert!(h.monitor.inner.senders.lock().unwrap().contains_key(&sender));
		assert!(h.sender_manager.state.lock().unwrap().cleared.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_start_recovers_persisted_queues() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);

		// A ticket persisted by a previous run
		h.store.append(sender, &ticket(sender, 30)).await.unwrap();

		h.monitor.start().await.unwrap();
		settle().await;
		h.time_manager.blocks.send(1).unwrap();
		settle().await;

		assert_eq!(h.broker.state.lock().unwrap().redemptions.len(), 1);
		assert_eq!(h.store.count(sender).await.unwrap(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stop_halts_consumers() {
		let h = harness(1000, 1);
		let sender = Address::repeat_byte(0x10);

		h.monitor.queue_ticket(ticket(sender, 30)).await.unwrap();
		h.monitor.stop();
		h.monitor.stop(); // idempotent
		settle().await;

		// The watcher may already be gone, so the send can have no receivers
		let _ = h.time_manager.blocks.send(1);
		settle().await;
		assert!(h.broker.state.lock().unwrap().redemptions.is_empty());
	}
}
