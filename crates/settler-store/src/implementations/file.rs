//! File-based ticket store implementation.
//!
//! Each sender's queue is a JSON file named after the sender's address.
//! Writes go to a temp file followed by an atomic rename, so a crash leaves
//! either the old queue or the new one, never a torn file. Read-modify-write
//! cycles are serialized by an internal lock.

use crate::{StoreError, TicketStore};
use alloy_primitives::{hex, Address};
use async_trait::async_trait;
use settler_types::SignedTicket;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// File-backed ticket store.
pub struct FileTicketStore {
	/// Base directory holding one queue file per sender.
	base_path: PathBuf,
	/// Serializes read-modify-write cycles across queue files.
	write_lock: Mutex<()>,
}

impl FileTicketStore {
	/// Creates a new FileTicketStore rooted at the given directory.
	pub fn new(base_path: impl Into<PathBuf>) -> Self {
		Self {
			base_path: base_path.into(),
			write_lock: Mutex::new(()),
		}
	}

	fn queue_path(&self, sender: Address) -> PathBuf {
		self.base_path.join(format!("{}.json", hex::encode(sender)))
	}

	async fn read_queue(&self, path: &Path) -> Result<Vec<SignedTicket>, StoreError> {
		let data = match fs::read(path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StoreError::Backend(e.to_string())),
		};
		serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))
	}

	async fn write_queue(&self, path: &Path, queue: &[SignedTicket]) -> Result<(), StoreError> {
		if queue.is_empty() {
			match fs::remove_file(path).await {
				Ok(()) => return Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
				Err(e) => return Err(StoreError::Backend(e.to_string())),
			}
		}

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StoreError::Backend(e.to_string()))?;
		}

		let bytes =
			serde_json::to_vec(queue).map_err(|e| StoreError::Serialization(e.to_string()))?;

		// Write atomically by writing to a temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, bytes)
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?;
		fs::rename(&temp_path, path)
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))
	}
}

#[async_trait]
impl TicketStore for FileTicketStore {
	async fn append(&self, sender: Address, ticket: &SignedTicket) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock().await;
		let path = self.queue_path(sender);
		let mut queue = self.read_queue(&path).await?;
		queue.push(ticket.clone());
		self.write_queue(&path, &queue).await
	}

	async fn head(&self, sender: Address) -> Result<Option<SignedTicket>, StoreError> {
		let queue = self.read_queue(&self.queue_path(sender)).await?;
		Ok(queue.into_iter().next())
	}

	async fn pop(&self, sender: Address) -> Result<Option<SignedTicket>, StoreError> {
		let _guard = self.write_lock.lock().await;
		let path = self.queue_path(sender);
		let mut queue = self.read_queue(&path).await?;
		if queue.is_empty() {
			return Ok(None);
		}
		let popped = queue.remove(0);
		self.write_queue(&path, &queue).await?;
		Ok(Some(popped))
	}

	async fn count(&self, sender: Address) -> Result<usize, StoreError> {
		Ok(self.read_queue(&self.queue_path(sender)).await?.len())
	}

	async fn senders(&self) -> Result<Vec<Address>, StoreError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StoreError::Backend(e.to_string())),
		};

		let mut senders = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?
		{
			let name = entry.file_name();
			let name = name.to_string_lossy();
			let Some(stem) = name.strip_suffix(".json") else {
				continue;
			};
			match stem.parse::<Address>() {
				Ok(sender) => senders.push(sender),
				Err(e) => {
					tracing::debug!(file = %name, error = %e, "Skipping non-queue file");
				}
			}
		}
		Ok(senders)
	}
}
