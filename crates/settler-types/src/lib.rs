//! Common types for the ticket settlement core.
//!
//! This crate defines the data model shared by every settlement component:
//! probabilistic payment tickets, cached sender state, and the outbound
//! transaction model used by the submission pipeline.

/// Payment ticket and remote sender types.
pub mod ticket;
/// Outbound transaction types and receipt events.
pub mod transaction;
/// Small formatting helpers for logging.
pub mod utils;

pub use ticket::*;
pub use transaction::*;
pub use utils::truncate_id;
