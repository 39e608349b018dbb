//! # Memory Management
//!
//! Recycled storage for the sync path.
//!
//! ## Design Philosophy
//!
//! Sync batches are throwaway per cycle. Their storage is not:
//! - Batch vectors travel simulation → core → back into the arena
//! - Long-lived registrations live in a slot pool with stable handles

mod arena;
mod pool;

pub use arena::{ArenaStats, BatchArena};
pub use pool::{SlotHandle, SlotPool};
