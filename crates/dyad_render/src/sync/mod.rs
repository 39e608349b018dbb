//! # Front/Back Synchronization
//!
//! ```text
//!   Simulation thread                                   Core thread
//!  ┌────────────────────┐   drain()   ┌──────────┐   ┌────────────────────┐
//!  │ Front<F>           │────────────►│  queue   │──►│ ApplyTask          │
//!  │  state, dirty mask │ SyncBuffer  │ (FIFO)   │   │  unpack → refresh  │
//!  │  BackHandle ───────┼─────────────┼──────────┼──►│        or rebuild  │
//!  └────────────────────┘             └──────────┘   └────────────────────┘
//! ```
//!
//! - [`dirty`] - dirty mask and registry
//! - [`buffer`] - the per-drain sync record
//! - [`object`] - back objects and shared handles
//! - [`front`] - front objects

pub mod buffer;
pub mod dirty;
pub mod front;
pub mod object;
pub(crate) mod tasks;

pub use buffer::SyncBuffer;
pub use dirty::{DirtyMask, DrainReport};
pub use front::{Front, FrontObject};
pub use object::{BackHandle, BackObject, ObjectId};
