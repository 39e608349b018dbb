//! # DYAD Core
//!
//! Thread handshake primitives behind the front/back object split:
//! - A simulation thread owns *front* objects and never blocks on the GPU
//! - A core thread owns *back* objects and applies what the simulation sent
//!
//! ## Architecture Rules
//!
//! 1. **One blocking point** - the simulation only waits at an [`InitGate`]
//! 2. **No lock across construction** - locks guard map/registry mutations only
//! 3. **Bounded ids stay bounded** - exhaustion is fatal, never a wrap-around
//!
//! ## Example
//!
//! ```rust,ignore
//! use dyad_core::{InitGate, property_snapshot};
//!
//! let gate = InitGate::new();
//! // hand a clone to the core thread, which calls `complete()`
//! gate.block_until_ready();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod ids;
pub mod memory;
pub mod sync;

pub use error::{CoreError, CoreResult};
pub use ids::{BoundedCounter, BoundedId};
pub use memory::{ArenaStats, BatchArena, SlotHandle, SlotPool};
pub use sync::{
    assert_core_thread, enter_core_role, is_core_thread, property_snapshot, CoreRoleGuard,
    InitGate, SnapshotPublisher, SnapshotView, SpinLock,
};
