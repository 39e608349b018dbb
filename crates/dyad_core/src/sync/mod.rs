//! # Synchronization Primitives for the Front/Back Split
//!
//! ## The Problem
//!
//! ```text
//! Simulation thread:  WRITES front objects, never touches GPU state
//! Core thread:        OWNS back objects, applies what the simulation sent
//!
//! Back object read before it exists:   GARBAGE HANDLE
//! Lock held across construction:       SIMULATION STALLS ON THE GPU
//! ```
//!
//! ## The Solution
//!
//! - [`InitGate`]: one-shot handshake, the only place the simulation blocks
//! - [`SpinLock`] + [`property_snapshot`]: whole-block copies for tiny,
//!   core-owned property blocks
//! - [`thread_role`]: who is allowed to touch back objects

mod gate;
mod snapshot;
mod spin;
pub mod thread_role;

pub use gate::InitGate;
pub use snapshot::{property_snapshot, SnapshotPublisher, SnapshotView};
pub use spin::{SpinGuard, SpinLock};
pub use thread_role::{assert_core_thread, enter_core_role, is_core_thread, CoreRoleGuard};
