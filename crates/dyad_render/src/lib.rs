//! # DYAD Render Sync
//!
//! Keeps simulation-owned *front* objects consistent with core-thread-owned
//! *back* objects, and deduplicates the immutable GPU states back objects
//! depend on.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────── SIMULATION ─────────────────────────────┐
//! │  Mesh / Material / Renderable / RenderWindow  (Front<F>)             │
//! │        │ setters: modify(mask) → dirty registry                      │
//! │        ▼                                                             │
//! │  SyncContext::drain()  ── one SyncBuffer per dirty object ──┐        │
//! └─────────────────────────────────────────────────────────────┼────────┘
//!                                                               ▼
//! ┌─────────────────────────────── CORE ─────────────────────────────────┐
//! │  apply: TRANSFORM → refresh + updated                                │
//! │         other     → removed, rebuild, added                          │
//! │  RenderStateCache: sampler / rasterizer / blend / depth / pipeline   │
//! │  GpuBackend (HeadlessBackend)       RenderTracker (ObjectIndex)      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **Fire-and-forget** - drain, build and apply never block the
//!    simulation; only `block_until_ready()` and `flush()` do
//! 2. **One back per front** - created once, never replaced
//! 3. **Teardown last** - a back is released only after every buffer that
//!    mentions it was applied

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod config;
pub mod context;
pub mod core_thread;
pub mod error;
pub mod objects;
pub mod state;
pub mod sync;
pub mod tracker;

pub use backend::{
    BufferUsage, GpuBackend, GpuResource, HeadlessBackend, HeadlessStats, ResourceId,
    StateCategory,
};
pub use config::{StateIdBits, SyncConfig};
pub use context::SyncContext;
pub use core_thread::{CoreServices, CoreStats};
pub use error::{RenderError, RenderResult};
pub use objects::{
    Material, MaterialBack, MaterialDesc, Mesh, MeshBack, MeshData, RenderWindow, Renderable,
    RenderableBack, WindowBack, WindowProperties, WindowSettings,
};
pub use state::{PipelineState, RenderStateCache, SortKey, StateCache, StateId};
pub use sync::{
    BackHandle, BackObject, DirtyMask, DrainReport, Front, FrontObject, ObjectId, SyncBuffer,
};
pub use tracker::{ObjectIndex, RecordingTracker, RenderTracker, TrackerEvent, TrackerLog};
