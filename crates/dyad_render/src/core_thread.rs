//! # Core Thread
//!
//! The one long-lived context that owns back objects. It receives commands
//! in FIFO order and runs each to completion:
//!
//! ```text
//! ┌──────────────┐  Construct / Sync(batch) / Execute / Fence / Shutdown
//! │  Simulation  │ ───────────────────────────────────────────────┐
//! └──────────────┘                                                ▼
//!                                                     ┌────────────────────┐
//!                                                     │ core loop          │
//!                                                     │  run task          │
//!                                                     │  recycle batch ──► │ BatchArena
//!                                                     └────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use dyad_core::{enter_core_role, BatchArena};
use tracing::{debug, info};

use crate::backend::GpuBackend;
use crate::error::{RenderError, RenderResult};
use crate::state::RenderStateCache;
use crate::sync::tasks::CoreTask;
use crate::tracker::RenderTracker;

pub(crate) type TaskBatch = Vec<Box<dyn CoreTask>>;

pub(crate) enum CoreCommand {
    /// Back object construction.
    Construct(Box<dyn CoreTask>),
    /// Everything one drain produced, teardowns last.
    Sync(TaskBatch),
    /// Closure submitted through `SyncContext::execute`.
    Execute(Box<dyn CoreTask>),
    /// Acknowledged once every earlier command ran.
    Fence(Sender<()>),
    /// Stop after the commands already queued ahead of it.
    Shutdown,
}

/// Apply counters shared between the core thread and the context.
#[derive(Debug, Default)]
pub(crate) struct CoreCounters {
    constructed: AtomicU64,
    construction_failures: AtomicU64,
    buffers_applied: AtomicU64,
    buffers_dropped: AtomicU64,
    lightweight_updates: AtomicU64,
    structural_rebuilds: AtomicU64,
    teardowns: AtomicU64,
    batches: AtomicU64,
}

impl CoreCounters {
    pub(crate) fn record_constructed(&self) {
        self.constructed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_construction_failure(&self) {
        self.construction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.buffers_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lightweight(&self) {
        self.buffers_applied.fetch_add(1, Ordering::Relaxed);
        self.lightweight_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebuild(&self) {
        self.buffers_applied.fetch_add(1, Ordering::Relaxed);
        self.structural_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
    }

    fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CoreStats {
        CoreStats {
            constructed: self.constructed.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            buffers_applied: self.buffers_applied.load(Ordering::Relaxed),
            buffers_dropped: self.buffers_dropped.load(Ordering::Relaxed),
            lightweight_updates: self.lightweight_updates.load(Ordering::Relaxed),
            structural_rebuilds: self.structural_rebuilds.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

/// What the core thread has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStats {
    /// Back objects constructed.
    pub constructed: u64,
    /// Constructions that failed.
    pub construction_failures: u64,
    /// Sync buffers applied.
    pub buffers_applied: u64,
    /// Sync buffers dropped because their back never constructed.
    pub buffers_dropped: u64,
    /// Buffers applied as lightweight updates.
    pub lightweight_updates: u64,
    /// Buffers applied as structural rebuilds.
    pub structural_rebuilds: u64,
    /// Teardowns run.
    pub teardowns: u64,
    /// Sync batches received.
    pub batches: u64,
}

/// Services available to back objects on the core thread.
pub struct CoreServices {
    backend: Arc<dyn GpuBackend>,
    states: Arc<RenderStateCache>,
    tracker: Box<dyn RenderTracker>,
    counters: Arc<CoreCounters>,
}

impl CoreServices {
    /// GPU backend.
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Immutable state caches.
    #[inline]
    #[must_use]
    pub fn states(&self) -> &RenderStateCache {
        &self.states
    }

    /// The render object index.
    #[inline]
    pub fn tracker(&mut self) -> &mut dyn RenderTracker {
        &mut *self.tracker
    }

    #[inline]
    pub(crate) fn counters(&self) -> &CoreCounters {
        &self.counters
    }
}

pub(crate) struct CoreThread {
    pub(crate) commands: Sender<CoreCommand>,
    pub(crate) handle: JoinHandle<()>,
}

/// Starts the core thread.
pub(crate) fn spawn(
    name: &str,
    queue_capacity: usize,
    backend: Arc<dyn GpuBackend>,
    states: Arc<RenderStateCache>,
    tracker: Box<dyn RenderTracker>,
    counters: Arc<CoreCounters>,
    arena: Arc<BatchArena<Box<dyn CoreTask>>>,
) -> RenderResult<CoreThread> {
    let (commands, receiver) = if queue_capacity == 0 {
        crossbeam_channel::unbounded()
    } else {
        crossbeam_channel::bounded(queue_capacity)
    };
    let services = CoreServices {
        backend,
        states,
        tracker,
        counters,
    };
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run(&receiver, services, &arena))
        .map_err(|err| RenderError::CoreThreadSpawn(err.to_string()))?;
    Ok(CoreThread { commands, handle })
}

fn run(
    receiver: &Receiver<CoreCommand>,
    mut services: CoreServices,
    arena: &BatchArena<Box<dyn CoreTask>>,
) {
    let _role = enter_core_role();
    info!(backend = services.backend.name(), "core thread started");

    while let Ok(command) = receiver.recv() {
        match command {
            CoreCommand::Construct(task) | CoreCommand::Execute(task) => task.run(&mut services),
            CoreCommand::Sync(mut batch) => {
                let commands = batch.len();
                for task in batch.drain(..) {
                    task.run(&mut services);
                }
                services.counters.record_batch();
                arena.recycle(batch);
                debug!(commands, "sync batch applied");
            }
            CoreCommand::Fence(ack) => {
                // The waiter may have given up; nothing to do then.
                let _ = ack.send(());
            }
            CoreCommand::Shutdown => break,
        }
    }

    // Whatever is still queued never runs. Pending constructions fail their
    // gates as they are dropped here.
    let abandoned = receiver.try_iter().count();
    if abandoned > 0 {
        debug!(abandoned, "commands discarded at shutdown");
    }

    let stats = services.counters.snapshot();
    info!(
        constructed = stats.constructed,
        buffers_applied = stats.buffers_applied,
        teardowns = stats.teardowns,
        "core thread stopped"
    );
}
