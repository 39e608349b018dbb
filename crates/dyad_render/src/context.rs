//! # Sync Context
//!
//! The explicit service object behind every front object: dirty registry,
//! command queue, batch arena, state caches and the core thread itself.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let ctx = SyncContext::start_headless(SyncConfig::default())?;
//!
//! let mesh = Mesh::new(&ctx, MeshData::quad(1.0));
//! mesh.create_back();
//!
//! loop {
//!     simulate(&mesh);
//!     ctx.drain();          // once per frame, fire-and-forget
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use dyad_core::{is_core_thread, BatchArena, CoreError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::{GpuBackend, HeadlessBackend};
use crate::config::SyncConfig;
use crate::core_thread::{self, CoreCommand, CoreCounters, CoreServices, CoreStats};
use crate::error::{RenderError, RenderResult};
use crate::state::RenderStateCache;
use crate::sync::dirty::{DirtyRegistry, DrainReport};
use crate::sync::tasks::{CoreTask, FnTask};
use crate::sync::ObjectId;
use crate::tracker::{ObjectIndex, RenderTracker};

struct ContextShared {
    config: SyncConfig,
    registry: DirtyRegistry,
    commands: Sender<CoreCommand>,
    arena: Arc<BatchArena<Box<dyn CoreTask>>>,
    states: Arc<RenderStateCache>,
    backend: Arc<dyn GpuBackend>,
    counters: Arc<CoreCounters>,
    next_object_id: AtomicU64,
    core: Mutex<Option<JoinHandle<()>>>,
}

impl ContextShared {
    fn send(&self, command: CoreCommand) -> bool {
        // The core thread reads this queue; it must never wait on it.
        if is_core_thread() {
            if self.commands.try_send(command).is_err() {
                warn!("command queue full or closed on the core thread; command dropped");
                return false;
            }
            return true;
        }
        if self.commands.send(command).is_err() {
            warn!("core thread is gone; command dropped");
            return false;
        }
        true
    }

    fn drain(&self) -> DrainReport {
        let mut batch = self.arena.take();
        let report = self.registry.drain(&mut batch);
        if batch.is_empty() {
            self.arena.recycle(batch);
        } else {
            self.send(CoreCommand::Sync(batch));
        }
        debug!(
            cycle = report.cycle,
            visited = report.objects_visited,
            buffers = report.buffers_built,
            teardowns = report.teardowns,
            "drained dirty registry"
        );
        report
    }

    fn shutdown(&self) {
        let Some(handle) = self.core.lock().take() else {
            return;
        };
        self.drain();
        self.send(CoreCommand::Shutdown);
        if is_core_thread() {
            // Dropped from a core task. The loop exits on Shutdown, or once
            // the queue disconnects if Shutdown did not fit.
            return;
        }
        if handle.join().is_err() {
            error!("core thread panicked");
        }
    }
}

impl Drop for ContextShared {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to the sync services. Cheap to clone.
///
/// The core thread stops when the context is shut down or the last handle,
/// including those held by front objects, is dropped.
#[derive(Clone)]
pub struct SyncContext(Arc<ContextShared>);

impl SyncContext {
    /// Starts the core thread.
    ///
    /// # Errors
    ///
    /// Invalid configuration or a failed thread spawn.
    pub fn start(
        config: SyncConfig,
        backend: Arc<dyn GpuBackend>,
        tracker: Box<dyn RenderTracker>,
    ) -> RenderResult<Self> {
        config.validate()?;

        let states = Arc::new(RenderStateCache::new(
            Arc::clone(&backend),
            &config.state_id_bits,
        ));
        let arena = Arc::new(BatchArena::new(
            config.batch_capacity,
            config.retained_batches,
        ));
        let counters = Arc::new(CoreCounters::default());
        let core = core_thread::spawn(
            &config.core_thread_name,
            config.queue_capacity,
            Arc::clone(&backend),
            Arc::clone(&states),
            tracker,
            Arc::clone(&counters),
            Arc::clone(&arena),
        )?;
        info!(
            thread = %config.core_thread_name,
            backend = backend.name(),
            queue_capacity = config.queue_capacity,
            "sync context started"
        );

        Ok(Self(Arc::new(ContextShared {
            config,
            registry: DirtyRegistry::default(),
            commands: core.commands,
            arena,
            states,
            backend,
            counters,
            next_object_id: AtomicU64::new(1),
            core: Mutex::new(Some(core.handle)),
        })))
    }

    /// Starts a context on a [`HeadlessBackend`] with an [`ObjectIndex`].
    ///
    /// # Errors
    ///
    /// See [`SyncContext::start`].
    pub fn start_headless(config: SyncConfig) -> RenderResult<Self> {
        let backend = Arc::new(HeadlessBackend::new(config.headless_memory_budget));
        Self::start(config, backend, Box::new(ObjectIndex::new()))
    }

    /// Synchronization point: sends one buffer per dirty object, then every
    /// queued teardown. Never blocks on the core thread.
    pub fn drain(&self) -> DrainReport {
        self.0.drain()
    }

    /// Blocks until the core thread ran everything sent so far.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WrongThread`] on the core thread
    /// - [`CoreError::CoreUnavailable`] if the core thread is gone
    pub fn flush(&self) -> RenderResult<()> {
        if is_core_thread() {
            return Err(CoreError::WrongThread { operation: "flush" }.into());
        }
        let (ack, done) = crossbeam_channel::bounded(1);
        if !self.0.send(CoreCommand::Fence(ack)) {
            return Err(CoreError::CoreUnavailable.into());
        }
        done.recv().map_err(|_| RenderError::from(CoreError::CoreUnavailable))
    }

    /// [`drain`](Self::drain) followed by [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// See [`SyncContext::flush`].
    pub fn sync(&self) -> RenderResult<DrainReport> {
        let report = self.drain();
        self.flush()?;
        Ok(report)
    }

    /// Runs `f` on the core thread, after everything sent before it.
    ///
    /// Platform glue uses this to drive core-side changes such as window
    /// resizes.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce(&mut CoreServices) + Send + 'static,
    {
        self.0.send(CoreCommand::Execute(Box::new(FnTask(f))));
    }

    /// Stops the core thread after a final drain. Idempotent.
    ///
    /// Front objects outliving this call keep working on the simulation
    /// side; their constructions fail with [`CoreError::CoreUnavailable`].
    pub fn shutdown(&self) {
        self.0.shutdown();
    }

    /// Objects registered for the next drain.
    #[must_use]
    pub fn pending_objects(&self) -> usize {
        self.0.registry.registered()
    }

    /// Immutable state caches.
    #[must_use]
    pub fn states(&self) -> &Arc<RenderStateCache> {
        &self.0.states
    }

    /// GPU backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.0.backend
    }

    /// Core thread counters.
    #[must_use]
    pub fn core_stats(&self) -> CoreStats {
        self.0.counters.snapshot()
    }

    /// Batch storage reuse counters.
    #[must_use]
    pub fn arena_stats(&self) -> dyad_core::ArenaStats {
        self.0.arena.stats()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.0.config
    }

    pub(crate) fn registry(&self) -> &DirtyRegistry {
        &self.0.registry
    }

    pub(crate) fn next_object_id(&self) -> ObjectId {
        ObjectId::new(self.0.next_object_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Sends a construction immediately, ahead of the next drain.
    pub(crate) fn submit_construct(&self, task: Box<dyn CoreTask>) {
        // On failure the task is dropped here and fails its gate.
        self.0.send(CoreCommand::Construct(task));
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("core_thread", &self.0.config.core_thread_name)
            .field("backend", &self.0.backend.name())
            .field("pending_objects", &self.pending_objects())
            .finish()
    }
}
