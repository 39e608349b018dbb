//! # Initialization Gate
//!
//! One-shot construction handshake between the simulation thread and the
//! core thread.
//!
//! ```text
//! Simulation:  create_back() ──submit──►  Core:  construct()
//!                   │                                │
//!            block_until_ready() ◄──── complete() / fail(err)
//! ```
//!
//! The gate never reopens. Waiting after completion is a single atomic load.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::sync::thread_role::is_core_thread;

const PENDING: u8 = 0;
const READY: u8 = 1;
const FAILED: u8 = 2;

enum GateState {
    Pending,
    Ready,
    Failed(CoreError),
}

struct GateInner {
    /// Fast-path mirror of `state`.
    flag: AtomicU8,
    state: Mutex<GateState>,
    condvar: Condvar,
}

/// One-shot asynchronous construction handshake.
///
/// Cloning is cheap; all clones observe the same gate.
///
/// ## Usage
///
/// ```rust,ignore
/// let gate = InitGate::new();
/// let core_side = gate.clone();
/// core_sender.send(move || core_side.complete())?;
///
/// gate.block_until_ready(); // returns once the core thread ran the closure
/// ```
#[derive(Clone)]
pub struct InitGate {
    inner: Arc<GateInner>,
}

impl InitGate {
    /// Creates a pending gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                flag: AtomicU8::new(PENDING),
                state: Mutex::new(GateState::Pending),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Creates a gate that is already open.
    #[must_use]
    pub fn ready() -> Self {
        let gate = Self::new();
        gate.complete();
        gate
    }

    /// Opens the gate. Called once, by the core thread, after construction.
    ///
    /// Completing a gate that already resolved is ignored.
    pub fn complete(&self) {
        self.resolve(GateState::Ready, READY);
    }

    /// Resolves the gate with a construction failure.
    ///
    /// Waiters observe the error; the gate stays failed forever.
    pub fn fail(&self, error: CoreError) {
        self.resolve(GateState::Failed(error), FAILED);
    }

    fn resolve(&self, outcome: GateState, flag: u8) {
        let mut state = self.inner.state.lock();
        if !matches!(*state, GateState::Pending) {
            tracing::warn!("init gate resolved twice; keeping the first outcome");
            return;
        }
        *state = outcome;
        self.inner.flag.store(flag, Ordering::Release);
        drop(state);
        self.inner.condvar.notify_all();
    }

    /// Returns true once construction completed successfully.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire) == READY
    }

    /// Returns true if construction failed.
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire) == FAILED
    }

    /// Returns true while construction has not resolved yet.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire) == PENDING
    }

    /// Waits until construction resolves.
    ///
    /// # Errors
    ///
    /// - the construction error if the core thread failed to build the object
    /// - [`CoreError::WrongThread`] if called on the core thread while still
    ///   pending (the core thread would wait on itself)
    pub fn wait(&self) -> CoreResult<()> {
        if self.is_ready() {
            return Ok(());
        }
        let mut state = self.inner.state.lock();
        loop {
            match &*state {
                GateState::Ready => return Ok(()),
                GateState::Failed(err) => return Err(err.clone()),
                GateState::Pending => {
                    if is_core_thread() {
                        return Err(CoreError::WrongThread {
                            operation: "block_until_ready before construction",
                        });
                    }
                    self.inner.condvar.wait(&mut state);
                }
            }
        }
    }

    /// Waits with a timeout. Returns `None` if still pending when it expires.
    ///
    /// # Errors
    ///
    /// Same as [`InitGate::wait`].
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CoreResult<()>> {
        if self.is_ready() {
            return Some(Ok(()));
        }
        let mut state = self.inner.state.lock();
        if matches!(*state, GateState::Pending) {
            if is_core_thread() {
                return Some(Err(CoreError::WrongThread {
                    operation: "block_until_ready before construction",
                }));
            }
            self.inner.condvar.wait_for(&mut state, timeout);
        }
        match &*state {
            GateState::Pending => None,
            GateState::Ready => Some(Ok(())),
            GateState::Failed(err) => Some(Err(err.clone())),
        }
    }

    /// Blocks until the back object exists.
    ///
    /// Idempotent and safe from any number of callers. Short-circuits on the
    /// core thread once construction is done.
    ///
    /// # Panics
    ///
    /// Construction failures and core-thread waits before construction are
    /// fatal.
    #[track_caller]
    pub fn block_until_ready(&self) {
        if let Err(err) = self.wait() {
            panic!("init gate: {err}");
        }
    }
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InitGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.flag.load(Ordering::Acquire) {
            READY => "ready",
            FAILED => "failed",
            _ => "pending",
        };
        f.debug_struct("InitGate").field("state", &state).finish()
    }
}
