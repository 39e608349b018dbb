//! # Core Tasks
//!
//! Everything the core thread executes: construction, buffer application,
//! teardown and ad-hoc closures.
//!
//! ## Apply Rules
//!
//! | mask              | back object              | tracker                    |
//! |-------------------|--------------------------|----------------------------|
//! | `TRANSFORM` only  | `unpack` + `refresh`     | `updated` (if registered)  |
//! | anything else     | `unpack` + `rebuild`     | `removed`, then `added`    |
//!
//! `ACTIVE` is never transform-only, so an enable/disable toggle always goes
//! through the remove/add pair.

use dyad_core::{CoreError, InitGate};
use tracing::{error, trace, warn};

use crate::core_thread::CoreServices;
use crate::sync::buffer::SyncBuffer;
use crate::sync::object::{BackHandle, BackObject};

/// A unit of work for the core thread.
pub(crate) trait CoreTask: Send {
    fn run(self: Box<Self>, core: &mut CoreServices);
}

/// Builds a back object and opens its gate.
pub(crate) struct ConstructTask<B: BackObject> {
    back: BackHandle<B>,
    desc: Option<B::Desc>,
}

impl<B: BackObject> ConstructTask<B> {
    pub(crate) fn new(back: BackHandle<B>, desc: B::Desc) -> Self {
        Self {
            back,
            desc: Some(desc),
        }
    }
}

impl<B: BackObject> CoreTask for ConstructTask<B> {
    fn run(mut self: Box<Self>, core: &mut CoreServices) {
        let Some(desc) = self.desc.take() else {
            return;
        };
        let id = self.back.id();
        let result = {
            let _unwind = FailOnUnwind {
                gate: self.back.gate(),
                kind: B::KIND,
            };
            B::construct(desc, core)
        };
        match result {
            Ok(object) => {
                let active = object.is_active();
                self.back.install(object);
                if active {
                    core.tracker().added(id);
                    self.back.set_tracked(true);
                }
                core.counters().record_constructed();
                trace!(kind = B::KIND, %id, active, "back object constructed");
                self.back.gate().complete();
            }
            Err(err) => {
                error!(kind = B::KIND, %id, error = %err, "back object construction failed");
                core.counters().record_construction_failure();
                self.back.gate().fail(CoreError::ConstructionFailed {
                    kind: B::KIND,
                    reason: err.to_string(),
                });
            }
        }
    }
}

impl<B: BackObject> Drop for ConstructTask<B> {
    fn drop(&mut self) {
        // Never ran: the core thread is gone. Waiters must not hang.
        if self.desc.is_some() {
            self.back.gate().fail(CoreError::CoreUnavailable);
        }
    }
}

/// Fails the gate if `construct` unwinds, so waiters never hang.
struct FailOnUnwind<'a> {
    gate: &'a InitGate,
    kind: &'static str,
}

impl Drop for FailOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.gate.fail(CoreError::ConstructionFailed {
                kind: self.kind,
                reason: "construction panicked".to_string(),
            });
        }
    }
}

/// Applies one sync buffer to a back object.
pub(crate) struct ApplyTask<B: BackObject> {
    back: BackHandle<B>,
    buffer: SyncBuffer<B::Record>,
}

impl<B: BackObject> ApplyTask<B> {
    pub(crate) fn new(back: BackHandle<B>, buffer: SyncBuffer<B::Record>) -> Self {
        Self { back, buffer }
    }
}

impl<B: BackObject> CoreTask for ApplyTask<B> {
    fn run(self: Box<Self>, core: &mut CoreServices) {
        let Self { back, buffer } = *self;
        let id = back.id();
        assert!(
            !back.is_torn_down(),
            "sync buffer for {} {id} applied after its teardown",
            B::KIND
        );
        if !back.is_constructed() {
            warn!(kind = B::KIND, %id, "dropping sync buffer for a back object that failed to construct");
            core.counters().record_dropped();
            return;
        }

        let (mask, cycle, record) = buffer.into_parts();
        trace!(kind = B::KIND, %id, ?mask, cycle, "applying sync buffer");

        back.write(|object| {
            object.unpack(mask, record);

            if mask.is_transform_only() {
                if let Err(err) = object.refresh(core) {
                    error!(kind = B::KIND, %id, error = %err, "lightweight update failed");
                }
                if back.is_tracked() {
                    core.tracker().updated(id);
                }
                core.counters().record_lightweight();
                return;
            }

            if back.take_tracked() {
                core.tracker().removed(id);
            }
            match object.rebuild(core) {
                Ok(()) => {
                    if object.is_active() {
                        core.tracker().added(id);
                        back.set_tracked(true);
                    }
                }
                Err(err) => {
                    error!(kind = B::KIND, %id, error = %err, "structural rebuild failed");
                }
            }
            core.counters().record_rebuild();
        });
    }
}

/// Last command for a back object.
pub(crate) struct TeardownTask<B: BackObject> {
    back: BackHandle<B>,
}

impl<B: BackObject> TeardownTask<B> {
    pub(crate) fn new(back: BackHandle<B>) -> Self {
        Self { back }
    }
}

impl<B: BackObject> CoreTask for TeardownTask<B> {
    fn run(self: Box<Self>, core: &mut CoreServices) {
        let id = self.back.id();
        self.back.mark_torn_down();
        if self.back.take_tracked() {
            core.tracker().removed(id);
        }
        self.back.write(|object| object.teardown(core));
        core.counters().record_teardown();
        trace!(
            kind = B::KIND,
            %id,
            handles = self.back.strong_count(),
            "back object torn down"
        );
    }
}

/// Runs a closure on the core thread.
pub(crate) struct FnTask<F>(pub(crate) F);

impl<F> CoreTask for FnTask<F>
where
    F: FnOnce(&mut CoreServices) + Send,
{
    fn run(self: Box<Self>, core: &mut CoreServices) {
        (self.0)(core);
    }
}
