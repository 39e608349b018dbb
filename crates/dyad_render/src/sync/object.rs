//! # Back Objects
//!
//! The core-thread half of a front/back pair. A back object is built once
//! from a construction descriptor, then only ever changed by applied sync
//! buffers. It holds no reference to its front.
//!
//! [`BackHandle`] is the shared reference to a back slot. The front holds one,
//! every in-flight buffer that mentions the object holds one, and other back
//! objects may hold one. The slot is released when the last of them goes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use dyad_core::{assert_core_thread, InitGate};
use parking_lot::RwLock;

use crate::core_thread::CoreServices;
use crate::error::RenderResult;
use crate::sync::dirty::DirtyMask;

/// Identity of a front/back pair, unique within a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Core-thread half of a front/back pair.
///
/// Every method runs on the core thread.
pub trait BackObject: Sized + Send + Sync + 'static {
    /// One-time construction descriptor, captured by `create_back()`.
    type Desc: Send + 'static;
    /// Sync record produced by the front at drain time.
    type Record: Send + 'static;
    /// Class name used in logs and errors.
    const KIND: &'static str;

    /// Builds the back object.
    ///
    /// # Errors
    ///
    /// Resource exhaustion; reported at the front's first readiness wait.
    fn construct(desc: Self::Desc, core: &mut CoreServices) -> RenderResult<Self>;

    /// Moves the record fields into the object, in record order.
    fn unpack(&mut self, mask: DirtyMask, record: Self::Record);

    /// Lightweight update after a transform-only buffer.
    ///
    /// # Errors
    ///
    /// Backend failures; logged by the applier.
    fn refresh(&mut self, _core: &mut CoreServices) -> RenderResult<()> {
        Ok(())
    }

    /// Recreates dependent GPU resources after any richer change.
    ///
    /// # Errors
    ///
    /// Backend failures; the object stays out of the render index.
    fn rebuild(&mut self, core: &mut CoreServices) -> RenderResult<()>;

    /// True if the object belongs in the render index.
    fn is_active(&self) -> bool {
        false
    }

    /// Last command for the object, queued when its front is destroyed.
    fn teardown(&mut self, _core: &mut CoreServices) {}
}

pub(crate) struct BackSlot<B> {
    id: ObjectId,
    gate: InitGate,
    object: OnceLock<RwLock<B>>,
    /// Registered with the render tracker.
    tracked: AtomicBool,
    torn_down: AtomicBool,
}

/// Shared reference to a back object slot.
pub struct BackHandle<B: BackObject>(Arc<BackSlot<B>>);

impl<B: BackObject> Clone for BackHandle<B> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<B: BackObject> BackHandle<B> {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self(Arc::new(BackSlot {
            id,
            gate: InitGate::new(),
            object: OnceLock::new(),
            tracked: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        }))
    }

    /// Pair identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Construction gate of the slot.
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &InitGate {
        &self.0.gate
    }

    /// True once construction succeeded.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.gate.is_ready()
    }

    /// Blocks until the back object exists.
    ///
    /// # Panics
    ///
    /// On construction failure, or on the core thread before construction.
    #[track_caller]
    pub fn block_until_ready(&self) {
        self.0.gate.block_until_ready();
    }

    /// Reads the back object, waiting for construction first.
    ///
    /// # Panics
    ///
    /// Same as [`BackHandle::block_until_ready`].
    #[track_caller]
    pub fn read<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        self.block_until_ready();
        let Some(object) = self.0.object.get() else {
            panic!("{} {} opened its gate without an object", B::KIND, self.0.id);
        };
        f(&object.read())
    }

    /// Reads the back object if it was constructed. Never blocks on the gate.
    pub fn try_read<R>(&self, f: impl FnOnce(&B) -> R) -> Option<R> {
        self.0.object.get().map(|object| f(&object.read()))
    }

    /// Mutates the back object. Core thread only.
    ///
    /// Returns `None` if the object was never constructed.
    ///
    /// # Panics
    ///
    /// Called from any other thread.
    #[track_caller]
    pub fn write<R>(&self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        assert_core_thread("back object mutation");
        self.0.object.get().map(|object| f(&mut object.write()))
    }

    /// True once the teardown ran.
    #[inline]
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.0.torn_down.load(Ordering::Acquire)
    }

    /// True while the object is registered with the render tracker.
    #[inline]
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.0.tracked.load(Ordering::Acquire)
    }

    /// True if both handles point at the same slot.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this slot.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub(crate) fn is_constructed(&self) -> bool {
        self.0.object.get().is_some()
    }

    /// Stores the constructed object. Core thread only, once.
    pub(crate) fn install(&self, object: B) {
        assert_core_thread("back object construction");
        if self.0.object.set(RwLock::new(object)).is_err() {
            panic!("{} {} constructed twice", B::KIND, self.0.id);
        }
    }

    pub(crate) fn set_tracked(&self, tracked: bool) {
        self.0.tracked.store(tracked, Ordering::Release);
    }

    pub(crate) fn take_tracked(&self) -> bool {
        self.0.tracked.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn mark_torn_down(&self) {
        self.0.torn_down.store(true, Ordering::Release);
    }
}

impl<B: BackObject> std::fmt::Debug for BackHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackHandle")
            .field("kind", &B::KIND)
            .field("id", &self.0.id)
            .field("gate", &self.0.gate)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}
