//! # Render Tracker
//!
//! Downward notifications from the applier to the renderer's object index.
//! Per object they are always well ordered: `removed` before `added`, never
//! interleaved, and a single `updated` for a lightweight change.

use std::collections::HashMap;
use std::sync::Arc;

use dyad_core::{SlotHandle, SlotPool};
use parking_lot::Mutex;
use tracing::warn;

use crate::sync::ObjectId;

/// Receiver of structural notifications. Lives on the core thread.
pub trait RenderTracker: Send {
    /// The object joined the render index.
    fn added(&mut self, id: ObjectId);
    /// The object left the render index.
    fn removed(&mut self, id: ObjectId);
    /// The object changed without structural work.
    fn updated(&mut self, id: ObjectId);
}

/// Notification counters of an [`ObjectIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// `added` notifications.
    pub added: u64,
    /// `removed` notifications.
    pub removed: u64,
    /// `updated` notifications.
    pub updated: u64,
}

/// The set of objects currently registered for rendering.
pub struct ObjectIndex {
    slots: SlotPool<ObjectId>,
    by_id: HashMap<ObjectId, SlotHandle>,
    stats: IndexStats,
}

impl ObjectIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotPool::with_capacity(256),
            by_id: HashMap::new(),
            stats: IndexStats::default(),
        }
    }

    /// Registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// True if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Registered ids, in slot order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.slots.iter().map(|(_, id)| *id)
    }

    /// Notification counters.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.stats
    }
}

impl Default for ObjectIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTracker for ObjectIndex {
    fn added(&mut self, id: ObjectId) {
        self.stats.added += 1;
        if self.by_id.contains_key(&id) {
            warn!(%id, "object added twice without a removal");
            return;
        }
        let handle = self.slots.insert(id);
        self.by_id.insert(id, handle);
    }

    fn removed(&mut self, id: ObjectId) {
        self.stats.removed += 1;
        match self.by_id.remove(&id) {
            Some(handle) => {
                self.slots.remove(handle);
            }
            None => warn!(%id, "removal of an object that was never added"),
        }
    }

    fn updated(&mut self, id: ObjectId) {
        self.stats.updated += 1;
        if !self.by_id.contains_key(&id) {
            warn!(%id, "update for an object outside the index");
        }
    }
}

/// One tracker notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerEvent {
    /// See [`RenderTracker::added`].
    Added(ObjectId),
    /// See [`RenderTracker::removed`].
    Removed(ObjectId),
    /// See [`RenderTracker::updated`].
    Updated(ObjectId),
}

impl TrackerEvent {
    /// Object the event is about.
    #[must_use]
    pub fn id(self) -> ObjectId {
        match self {
            Self::Added(id) | Self::Removed(id) | Self::Updated(id) => id,
        }
    }
}

#[derive(Default)]
struct LogInner {
    events: Vec<TrackerEvent>,
    index: ObjectIndex,
}

/// Shared view of what a [`RecordingTracker`] has seen.
///
/// Readable from any thread while the tracker itself lives on the core
/// thread.
#[derive(Clone, Default)]
pub struct TrackerLog(Arc<Mutex<LogInner>>);

impl TrackerLog {
    /// Every event so far, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<TrackerEvent> {
        self.0.lock().events.clone()
    }

    /// Events about one object, in delivery order.
    #[must_use]
    pub fn events_for(&self, id: ObjectId) -> Vec<TrackerEvent> {
        self.0
            .lock()
            .events
            .iter()
            .copied()
            .filter(|event| event.id() == id)
            .collect()
    }

    /// True if `id` is currently in the index.
    #[must_use]
    pub fn is_registered(&self, id: ObjectId) -> bool {
        self.0.lock().index.contains(id)
    }

    /// Objects currently in the index.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.0.lock().index.len()
    }

    /// Index notification counters.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.0.lock().index.stats()
    }

    /// Forgets the recorded events. The index is kept.
    pub fn clear(&self) {
        self.0.lock().events.clear();
    }
}

/// An [`ObjectIndex`] that also records every notification.
pub struct RecordingTracker {
    log: TrackerLog,
}

impl RecordingTracker {
    /// Creates a tracker and the log that observes it.
    #[must_use]
    pub fn new() -> (Self, TrackerLog) {
        let log = TrackerLog::default();
        (Self { log: log.clone() }, log)
    }

    fn record(&self, event: TrackerEvent) {
        let mut inner = self.log.0.lock();
        inner.events.push(event);
        match event {
            TrackerEvent::Added(id) => inner.index.added(id),
            TrackerEvent::Removed(id) => inner.index.removed(id),
            TrackerEvent::Updated(id) => inner.index.updated(id),
        }
    }
}

impl RenderTracker for RecordingTracker {
    fn added(&mut self, id: ObjectId) {
        self.record(TrackerEvent::Added(id));
    }

    fn removed(&mut self, id: ObjectId) {
        self.record(TrackerEvent::Removed(id));
    }

    fn updated(&mut self, id: ObjectId) {
        self.record(TrackerEvent::Updated(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_add_remove() {
        let mut index = ObjectIndex::new();
        let a = ObjectId::new(1);
        let b = ObjectId::new(2);

        index.added(a);
        index.added(b);
        index.removed(a);
        index.updated(b);

        assert_eq!(index.len(), 1);
        assert!(index.contains(b));
        assert!(!index.contains(a));
        assert_eq!(index.ids().collect::<Vec<_>>(), vec![b]);
        assert_eq!(
            index.stats(),
            IndexStats { added: 2, removed: 1, updated: 1 }
        );
    }

    #[test]
    fn test_double_add_keeps_one_entry() {
        let mut index = ObjectIndex::new();
        let a = ObjectId::new(7);
        index.added(a);
        index.added(a);
        assert_eq!(index.len(), 1);
        index.removed(a);
        assert!(index.is_empty());
    }

    #[test]
    fn test_recording_tracker_log() {
        let (mut tracker, log) = RecordingTracker::new();
        let a = ObjectId::new(3);
        tracker.added(a);
        tracker.updated(a);
        tracker.removed(a);
        tracker.added(a);

        assert_eq!(
            log.events_for(a),
            vec![
                TrackerEvent::Added(a),
                TrackerEvent::Updated(a),
                TrackerEvent::Removed(a),
                TrackerEvent::Added(a),
            ]
        );
        assert!(log.is_registered(a));
        log.clear();
        assert!(log.events().is_empty());
        assert_eq!(log.registered(), 1);
    }
}
