//! In-memory backend with a hard memory budget.
//!
//! Buffer contents are kept so tests can read back what the core thread
//! uploaded. Surfaces cost 4 bytes per pixel; state objects cost nothing.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use super::{BufferUsage, GpuBackend, ResourceId, StateCategory};
use crate::error::{RenderError, RenderResult};
use crate::state::StateId;

const BYTES_PER_PIXEL: u64 = 4;

enum Resource {
    Buffer { usage: BufferUsage, data: Vec<u8> },
    State { category: StateCategory, id: StateId },
    Surface { width: u32, height: u32 },
}

impl Resource {
    fn bytes(&self) -> u64 {
        match self {
            Self::Buffer { data, .. } => data.len() as u64,
            Self::State { .. } => 0,
            Self::Surface { width, height } => surface_bytes(*width, *height),
        }
    }
}

fn surface_bytes(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * BYTES_PER_PIXEL
}

/// Creation counters of a [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Buffers ever created.
    pub buffers_created: u64,
    /// State objects ever created.
    pub states_created: u64,
    /// Surfaces ever created.
    pub surfaces_created: u64,
    /// Resources currently alive.
    pub live: usize,
    /// Bytes currently in use.
    pub used_bytes: u64,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    resources: HashMap<u64, Resource>,
    used: u64,
    stats: HeadlessStats,
}

impl Inner {
    fn reserve(&mut self, budget: u64, bytes: u64) -> RenderResult<()> {
        let available = budget.saturating_sub(self.used);
        if bytes > available {
            return Err(RenderError::OutOfGpuMemory {
                requested: bytes,
                available,
            });
        }
        self.used += bytes;
        Ok(())
    }

    fn insert(&mut self, resource: Resource) -> ResourceId {
        self.next_id += 1;
        self.resources.insert(self.next_id, resource);
        ResourceId::new(self.next_id)
    }
}

/// GPU backend that lives entirely in host memory.
pub struct HeadlessBackend {
    budget: u64,
    inner: Mutex<Inner>,
}

impl HeadlessBackend {
    /// Creates a backend that refuses allocations beyond `budget` bytes.
    #[must_use]
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Memory budget in bytes.
    #[must_use]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Copy of a buffer's current contents.
    #[must_use]
    pub fn read_buffer(&self, buffer: ResourceId) -> Option<Vec<u8>> {
        match self.inner.lock().resources.get(&buffer.raw()) {
            Some(Resource::Buffer { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Usage of a live buffer.
    #[must_use]
    pub fn buffer_usage(&self, buffer: ResourceId) -> Option<BufferUsage> {
        match self.inner.lock().resources.get(&buffer.raw()) {
            Some(Resource::Buffer { usage, .. }) => Some(*usage),
            _ => None,
        }
    }

    /// Current size of a live surface.
    #[must_use]
    pub fn surface_size(&self, surface: ResourceId) -> Option<(u32, u32)> {
        match self.inner.lock().resources.get(&surface.raw()) {
            Some(Resource::Surface { width, height }) => Some((*width, *height)),
            _ => None,
        }
    }

    /// Category and cache id of a live state object.
    #[must_use]
    pub fn state_info(&self, state: ResourceId) -> Option<(StateCategory, StateId)> {
        match self.inner.lock().resources.get(&state.raw()) {
            Some(Resource::State { category, id }) => Some((*category, *id)),
            _ => None,
        }
    }

    /// True while the resource has not been released.
    #[must_use]
    pub fn is_live(&self, resource: ResourceId) -> bool {
        self.inner.lock().resources.contains_key(&resource.raw())
    }

    /// Creation counters and current usage.
    #[must_use]
    pub fn stats(&self) -> HeadlessStats {
        let inner = self.inner.lock();
        HeadlessStats {
            live: inner.resources.len(),
            used_bytes: inner.used,
            ..inner.stats
        }
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_buffer(
        &self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> RenderResult<ResourceId> {
        let mut inner = self.inner.lock();
        inner.reserve(self.budget, contents.len() as u64)?;
        inner.stats.buffers_created += 1;
        let id = inner.insert(Resource::Buffer {
            usage,
            data: contents.to_vec(),
        });
        trace!(label, ?usage, bytes = contents.len(), ?id, "buffer created");
        Ok(id)
    }

    fn write_buffer(&self, buffer: ResourceId, offset: u64, data: &[u8]) -> RenderResult<()> {
        let mut inner = self.inner.lock();
        let Some(Resource::Buffer { data: target, .. }) = inner.resources.get_mut(&buffer.raw())
        else {
            return Err(RenderError::UnknownResource(buffer.raw()));
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(data.len());
        if end > target.len() {
            return Err(RenderError::BufferOverrun {
                resource: buffer.raw(),
                end: end as u64,
                size: target.len() as u64,
            });
        }
        target[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_state(&self, category: StateCategory, id: StateId) -> RenderResult<ResourceId> {
        let mut inner = self.inner.lock();
        inner.stats.states_created += 1;
        let resource = inner.insert(Resource::State { category, id });
        trace!(category = category.name(), %id, ?resource, "state created");
        Ok(resource)
    }

    fn create_surface(&self, label: &str, width: u32, height: u32) -> RenderResult<ResourceId> {
        let mut inner = self.inner.lock();
        inner.reserve(self.budget, surface_bytes(width, height))?;
        inner.stats.surfaces_created += 1;
        let id = inner.insert(Resource::Surface { width, height });
        trace!(label, width, height, ?id, "surface created");
        Ok(id)
    }

    fn resize_surface(&self, surface: ResourceId, width: u32, height: u32) -> RenderResult<()> {
        let mut inner = self.inner.lock();
        let old = match inner.resources.get(&surface.raw()) {
            Some(Resource::Surface { width, height }) => surface_bytes(*width, *height),
            _ => return Err(RenderError::UnknownResource(surface.raw())),
        };
        inner.used -= old;
        if let Err(err) = inner.reserve(self.budget, surface_bytes(width, height)) {
            inner.used += old;
            return Err(err);
        }
        inner
            .resources
            .insert(surface.raw(), Resource::Surface { width, height });
        Ok(())
    }

    fn release(&self, resource: ResourceId) {
        let mut inner = self.inner.lock();
        if let Some(released) = inner.resources.remove(&resource.raw()) {
            inner.used -= released.bytes();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_enforced() {
        let backend = HeadlessBackend::new(64);
        let a = backend
            .create_buffer("a", BufferUsage::Vertex, &[0u8; 48])
            .unwrap();
        let err = backend
            .create_buffer("b", BufferUsage::Vertex, &[0u8; 32])
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::OutOfGpuMemory { requested: 32, available: 16 }
        ));

        backend.release(a);
        assert!(backend
            .create_buffer("b", BufferUsage::Vertex, &[0u8; 32])
            .is_ok());
    }

    #[test]
    fn test_write_and_read_back() {
        let backend = HeadlessBackend::new(1024);
        let buf = backend
            .create_buffer("u", BufferUsage::Uniform, &[0u8; 8])
            .unwrap();
        backend.write_buffer(buf, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.read_buffer(buf).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);

        assert!(matches!(
            backend.write_buffer(buf, 6, &[9, 9, 9]),
            Err(RenderError::BufferOverrun { end: 9, size: 8, .. })
        ));
        assert!(matches!(
            backend.write_buffer(ResourceId::new(999), 0, &[1]),
            Err(RenderError::UnknownResource(999))
        ));
    }

    #[test]
    fn test_surface_resize_accounts_memory() {
        let backend = HeadlessBackend::new(100 * 100 * 4);
        let surface = backend.create_surface("main", 50, 50).unwrap();
        assert_eq!(backend.stats().used_bytes, 50 * 50 * 4);

        backend.resize_surface(surface, 100, 100).unwrap();
        assert_eq!(backend.surface_size(surface), Some((100, 100)));
        assert!(backend.resize_surface(surface, 101, 100).is_err());
        assert_eq!(backend.surface_size(surface), Some((100, 100)));
        assert_eq!(backend.stats().used_bytes, 100 * 100 * 4);
    }

    #[test]
    fn test_stats_count_creations() {
        let backend = HeadlessBackend::new(1024);
        let counter = dyad_core::BoundedCounter::new("test", 4);
        let state = backend
            .create_state(StateCategory::Blend, counter.allocate().unwrap())
            .unwrap();
        backend.create_surface("s", 2, 2).unwrap();
        backend.release(state);

        let stats = backend.stats();
        assert_eq!(stats.states_created, 1);
        assert_eq!(stats.surfaces_created, 1);
        assert_eq!(stats.live, 1);
        assert!(!backend.is_live(state));
    }
}
