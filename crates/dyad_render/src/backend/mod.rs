//! # GPU Backend
//!
//! The narrow surface back objects use to create GPU resources. Everything
//! above it is API-agnostic; [`HeadlessBackend`] implements it in memory.
//!
//! Resources are owned through [`GpuResource`], which releases the backend
//! object when dropped. A back object releasing its last `GpuResource` is the
//! only way GPU memory is returned.

mod headless;

use std::sync::Arc;

pub use headless::{HeadlessBackend, HeadlessStats};

use crate::error::RenderResult;
use crate::state::StateId;

/// Backend handle of a GPU resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Wraps a raw backend handle.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw backend handle.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// What a buffer is bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex positions.
    Vertex,
    /// Triangle indices.
    Index,
    /// Per-material uniform block.
    Uniform,
    /// Per-object instance data.
    Instance,
}

/// Immutable state object categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateCategory {
    /// Texture sampler.
    Sampler,
    /// Rasterizer state.
    Rasterizer,
    /// Blend state.
    Blend,
    /// Depth-stencil state.
    DepthStencil,
    /// Full pipeline state.
    Pipeline,
}

impl StateCategory {
    /// Category name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sampler => "sampler",
            Self::Rasterizer => "rasterizer",
            Self::Blend => "blend",
            Self::DepthStencil => "depth_stencil",
            Self::Pipeline => "pipeline",
        }
    }
}

/// GPU resource factory. Called from the core thread only.
pub trait GpuBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Creates a buffer initialized with `contents`.
    ///
    /// # Errors
    ///
    /// Out of GPU memory.
    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8])
        -> RenderResult<ResourceId>;

    /// Overwrites part of a buffer.
    ///
    /// # Errors
    ///
    /// Unknown buffer or a write past its end.
    fn write_buffer(&self, buffer: ResourceId, offset: u64, data: &[u8]) -> RenderResult<()>;

    /// Realizes an immutable state object.
    ///
    /// # Errors
    ///
    /// Backend refused the state.
    fn create_state(&self, category: StateCategory, id: StateId) -> RenderResult<ResourceId>;

    /// Creates a presentable surface.
    ///
    /// # Errors
    ///
    /// Out of GPU memory.
    fn create_surface(&self, label: &str, width: u32, height: u32) -> RenderResult<ResourceId>;

    /// Resizes a surface.
    ///
    /// # Errors
    ///
    /// Unknown surface or out of GPU memory.
    fn resize_surface(&self, surface: ResourceId, width: u32, height: u32) -> RenderResult<()>;

    /// Releases any resource. Unknown ids are ignored.
    fn release(&self, resource: ResourceId);
}

/// Owning handle to a backend resource. Released on drop.
pub struct GpuResource {
    id: ResourceId,
    backend: Arc<dyn GpuBackend>,
}

impl GpuResource {
    /// Creates a buffer.
    ///
    /// # Errors
    ///
    /// See [`GpuBackend::create_buffer`].
    pub fn buffer(
        backend: &Arc<dyn GpuBackend>,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> RenderResult<Self> {
        let id = backend.create_buffer(label, usage, contents)?;
        Ok(Self::adopt(backend, id))
    }

    /// Realizes a state object.
    ///
    /// # Errors
    ///
    /// See [`GpuBackend::create_state`].
    pub fn state(
        backend: &Arc<dyn GpuBackend>,
        category: StateCategory,
        id: StateId,
    ) -> RenderResult<Self> {
        let id = backend.create_state(category, id)?;
        Ok(Self::adopt(backend, id))
    }

    /// Creates a surface.
    ///
    /// # Errors
    ///
    /// See [`GpuBackend::create_surface`].
    pub fn surface(
        backend: &Arc<dyn GpuBackend>,
        label: &str,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let id = backend.create_surface(label, width, height)?;
        Ok(Self::adopt(backend, id))
    }

    fn adopt(backend: &Arc<dyn GpuBackend>, id: ResourceId) -> Self {
        Self {
            id,
            backend: Arc::clone(backend),
        }
    }

    /// Backend handle.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Overwrites part of the buffer.
    ///
    /// # Errors
    ///
    /// See [`GpuBackend::write_buffer`].
    pub fn write(&self, offset: u64, data: &[u8]) -> RenderResult<()> {
        self.backend.write_buffer(self.id, offset, data)
    }

    /// Resizes the surface.
    ///
    /// # Errors
    ///
    /// See [`GpuBackend::resize_surface`].
    pub fn resize(&self, width: u32, height: u32) -> RenderResult<()> {
        self.backend.resize_surface(self.id, width, height)
    }
}

impl Drop for GpuResource {
    fn drop(&mut self) {
        self.backend.release(self.id);
    }
}

impl std::fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuResource")
            .field("id", &self.id)
            .field("backend", &self.backend.name())
            .finish()
    }
}
