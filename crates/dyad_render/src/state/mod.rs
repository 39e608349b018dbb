//! # Immutable Render State
//!
//! Back objects ask for GPU state by value. Equal descriptors share one GPU
//! object for as long as anybody holds it.
//!
//! ## Sort Key Layout
//!
//! ```text
//!  63      56 55          36 35      24 23      12 11       0
//! ┌──────────┬──────────────┬──────────┬──────────┬──────────┐
//! │  layer   │   pipeline   │  blend   │  depth   │  raster  │
//! │  8 bits  │   20 bits    │ 12 bits  │ 12 bits  │ 12 bits  │
//! └──────────┴──────────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! This is why state ids are bounded: each one must fit its field.

mod cache;
pub mod descriptors;

use std::sync::Arc;

pub use cache::StateCache;
pub use descriptors::{
    AddressMode, BlendDesc, BlendFactor, BlendOp, BorderColor, CompareFunction, CullMode,
    DepthStencilDesc, FillMode, FilterMode, FloatKey, FrontFace, PipelineStateDesc,
    PrimitiveTopology, RasterizerDesc, SamplerDesc, ShaderKey, StencilFaceDesc, StencilOp,
};

use crate::backend::{GpuBackend, GpuResource, StateCategory};
use crate::config::StateIdBits;
use crate::error::RenderResult;

/// Bounded id of a cached state object.
pub type StateId = dyad_core::BoundedId;

/// A realized immutable state object.
#[derive(Debug)]
pub struct CachedState<D> {
    id: StateId,
    desc: D,
    gpu: GpuResource,
}

impl<D> CachedState<D> {
    /// Cache id, stable for the lifetime of the object.
    #[inline]
    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    /// The descriptor it was built from.
    #[inline]
    #[must_use]
    pub fn desc(&self) -> &D {
        &self.desc
    }

    /// Backend object.
    #[inline]
    #[must_use]
    pub fn gpu(&self) -> &GpuResource {
        &self.gpu
    }
}

/// Cached sampler.
pub type SamplerState = CachedState<SamplerDesc>;
/// Cached rasterizer state.
pub type RasterizerState = CachedState<RasterizerDesc>;
/// Cached blend state.
pub type BlendState = CachedState<BlendDesc>;
/// Cached depth-stencil state.
pub type DepthStencilState = CachedState<DepthStencilDesc>;

/// A cached pipeline. Keeps its sub-states alive, so their ids stay valid.
#[derive(Debug)]
pub struct PipelineState {
    id: StateId,
    desc: PipelineStateDesc,
    rasterizer: Arc<RasterizerState>,
    blend: Arc<BlendState>,
    depth_stencil: Arc<DepthStencilState>,
    gpu: GpuResource,
}

impl PipelineState {
    /// Cache id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Composed descriptor.
    #[inline]
    #[must_use]
    pub fn desc(&self) -> &PipelineStateDesc {
        &self.desc
    }

    /// Rasterizer sub-state.
    #[must_use]
    pub fn rasterizer(&self) -> &Arc<RasterizerState> {
        &self.rasterizer
    }

    /// Blend sub-state.
    #[must_use]
    pub fn blend(&self) -> &Arc<BlendState> {
        &self.blend
    }

    /// Depth-stencil sub-state.
    #[must_use]
    pub fn depth_stencil(&self) -> &Arc<DepthStencilState> {
        &self.depth_stencil
    }

    /// Backend object.
    #[must_use]
    pub fn gpu(&self) -> &GpuResource {
        &self.gpu
    }
}

/// The five state caches of a context.
pub struct RenderStateCache {
    backend: Arc<dyn GpuBackend>,
    samplers: StateCache<SamplerDesc, SamplerState>,
    rasterizers: StateCache<RasterizerDesc, RasterizerState>,
    blends: StateCache<BlendDesc, BlendState>,
    depth_stencils: StateCache<DepthStencilDesc, DepthStencilState>,
    pipelines: StateCache<PipelineStateDesc, PipelineState>,
}

impl RenderStateCache {
    /// Creates empty caches realizing states through `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn GpuBackend>, bits: &StateIdBits) -> Self {
        Self {
            backend,
            samplers: StateCache::new(StateCategory::Sampler.name(), bits.sampler),
            rasterizers: StateCache::new(StateCategory::Rasterizer.name(), bits.rasterizer),
            blends: StateCache::new(StateCategory::Blend.name(), bits.blend),
            depth_stencils: StateCache::new(StateCategory::DepthStencil.name(), bits.depth_stencil),
            pipelines: StateCache::new(StateCategory::Pipeline.name(), bits.pipeline),
        }
    }

    fn realize<'a, D: Copy + 'a>(
        &'a self,
        category: StateCategory,
        desc: &D,
    ) -> impl FnOnce(StateId) -> RenderResult<CachedState<D>> + 'a {
        let desc = *desc;
        move |id| {
            Ok(CachedState {
                id,
                desc,
                gpu: GpuResource::state(&self.backend, category, id)?,
            })
        }
    }

    /// Acquires a sampler.
    ///
    /// # Errors
    ///
    /// The backend refused the state.
    pub fn sampler(&self, desc: &SamplerDesc) -> RenderResult<Arc<SamplerState>> {
        self.samplers
            .try_acquire_with(desc, self.realize(StateCategory::Sampler, desc))
    }

    /// Acquires a rasterizer state.
    ///
    /// # Errors
    ///
    /// The backend refused the state.
    pub fn rasterizer(&self, desc: &RasterizerDesc) -> RenderResult<Arc<RasterizerState>> {
        self.rasterizers
            .try_acquire_with(desc, self.realize(StateCategory::Rasterizer, desc))
    }

    /// Acquires a blend state.
    ///
    /// # Errors
    ///
    /// The backend refused the state.
    pub fn blend(&self, desc: &BlendDesc) -> RenderResult<Arc<BlendState>> {
        self.blends
            .try_acquire_with(desc, self.realize(StateCategory::Blend, desc))
    }

    /// Acquires a depth-stencil state.
    ///
    /// # Errors
    ///
    /// The backend refused the state.
    pub fn depth_stencil(&self, desc: &DepthStencilDesc) -> RenderResult<Arc<DepthStencilState>> {
        self.depth_stencils
            .try_acquire_with(desc, self.realize(StateCategory::DepthStencil, desc))
    }

    /// Acquires a pipeline state, acquiring its sub-states first.
    ///
    /// # Errors
    ///
    /// The backend refused one of the states.
    pub fn pipeline(
        &self,
        shader: ShaderKey,
        topology: PrimitiveTopology,
        rasterizer: &RasterizerDesc,
        blend: &BlendDesc,
        depth_stencil: &DepthStencilDesc,
    ) -> RenderResult<Arc<PipelineState>> {
        let rasterizer = self.rasterizer(rasterizer)?;
        let blend = self.blend(blend)?;
        let depth_stencil = self.depth_stencil(depth_stencil)?;
        let desc = PipelineStateDesc {
            shader,
            topology,
            rasterizer: rasterizer.id(),
            blend: blend.id(),
            depth_stencil: depth_stencil.id(),
        };
        self.pipelines.try_acquire_with(&desc, |id| {
            Ok(PipelineState {
                id,
                desc,
                gpu: GpuResource::state(&self.backend, StateCategory::Pipeline, id)?,
                rasterizer,
                blend,
                depth_stencil,
            })
        })
    }

    /// Sampler cache.
    #[must_use]
    pub fn samplers(&self) -> &StateCache<SamplerDesc, SamplerState> {
        &self.samplers
    }

    /// Rasterizer cache.
    #[must_use]
    pub fn rasterizers(&self) -> &StateCache<RasterizerDesc, RasterizerState> {
        &self.rasterizers
    }

    /// Blend cache.
    #[must_use]
    pub fn blends(&self) -> &StateCache<BlendDesc, BlendState> {
        &self.blends
    }

    /// Depth-stencil cache.
    #[must_use]
    pub fn depth_stencils(&self) -> &StateCache<DepthStencilDesc, DepthStencilState> {
        &self.depth_stencils
    }

    /// Pipeline cache.
    #[must_use]
    pub fn pipelines(&self) -> &StateCache<PipelineStateDesc, PipelineState> {
        &self.pipelines
    }
}

/// 64-bit draw order key. Draws sorted by key minimize state changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SortKey(u64);

impl SortKey {
    const PIPELINE_SHIFT: u32 = 36;
    const BLEND_SHIFT: u32 = 24;
    const DEPTH_SHIFT: u32 = 12;
    const SUBSTATE_MASK: u64 = 0xfff;
    const PIPELINE_MASK: u64 = 0xf_ffff;

    /// Packs `layer` and the ids of `pipeline` and its parts.
    #[must_use]
    pub fn new(layer: u8, pipeline: &PipelineState) -> Self {
        let desc = pipeline.desc();
        let layer = u64::from(layer) << 56;
        let pipeline_id = (u64::from(pipeline.id().value()) & Self::PIPELINE_MASK) << Self::PIPELINE_SHIFT;
        let blend = (u64::from(desc.blend.value()) & Self::SUBSTATE_MASK) << Self::BLEND_SHIFT;
        let depth = (u64::from(desc.depth_stencil.value()) & Self::SUBSTATE_MASK) << Self::DEPTH_SHIFT;
        let raster = u64::from(desc.rasterizer.value()) & Self::SUBSTATE_MASK;
        Self(layer | pipeline_id | blend | depth | raster)
    }

    /// Raw key.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Layer field.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn layer(self) -> u8 {
        (self.0 >> 56) as u8
    }

    /// Pipeline id field.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn pipeline(self) -> u32 {
        ((self.0 >> Self::PIPELINE_SHIFT) & Self::PIPELINE_MASK) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    fn cache() -> (Arc<HeadlessBackend>, RenderStateCache) {
        let backend = Arc::new(HeadlessBackend::new(1 << 20));
        let states = RenderStateCache::new(backend.clone(), &StateIdBits::default());
        (backend, states)
    }

    #[test]
    fn test_states_are_shared_and_realized_once() {
        let (backend, states) = cache();
        let a = states.sampler(&SamplerDesc::linear_repeat()).unwrap();
        let b = states.sampler(&SamplerDesc::default()).unwrap();
        let c = states.sampler(&SamplerDesc::nearest_clamp()).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(backend.stats().states_created, 2);
        assert_eq!(
            backend.state_info(a.gpu().id()),
            Some((StateCategory::Sampler, a.id()))
        );
    }

    #[test]
    fn test_released_state_frees_backend_object() {
        let (backend, states) = cache();
        let blend = states.blend(&BlendDesc::additive()).unwrap();
        let gpu = blend.gpu().id();
        drop(blend);

        assert!(!backend.is_live(gpu));
        assert_eq!(states.blends().live_entries(), 0);
    }

    #[test]
    fn test_pipeline_shares_parts() {
        let (backend, states) = cache();
        let raster = RasterizerDesc::default();
        let depth = DepthStencilDesc::default();

        let opaque = states
            .pipeline(ShaderKey(1), PrimitiveTopology::TriangleList, &raster, &BlendDesc::opaque(), &depth)
            .unwrap();
        let again = states
            .pipeline(ShaderKey(1), PrimitiveTopology::TriangleList, &raster, &BlendDesc::opaque(), &depth)
            .unwrap();
        let blended = states
            .pipeline(ShaderKey(1), PrimitiveTopology::TriangleList, &raster, &BlendDesc::alpha_blend(), &depth)
            .unwrap();

        assert!(Arc::ptr_eq(&opaque, &again));
        assert!(!Arc::ptr_eq(&opaque, &blended));
        assert!(Arc::ptr_eq(opaque.rasterizer(), blended.rasterizer()));
        assert_eq!(states.rasterizers().live_entries(), 1);
        assert_eq!(states.blends().live_entries(), 2);
        // raster + depth + 2 blends + 2 pipelines
        assert_eq!(backend.stats().states_created, 6);
    }

    #[test]
    fn test_pipeline_keeps_parts_alive() {
        let (_backend, states) = cache();
        let pipeline = states
            .pipeline(
                ShaderKey(9),
                PrimitiveTopology::TriangleList,
                &RasterizerDesc::default(),
                &BlendDesc::additive(),
                &DepthStencilDesc::depth_read_only(),
            )
            .unwrap();
        let blend_id = pipeline.blend().id();

        let blend = states.blend(&BlendDesc::additive()).unwrap();
        assert_eq!(blend.id(), blend_id);
        assert_eq!(pipeline.desc().blend, blend_id);
    }

    #[test]
    fn test_sort_key_orders_by_layer_then_pipeline() {
        let (_backend, states) = cache();
        let depth = DepthStencilDesc::default();
        let raster = RasterizerDesc::default();
        let first = states
            .pipeline(ShaderKey(1), PrimitiveTopology::TriangleList, &raster, &BlendDesc::opaque(), &depth)
            .unwrap();
        let second = states
            .pipeline(ShaderKey(2), PrimitiveTopology::TriangleList, &raster, &BlendDesc::opaque(), &depth)
            .unwrap();

        let a = SortKey::new(0, &second);
        let b = SortKey::new(1, &first);
        let c = SortKey::new(0, &first);
        assert!(c < a);
        assert!(a < b);
        assert_eq!(b.layer(), 1);
        assert_eq!(a.pipeline(), second.id().value());
    }
}
