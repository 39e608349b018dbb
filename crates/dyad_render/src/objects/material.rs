//! Surface material: a uniform block plus cached immutable states.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::backend::{BufferUsage, GpuResource};
use crate::context::SyncContext;
use crate::core_thread::CoreServices;
use crate::error::RenderResult;
use crate::state::{
    BlendDesc, DepthStencilDesc, PipelineState, PrimitiveTopology, RasterizerDesc, SamplerDesc,
    SamplerState, ShaderKey,
};
use crate::sync::{BackObject, DirtyMask, Front, FrontObject};

/// Uniform block uploaded per material. Matches the shader layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialParams {
    /// Linear RGBA.
    pub base_color: [f32; 4],
    /// 0 = mirror, 1 = fully rough.
    pub roughness: f32,
    /// 0 = dielectric, 1 = metal.
    pub metallic: f32,
    /// Alpha cutoff for masked materials.
    pub alpha_cutoff: f32,
    /// Padding to 16 bytes.
    pub _pad: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            roughness: 0.5,
            metallic: 0.0,
            alpha_cutoff: 0.5,
            _pad: 0.0,
        }
    }
}

/// Everything a material is made of. Front state, descriptor and record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaterialDesc {
    /// Uniform parameters.
    pub params: MaterialParams,
    /// Shader program.
    pub shader: ShaderKey,
    /// Texture sampling.
    pub sampler: SamplerDesc,
    /// Rasterization.
    pub rasterizer: RasterizerDesc,
    /// Blending.
    pub blend: BlendDesc,
    /// Depth and stencil.
    pub depth_stencil: DepthStencilDesc,
}

impl FrontObject for MaterialDesc {
    type Back = MaterialBack;

    fn describe(&self) -> MaterialDesc {
        *self
    }

    fn build_record(&self, _mask: DirtyMask) -> MaterialDesc {
        *self
    }
}

/// Shared surface description.
pub type Material = Front<MaterialDesc>;

impl Material {
    /// Creates a material. Call [`Front::create_back`] to realize it.
    #[must_use]
    pub fn with_desc(ctx: &SyncContext, desc: MaterialDesc) -> Self {
        Front::new(ctx, desc)
    }

    /// Sets the base color.
    pub fn set_base_color(&self, rgba: [f32; 4]) {
        self.modify(DirtyMask::PROPERTIES, |m| m.params.base_color = rgba);
    }

    /// Sets roughness and metalness.
    pub fn set_surface(&self, roughness: f32, metallic: f32) {
        self.modify(DirtyMask::PROPERTIES, |m| {
            m.params.roughness = roughness.clamp(0.0, 1.0);
            m.params.metallic = metallic.clamp(0.0, 1.0);
        });
    }

    /// Sets the shader program.
    pub fn set_shader(&self, shader: ShaderKey) {
        self.modify(DirtyMask::DATA, |m| m.shader = shader);
    }

    /// Sets the sampler.
    pub fn set_sampler(&self, sampler: SamplerDesc) {
        self.modify(DirtyMask::DATA, |m| m.sampler = sampler);
    }

    /// Sets the blend state.
    pub fn set_blend(&self, blend: BlendDesc) {
        self.modify(DirtyMask::DATA, |m| m.blend = blend);
    }

    /// Sets the depth-stencil state.
    pub fn set_depth_stencil(&self, depth_stencil: DepthStencilDesc) {
        self.modify(DirtyMask::DATA, |m| m.depth_stencil = depth_stencil);
    }

    /// Sets the rasterizer state.
    pub fn set_rasterizer(&self, rasterizer: RasterizerDesc) {
        self.modify(DirtyMask::DATA, |m| m.rasterizer = rasterizer);
    }

    /// Current description.
    #[must_use]
    pub fn desc(&self) -> MaterialDesc {
        self.read(|m| *m)
    }
}

/// Core-side material.
#[derive(Debug)]
pub struct MaterialBack {
    desc: MaterialDesc,
    uniform: GpuResource,
    sampler: Arc<SamplerState>,
    pipeline: Arc<PipelineState>,
}

fn acquire_states(
    core: &CoreServices,
    desc: &MaterialDesc,
) -> RenderResult<(Arc<SamplerState>, Arc<PipelineState>)> {
    let states = core.states();
    let sampler = states.sampler(&desc.sampler)?;
    let pipeline = states.pipeline(
        desc.shader,
        PrimitiveTopology::TriangleList,
        &desc.rasterizer,
        &desc.blend,
        &desc.depth_stencil,
    )?;
    Ok((sampler, pipeline))
}

impl MaterialBack {
    /// Current description.
    #[must_use]
    pub fn desc(&self) -> &MaterialDesc {
        &self.desc
    }

    /// Uniform buffer.
    #[must_use]
    pub fn uniform(&self) -> &GpuResource {
        &self.uniform
    }

    /// Cached sampler.
    #[must_use]
    pub fn sampler(&self) -> &Arc<SamplerState> {
        &self.sampler
    }

    /// Cached pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<PipelineState> {
        &self.pipeline
    }
}

impl BackObject for MaterialBack {
    type Desc = MaterialDesc;
    type Record = MaterialDesc;
    const KIND: &'static str = "material";

    fn construct(desc: MaterialDesc, core: &mut CoreServices) -> RenderResult<Self> {
        let uniform = GpuResource::buffer(
            core.backend(),
            "material.params",
            BufferUsage::Uniform,
            bytemuck::bytes_of(&desc.params),
        )?;
        let (sampler, pipeline) = acquire_states(core, &desc)?;
        Ok(Self {
            desc,
            uniform,
            sampler,
            pipeline,
        })
    }

    fn unpack(&mut self, _mask: DirtyMask, desc: MaterialDesc) {
        self.desc = desc;
    }

    fn rebuild(&mut self, core: &mut CoreServices) -> RenderResult<()> {
        self.uniform.write(0, bytemuck::bytes_of(&self.desc.params))?;
        // Unchanged descriptors hit the cache and return the same states.
        let (sampler, pipeline) = acquire_states(core, &self.desc)?;
        self.sampler = sampler;
        self.pipeline = pipeline;
        Ok(())
    }
}
