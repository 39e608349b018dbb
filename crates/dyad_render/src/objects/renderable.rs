//! # Renderable
//!
//! A drawable instance: transform, mesh, material and flags. The only object
//! that goes into the render index.
//!
//! Sync record by mask:
//!
//! | mask             | record                                   |
//! |------------------|------------------------------------------|
//! | `TRANSFORM` only | `Transform(matrix)`                      |
//! | anything else    | `Full(snapshot)` with resolved handles   |

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::backend::{BufferUsage, GpuResource};
use crate::context::SyncContext;
use crate::core_thread::CoreServices;
use crate::error::RenderResult;
use crate::objects::{Material, MaterialBack, MaterialDesc, Mesh, MeshBack};
use crate::state::{PipelineState, PrimitiveTopology, SortKey};
use crate::sync::{BackHandle, BackObject, DirtyMask, Front, FrontObject};

/// Column-major 4x4 matrix.
pub type Mat4 = [[f32; 4]; 4];

/// The identity matrix.
pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// A pure translation.
#[must_use]
pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[3] = [x, y, z, 1.0];
    m
}

const FLAG_CAST_SHADOWS: u32 = 1;

/// Per-instance block read by the vertex shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Model matrix.
    pub model: Mat4,
    /// Bit 0: casts shadows.
    pub flags: u32,
    /// Render layer.
    pub layer: u32,
    /// Padding to 16 bytes.
    pub _pad: [u32; 2],
}

/// Front state of a [`Renderable`].
pub struct RenderableState {
    transform: Mat4,
    mesh: Option<Mesh>,
    material: Option<Material>,
    layer: u8,
    cast_shadows: bool,
    active: bool,
}

impl Default for RenderableState {
    fn default() -> Self {
        Self {
            transform: IDENTITY,
            mesh: None,
            material: None,
            layer: 0,
            cast_shadows: true,
            active: true,
        }
    }
}

/// Everything a renderable back needs, with references already resolved.
#[derive(Debug, Clone)]
pub struct RenderableSnapshot {
    /// Model matrix.
    pub transform: Mat4,
    /// Mesh back, `None` if absent or not constructed yet.
    pub mesh: Option<BackHandle<MeshBack>>,
    /// Material back, `None` if absent or not constructed yet.
    pub material: Option<BackHandle<MaterialBack>>,
    /// Render layer.
    pub layer: u8,
    /// Shadow casting.
    pub cast_shadows: bool,
    /// In the render index.
    pub active: bool,
}

/// Sync record of a renderable.
#[derive(Debug, Clone)]
pub enum RenderableRecord {
    /// Transform-only change.
    Transform(Mat4),
    /// Anything richer.
    Full(RenderableSnapshot),
}

impl RenderableState {
    fn snapshot(&self) -> RenderableSnapshot {
        RenderableSnapshot {
            transform: self.transform,
            mesh: self.mesh.as_ref().and_then(Front::back_if_ready),
            material: self.material.as_ref().and_then(Front::back_if_ready),
            layer: self.layer,
            cast_shadows: self.cast_shadows,
            active: self.active,
        }
    }
}

impl FrontObject for RenderableState {
    type Back = RenderableBack;

    fn describe(&self) -> RenderableSnapshot {
        self.snapshot()
    }

    fn build_record(&self, mask: DirtyMask) -> RenderableRecord {
        if mask.is_transform_only() {
            RenderableRecord::Transform(self.transform)
        } else {
            RenderableRecord::Full(self.snapshot())
        }
    }
}

/// A drawable instance.
pub type Renderable = Front<RenderableState>;

impl Renderable {
    /// Creates an active renderable with an identity transform.
    ///
    /// Mesh and material backs are resolved when the descriptor and each
    /// later record are built. A part whose back is not ready by then is
    /// drawn with defaults until the renderable is marked
    /// [`DirtyMask::REFERENCES`] again:
    ///
    /// ```rust,ignore
    /// mesh.create_back();
    /// let r = Renderable::with_parts(&ctx, Some(mesh.clone()), None);
    /// r.create_back();                       // mesh may still be pending
    ///
    /// mesh.block_until_ready();
    /// r.mark_dirty(DirtyMask::REFERENCES);   // picked up at the next drain
    /// ```
    #[must_use]
    pub fn with_parts(ctx: &SyncContext, mesh: Option<Mesh>, material: Option<Material>) -> Self {
        Front::new(
            ctx,
            RenderableState {
                mesh,
                material,
                ..RenderableState::default()
            },
        )
    }

    /// Sets the model matrix. The only lightweight change.
    pub fn set_transform(&self, transform: Mat4) {
        self.modify(DirtyMask::TRANSFORM, |r| r.transform = transform);
    }

    /// Replaces the mesh. Resolved at the next drain, see
    /// [`Renderable::with_parts`].
    pub fn set_mesh(&self, mesh: Option<Mesh>) {
        self.modify(DirtyMask::REFERENCES, |r| r.mesh = mesh);
    }

    /// Replaces the material.
    pub fn set_material(&self, material: Option<Material>) {
        self.modify(DirtyMask::REFERENCES, |r| r.material = material);
    }

    /// Sets the render layer.
    pub fn set_layer(&self, layer: u8) {
        self.modify(DirtyMask::PROPERTIES, |r| r.layer = layer);
    }

    /// Enables or disables shadow casting.
    pub fn set_cast_shadows(&self, cast_shadows: bool) {
        self.modify(DirtyMask::PROPERTIES, |r| r.cast_shadows = cast_shadows);
    }

    /// Adds the object to, or removes it from, the render index.
    pub fn set_active(&self, active: bool) {
        self.modify(DirtyMask::ACTIVE, |r| r.active = active);
    }

    /// Current model matrix.
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.read(|r| r.transform)
    }

    /// True if the renderable wants to be drawn.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.read(|r| r.active)
    }
}

/// Core-side renderable.
#[derive(Debug)]
pub struct RenderableBack {
    snapshot: RenderableSnapshot,
    instance: GpuResource,
    pipeline: Option<Arc<PipelineState>>,
    sort_key: SortKey,
    index_count: u32,
}

impl RenderableBack {
    fn instance_data(&self) -> InstanceData {
        InstanceData {
            model: self.snapshot.transform,
            flags: if self.snapshot.cast_shadows {
                FLAG_CAST_SHADOWS
            } else {
                0
            },
            layer: u32::from(self.snapshot.layer),
            _pad: [0; 2],
        }
    }

    fn upload_instance(&self) -> RenderResult<()> {
        self.instance.write(0, bytemuck::bytes_of(&self.instance_data()))
    }

    /// Current model matrix.
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.snapshot.transform
    }

    /// Last applied snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &RenderableSnapshot {
        &self.snapshot
    }

    /// Instance buffer.
    #[must_use]
    pub fn instance(&self) -> &GpuResource {
        &self.instance
    }

    /// Pipeline used to draw, `None` until a rebuild succeeds.
    #[must_use]
    pub fn pipeline(&self) -> Option<&Arc<PipelineState>> {
        self.pipeline.as_ref()
    }

    /// Draw order key.
    #[must_use]
    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    /// Indices to draw. Zero without a mesh.
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

impl BackObject for RenderableBack {
    type Desc = RenderableSnapshot;
    type Record = RenderableRecord;
    const KIND: &'static str = "renderable";

    fn construct(snapshot: RenderableSnapshot, core: &mut CoreServices) -> RenderResult<Self> {
        let instance = GpuResource::buffer(
            core.backend(),
            "renderable.instance",
            BufferUsage::Instance,
            bytemuck::bytes_of(&InstanceData::zeroed()),
        )?;
        let mut back = Self {
            snapshot,
            instance,
            pipeline: None,
            sort_key: SortKey::default(),
            index_count: 0,
        };
        back.rebuild(core)?;
        Ok(back)
    }

    fn unpack(&mut self, _mask: DirtyMask, record: RenderableRecord) {
        match record {
            RenderableRecord::Transform(transform) => self.snapshot.transform = transform,
            RenderableRecord::Full(snapshot) => self.snapshot = snapshot,
        }
    }

    fn refresh(&mut self, _core: &mut CoreServices) -> RenderResult<()> {
        self.upload_instance()
    }

    fn rebuild(&mut self, core: &mut CoreServices) -> RenderResult<()> {
        self.upload_instance()?;

        // A missing material draws with the default one.
        let pipeline = match self
            .snapshot
            .material
            .as_ref()
            .and_then(|m| m.try_read(|m| Arc::clone(m.pipeline())))
        {
            Some(pipeline) => pipeline,
            None => {
                let fallback = MaterialDesc::default();
                core.states().pipeline(
                    fallback.shader,
                    PrimitiveTopology::TriangleList,
                    &fallback.rasterizer,
                    &fallback.blend,
                    &fallback.depth_stencil,
                )?
            }
        };
        self.index_count = self
            .snapshot
            .mesh
            .as_ref()
            .and_then(|m| m.try_read(MeshBack::index_count))
            .unwrap_or(0);
        self.sort_key = SortKey::new(self.snapshot.layer, &pipeline);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.snapshot.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_layout() {
        assert_eq!(std::mem::size_of::<InstanceData>(), 80);
        let m = translation(1.0, 2.0, 3.0);
        assert_eq!(m[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(m[0], IDENTITY[0]);
    }

    #[test]
    fn test_defaults_are_active_identity() {
        let state = RenderableState::default();
        assert!(state.active);
        assert_eq!(state.transform, IDENTITY);
        let snapshot = state.snapshot();
        assert!(snapshot.mesh.is_none());
        assert!(snapshot.material.is_none());
    }
}
