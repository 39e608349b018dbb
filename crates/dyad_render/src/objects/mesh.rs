//! Triangle mesh: vertex and index buffers plus bounds.

use std::sync::Arc;

use crate::backend::{BufferUsage, GpuResource};
use crate::context::SyncContext;
use crate::core_thread::CoreServices;
use crate::error::RenderResult;
use crate::sync::{BackObject, DirtyMask, Front, FrontObject};

/// CPU-side geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Axis-aligned quad in the XY plane, centered on the origin.
    #[must_use]
    pub fn quad(half_extent: f32) -> Self {
        let h = half_extent;
        Self {
            positions: vec![[-h, -h, 0.0], [h, -h, 0.0], [h, h, 0.0], [-h, h, 0.0]],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Axis-aligned cube centered on the origin.
    #[must_use]
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        let mut positions = Vec::with_capacity(8);
        for i in 0..8u8 {
            positions.push([
                if i & 1 == 0 { -h } else { h },
                if i & 2 == 0 { -h } else { h },
                if i & 4 == 0 { -h } else { h },
            ]);
        }
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 1, 2, 3,   4, 5, 6, 5, 7, 6,
            0, 1, 4, 1, 5, 4,   2, 6, 3, 3, 6, 7,
            0, 4, 2, 2, 4, 6,   1, 3, 5, 3, 7, 5,
        ];
        Self { positions, indices }
    }

    /// Bounding box of the positions. Empty meshes get a zero box.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let Some(first) = self.positions.first() else {
            return Bounds::default();
        };
        let mut bounds = Bounds {
            min: *first,
            max: *first,
        };
        for p in &self.positions[1..] {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(p[axis]);
                bounds.max[axis] = bounds.max[axis].max(p[axis]);
            }
        }
        bounds
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

/// Front state of a [`Mesh`].
pub struct MeshState {
    data: Arc<MeshData>,
}

impl FrontObject for MeshState {
    type Back = MeshBack;

    fn describe(&self) -> Arc<MeshData> {
        Arc::clone(&self.data)
    }

    fn build_record(&self, _mask: DirtyMask) -> Arc<MeshData> {
        Arc::clone(&self.data)
    }
}

/// Shared geometry resource.
pub type Mesh = Front<MeshState>;

impl Mesh {
    /// Creates a mesh. Call [`Front::create_back`] to upload it.
    #[must_use]
    pub fn with_data(ctx: &SyncContext, data: MeshData) -> Self {
        Front::new(ctx, MeshState { data: Arc::new(data) })
    }

    /// Replaces the geometry.
    pub fn set_data(&self, data: MeshData) {
        self.modify(DirtyMask::DATA, |state| state.data = Arc::new(data));
    }

    /// Current geometry.
    #[must_use]
    pub fn data(&self) -> Arc<MeshData> {
        self.read(|state| Arc::clone(&state.data))
    }
}

/// Core-side mesh.
#[derive(Debug)]
pub struct MeshBack {
    data: Arc<MeshData>,
    vertices: GpuResource,
    indices: GpuResource,
    bounds: Bounds,
}

impl MeshBack {
    fn upload(core: &CoreServices, data: &MeshData) -> RenderResult<(GpuResource, GpuResource)> {
        let vertices = GpuResource::buffer(
            core.backend(),
            "mesh.vertices",
            BufferUsage::Vertex,
            bytemuck::cast_slice(&data.positions),
        )?;
        let indices = GpuResource::buffer(
            core.backend(),
            "mesh.indices",
            BufferUsage::Index,
            bytemuck::cast_slice(&data.indices),
        )?;
        Ok((vertices, indices))
    }

    /// Geometry the buffers were built from.
    #[must_use]
    pub fn data(&self) -> &Arc<MeshData> {
        &self.data
    }

    /// Vertex buffer.
    #[must_use]
    pub fn vertices(&self) -> &GpuResource {
        &self.vertices
    }

    /// Index buffer.
    #[must_use]
    pub fn indices(&self) -> &GpuResource {
        &self.indices
    }

    /// Indices to draw.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_count(&self) -> u32 {
        self.data.indices.len() as u32
    }

    /// Bounding box.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

impl BackObject for MeshBack {
    type Desc = Arc<MeshData>;
    type Record = Arc<MeshData>;
    const KIND: &'static str = "mesh";

    fn construct(data: Arc<MeshData>, core: &mut CoreServices) -> RenderResult<Self> {
        let (vertices, indices) = Self::upload(core, &data)?;
        Ok(Self {
            bounds: data.bounds(),
            data,
            vertices,
            indices,
        })
    }

    fn unpack(&mut self, _mask: DirtyMask, data: Arc<MeshData>) {
        self.data = data;
    }

    fn rebuild(&mut self, core: &mut CoreServices) -> RenderResult<()> {
        // Old buffers are released once the new ones exist.
        let (vertices, indices) = Self::upload(core, &self.data)?;
        self.vertices = vertices;
        self.indices = indices;
        self.bounds = self.data.bounds();
        Ok(())
    }
}
