//! Immutable state descriptors.
//!
//! Pure values: two descriptors that compare equal describe the same GPU
//! state object. Floats are stored as [`FloatKey`] so descriptors can be
//! hashed.

use crate::state::StateId;

/// An `f32` stored by bit pattern, with `-0.0` folded into `0.0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct FloatKey(u32);

impl FloatKey {
    /// Stores `value`.
    #[must_use]
    pub fn new(value: f32) -> Self {
        // -0.0 == 0.0 but their bit patterns differ.
        if value == 0.0 {
            return Self(0);
        }
        Self(value.to_bits())
    }

    /// The stored value.
    #[must_use]
    pub fn get(self) -> f32 {
        f32::from_bits(self.0)
    }
}

impl From<f32> for FloatKey {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

/// Texture filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    #[default]
    Linear,
}

/// Texture addressing outside `0..1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Tile.
    #[default]
    Repeat,
    /// Tile, mirrored.
    MirrorRepeat,
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Clamp to the border color.
    ClampToBorder,
}

/// Border color for [`AddressMode::ClampToBorder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BorderColor {
    /// (0, 0, 0, 0)
    #[default]
    TransparentBlack,
    /// (0, 0, 0, 1)
    OpaqueBlack,
    /// (1, 1, 1, 1)
    OpaqueWhite,
}

/// Comparison used by depth, stencil and shadow samplers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// `new < old`
    #[default]
    Less,
    /// `new == old`
    Equal,
    /// `new <= old`
    LessEqual,
    /// `new > old`
    Greater,
    /// `new != old`
    NotEqual,
    /// `new >= old`
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Polygon fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled triangles.
    #[default]
    Solid,
    /// Edges only.
    Wireframe,
}

/// Face culling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    #[default]
    Back,
}

/// Winding of front faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counter-clockwise.
    #[default]
    Ccw,
    /// Clockwise.
    Cw,
}

/// Blend factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend equation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Stencil buffer operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

/// Primitive assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
}

/// Sampler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Mip level filter.
    pub mip_filter: FilterMode,
    /// Addressing per axis.
    pub address: [AddressMode; 3],
    /// Mip level bias.
    pub lod_bias: FloatKey,
    /// Lowest mip level.
    pub min_lod: FloatKey,
    /// Highest mip level.
    pub max_lod: FloatKey,
    /// Anisotropy clamp, 1 = off.
    pub max_anisotropy: u8,
    /// Comparison for shadow samplers.
    pub compare: Option<CompareFunction>,
    /// Used with [`AddressMode::ClampToBorder`].
    pub border: BorderColor,
}

impl SamplerDesc {
    /// Trilinear, repeating.
    #[must_use]
    pub fn linear_repeat() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            address: [AddressMode::Repeat; 3],
            lod_bias: FloatKey::new(0.0),
            min_lod: FloatKey::new(0.0),
            max_lod: FloatKey::new(32.0),
            max_anisotropy: 1,
            compare: None,
            border: BorderColor::TransparentBlack,
        }
    }

    /// Point sampling, clamped. The usual choice for pixel art and LUTs.
    #[must_use]
    pub fn nearest_clamp() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            mip_filter: FilterMode::Nearest,
            address: [AddressMode::ClampToEdge; 3],
            ..Self::linear_repeat()
        }
    }

    /// Sets the anisotropy clamp.
    #[must_use]
    pub fn with_anisotropy(mut self, max: u8) -> Self {
        self.max_anisotropy = max.max(1);
        self
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::linear_repeat()
    }
}

/// Rasterizer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct RasterizerDesc {
    /// Fill mode.
    pub fill: FillMode,
    /// Culled faces.
    pub cull: CullMode,
    /// Front face winding.
    pub front_face: FrontFace,
    /// Constant depth bias.
    pub depth_bias: i32,
    /// Slope-scaled depth bias.
    pub slope_scaled_depth_bias: FloatKey,
    /// Clip against the near/far planes.
    pub depth_clip: bool,
}

impl RasterizerDesc {
    /// Sets the culled faces.
    #[must_use]
    pub fn with_cull(mut self, cull: CullMode) -> Self {
        self.cull = cull;
        self
    }
}

/// Blend state of the single color target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    /// Blending on.
    pub enabled: bool,
    /// Color source factor.
    pub color_src: BlendFactor,
    /// Color destination factor.
    pub color_dst: BlendFactor,
    /// Color equation.
    pub color_op: BlendOp,
    /// Alpha source factor.
    pub alpha_src: BlendFactor,
    /// Alpha destination factor.
    pub alpha_dst: BlendFactor,
    /// Alpha equation.
    pub alpha_op: BlendOp,
    /// RGBA write mask, low four bits.
    pub write_mask: u8,
}

impl BlendDesc {
    /// Replace the target.
    #[must_use]
    pub fn opaque() -> Self {
        Self {
            enabled: false,
            color_src: BlendFactor::One,
            color_dst: BlendFactor::Zero,
            color_op: BlendOp::Add,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            write_mask: 0b1111,
        }
    }

    /// Straight alpha blending.
    #[must_use]
    pub fn alpha_blend() -> Self {
        Self {
            enabled: true,
            color_src: BlendFactor::SrcAlpha,
            color_dst: BlendFactor::OneMinusSrcAlpha,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::OneMinusSrcAlpha,
            ..Self::opaque()
        }
    }

    /// Additive blending for emissive effects.
    #[must_use]
    pub fn additive() -> Self {
        Self {
            enabled: true,
            color_src: BlendFactor::SrcAlpha,
            color_dst: BlendFactor::One,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::One,
            ..Self::opaque()
        }
    }
}

impl Default for BlendDesc {
    fn default() -> Self {
        Self::opaque()
    }
}

/// Stencil behavior for one face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct StencilFaceDesc {
    /// Stencil test.
    pub compare: CompareFunction,
    /// On stencil failure.
    pub fail_op: StencilOp,
    /// On depth failure.
    pub depth_fail_op: StencilOp,
    /// On pass.
    pub pass_op: StencilOp,
}

/// Depth and stencil state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    /// Depth test on.
    pub depth_test: bool,
    /// Depth writes on.
    pub depth_write: bool,
    /// Depth test function.
    pub depth_compare: CompareFunction,
    /// Stencil test, if any.
    pub stencil: Option<StencilFaceDesc>,
    /// Stencil read mask.
    pub stencil_read_mask: u8,
    /// Stencil write mask.
    pub stencil_write_mask: u8,
}

impl DepthStencilDesc {
    /// Depth test and write, `Less`, no stencil.
    #[must_use]
    pub fn depth_write() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: CompareFunction::Less,
            stencil: None,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }

    /// Depth test without writes, for transparent geometry.
    #[must_use]
    pub fn depth_read_only() -> Self {
        Self {
            depth_write: false,
            depth_compare: CompareFunction::LessEqual,
            ..Self::depth_write()
        }
    }

    /// No depth test at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_compare: CompareFunction::Always,
            ..Self::depth_write()
        }
    }
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self::depth_write()
    }
}

/// Identifies a compiled shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ShaderKey(pub u64);

/// Full pipeline state, composed of already-cached sub-states.
///
/// Built by [`RenderStateCache::pipeline`](crate::RenderStateCache::pipeline)
/// from the ids of its parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineStateDesc {
    /// Shader program.
    pub shader: ShaderKey,
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Rasterizer sub-state.
    pub rasterizer: StateId,
    /// Blend sub-state.
    pub blend: StateId,
    /// Depth-stencil sub-state.
    pub depth_stencil: StateId,
}
