//! # Render Objects
//!
//! Concrete front/back pairs.
//!
//! | front            | back             | typical change                  |
//! |------------------|------------------|---------------------------------|
//! | [`Mesh`]         | [`MeshBack`]     | geometry replaced (`DATA`)      |
//! | [`Material`]     | [`MaterialBack`] | color tweak, state swap         |
//! | [`Renderable`]   | [`RenderableBack`] | per-frame transform           |
//! | [`RenderWindow`] | [`WindowBack`]   | resized from both sides         |

mod material;
mod mesh;
mod renderable;
mod window;

pub use material::{Material, MaterialBack, MaterialDesc, MaterialParams};
pub use mesh::{Bounds, Mesh, MeshBack, MeshData, MeshState};
pub use renderable::{
    translation, InstanceData, Mat4, Renderable, RenderableBack, RenderableRecord,
    RenderableSnapshot, RenderableState, IDENTITY,
};
pub use window::{
    RenderWindow, WindowBack, WindowDesc, WindowProperties, WindowRecord, WindowSettings,
    WindowState,
};
