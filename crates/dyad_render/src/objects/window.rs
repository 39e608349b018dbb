//! # Render Window
//!
//! The one object whose state is changed from both sides. The simulation
//! sets the requested title and size; the platform resizes and focuses the
//! window on the core thread. Core-side properties reach the simulation
//! through a property snapshot:
//!
//! ```text
//!  core: platform_resize() ──► publish(WindowProperties)
//!                                        │
//!  simulation: properties() ──► pull() ◄─┘
//! ```

use dyad_core::{property_snapshot, SnapshotPublisher, SnapshotView};
use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{GpuResource, ResourceId};
use crate::context::SyncContext;
use crate::core_thread::CoreServices;
use crate::error::RenderResult;
use crate::sync::{BackHandle, BackObject, DirtyMask, Front, FrontObject};

/// Window properties owned by the core thread.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowProperties {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Physical pixels per logical pixel.
    pub scale_factor: f32,
    /// Has keyboard focus.
    pub focused: bool,
    /// Minimized by the user.
    pub minimized: bool,
}

impl Default for WindowProperties {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            scale_factor: 1.0,
            focused: false,
            minimized: false,
        }
    }
}

/// Requested window settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSettings {
    /// Title bar text.
    pub title: String,
    /// Requested size in pixels.
    pub size: (u32, u32),
    /// Wait for vertical blank.
    pub vsync: bool,
    /// Exclusive fullscreen.
    pub fullscreen: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "DYAD".to_string(),
            size: (1280, 720),
            vsync: true,
            fullscreen: false,
        }
    }
}

/// Front state of a [`RenderWindow`].
pub struct WindowState {
    settings: WindowSettings,
    publisher: SnapshotPublisher<WindowProperties>,
}

/// Sync record of a window.
///
/// The size travels only with `DATA` changes. Between those the core side
/// owns it, and platform resizes must not be undone by a title change.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRecord {
    /// Title bar text.
    pub title: String,
    /// Wait for vertical blank.
    pub vsync: bool,
    /// Exclusive fullscreen.
    pub fullscreen: bool,
    /// Requested size, `None` unless the mask carries `DATA`.
    pub size: Option<(u32, u32)>,
}

/// Construction descriptor of a window back.
pub struct WindowDesc {
    settings: WindowSettings,
    publisher: SnapshotPublisher<WindowProperties>,
}

impl FrontObject for WindowState {
    type Back = WindowBack;

    fn describe(&self) -> WindowDesc {
        WindowDesc {
            settings: self.settings.clone(),
            publisher: self.publisher.clone(),
        }
    }

    fn build_record(&self, mask: DirtyMask) -> WindowRecord {
        WindowRecord {
            title: self.settings.title.clone(),
            vsync: self.settings.vsync,
            fullscreen: self.settings.fullscreen,
            size: mask
                .contains(DirtyMask::DATA)
                .then_some(self.settings.size),
        }
    }
}

/// A window with a presentable surface.
pub struct RenderWindow {
    front: Front<WindowState>,
    properties: Mutex<SnapshotView<WindowProperties>>,
}

impl RenderWindow {
    /// Creates a window. Call [`RenderWindow::create_back`] to open it.
    #[must_use]
    pub fn new(ctx: &SyncContext, settings: WindowSettings) -> Self {
        let (publisher, view) = property_snapshot(WindowProperties::default());
        Self {
            front: Front::new(ctx, WindowState { settings, publisher }),
            properties: Mutex::new(view),
        }
    }

    /// Queues creation of the surface and returns immediately.
    pub fn create_back(&self) -> &BackHandle<WindowBack> {
        self.front.create_back()
    }

    /// Blocks until the surface exists.
    ///
    /// # Panics
    ///
    /// If `create_back()` was never called or the surface could not be
    /// created.
    #[track_caller]
    pub fn block_until_ready(&self) -> &BackHandle<WindowBack> {
        self.front.block_until_ready()
    }

    /// Backend handle of the surface. Blocks until it exists.
    ///
    /// # Panics
    ///
    /// Same as [`RenderWindow::block_until_ready`].
    #[track_caller]
    #[must_use]
    pub fn surface_handle(&self) -> Option<ResourceId> {
        self.block_until_ready().read(WindowBack::surface)
    }

    /// Latest core-side properties.
    #[must_use]
    pub fn properties(&self) -> WindowProperties {
        let mut view = self.properties.lock();
        view.pull();
        view.local().clone()
    }

    /// Sets the title.
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.front
            .modify(DirtyMask::PROPERTIES, |w| w.settings.title = title);
    }

    /// Requests a new size.
    pub fn set_size(&self, width: u32, height: u32) {
        self.front
            .modify(DirtyMask::DATA, |w| w.settings.size = (width, height));
    }

    /// Toggles vsync.
    pub fn set_vsync(&self, vsync: bool) {
        self.front
            .modify(DirtyMask::PROPERTIES, |w| w.settings.vsync = vsync);
    }

    /// Toggles fullscreen.
    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.front
            .modify(DirtyMask::DATA, |w| w.settings.fullscreen = fullscreen);
    }

    /// Requested settings.
    #[must_use]
    pub fn settings(&self) -> WindowSettings {
        self.front.read(|w| w.settings.clone())
    }

    /// The underlying front object.
    #[must_use]
    pub fn front(&self) -> &Front<WindowState> {
        &self.front
    }
}

/// Core-side window.
pub struct WindowBack {
    settings: WindowSettings,
    requested_size: Option<(u32, u32)>,
    surface: Option<GpuResource>,
    properties: WindowProperties,
    publisher: SnapshotPublisher<WindowProperties>,
}

impl WindowBack {
    /// Surface handle, `None` after teardown.
    #[must_use]
    pub fn surface(&self) -> Option<ResourceId> {
        self.surface.as_ref().map(GpuResource::id)
    }

    /// Applied settings. The size follows the last resize from either side.
    #[must_use]
    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    /// Core-side properties.
    #[must_use]
    pub fn properties(&self) -> &WindowProperties {
        &self.properties
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if let Some(surface) = &self.surface {
            surface.resize(width, height)?;
        }
        self.properties.width = width;
        self.properties.height = height;
        Ok(())
    }

    /// Platform-driven resize. Core thread only.
    ///
    /// # Errors
    ///
    /// The backend could not resize the surface.
    pub fn platform_resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.resize_surface(width, height)?;
        self.settings.size = (width, height);
        self.publisher.publish(&self.properties);
        debug!(width, height, "window resized by platform");
        Ok(())
    }

    /// Platform focus and minimize changes. Core thread only.
    pub fn platform_focus(&mut self, focused: bool, minimized: bool) {
        self.properties.focused = focused;
        self.properties.minimized = minimized;
        self.publisher.publish(&self.properties);
    }
}

impl BackObject for WindowBack {
    type Desc = WindowDesc;
    type Record = WindowRecord;
    const KIND: &'static str = "window";

    fn construct(desc: WindowDesc, core: &mut CoreServices) -> RenderResult<Self> {
        let (width, height) = desc.settings.size;
        let surface = GpuResource::surface(core.backend(), &desc.settings.title, width, height)?;
        let properties = WindowProperties {
            width,
            height,
            focused: true,
            ..WindowProperties::default()
        };
        desc.publisher.publish(&properties);
        Ok(Self {
            settings: desc.settings,
            requested_size: None,
            surface: Some(surface),
            properties,
            publisher: desc.publisher,
        })
    }

    fn unpack(&mut self, _mask: DirtyMask, record: WindowRecord) {
        self.settings.title = record.title;
        self.settings.vsync = record.vsync;
        self.settings.fullscreen = record.fullscreen;
        self.requested_size = record.size;
    }

    fn rebuild(&mut self, _core: &mut CoreServices) -> RenderResult<()> {
        if let Some((width, height)) = self.requested_size.take() {
            if (width, height) != (self.properties.width, self.properties.height) {
                self.resize_surface(width, height)?;
            }
            self.settings.size = (width, height);
        }
        self.publisher.publish(&self.properties);
        Ok(())
    }

    fn teardown(&mut self, _core: &mut CoreServices) {
        self.surface = None;
        self.properties = WindowProperties::default();
        self.publisher.publish(&self.properties);
    }
}
