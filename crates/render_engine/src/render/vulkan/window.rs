//! GLFW-based window capability for Vulkan presentation
//!
//! Owns the process-wide GLFW handle together with the native window.
//! Dropping the [`Window`] destroys the native window and releases the
//! display subsystem with it, which is why the renderer keeps it as the
//! outermost resource: everything Vulkan-side is flushed first.

use ash::vk;
use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use thiserror::Error;

use crate::config::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// The display subsystem refused to come up
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("window creation failed")]
    CreationFailed,

    /// Any other GLFW-reported failure
    #[error("GLFW error: {0}")]
    Glfw(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Initialize the display subsystem and create the native window.
    ///
    /// The configured logical size is scaled by the primary monitor's
    /// content scale so the window comes up the same physical size on
    /// high-DPI displays. Fatal on either init or creation failure; the
    /// caller must not continue the bring-up chain without a window.
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let scale = glfw.with_primary_monitor(|_, monitor| {
            monitor.map_or(1.0, |m| m.get_content_scale().0)
        });
        let width = (config.width as f32 * scale) as u32;
        let height = (config.height as f32 * scale) as u32;

        let (mut window, events) = glfw
            .create_window(width, height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_iconify_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Pump the platform event queue; events land in [`Self::flush_events`].
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Drain every event received since the last poll.
    pub fn flush_events(&self) -> glfw::FlushedMessages<'_, (f64, glfw::WindowEvent)> {
        glfw::flush_messages(&self.events)
    }

    /// Whether the platform asked this window to close.
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Whether the window is currently iconified.
    pub fn is_minimized(&self) -> bool {
        self.window.is_iconified()
    }

    /// Current framebuffer size as a Vulkan extent.
    pub fn framebuffer_extent(&self) -> vk::Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        vk::Extent2D {
            width: width as u32,
            height: height as u32,
        }
    }

    /// Instance extensions the platform requires for presentation.
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::Glfw("no Vulkan instance extensions reported".to_string()))
    }
}

unsafe impl HasRawWindowHandle for Window {
    fn raw_window_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }
}

unsafe impl HasRawDisplayHandle for Window {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        self.window.raw_display_handle()
    }
}
