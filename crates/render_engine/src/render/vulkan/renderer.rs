//! Top-level renderer: ordered bring-up, event loop and teardown
//!
//! Acquisition runs window → instance → surface → physical device →
//! logical device → allocator → draw target → swapchain, each stage
//! feeding the next and registering its release into the deletion
//! registry. A failure anywhere halts the chain; flushing the registry
//! then releases exactly what was acquired. Teardown is the reverse:
//! wait for the device to go idle, retire the current swapchain
//! generation, then drain the registry.

use ash::extensions::khr::Surface as SurfaceLoader;
use ash::vk;
use log::{error, info};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::config::RendererConfig;
use crate::render::vulkan::allocator::{self, DrawImage};
use crate::render::vulkan::deletion::DeletionRegistry;
use crate::render::vulkan::device::{self, DeviceSelection, LogicalDevice, PhysicalDeviceInfo};
use crate::render::vulkan::error::{VulkanError, VulkanResult};
use crate::render::vulkan::instance::{self, VulkanInstance};
use crate::render::vulkan::surface;
use crate::render::vulkan::swapchain::{Swapchain, SwapchainConfig};
use crate::render::vulkan::window::{Window, WindowError};

/// How long the loop yields per iteration while the window is minimized.
const MINIMIZED_IDLE: Duration = Duration::from_millis(10);

/// Renderer-level errors
#[derive(Error, Debug)]
pub enum RendererError {
    /// The display subsystem or window failed
    #[error(transparent)]
    Window(#[from] WindowError),

    /// A Vulkan bring-up stage failed
    #[error(transparent)]
    Vulkan(#[from] VulkanError),
}

/// Everything the acquisition chain produced, owned by the renderer for
/// its whole lifetime.
///
/// Populated stage by stage during bring-up; never partially destroyed
/// mid-run. The swapchain is the only field that is replaced while the
/// renderer lives (rebuilds), which is why it and its derived images stay
/// outside the deletion registry.
pub struct InitContext {
    /// Window and display-subsystem capability; dropped last, after the
    /// registry flush, which releases the native window and GLFW
    pub window: Window,
    /// Current framebuffer extent
    pub window_extent: vk::Extent2D,
    /// Instance bundle, including the extension list it was created with
    pub instance: VulkanInstance,
    /// Surface extension loader
    pub surface_loader: SurfaceLoader,
    /// Presentation surface
    pub surface: vk::SurfaceKHR,
    /// Selected physical device
    pub physical_device: PhysicalDeviceInfo,
    /// Logical device and queues
    pub device: LogicalDevice,
    /// Memory allocator; `None` once teardown handed the last reference
    /// to the registry
    pub allocator: Option<Arc<vk_mem::Allocator>>,
    /// Presentable image chain; `None` before the first build and after
    /// the pre-drain teardown step
    pub swapchain: Option<Swapchain>,
}

/// Per-swapchain-generation resources, regenerated on every rebuild.
#[derive(Default)]
pub struct RenderResources {
    /// Images owned by the current swapchain
    pub swapchain_images: Vec<vk::Image>,
    /// One view per swapchain image
    pub swapchain_image_views: Vec<vk::ImageView>,
    /// Offscreen draw target (created once; released via the registry)
    pub draw_image: Option<DrawImage>,
}

/// Owns the full bring-up state and the event loop.
pub struct Renderer {
    init: InitContext,
    resources: RenderResources,
    deletion: DeletionRegistry,
    swapchain_config: SwapchainConfig,
    torn_down: bool,
}

impl Renderer {
    /// Run the acquisition chain.
    ///
    /// Halts at the first failing stage; the release actions registered by
    /// the stages that did succeed are flushed before the error is
    /// returned, so a failed bring-up leaks nothing.
    pub fn new(config: &RendererConfig) -> Result<Self, RendererError> {
        let swapchain_config = SwapchainConfig {
            min_image_count: config.preferred_image_count,
            ..Default::default()
        };
        let mut deletion = DeletionRegistry::new();
        let mut resources = RenderResources::default();

        match Self::acquire(config, &swapchain_config, &mut deletion, &mut resources) {
            Ok(init) => {
                info!("Renderer initialized");
                Ok(Self {
                    init,
                    resources,
                    deletion,
                    swapchain_config,
                    torn_down: false,
                })
            }
            Err(err) => {
                deletion.flush();
                Err(err)
            }
        }
    }

    fn acquire(
        config: &RendererConfig,
        swapchain_config: &SwapchainConfig,
        deletion: &mut DeletionRegistry,
        resources: &mut RenderResources,
    ) -> Result<InitContext, RendererError> {
        let window = Window::new(&config.window)?;
        info!("Window created");

        let instance = instance::create_instance(
            &window,
            &config.application_name,
            config.enable_validation,
            deletion,
        )?;

        let (surface_loader, surface) =
            surface::create_surface(&instance.entry, &instance.instance, &window, deletion)?;

        let optional_extensions = device::optional_device_extensions();
        let selection = DeviceSelection {
            surface,
            surface_loader: &surface_loader,
            optional_extensions: &optional_extensions,
            prefer_discrete: true,
        };
        let physical_device = device::select_physical_device(&instance.instance, &selection)?;

        let device = device::create_logical_device(&instance.instance, &physical_device, deletion)?;

        let buffer_device_address =
            physical_device.has_extension(vk::KhrBufferDeviceAddressFn::name());
        let allocator = allocator::create_allocator(
            &instance.instance,
            physical_device.device,
            &device.device,
            buffer_device_address,
            deletion,
        )?;

        let window_extent = window.framebuffer_extent();
        resources.draw_image = Some(allocator::create_draw_image(
            &device.device,
            &allocator,
            window_extent,
            deletion,
        )?);

        let (swapchain, images, views) = Swapchain::build(
            &surface_loader,
            surface,
            physical_device.device,
            &device.device,
            &device.swapchain_loader,
            window_extent,
            swapchain_config,
            None,
        )?;
        resources.swapchain_images = images;
        resources.swapchain_image_views = views;

        Ok(InitContext {
            window,
            window_extent,
            instance,
            surface_loader,
            surface,
            physical_device,
            device,
            allocator: Some(allocator),
            swapchain: Some(swapchain),
        })
    }

    /// Current framebuffer extent.
    pub fn window_extent(&self) -> vk::Extent2D {
        self.init.window_extent
    }

    /// Offscreen draw target, if bring-up completed.
    pub fn draw_image(&self) -> Option<&DrawImage> {
        self.resources.draw_image.as_ref()
    }

    /// Run the event loop until a quit or close request arrives.
    ///
    /// Non-blocking poll model: every iteration drains the whole pending
    /// event batch before acting on it, so a quit in the middle of a batch
    /// still lets the rest of the batch be observed; the `done` flag is
    /// checked at the top of the next iteration. While the window is
    /// minimized the loop only sleeps briefly and re-polls.
    pub fn run(&mut self) {
        let mut done = false;
        while !done {
            self.init.window.poll_events();
            let batch = drain_events(self.init.window.flush_events());

            if batch.close_requested || self.init.window.should_close() {
                done = true;
            }

            if self.init.window.is_minimized() {
                thread::sleep(MINIMIZED_IDLE);
                continue;
            }

            if let Some(extent) = batch.resized {
                if let Err(err) = self.rebuild_swapchain(extent) {
                    // No retry policy: report and stop cleanly.
                    error!("Swapchain rebuild failed: {err}");
                    done = true;
                }
            }
        }
    }

    /// Rebuild the swapchain against the previous generation.
    ///
    /// The previous chain is handed to the builder as `old_swapchain` and
    /// destroyed only after the new chain and views exist; a failed build
    /// leaves the previous generation in place.
    fn rebuild_swapchain(&mut self, desired: vk::Extent2D) -> VulkanResult<()> {
        // Mid-resize the framebuffer can report zero; wait for a real size.
        if desired.width == 0 || desired.height == 0 {
            return Ok(());
        }

        unsafe { self.init.device.device.device_wait_idle() }.map_err(VulkanError::Api)?;

        let (fresh, images, views) = Swapchain::build(
            &self.init.surface_loader,
            self.init.surface,
            self.init.physical_device.device,
            &self.init.device.device,
            &self.init.device.swapchain_loader,
            desired,
            &self.swapchain_config,
            self.init.swapchain.as_ref(),
        )?;
        let extent = fresh.extent();

        // The new generation is live; retire the previous one.
        unsafe {
            for view in self.resources.swapchain_image_views.drain(..) {
                self.init.device.device.destroy_image_view(view, None);
            }
        }
        if let Some(old) = self.init.swapchain.replace(fresh) {
            old.destroy();
        }
        self.resources.swapchain_images = images;
        self.resources.swapchain_image_views = views;
        self.init.window_extent = extent;

        Ok(())
    }

    /// Tear everything down in reverse acquisition order.
    ///
    /// Waits for the device to go idle, destroys the current swapchain
    /// generation (views, then chain), hands the allocator's last
    /// reference to the registry and drains it. Idempotent; also invoked
    /// by `Drop`. The window goes down last, when the context drops.
    pub fn destroy(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        // Nothing in flight may outlive what teardown is about to destroy.
        if let Err(err) = unsafe { self.init.device.device.device_wait_idle() } {
            error!("Device wait-idle failed during teardown: {err}");
        }

        unsafe {
            for view in self.resources.swapchain_image_views.drain(..) {
                self.init.device.device.destroy_image_view(view, None);
            }
        }
        self.resources.swapchain_images.clear();
        self.resources.draw_image = None;
        if let Some(swapchain) = self.init.swapchain.take() {
            swapchain.destroy();
        }

        // The registry entry must hold the allocator's last reference so
        // VMA teardown happens at its slot in the flush.
        self.init.allocator = None;

        self.deletion.flush();
        info!("Renderer destroyed");
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// One polled batch of window events, fully drained before it is acted on.
#[derive(Debug, Default)]
struct EventBatch {
    close_requested: bool,
    resized: Option<vk::Extent2D>,
}

/// Fold a batch of window events into the decisions the loop acts on.
///
/// Always consumes the whole batch: a close request does not stop the
/// drain, and the last resize in the batch wins.
fn drain_events<I>(events: I) -> EventBatch
where
    I: IntoIterator<Item = (f64, glfw::WindowEvent)>,
{
    let mut batch = EventBatch::default();
    for (_, event) in events {
        match event {
            glfw::WindowEvent::Close => batch.close_requested = true,
            glfw::WindowEvent::FramebufferSize(width, height) => {
                batch.resized = Some(vk::Extent2D {
                    width: width as u32,
                    height: height as u32,
                });
            }
            _ => {}
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_request_still_drains_the_rest_of_the_batch() {
        let events = vec![
            (
                0.0,
                glfw::WindowEvent::Key(glfw::Key::Escape, 0, glfw::Action::Press, glfw::Modifiers::empty()),
            ),
            (0.0, glfw::WindowEvent::Close),
            (0.0, glfw::WindowEvent::FramebufferSize(640, 480)),
        ];
        let batch = drain_events(events);
        assert!(batch.close_requested);
        // The resize queued behind the close request was still observed.
        let resized = batch.resized.unwrap();
        assert_eq!(resized.width, 640);
        assert_eq!(resized.height, 480);
    }

    #[test]
    fn empty_batch_requests_nothing() {
        let batch = drain_events(Vec::new());
        assert!(!batch.close_requested);
        assert!(batch.resized.is_none());
    }

    #[test]
    fn latest_resize_in_a_batch_wins() {
        let events = vec![
            (0.0, glfw::WindowEvent::FramebufferSize(800, 600)),
            (0.0, glfw::WindowEvent::FramebufferSize(1024, 768)),
        ];
        let batch = drain_events(events);
        let resized = batch.resized.unwrap();
        assert_eq!(resized.width, 1024);
        assert_eq!(resized.height, 768);
    }
}
