//! Vulkan backend: dependency-ordered resource acquisition and release
//!
//! Bring-up proceeds window → instance → surface → physical device →
//! logical device → allocator → draw target → swapchain; each stage
//! registers exactly one release action into the [`DeletionRegistry`]
//! immediately after it succeeds. Teardown drains the registry once, in
//! reverse registration order, after an explicit device-idle wait and the
//! pre-drain destruction of the current swapchain generation. A failure at
//! any stage halts the chain; flushing the registry then releases exactly
//! the resources that were acquired.

pub mod allocator;
pub mod deletion;
pub mod device;
pub mod error;
pub mod instance;
pub mod renderer;
pub mod surface;
pub mod swapchain;
pub mod window;

pub use deletion::{DeletionRegistry, ReleaseAction};
pub use error::{VulkanError, VulkanResult};
pub use renderer::{InitContext, RenderResources, Renderer, RendererError};
pub use window::{Window, WindowError};
