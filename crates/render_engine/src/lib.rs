//! # Render Engine
//!
//! A Vulkan bring-up core: it negotiates the instance, presentation surface,
//! physical and logical device, memory allocator and swapchain for a native
//! window, and tears everything down again in strict reverse acquisition
//! order through a deletion registry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::config::RendererConfig;
//! use render_engine::render::vulkan::Renderer;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     render_engine::foundation::logging::init();
//!     let mut renderer = Renderer::new(&RendererConfig::default())?;
//!     renderer.run();
//!     renderer.destroy();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

pub use config::{ConfigError, RendererConfig, WindowConfig};
pub use render::vulkan::{Renderer, RendererError};
