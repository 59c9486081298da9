//! Rendering subsystem
//!
//! The only backend is Vulkan; everything public lives under [`vulkan`].

pub mod vulkan;

pub use vulkan::{Renderer, RendererError};
