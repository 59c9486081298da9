//! Error types for the Vulkan backend

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A bring-up stage failed; the message names the stage and the cause
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device satisfied the selection criteria.
    ///
    /// Carries one human-readable rejection reason per candidate device.
    #[error("no suitable GPU found:\n{}", .reasons.join("\n"))]
    NoSuitableDevice {
        /// Per-candidate rejection reasons
        reasons: Vec<String>,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
