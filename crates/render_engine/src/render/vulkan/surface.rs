//! Presentation surface bound to a window and instance

use ash::extensions::khr;
use ash::{vk, Entry, Instance};
use log::info;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use crate::render::vulkan::deletion::DeletionRegistry;
use crate::render::vulkan::error::{VulkanError, VulkanResult};

/// Create a presentation surface for a window.
///
/// Registers a release action scoped to the (loader, surface) pair as it
/// exists at registration time.
pub fn create_surface<W>(
    entry: &Entry,
    instance: &Instance,
    window: &W,
    deletion: &mut DeletionRegistry,
) -> VulkanResult<(khr::Surface, vk::SurfaceKHR)>
where
    W: HasRawWindowHandle + HasRawDisplayHandle,
{
    let surface_loader = khr::Surface::new(entry, instance);

    let surface = unsafe {
        ash_window::create_surface(
            entry,
            instance,
            window.raw_display_handle(),
            window.raw_window_handle(),
            None,
        )
        .map_err(|e| VulkanError::InitializationFailed(format!("Failed to create surface: {e}")))?
    };

    let release_loader = surface_loader.clone();
    deletion.register(move || unsafe {
        release_loader.destroy_surface(surface, None);
    });

    info!("Surface created");

    Ok((surface_loader, surface))
}
