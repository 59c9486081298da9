//! VMA-backed GPU memory allocator and the offscreen draw target
//!
//! The allocator is shared as an `Arc`: its registry entry holds the final
//! reference, and the renderer drops the context's clone before flushing,
//! so destruction happens at exactly the entry's LIFO slot — after every
//! allocation registered later, before the device registered earlier.

use ash::{vk, Device, Instance};
use log::info;
use std::sync::Arc;
use vk_mem::Alloc;

use crate::render::vulkan::deletion::DeletionRegistry;
use crate::render::vulkan::error::{VulkanError, VulkanResult};
use crate::render::vulkan::instance::REQUIRED_API_VERSION;

/// Create the memory allocator and register its release.
///
/// Device-address support is requested only when the device enabled the
/// buffer-device-address extension.
pub fn create_allocator(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    device: &Device,
    buffer_device_address: bool,
    deletion: &mut DeletionRegistry,
) -> VulkanResult<Arc<vk_mem::Allocator>> {
    let mut flags = vk_mem::AllocatorCreateFlags::empty();
    if buffer_device_address {
        flags |= vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;
    }

    let create_info = vk_mem::AllocatorCreateInfo::new(instance, device, physical_device)
        .vulkan_api_version(REQUIRED_API_VERSION)
        .flags(flags);

    let allocator = unsafe { vk_mem::Allocator::new(create_info) }
        .map_err(|e| VulkanError::InitializationFailed(format!("Failed to create allocator: {e}")))?;
    let allocator = Arc::new(allocator);

    let release_allocator = Arc::clone(&allocator);
    deletion.register(move || {
        // Last reference; dropping it destroys the VMA allocator here, in
        // registry order.
        drop(release_allocator);
    });

    info!("Allocator created");

    Ok(allocator)
}

/// Offscreen draw target allocated through VMA.
///
/// The image's allocation lives inside its release action; the resources
/// struct only keeps the handles the renderer works with.
pub struct DrawImage {
    /// Image handle
    pub image: vk::Image,
    /// Full-image color view
    pub view: vk::ImageView,
    /// Image extent (depth 1)
    pub extent: vk::Extent3D,
    /// Image format
    pub format: vk::Format,
}

/// Create the 16-bit float offscreen draw target and register its release.
pub fn create_draw_image(
    device: &Device,
    allocator: &Arc<vk_mem::Allocator>,
    extent: vk::Extent2D,
    deletion: &mut DeletionRegistry,
) -> VulkanResult<DrawImage> {
    let format = vk::Format::R16G16B16A16_SFLOAT;
    let extent3d = vk::Extent3D {
        width: extent.width,
        height: extent.height,
        depth: 1,
    };

    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(extent3d)
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::STORAGE
                | vk::ImageUsageFlags::COLOR_ATTACHMENT,
        );

    let allocation_info = vk_mem::AllocationCreateInfo {
        usage: vk_mem::MemoryUsage::AutoPreferDevice,
        required_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ..Default::default()
    };

    let (image, allocation) = unsafe { allocator.create_image(&image_info, &allocation_info) }
        .map_err(VulkanError::Api)?;

    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = match unsafe { device.create_image_view(&view_info, None) } {
        Ok(view) => view,
        Err(e) => {
            // Nothing registered yet; undo the image before bailing.
            let mut allocation = allocation;
            unsafe { allocator.destroy_image(image, &mut allocation) };
            return Err(VulkanError::Api(e));
        }
    };

    let release_device = device.clone();
    let release_allocator = Arc::clone(allocator);
    deletion.register(move || {
        let mut allocation = allocation;
        unsafe {
            release_device.destroy_image_view(view, None);
            release_allocator.destroy_image(image, &mut allocation);
        }
    });

    info!("Draw target created ({}x{})", extent.width, extent.height);

    Ok(DrawImage {
        image,
        view,
        extent: extent3d,
        format,
    })
}
