//! Swapchain creation and rebuild against a previous generation
//!
//! The chain moves through Absent → Building → Ready; a resize takes it
//! Ready → Building → Ready again. Building always receives the previous
//! generation's handle as `old_swapchain`, and the previous generation is
//! destroyed only after the new chain and its views fully exist. A failed
//! build leaves the previous generation untouched.

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::{vk, Device};
use log::info;

use crate::render::vulkan::error::{VulkanError, VulkanResult};

/// Build parameters shared by initial creation and rebuilds.
pub struct SwapchainConfig {
    /// Minimum number of images to request (3 = triple buffering)
    pub min_image_count: u32,
    /// Usage flags needed by consumers beyond color attachment
    /// (transfer-destination for blit-based presentation)
    pub extra_usage: vk::ImageUsageFlags,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            min_image_count: 3,
            extra_usage: vk::ImageUsageFlags::TRANSFER_DST,
        }
    }
}

/// A ready presentable image chain.
///
/// Images and views derived from it live in the renderer's resources; this
/// type owns only the handle, which is destroyed explicitly (never by
/// `Drop`) so replacement order stays under the renderer's control.
pub struct Swapchain {
    loader: SwapchainLoader,
    handle: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Build a swapchain, reusing `previous` as the old swapchain if given.
    ///
    /// Returns the ready chain together with its images and per-image
    /// views. On any failure everything built so far is destroyed and
    /// `previous` is left exactly as it was.
    pub fn build(
        surface_loader: &SurfaceLoader,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
        device: &Device,
        swapchain_loader: &SwapchainLoader,
        desired_extent: vk::Extent2D,
        config: &SwapchainConfig,
        previous: Option<&Swapchain>,
    ) -> VulkanResult<(Self, Vec<vk::Image>, Vec<vk::ImageView>)> {
        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        let format = choose_surface_format(&surface_formats);
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&surface_caps, desired_extent);
        let image_count = choose_image_count(&surface_caps, config.min_image_count);

        let old_handle = previous.map_or(vk::SwapchainKHR::null(), |p| p.handle);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | config.extra_usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_handle);

        let handle = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    VulkanError::InitializationFailed(format!("Failed to create swapchain: {e}"))
                })?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(handle, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            match unsafe { device.create_image_view(&view_info, None) } {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    // Unwind this generation; the previous one stays valid.
                    unsafe {
                        for view in image_views {
                            device.destroy_image_view(view, None);
                        }
                        swapchain_loader.destroy_swapchain(handle, None);
                    }
                    return Err(VulkanError::Api(e));
                }
            }
        }

        info!(
            "Swapchain created ({}x{}, {} images)",
            extent.width,
            extent.height,
            images.len()
        );

        Ok((
            Self {
                loader: swapchain_loader.clone(),
                handle,
                format,
                extent,
            },
            images,
            image_views,
        ))
    }

    /// Swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Surface format the chain was created with.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Extent the chain was created with.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Destroy the swapchain handle.
    ///
    /// Callers destroy the generation's image views first; a replacement
    /// chain must already have been built from this one's handle.
    pub fn destroy(self) {
        unsafe {
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}

/// Prefer sRGB B8G8R8A8; fall back to the first reported format.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_SRGB
                && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Prefer MAILBOX; FIFO is the guaranteed fallback.
fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's fixed extent when it has one, else clamp the desired
/// extent into the supported range.
fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: desired
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: desired
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Clamp the requested minimum image count into the supported range
/// (`max_image_count == 0` means no upper limit).
fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, desired_min: u32) -> u32 {
    let count = desired_min.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_format_is_preferred_when_available() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn first_format_is_the_fallback() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn fifo_is_the_present_mode_fallback() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn extent_is_clamped_when_surface_leaves_it_free() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 2048,
                height: 2048,
            },
            ..Default::default()
        };
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 4096,
                height: 32,
            },
        );
        assert_eq!(extent.width, 2048);
        assert_eq!(extent.height, 64);
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 800,
            },
            ..Default::default()
        };
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 640,
                height: 480,
            },
        );
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 800);
    }

    #[test]
    fn image_count_respects_surface_limits() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps, 3), 2);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&unbounded, 3), 3);
    }
}
