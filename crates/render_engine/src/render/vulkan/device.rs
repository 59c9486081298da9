//! Physical device selection and logical device creation
//!
//! Selection takes an explicit criteria struct and returns either the best
//! matching device (discrete GPUs outrank integrated and software ones) or
//! the full list of per-candidate rejection reasons. Requested device
//! extensions beyond the swapchain are enabled only when present; a missing
//! one is a warning, not a failure.

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::ffi::{CStr, CString};

use crate::render::vulkan::deletion::DeletionRegistry;
use crate::render::vulkan::error::{VulkanError, VulkanResult};

/// Device extensions requested when present; absence only logs a warning.
pub fn optional_device_extensions() -> [&'static CStr; 4] {
    [
        vk::KhrBufferDeviceAddressFn::name(),
        vk::ExtDescriptorIndexingFn::name(),
        vk::KhrDynamicRenderingFn::name(),
        vk::KhrSynchronization2Fn::name(),
    ]
}

/// Selection constraints for picking a physical device.
pub struct DeviceSelection<'a> {
    /// Surface the device must be able to present to
    pub surface: vk::SurfaceKHR,
    /// Loader for surface support queries
    pub surface_loader: &'a SurfaceLoader,
    /// Extensions to enable if present
    pub optional_extensions: &'a [&'a CStr],
    /// Rank discrete GPUs above integrated and software implementations
    pub prefer_discrete: bool,
}

/// Selected physical device and the queue/extension facts derived from it.
pub struct PhysicalDeviceInfo {
    /// Physical device handle (not destroyed; owned by the instance)
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Extensions that will be enabled on the logical device
    pub enabled_extensions: Vec<CString>,
    /// Requested extensions this device does not offer
    pub missing_extensions: Vec<CString>,
}

impl PhysicalDeviceInfo {
    /// Human-readable device name.
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Whether the named extension will be enabled on the logical device.
    pub fn has_extension(&self, name: &CStr) -> bool {
        self.enabled_extensions.iter().any(|e| e.as_c_str() == name)
    }
}

/// Select the physical device best satisfying the constraints.
///
/// Fatal when no candidate supports presentation to the surface plus the
/// swapchain extension; the error carries one rejection reason per
/// candidate. Physical devices register no release action.
pub fn select_physical_device(
    instance: &Instance,
    selection: &DeviceSelection<'_>,
) -> VulkanResult<PhysicalDeviceInfo> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(VulkanError::Api)?
    };

    let mut rejections = Vec::new();
    let mut best: Option<(u32, PhysicalDeviceInfo)> = None;

    for device in devices {
        match evaluate_device(instance, device, selection) {
            Ok(info) => {
                let rank = if selection.prefer_discrete {
                    device_type_rank(info.properties.device_type)
                } else {
                    0
                };
                if best.as_ref().map_or(true, |(r, _)| rank > *r) {
                    best = Some((rank, info));
                }
            }
            Err(reason) => {
                debug!("Rejected candidate: {reason}");
                rejections.push(reason);
            }
        }
    }

    let Some((_, info)) = best else {
        return Err(VulkanError::NoSuitableDevice { reasons: rejections });
    };

    info!("Selected GPU: {}", info.name());
    for missing in &info.missing_extensions {
        warn!(
            "Device extension {} not supported by {}; continuing without it",
            missing.to_string_lossy(),
            info.name()
        );
    }

    Ok(info)
}

fn evaluate_device(
    instance: &Instance,
    device: vk::PhysicalDevice,
    selection: &DeviceSelection<'_>,
) -> Result<PhysicalDeviceInfo, String> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut graphics_family = None;
    let mut present_family = None;
    for (index, family) in queue_families.iter().enumerate() {
        let index = index as u32;
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
            graphics_family = Some(index);
        }
        let present_support = unsafe {
            selection
                .surface_loader
                .get_physical_device_surface_support(device, index, selection.surface)
                .map_err(|e| format!("{name}: surface support query failed ({e})"))?
        };
        if present_support && present_family.is_none() {
            present_family = Some(index);
        }
    }

    let graphics_family = graphics_family.ok_or_else(|| format!("{name}: no graphics queue family"))?;
    let present_family =
        present_family.ok_or_else(|| format!("{name}: no presentation support for the surface"))?;

    let available: HashSet<CString> = unsafe {
        instance
            .enumerate_device_extension_properties(device)
            .map_err(|e| format!("{name}: extension enumeration failed ({e})"))?
    }
    .iter()
    .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
    .collect();

    let swapchain_name = SwapchainLoader::name();
    if !available.contains(swapchain_name) {
        return Err(format!(
            "{name}: missing {}",
            swapchain_name.to_string_lossy()
        ));
    }

    let (mut enabled_extensions, missing_extensions) =
        partition_extensions(selection.optional_extensions, &available);
    enabled_extensions.insert(0, swapchain_name.to_owned());

    Ok(PhysicalDeviceInfo {
        device,
        properties,
        graphics_family,
        present_family,
        enabled_extensions,
        missing_extensions,
    })
}

/// Split requested extensions into the ones the device offers and the rest.
fn partition_extensions(
    requested: &[&CStr],
    available: &HashSet<CString>,
) -> (Vec<CString>, Vec<CString>) {
    let mut enabled = Vec::new();
    let mut missing = Vec::new();
    for &name in requested {
        if available.contains(name) {
            enabled.push(name.to_owned());
        } else {
            missing.push(name.to_owned());
        }
    }
    (enabled, missing)
}

fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    if device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        3
    } else if device_type == vk::PhysicalDeviceType::INTEGRATED_GPU {
        2
    } else if device_type == vk::PhysicalDeviceType::VIRTUAL_GPU {
        1
    } else {
        0
    }
}

/// Logical device bundle: handle, queues and the swapchain loader.
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

/// Create the logical device and its queues from the selected device.
///
/// Feature structs for buffer-device-address, dynamic rendering and
/// synchronization2 are chained only when the matching extension was
/// enabled. Registers a release action that destroys the device.
pub fn create_logical_device(
    instance: &Instance,
    physical: &PhysicalDeviceInfo,
    deletion: &mut DeletionRegistry,
) -> VulkanResult<LogicalDevice> {
    let unique_families: HashSet<u32> = [physical.graphics_family, physical.present_family]
        .iter()
        .copied()
        .collect();

    let priorities = [1.0f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&priorities)
                .build()
        })
        .collect();

    let extension_ptrs: Vec<*const i8> = physical
        .enabled_extensions
        .iter()
        .map(|e| e.as_ptr())
        .collect();

    let features = vk::PhysicalDeviceFeatures::default();

    let mut buffer_device_address = vk::PhysicalDeviceBufferDeviceAddressFeatures::builder()
        .buffer_device_address(true);
    let mut dynamic_rendering =
        vk::PhysicalDeviceDynamicRenderingFeatures::builder().dynamic_rendering(true);
    let mut synchronization2 =
        vk::PhysicalDeviceSynchronization2Features::builder().synchronization2(true);

    let mut create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_ptrs)
        .enabled_features(&features);
    if physical.has_extension(vk::KhrBufferDeviceAddressFn::name()) {
        create_info = create_info.push_next(&mut buffer_device_address);
    }
    if physical.has_extension(vk::KhrDynamicRenderingFn::name()) {
        create_info = create_info.push_next(&mut dynamic_rendering);
    }
    if physical.has_extension(vk::KhrSynchronization2Fn::name()) {
        create_info = create_info.push_next(&mut synchronization2);
    }

    let device = unsafe {
        instance
            .create_device(physical.device, &create_info, None)
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to create device: {e}")))?
    };

    let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
    let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
    let swapchain_loader = SwapchainLoader::new(instance, &device);

    let release_device = device.clone();
    deletion.register(move || unsafe {
        release_device.destroy_device(None);
    });

    info!("Device created");

    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
        graphics_family: physical.graphics_family,
        present_family: physical.present_family,
        swapchain_loader,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension_set(names: &[&CStr]) -> HashSet<CString> {
        names.iter().map(|&n| n.to_owned()).collect()
    }

    #[test]
    fn partition_keeps_all_present_extensions() {
        let requested = optional_device_extensions();
        let available = extension_set(&requested);
        let (enabled, missing) = partition_extensions(&requested, &available);
        assert_eq!(enabled.len(), 4);
        assert!(missing.is_empty());
    }

    #[test]
    fn one_absent_extension_is_missing_not_fatal() {
        let requested = optional_device_extensions();
        // Everything but synchronization2 is available.
        let available = extension_set(&requested[..3]);
        let (enabled, missing) = partition_extensions(&requested, &available);
        assert_eq!(enabled.len(), 3);
        assert_eq!(missing, vec![vk::KhrSynchronization2Fn::name().to_owned()]);
    }

    #[test]
    fn discrete_devices_outrank_everything_else() {
        let discrete = device_type_rank(vk::PhysicalDeviceType::DISCRETE_GPU);
        let integrated = device_type_rank(vk::PhysicalDeviceType::INTEGRATED_GPU);
        let cpu = device_type_rank(vk::PhysicalDeviceType::CPU);
        assert!(discrete > integrated);
        assert!(integrated > cpu);
    }
}
