//! Vulkan instance creation with validation and debug-utils reporting

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use log::info;
use std::ffi::{CStr, CString};

use crate::render::vulkan::deletion::DeletionRegistry;
use crate::render::vulkan::error::{VulkanError, VulkanResult};
use crate::render::vulkan::window::Window;

/// Minimum Vulkan version the bring-up chain targets.
pub const REQUIRED_API_VERSION: u32 = vk::API_VERSION_1_3;

/// Instance bundle: entry points, instance handle, debug messenger and the
/// extension list the instance was created with.
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Debug utilities extension loader
    pub debug_utils: DebugUtils,
    /// Debug messenger handle; null when validation is disabled
    pub debug_messenger: vk::DebugUtilsMessengerEXT,
    /// Extensions the instance was created with
    pub enabled_extensions: Vec<CString>,
}

/// Create the instance and attach the diagnostic message handler.
///
/// The extension list is the window's platform surface requirements plus
/// the device-properties query and debug-utilities extensions. Registers a
/// single release action that destroys the messenger and then the instance.
pub fn create_instance(
    window: &Window,
    app_name: &str,
    enable_validation: bool,
    deletion: &mut DeletionRegistry,
) -> VulkanResult<VulkanInstance> {
    let entry = unsafe { Entry::load() }
        .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

    let mut enabled_extensions: Vec<CString> = window
        .required_instance_extensions()
        .map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to get surface extensions: {e}"))
        })?
        .into_iter()
        .map(|name| CString::new(name).unwrap())
        .collect();
    enabled_extensions.push(vk::KhrGetPhysicalDeviceProperties2Fn::name().to_owned());
    enabled_extensions.push(DebugUtils::name().to_owned());

    let extension_ptrs: Vec<*const i8> = enabled_extensions.iter().map(|e| e.as_ptr()).collect();

    let layer_names = if enable_validation {
        vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
    } else {
        vec![]
    };
    let layer_ptrs: Vec<*const i8> = layer_names.iter().map(|l| l.as_ptr()).collect();

    let app_name_cstr = CString::new(app_name).unwrap();
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name_cstr)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&app_name_cstr)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(REQUIRED_API_VERSION);

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs);

    let instance = unsafe {
        entry
            .create_instance(&create_info, None)
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to create instance: {e}")))?
    };

    let debug_utils = DebugUtils::new(&entry, &instance);
    let debug_messenger = if enable_validation {
        let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        match unsafe { debug_utils.create_debug_utils_messenger(&messenger_info, None) } {
            Ok(messenger) => messenger,
            Err(e) => {
                // The instance exists but nothing was registered for it yet.
                unsafe { instance.destroy_instance(None) };
                return Err(VulkanError::Api(e));
            }
        }
    } else {
        vk::DebugUtilsMessengerEXT::null()
    };

    // One release action per acquired resource: the messenger belongs to
    // the instance and goes down with it.
    let release_utils = debug_utils.clone();
    let release_instance = instance.clone();
    let release_messenger = debug_messenger;
    deletion.register(move || unsafe {
        if release_messenger != vk::DebugUtilsMessengerEXT::null() {
            release_utils.destroy_debug_utils_messenger(release_messenger, None);
        }
        release_instance.destroy_instance(None);
    });

    info!("Instance created ({} extensions)", enabled_extensions.len());

    Ok(VulkanInstance {
        entry,
        instance,
        debug_utils,
        debug_messenger,
        enabled_extensions,
    })
}

/// Debug callback for validation layers; routes by severity.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
