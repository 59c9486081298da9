//! Renderer and window configuration
//!
//! TOML-backed configuration with serde derives. Every field has a default,
//! so a partial config file (or none at all) yields a usable setup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window creation parameters.
///
/// Width and height are logical sizes; the window capability scales them by
/// the primary monitor's content scale before creating the native window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Logical width in pixels
    pub width: u32,
    /// Logical height in pixels
    pub height: u32,
    /// Whether the window can be resized by the user
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Compute Playground".to_string(),
            width: 1280,
            height: 800,
            resizable: true,
        }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan instance
    pub application_name: String,
    /// Window creation parameters
    pub window: WindowConfig,
    /// Whether to enable the Khronos validation layer and debug messenger
    pub enable_validation: bool,
    /// Minimum number of swapchain images to request (3 = triple buffering)
    pub preferred_image_count: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Compute Playground".to_string(),
            window: WindowConfig::default(),
            enable_validation: true,
            preferred_image_count: 3,
        }
    }
}

impl RendererConfig {
    /// Load a configuration from a TOML file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_playground_setup() {
        let config = RendererConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 800);
        assert!(config.window.resizable);
        assert!(config.enable_validation);
        assert_eq!(config.preferred_image_count, 3);
    }

    #[test]
    fn partial_toml_fills_missing_fields() {
        let config: RendererConfig = toml::from_str(
            r#"
            application_name = "Test App"

            [window]
            width = 640
            "#,
        )
        .unwrap();
        assert_eq!(config.application_name, "Test App");
        assert_eq!(config.window.width, 640);
        // Everything not named in the file keeps its default.
        assert_eq!(config.window.height, 800);
        assert_eq!(config.preferred_image_count, 3);
    }
}
