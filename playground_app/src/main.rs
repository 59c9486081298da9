//! Compute playground launcher
//!
//! Brings the full Vulkan context up for a window (instance, device,
//! allocator, swapchain), runs the event loop until the window is closed,
//! then tears everything down in reverse order.

use render_engine::config::RendererConfig;
use render_engine::foundation::logging;
use render_engine::render::vulkan::Renderer;

fn main() {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match RendererConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("Failed to load config {path}: {err}");
                std::process::exit(1);
            }
        },
        None => RendererConfig::default(),
    };

    let mut renderer = match Renderer::new(&config) {
        Ok(renderer) => renderer,
        Err(err) => {
            log::error!("Renderer initialization failed: {err}");
            std::process::exit(1);
        }
    };

    renderer.run();
    renderer.destroy();
}
