//! Demo configuration and logger setup.

use std::{
    path::{Path, PathBuf},
    sync::Once,
};

use crate::pipelines::state::FillMode;

/// Where assets are looked up.
///
/// Every lookup tries `root` first and `fallback` second. The fallback defaults
/// to the copy of `assets/` that the build script places in the build output
/// directory, so the binary also finds its shaders when started from elsewhere.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub root: PathBuf,
    pub fallback: PathBuf,
}

impl AssetPaths {
    pub fn new(root: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fallback: fallback.into(),
        }
    }

    pub fn primary(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn secondary(&self, file_name: &str) -> PathBuf {
        self.fallback.join(file_name)
    }
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self::new(
            Path::new("./").join("assets"),
            Path::new(env!("OUT_DIR")).join("assets"),
        )
    }
}

/// Everything the demo reads at start-up.
///
/// The render parameters are only initial values; they can be changed at
/// runtime through the keyboard controls.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub assets: AssetPaths,
    pub clear_colour: [f32; 4],
    pub fill_mode: FillMode,
    pub tessellation_amount: f32,
    pub height_scale: f32,
    pub height_bias: f32,
    pub camera_speed: f32,
    /// Drag rotation in radians per pixel.
    pub camera_sensitivity: f32,
    pub logging: LoggingConfig,
}

impl DemoConfig {
    pub const MAX_TESSELLATION_AMOUNT: f32 = 50.0;
    pub const MAX_HEIGHT_PARAM: f32 = 5.0;

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Tessellation Demo".to_string(),
            width: 1280,
            height: 720,
            assets: AssetPaths::default(),
            clear_colour: [0.0, 0.0, 0.0, 0.0],
            fill_mode: FillMode::Solid,
            tessellation_amount: 10.0,
            height_scale: 0.5,
            height_bias: 1.0,
            camera_speed: 4.0,
            camera_sensitivity: 0.005,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "tess_demo=debug,wgpu=warn"). When unset, `RUST_LOG` is used, then `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = &config.env_filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder
                .filter_level(log::LevelFilter::Info)
                .filter_module("wgpu_core", log::LevelFilter::Warn)
                .filter_module("wgpu_hal", log::LevelFilter::Warn)
                .filter_module("naga", log::LevelFilter::Warn);
        }

        builder.write_style(config.write_style);

        if let Err(e) = builder.try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        }
        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_window() {
        let config = DemoConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert!((config.aspect_ratio() - 1280.0 / 720.0).abs() < 1e-6);
        assert_eq!(config.tessellation_amount, 10.0);
        assert_eq!(config.height_scale, 0.5);
        assert_eq!(config.height_bias, 1.0);
        assert_eq!(config.fill_mode, FillMode::Solid);
    }

    #[test]
    fn asset_paths_join_primary_and_fallback_roots() {
        let paths = AssetPaths::new("a", "b");
        assert_eq!(paths.primary("shaders/x.wgsl"), Path::new("a/shaders/x.wgsl"));
        assert_eq!(paths.secondary("shaders/x.wgsl"), Path::new("b/shaders/x.wgsl"));
    }
}
