pub mod constants;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod util {
    pub mod config;
    pub mod file_utils;
    pub mod heatmap;
    pub mod logger;
    pub mod model_logger;
    pub mod motion_intensity;
}

/// Build-time package information generated by `built`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
