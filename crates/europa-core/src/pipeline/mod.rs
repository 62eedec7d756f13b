mod render;

pub mod config;

pub use config::ViewerConfig;
pub use render::{CacheStage, RenderPipeline, RenderStats, RgbFrame};
