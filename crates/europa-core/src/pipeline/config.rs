use serde::{Deserialize, Serialize};

use crate::autocuts::{AutoCutMethod, AutoCutParams};
use crate::consts::{
    DEFAULT_HASH_EXPO, DEFAULT_HASH_SIZE, DEFAULT_MAX_AUTO_ZOOM, DEFAULT_MIN_AUTO_ZOOM,
};
use crate::rgbmap::HashAlgorithm;
use crate::viewport::AutoMode;

/// Construction-time settings for a [`RenderPipeline`].
///
/// Every field has a default, so a partial document deserializes into a
/// usable configuration.
///
/// [`RenderPipeline`]: crate::pipeline::RenderPipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Mirror data horizontally.
    #[serde(default)]
    pub flip_x: bool,
    /// Mirror data vertically.
    #[serde(default)]
    pub flip_y: bool,
    /// Transpose the data axes.
    #[serde(default)]
    pub swap_xy: bool,
    #[serde(default = "default_zoom")]
    pub zoom_level: i32,
    #[serde(default = "default_pan")]
    pub pan_x: f64,
    #[serde(default = "default_pan")]
    pub pan_y: f64,
    #[serde(default = "default_auto_mode")]
    pub autozoom: AutoMode,
    #[serde(default = "default_auto_mode")]
    pub autolevels: AutoMode,
    #[serde(default = "default_autocut_method")]
    pub autocut_method: AutoCutMethod,
    #[serde(default)]
    pub autocut_params: AutoCutParams,
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: HashAlgorithm,
    #[serde(default = "default_hash_size")]
    pub hash_size: usize,
    #[serde(default = "default_hash_expo")]
    pub hash_expo: f64,
    #[serde(default = "default_min_auto_zoom")]
    pub min_auto_zoom: i32,
    #[serde(default = "default_max_auto_zoom")]
    pub max_auto_zoom: i32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            flip_x: false,
            flip_y: false,
            swap_xy: false,
            zoom_level: default_zoom(),
            pan_x: default_pan(),
            pan_y: default_pan(),
            autozoom: default_auto_mode(),
            autolevels: default_auto_mode(),
            autocut_method: default_autocut_method(),
            autocut_params: AutoCutParams::default(),
            hash_algorithm: default_hash_algorithm(),
            hash_size: default_hash_size(),
            hash_expo: default_hash_expo(),
            min_auto_zoom: default_min_auto_zoom(),
            max_auto_zoom: default_max_auto_zoom(),
        }
    }
}

fn default_zoom() -> i32 {
    1
}

fn default_pan() -> f64 {
    0.5
}

fn default_auto_mode() -> AutoMode {
    AutoMode::On
}

fn default_autocut_method() -> AutoCutMethod {
    AutoCutMethod::Histogram
}

fn default_hash_algorithm() -> HashAlgorithm {
    HashAlgorithm::Linear
}

fn default_hash_size() -> usize {
    DEFAULT_HASH_SIZE
}

fn default_hash_expo() -> f64 {
    DEFAULT_HASH_EXPO
}

fn default_min_auto_zoom() -> i32 {
    DEFAULT_MIN_AUTO_ZOOM
}

fn default_max_auto_zoom() -> i32 {
    DEFAULT_MAX_AUTO_ZOOM
}
