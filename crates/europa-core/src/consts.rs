/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Number of output display levels produced by the quantization hash.
pub const HASH_LEVELS: usize = 256;

/// Default quantization hash table length.
pub const DEFAULT_HASH_SIZE: usize = 65_536;

/// Smallest accepted hash table length (the hash must resolve more than
/// 255 input levels to be useful).
pub const MIN_HASH_SIZE: usize = 256;

/// Largest accepted hash table length.
pub const MAX_HASH_SIZE: usize = 1_048_576;

/// Default exponent for the logarithmic and exponential hash curves.
pub const DEFAULT_HASH_EXPO: f64 = 4.0;

/// Default number of bins for the histogram autocut method.
pub const DEFAULT_NUM_BINS: usize = 2_048;

/// Default fraction of pixels retained inside the histogram cut levels
/// (the discarded tails are symmetric).
pub const DEFAULT_HIST_PCT: f64 = 0.999;

/// Default half-width (in pixels) of the centered crop sampled by the
/// histogram autocut on large images.
pub const DEFAULT_CROP_RADIUS: usize = 512;

/// Side length of the square median smoothing window used by the median
/// autocut method.
pub const MEDIAN_SMOOTH_WINDOW: usize = 7;

/// Default low offset (percentile-like, 50 = mean) for the stddev autocut
/// method. Reproduces the historical viewer's levels.
pub const DEFAULT_STDDEV_LO: f32 = 35.0;

/// Default high offset for the stddev autocut method.
pub const DEFAULT_STDDEV_HI: f32 = 90.0;

/// Default clamp range for automatically chosen zoom levels.
pub const DEFAULT_MIN_AUTO_ZOOM: i32 = -20;

/// See [`DEFAULT_MIN_AUTO_ZOOM`].
pub const DEFAULT_MAX_AUTO_ZOOM: i32 = 100;
