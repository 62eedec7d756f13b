use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, ArrayViewD, Axis, Slice};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CROP_RADIUS, DEFAULT_HIST_PCT, DEFAULT_NUM_BINS, DEFAULT_STDDEV_HI, DEFAULT_STDDEV_LO,
    MEDIAN_SMOOTH_WINDOW, PARALLEL_PIXEL_THRESHOLD,
};
use crate::error::{EuropaError, Result};

/// Statistical method used to derive (lo, hi) cut levels from a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoCutMethod {
    MinMax,
    StdDev,
    Median,
    Histogram,
}

impl fmt::Display for AutoCutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinMax => write!(f, "minmax"),
            Self::StdDev => write!(f, "stddev"),
            Self::Median => write!(f, "median"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}

impl FromStr for AutoCutMethod {
    type Err = EuropaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minmax" => Ok(Self::MinMax),
            "stddev" => Ok(Self::StdDev),
            "median" => Ok(Self::Median),
            "histogram" => Ok(Self::Histogram),
            other => Err(EuropaError::UnknownAutoCutMethod(other.to_string())),
        }
    }
}

/// Methods usable on this build. The median smoothing filter is built in,
/// so all four methods are always advertised; callers should still consult
/// this list rather than hardcoding names.
pub fn available_methods() -> &'static [AutoCutMethod] {
    &[
        AutoCutMethod::MinMax,
        AutoCutMethod::StdDev,
        AutoCutMethod::Median,
        AutoCutMethod::Histogram,
    ]
}

/// Tunable parameters for the autocut methods.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutoCutParams {
    /// Histogram bin count.
    pub num_bins: usize,
    /// Fraction of pixels retained inside [lo, hi] by the histogram method.
    pub hist_pct: f64,
    /// Half-width of the centered square crop sampled by the histogram
    /// method. None samples the full frame.
    pub crop_radius: Option<usize>,
    /// Percentile-like offsets for the stddev method (50 = the mean).
    pub stddev_lo: f32,
    pub stddev_hi: f32,
    /// Side length of the median smoothing window.
    pub median_window: usize,
}

impl Default for AutoCutParams {
    fn default() -> Self {
        Self {
            num_bins: DEFAULT_NUM_BINS,
            hist_pct: DEFAULT_HIST_PCT,
            crop_radius: Some(DEFAULT_CROP_RADIUS),
            stddev_lo: DEFAULT_STDDEV_LO,
            stddev_hi: DEFAULT_STDDEV_HI,
            median_window: MEDIAN_SMOOTH_WINDOW,
        }
    }
}

/// Compute (lo, hi) cut levels for a sample with the chosen method.
///
/// Pure function of its inputs; safe to call concurrently for different
/// images. NaN samples never reach the returned levels.
pub fn compute_cut_levels(
    data: ArrayViewD<'_, f32>,
    method: AutoCutMethod,
    params: &AutoCutParams,
) -> Result<(f32, f32)> {
    match method {
        AutoCutMethod::MinMax => cut_minmax(data),
        AutoCutMethod::StdDev => cut_stddev(data, params.stddev_lo, params.stddev_hi),
        AutoCutMethod::Median => cut_median(data, params.median_window),
        AutoCutMethod::Histogram => {
            cut_histogram(data, params.num_bins, params.hist_pct, params.crop_radius)
        }
    }
}

fn check_nonempty(data: &ArrayViewD<'_, f32>) -> Result<()> {
    if data.is_empty() {
        Err(EuropaError::EmptyImage)
    } else {
        Ok(())
    }
}

/// Min/max over finite values only. None when every value is NaN/Inf.
fn finite_min_max(data: &ArrayViewD<'_, f32>) -> Option<(f32, f32)> {
    let init = (f32::INFINITY, f32::NEG_INFINITY);
    let fold = |acc: (f32, f32), v: f32| {
        if v.is_finite() {
            (acc.0.min(v), acc.1.max(v))
        } else {
            acc
        }
    };
    let (lo, hi) = match data.as_slice() {
        Some(slice) if slice.len() > PARALLEL_PIXEL_THRESHOLD => slice
            .par_iter()
            .fold(|| init, |acc, &v| fold(acc, v))
            .reduce(|| init, |a, b| (a.0.min(b.0), a.1.max(b.1))),
        Some(slice) => slice.iter().fold(init, |acc, &v| fold(acc, v)),
        None => data.iter().fold(init, |acc, &v| fold(acc, v)),
    };
    (lo <= hi).then_some((lo, hi))
}

/// Global minimum and maximum, excluding invalid samples.
pub fn cut_minmax(data: ArrayViewD<'_, f32>) -> Result<(f32, f32)> {
    check_nonempty(&data)?;
    finite_min_max(&data).ok_or(EuropaError::NoFiniteValues)
}

/// Mean/stddev based levels: `mean + ((pct - 50) / 10) * sdev` for each of
/// the low and high offsets.
pub fn cut_stddev(data: ArrayViewD<'_, f32>, lo_pct: f32, hi_pct: f32) -> Result<(f32, f32)> {
    check_nonempty(&data)?;
    let mut count = 0u64;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &v in data.iter() {
        if v.is_finite() {
            count += 1;
            sum += f64::from(v);
            sum_sq += f64::from(v) * f64::from(v);
        }
    }
    if count == 0 {
        return Err(EuropaError::NoFiniteValues);
    }
    let mean = sum / count as f64;
    let var = (sum_sq / count as f64 - mean * mean).max(0.0);
    let sdev = var.sqrt();
    let lo = mean + f64::from((lo_pct - 50.0) / 10.0) * sdev;
    let hi = mean + f64::from((hi_pct - 50.0) / 10.0) * sdev;
    Ok((lo as f32, hi as f32))
}

/// Median of the finite values in a window; NaN when there are none.
fn window_median(scratch: &mut Vec<f32>) -> f32 {
    if scratch.is_empty() {
        return f32::NAN;
    }
    scratch.sort_unstable_by(|a, b| a.total_cmp(b));
    scratch[scratch.len() / 2]
}

/// Square median filter with clamped borders, used by the median autocut.
fn median_filter(data: ArrayView2<'_, f32>, window: usize) -> Array2<f32> {
    let (h, w) = data.dim();
    let half = (window / 2) as isize;
    let mut scratch = Vec::with_capacity(window * window);
    Array2::from_shape_fn((h, w), |(y, x)| {
        scratch.clear();
        for dy in -half..=half {
            for dx in -half..=half {
                let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                let v = data[[sy, sx]];
                if v.is_finite() {
                    scratch.push(v);
                }
            }
        }
        window_median(&mut scratch)
    })
}

/// Median-smooth the sample, then take the min/max of the smoothed result.
pub fn cut_median(data: ArrayViewD<'_, f32>, window: usize) -> Result<(f32, f32)> {
    check_nonempty(&data)?;
    let smoothed: Vec<Array2<f32>> = match data.ndim() {
        2 => {
            let view = data
                .view()
                .into_dimensionality::<ndarray::Ix2>()
                .expect("ndim checked above");
            vec![median_filter(view, window)]
        }
        3 => {
            let view = data
                .view()
                .into_dimensionality::<ndarray::Ix3>()
                .expect("ndim checked above");
            (0..view.dim().2)
                .map(|c| median_filter(view.index_axis(Axis(2), c), window))
                .collect()
        }
        ndim => {
            return Err(EuropaError::InvalidDimensions {
                width: 0,
                height: 0,
                channels: ndim,
            })
        }
    };

    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for arr in &smoothed {
        if let Some((l, h)) = finite_min_max(&arr.view().into_dyn()) {
            lo = lo.min(l);
            hi = hi.max(h);
        }
    }
    if lo <= hi {
        Ok((lo, hi))
    } else {
        Err(EuropaError::NoFiniteValues)
    }
}

/// Restrict the sample to a centered square crop on the spatial axes. Axes
/// whose half-extent is below the radius keep their full extent.
fn crop_center<'a>(data: ArrayViewD<'a, f32>, radius: usize) -> ArrayViewD<'a, f32> {
    let mut view = data;
    for axis in 0..view.ndim().min(2) {
        let len = view.len_of(Axis(axis));
        let center = len / 2;
        if radius < center {
            view.slice_axis_inplace(
                Axis(axis),
                Slice::from(center - radius..center + radius),
            );
        }
    }
    view
}

/// Histogram-based cut levels retaining `hist_pct` of the pixels, with
/// symmetric tails and sub-bin linear interpolation.
///
/// NaNs are replaced by the midpoint of the finite range before binning
/// (substitution, not exclusion, keeps the bin totals correct).
pub fn cut_histogram(
    data: ArrayViewD<'_, f32>,
    num_bins: usize,
    hist_pct: f64,
    crop_radius: Option<usize>,
) -> Result<(f32, f32)> {
    check_nonempty(&data)?;
    let view = match crop_radius {
        Some(radius) => crop_center(data, radius),
        None => data,
    };

    let (min, max) = finite_min_max(&view).ok_or(EuropaError::NoFiniteValues)?;
    if min == max || num_bins == 0 {
        return Ok((min, max));
    }

    let min_f = f64::from(min);
    let width = (f64::from(max) - min_f) / num_bins as f64;
    let midpoint = (f64::from(min) + f64::from(max)) / 2.0;

    let mut hist = vec![0usize; num_bins];
    for &v in view.iter() {
        let value = if v.is_finite() { f64::from(v) } else { midpoint };
        let bin = (((value - min_f) / width) as usize).min(num_bins - 1);
        hist[bin] += 1;
    }

    let total = view.len();
    let cutoff = (total as f64 * (1.0 - hist_pct) / 2.0).floor() as usize;

    // Walk the cumulative histogram in from each end until the discarded
    // tail would exceed the cutoff, then interpolate inside that bin.
    let mut lo = f64::from(min);
    let mut cum = 0usize;
    for (i, &count) in hist.iter().enumerate() {
        if cum + count > cutoff {
            let frac = if count == 0 {
                0.0
            } else {
                (cutoff - cum) as f64 / count as f64
            };
            lo = min_f + width * (i as f64 + frac);
            break;
        }
        cum += count;
    }

    let mut hi = f64::from(max);
    let mut cum = 0usize;
    for (i, &count) in hist.iter().enumerate().rev() {
        if cum + count > cutoff {
            let frac = if count == 0 {
                0.0
            } else {
                (cutoff - cum) as f64 / count as f64
            };
            hi = min_f + width * ((i + 1) as f64 - frac);
            break;
        }
        cum += count;
    }

    Ok((lo as f32, hi as f32))
}
