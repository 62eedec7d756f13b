use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MAX_AUTO_ZOOM, DEFAULT_MIN_AUTO_ZOOM};
use crate::error::{EuropaError, Result};

/// Re-application policy for automatic zoom / cut levels.
///
/// `On` reapplies on every new image (and window resize, for zoom).
/// `Override` reapplies until the user sets the value manually, which drops
/// the mode to `Off`. `Off` never reapplies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoMode {
    On,
    Override,
    Off,
}

#[derive(Clone, Copy, Debug)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Zoom/pan/orientation state for a single view of an image.
///
/// `zoom_level >= 1` is an integer magnification factor; `zoom_level <= -2`
/// is a 1/|n| minification. 0 and -1 are forbidden; setters step across the
/// gap instead of landing in it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewportState {
    pub zoom_level: i32,
    /// Pan center as a fraction of the data extent, in [0, 1].
    pub pan_x: f64,
    pub pan_y: f64,
    /// On-screen surface size in pixels. None until the first layout.
    pub window: Option<(u32, u32)>,
    pub flip_x: bool,
    pub flip_y: bool,
    pub swap_xy: bool,
    pub cut_lo: f32,
    pub cut_hi: f32,
    pub autozoom: AutoMode,
    pub autolevels: AutoMode,
    pub min_auto_zoom: i32,
    pub max_auto_zoom: i32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom_level: 1,
            pan_x: 0.5,
            pan_y: 0.5,
            window: None,
            flip_x: false,
            flip_y: false,
            swap_xy: false,
            cut_lo: 0.0,
            cut_hi: 0.0,
            autozoom: AutoMode::On,
            autolevels: AutoMode::On,
            min_auto_zoom: DEFAULT_MIN_AUTO_ZOOM,
            max_auto_zoom: DEFAULT_MAX_AUTO_ZOOM,
        }
    }
}

impl ViewportState {
    /// Linear scale factor for the current zoom level.
    pub fn scale(&self) -> f64 {
        zoom_scale(self.zoom_level)
    }
}

/// Half-open rectangle of data-space indices, `x1..x2` by `y1..y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataRect {
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
}

impl DataRect {
    pub fn width(&self) -> usize {
        self.x2 - self.x1
    }

    pub fn height(&self) -> usize {
        self.y2 - self.y1
    }
}

/// Derived fit geometry. Recomputed once per geometry-severity render pass
/// and consumed by the cutout extractor and every coordinate conversion
/// until invalidated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub scale: f64,
    /// Full image extent at the current scale (may exceed the window).
    pub zoomed_width: f64,
    pub zoomed_height: f64,
    /// Offset into zoomed-canvas space of the first visible pixel.
    pub src_x: f64,
    pub src_y: f64,
    /// Window offset at which the rendered buffer is blitted (nonzero when
    /// the zoomed image is smaller than the window and gets centered).
    pub dst_x: u32,
    pub dst_y: u32,
    /// Visible extent in window pixels.
    pub visible_width: u32,
    pub visible_height: u32,
    /// Data-space rectangle covering the visible region.
    pub rect: DataRect,
}

/// Scale factor for a zoom level: n for n >= 1, 1/|n| for n <= -2.
pub fn zoom_scale(level: i32) -> f64 {
    debug_assert!(level != 0 && level != -1, "zoom level in forbidden gap");
    if level >= 1 {
        f64::from(level)
    } else {
        1.0 / f64::from(-level)
    }
}

/// Clamp a requested zoom level into `[min, max]`, stepping over the
/// forbidden {0, -1} gap. Out-of-range requests clamp silently.
pub fn clamp_zoom(level: i32, min: i32, max: i32) -> i32 {
    match level.clamp(min, max) {
        0 => 1,
        -1 => -2,
        l => l,
    }
}

/// Step the zoom level by one notch, crossing the forbidden {0, -1} gap:
/// stepping out from 1 goes to -2, stepping in from -2 returns to 1.
pub fn step_zoom(level: i32, direction: ZoomDirection) -> i32 {
    match direction {
        ZoomDirection::In => {
            if level == -2 {
                1
            } else {
                level + 1
            }
        }
        ZoomDirection::Out => {
            if level == 1 {
                -2
            } else {
                level - 1
            }
        }
    }
}

/// Largest zoom level at which a `data_w` x `data_h` image still fits a
/// `window_w` x `window_h` window, clamped to `[min_auto, max_auto]`.
pub fn zoom_to_fit(
    window_w: u32,
    window_h: u32,
    data_w: usize,
    data_h: usize,
    min_auto: i32,
    max_auto: i32,
) -> i32 {
    let rx = f64::from(window_w) / data_w as f64;
    let ry = f64::from(window_h) / data_h as f64;
    let ratio = rx.min(ry);
    let level = if ratio >= 1.0 {
        // Largest magnifying integer not exceeding the ratio.
        ratio.floor() as i32
    } else {
        // Smallest minifying level (most negative allowed is the first one
        // that makes the image fit).
        -((1.0 / ratio).ceil() as i32)
    };
    clamp_zoom(level, min_auto, max_auto)
}

/// Per-axis fit: center the zoomed image when it is smaller than the
/// window, otherwise clip it and position the visible slice by the pan
/// fraction (clamped so the window never reads past the zoomed bounds).
fn fit_axis(window: u32, zoomed: f64, pan: f64) -> (f64, u32, u32) {
    let window_f = f64::from(window);
    if zoomed <= window_f {
        let dst = ((window_f - zoomed) / 2.0).round() as u32;
        (0.0, dst, zoomed.ceil() as u32)
    } else {
        let centered = (pan * zoomed).round() - window_f / 2.0;
        let src = centered.clamp(0.0, zoomed - window_f);
        (src, 0, window)
    }
}

/// Compute the fit geometry for the current viewport against an image of
/// `data_w` x `data_h` pixels.
pub fn compute_fit(state: &ViewportState, data_w: usize, data_h: usize) -> Result<Geometry> {
    let (win_w, win_h) = state.window.ok_or(EuropaError::WindowNotReady)?;
    // A transposed display swaps which window axis each data axis spans.
    let (win_x, win_y) = if state.swap_xy {
        (win_h, win_w)
    } else {
        (win_w, win_h)
    };
    let scale = state.scale();
    let zoomed_w = data_w as f64 * scale;
    let zoomed_h = data_h as f64 * scale;

    let (src_x, dst_along_x, vis_x) = fit_axis(win_x, zoomed_w, state.pan_x);
    let (src_y, dst_along_y, vis_y) = fit_axis(win_y, zoomed_h, state.pan_y);

    // Convert the visible zoomed-space slice back into data-space bounds.
    let x1 = ((src_x / scale).floor() as usize).min(data_w.saturating_sub(1));
    let y1 = ((src_y / scale).floor() as usize).min(data_h.saturating_sub(1));
    let x2 = (((src_x + f64::from(vis_x)) / scale).ceil() as usize).max(x1 + 1).min(data_w);
    let y2 = (((src_y + f64::from(vis_y)) / scale).ceil() as usize).max(y1 + 1).min(data_h);

    // Blit offsets and visible extents are reported in window orientation.
    let (dst_x, dst_y, vis_w, vis_h) = if state.swap_xy {
        (dst_along_y, dst_along_x, vis_y, vis_x)
    } else {
        (dst_along_x, dst_along_y, vis_x, vis_y)
    };

    Ok(Geometry {
        scale,
        zoomed_width: zoomed_w,
        zoomed_height: zoomed_h,
        src_x,
        src_y,
        dst_x,
        dst_y,
        visible_width: vis_w,
        visible_height: vis_h,
        rect: DataRect { x1, y1, x2, y2 },
    })
}

/// Window pixels covered by one cutout step for a replication factor:
/// `factor` pixels when magnified, 1/stride when minified.
fn replication_scale(replication: i32) -> f64 {
    debug_assert!(replication != 0, "replication factor must be signed nonzero");
    if replication >= 1 {
        f64::from(replication)
    } else {
        1.0 / f64::from(-replication)
    }
}

/// Convert a data-space coordinate to window space.
///
/// Window space has its origin at the upper-left with Y growing downward;
/// data space grows upward. With `center = true` an integer data coordinate
/// lands on the center of its zoomed screen cell (the sample sits at the
/// center of its 1x1 cell, not its corner).
pub fn data_to_window(
    state: &ViewportState,
    geom: &Geometry,
    replication: i32,
    data_x: f64,
    data_y: f64,
    center: bool,
) -> (f64, f64) {
    let rw = geom.rect.width() as f64;
    let rh = geom.rect.height() as f64;
    let off = if center { 0.5 } else { 0.0 };

    let mut tx = data_x - geom.rect.x1 as f64 + off;
    let mut ty = data_y - geom.rect.y1 as f64 + off;
    // Flips mirror around the extracted rectangle, not the full source.
    if state.flip_x {
        tx = rw - tx;
    }
    if state.flip_y {
        ty = rh - ty;
    }
    if state.swap_xy {
        std::mem::swap(&mut tx, &mut ty);
    }
    let eh = if state.swap_xy { rw } else { rh };

    let e = replication_scale(replication);
    let win_x = f64::from(geom.dst_x) + tx * e;
    let win_y = f64::from(geom.dst_y) + (eh - ty) * e;
    (win_x, win_y)
}

/// Inverse of [`data_to_window`]. Returns fractional data coordinates; the
/// caller rounds or floors as appropriate for cursor readout.
pub fn window_to_data(
    state: &ViewportState,
    geom: &Geometry,
    replication: i32,
    win_x: f64,
    win_y: f64,
    center: bool,
) -> (f64, f64) {
    let rw = geom.rect.width() as f64;
    let rh = geom.rect.height() as f64;
    let off = if center { 0.5 } else { 0.0 };
    let eh = if state.swap_xy { rw } else { rh };

    let e = replication_scale(replication);
    let mut tx = (win_x - f64::from(geom.dst_x)) / e;
    let mut ty = eh - (win_y - f64::from(geom.dst_y)) / e;

    if state.swap_xy {
        std::mem::swap(&mut tx, &mut ty);
    }
    if state.flip_x {
        tx = rw - tx;
    }
    if state.flip_y {
        ty = rh - ty;
    }
    (tx - off + geom.rect.x1 as f64, ty - off + geom.rect.y1 as f64)
}

/// Pan fractions that center the view on the given data coordinate.
pub fn pan_fraction_for(data_x: f64, data_y: f64, data_w: usize, data_h: usize) -> (f64, f64) {
    let px = ((data_x + 0.5) / data_w as f64).clamp(0.0, 1.0);
    let py = ((data_y + 0.5) / data_h as f64).clamp(0.0, 1.0);
    (px, py)
}
