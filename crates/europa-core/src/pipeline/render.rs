use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Zip};
use tracing::{debug, info};

use crate::autocuts::{compute_cut_levels, AutoCutMethod, AutoCutParams};
use crate::consts::{EPSILON, PARALLEL_PIXEL_THRESHOLD};
use crate::cutout::{extract_cutout, Cutout, CutoutData};
use crate::error::{EuropaError, Result};
use crate::image::ImageBuffer;
use crate::rgbmap::{ColorMap, HashAlgorithm, IndexArray, IntensityMap, RgbMapper};
use crate::viewport::{
    clamp_zoom, compute_fit, pan_fraction_for, step_zoom, zoom_to_fit, AutoMode, Geometry,
    ViewportState, ZoomDirection,
};

use super::config::ViewerConfig;

/// Severity of a viewport change: the cheapest pipeline stage that must
/// re-run because of it. Lower is more expensive. Coalescing several
/// pending changes is `min()` over their severities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheStage {
    /// Re-run fit geometry and cutout extraction (zoom, pan, resize,
    /// flip/swap, new image).
    Geometry = 0,
    /// Re-run level normalization (cut-level change).
    Levels = 1,
    /// Re-run color mapping (color/intensity map or hash change).
    Color = 2,
    /// Nothing pending; reuse the final RGB buffer.
    Cached = 3,
}

/// Per-stage recomputation counters. Lets callers (and tests) observe the
/// cache discipline without poking at the cached buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub geometry_passes: usize,
    pub level_passes: usize,
    pub color_passes: usize,
}

/// One rendered frame: the RGB pixels plus the window offset at which the
/// GUI shell should blit them (nonzero when the zoomed image is centered
/// inside a larger window).
#[derive(Debug)]
pub struct RgbFrame<'a> {
    /// Shape = (height, width, 3).
    pub pixels: &'a Array3<u8>,
    pub offset_x: u32,
    pub offset_y: u32,
}

/// Single-viewport staged render cache.
///
/// Owns the viewport state, the RGB mapper and the derived stage caches.
/// All derived buffers are pure caches, recomputable from the viewport
/// state, the image and the mapper configuration. Not internally
/// synchronized: one instance belongs to one logical UI thread.
#[derive(Debug)]
pub struct RenderPipeline {
    state: ViewportState,
    autocut_method: AutoCutMethod,
    autocut_params: AutoCutParams,
    mapper: RgbMapper,
    image: Option<Arc<ImageBuffer>>,

    geometry: Option<Geometry>,
    cutout: Option<Cutout>,
    normalized: Option<IndexArray>,
    rgb: Option<Array3<u8>>,
    /// Minimum severity seen since the last render (take-min coalescing).
    pending: CacheStage,
    stats: RenderStats,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPipeline {
    pub fn new() -> Self {
        Self {
            state: ViewportState::default(),
            autocut_method: AutoCutMethod::Histogram,
            autocut_params: AutoCutParams::default(),
            mapper: RgbMapper::new(),
            image: None,
            geometry: None,
            cutout: None,
            normalized: None,
            rgb: None,
            pending: CacheStage::Geometry,
            stats: RenderStats::default(),
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Result<Self> {
        let mut pipeline = Self::new();
        pipeline.state.flip_x = config.flip_x;
        pipeline.state.flip_y = config.flip_y;
        pipeline.state.swap_xy = config.swap_xy;
        pipeline.state.zoom_level =
            clamp_zoom(config.zoom_level, config.min_auto_zoom, config.max_auto_zoom);
        pipeline.state.pan_x = config.pan_x.clamp(0.0, 1.0);
        pipeline.state.pan_y = config.pan_y.clamp(0.0, 1.0);
        pipeline.state.autozoom = config.autozoom;
        pipeline.state.autolevels = config.autolevels;
        pipeline.state.min_auto_zoom = config.min_auto_zoom;
        pipeline.state.max_auto_zoom = config.max_auto_zoom;
        pipeline.autocut_method = config.autocut_method;
        pipeline.autocut_params = config.autocut_params.clone();
        pipeline
            .mapper
            .set_hash(config.hash_algorithm, config.hash_size, config.hash_expo)?;
        Ok(pipeline)
    }

    // --- accessors ---------------------------------------------------

    pub fn viewport(&self) -> &ViewportState {
        &self.state
    }

    pub fn image(&self) -> Option<&Arc<ImageBuffer>> {
        self.image.as_ref()
    }

    pub fn mapper(&self) -> &RgbMapper {
        &self.mapper
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn cut_levels(&self) -> (f32, f32) {
        (self.state.cut_lo, self.state.cut_hi)
    }

    pub fn autocut_method(&self) -> AutoCutMethod {
        self.autocut_method
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    // --- viewport mutation -------------------------------------------

    /// Record that the view changed with the given severity. Repeated
    /// calls coalesce by keeping the minimum severity seen.
    pub fn invalidate(&mut self, stage: CacheStage) {
        self.pending = self.pending.min(stage);
    }

    /// Replace the source image. Reapplies auto-zoom and auto cut levels
    /// according to their modes.
    pub fn set_image(&mut self, image: Arc<ImageBuffer>) -> Result<()> {
        info!(
            width = image.width(),
            height = image.height(),
            channels = image.channels(),
            "set image"
        );
        self.image = Some(image);
        self.invalidate(CacheStage::Geometry);
        self.maybe_autozoom();
        if self.state.autolevels != AutoMode::Off {
            self.auto_cut_levels()?;
        }
        Ok(())
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.state.window = Some((width, height));
        self.invalidate(CacheStage::Geometry);
        self.maybe_autozoom();
    }

    /// Set an explicit zoom level, silently clamped into the allowed
    /// range. A manual zoom drops `autozoom` from Override to Off.
    pub fn set_zoom(&mut self, level: i32) {
        if self.state.autozoom == AutoMode::Override {
            self.state.autozoom = AutoMode::Off;
        }
        let clamped = clamp_zoom(level, self.state.min_auto_zoom, self.state.max_auto_zoom);
        if clamped != self.state.zoom_level {
            self.state.zoom_level = clamped;
            self.invalidate(CacheStage::Geometry);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(step_zoom(self.state.zoom_level, ZoomDirection::In));
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(step_zoom(self.state.zoom_level, ZoomDirection::Out));
    }

    /// Fit the image to the current window and adopt that zoom level.
    pub fn zoom_fit(&mut self) -> Result<()> {
        let image = self.image.as_ref().ok_or(EuropaError::NoImage)?;
        let (w, h) = self.state.window.ok_or(EuropaError::WindowNotReady)?;
        let (w, h) = if self.state.swap_xy { (h, w) } else { (w, h) };
        let level = zoom_to_fit(
            w,
            h,
            image.width(),
            image.height(),
            self.state.min_auto_zoom,
            self.state.max_auto_zoom,
        );
        self.set_zoom(level);
        Ok(())
    }

    pub fn set_pan(&mut self, pan_x: f64, pan_y: f64) {
        self.state.pan_x = pan_x.clamp(0.0, 1.0);
        self.state.pan_y = pan_y.clamp(0.0, 1.0);
        self.invalidate(CacheStage::Geometry);
    }

    /// Re-center the view on a data coordinate (e.g. a clicked point).
    pub fn pan_to_data(&mut self, data_x: f64, data_y: f64) -> Result<()> {
        let image = self.image.as_ref().ok_or(EuropaError::NoImage)?;
        let (px, py) = pan_fraction_for(data_x, data_y, image.width(), image.height());
        self.set_pan(px, py);
        Ok(())
    }

    pub fn set_transforms(&mut self, flip_x: bool, flip_y: bool, swap_xy: bool) {
        self.state.flip_x = flip_x;
        self.state.flip_y = flip_y;
        self.state.swap_xy = swap_xy;
        self.invalidate(CacheStage::Geometry);
    }

    /// Set manual cut levels. Drops `autolevels` from Override to Off.
    pub fn set_cut_levels(&mut self, lo: f32, hi: f32) {
        if self.state.autolevels == AutoMode::Override {
            self.state.autolevels = AutoMode::Off;
        }
        self.state.cut_lo = lo;
        self.state.cut_hi = hi;
        self.invalidate(CacheStage::Levels);
    }

    /// Compute and apply cut levels with the configured autocut method.
    pub fn auto_cut_levels(&mut self) -> Result<(f32, f32)> {
        let (lo, hi) = {
            let image = self.image.as_ref().ok_or(EuropaError::NoImage)?;
            compute_cut_levels(image.view_dyn(), self.autocut_method, &self.autocut_params)?
        };
        self.state.cut_lo = lo;
        self.state.cut_hi = hi;
        self.invalidate(CacheStage::Levels);
        info!(lo, hi, method = %self.autocut_method, "auto cut levels");
        Ok((lo, hi))
    }

    pub fn set_autocut_method(&mut self, method: AutoCutMethod) {
        self.autocut_method = method;
    }

    pub fn set_autocut_params(&mut self, params: AutoCutParams) {
        self.autocut_params = params;
    }

    // --- mapper passthroughs -----------------------------------------

    pub fn set_color_map(&mut self, cmap: ColorMap) {
        self.mapper.set_color_map(cmap);
        self.invalidate(CacheStage::Color);
    }

    pub fn set_intensity_map(&mut self, imap: IntensityMap) {
        self.mapper.set_intensity_map(imap);
        self.invalidate(CacheStage::Color);
    }

    /// Rebuild the quantization hash. A new hash size changes the level
    /// normalization domain, so this invalidates from the level stage.
    pub fn set_hash(&mut self, algorithm: HashAlgorithm, size: usize, expo: f64) -> Result<()> {
        let resized = size != self.mapper.hash_size();
        self.mapper.set_hash(algorithm, size, expo)?;
        self.invalidate(if resized {
            CacheStage::Levels
        } else {
            CacheStage::Color
        });
        Ok(())
    }

    pub fn shift_color_map(&mut self, pct: f64) {
        self.mapper.shift(pct);
        self.invalidate(CacheStage::Color);
    }

    pub fn reset_color_map(&mut self) {
        self.mapper.reset();
        self.invalidate(CacheStage::Color);
    }

    // --- coordinate conversion ---------------------------------------

    /// Data coordinate to window coordinate (pixel centers). Uses the
    /// cached geometry when present, otherwise computes a fresh fit.
    pub fn data_to_window(&self, data_x: f64, data_y: f64) -> Result<(f64, f64)> {
        let (geom, replication) = self.conversion_basis()?;
        Ok(crate::viewport::data_to_window(
            &self.state,
            &geom,
            replication,
            data_x,
            data_y,
            true,
        ))
    }

    /// Window coordinate back to a fractional data coordinate, for cursor
    /// readout and overlay tools.
    pub fn window_to_data(&self, win_x: f64, win_y: f64) -> Result<(f64, f64)> {
        let (geom, replication) = self.conversion_basis()?;
        Ok(crate::viewport::window_to_data(
            &self.state,
            &geom,
            replication,
            win_x,
            win_y,
            true,
        ))
    }

    fn conversion_basis(&self) -> Result<(Geometry, i32)> {
        let image = self.image.as_ref().ok_or(EuropaError::NoImage)?;
        let geom = match self.geometry {
            Some(g) => g,
            None => compute_fit(&self.state, image.width(), image.height())?,
        };
        // Without a cutout yet, the zoom level itself carries the right
        // signed magnify/minify convention.
        let replication = match &self.cutout {
            Some(c) => c.replication,
            None => self.state.zoom_level,
        };
        Ok((geom, replication))
    }

    // --- rendering ---------------------------------------------------

    /// Render using only the pending (coalesced) severity.
    pub fn render(&mut self) -> Result<RgbFrame<'_>> {
        self.get_rgb_frame(CacheStage::Cached)
    }

    /// The single per-repaint entry point: re-runs every stage at least as
    /// severe as `whence` (combined with any pending invalidations) and
    /// reuses cached results below it. Missing caches are computed
    /// regardless of `whence`.
    pub fn get_rgb_frame(&mut self, whence: CacheStage) -> Result<RgbFrame<'_>> {
        let image = Arc::clone(self.image.as_ref().ok_or(EuropaError::NoImage)?);
        let whence = whence.min(self.pending);
        self.pending = CacheStage::Cached;

        // Stage 0: fit geometry + cutout extraction.
        if whence <= CacheStage::Geometry || self.geometry.is_none() || self.cutout.is_none() {
            let geom = compute_fit(&self.state, image.width(), image.height())?;
            let (target_w, target_h) = if self.state.swap_xy {
                (geom.visible_height as usize, geom.visible_width as usize)
            } else {
                (geom.visible_width as usize, geom.visible_height as usize)
            };
            let cutout = extract_cutout(
                &image,
                geom.rect,
                target_w,
                target_h,
                self.state.flip_x,
                self.state.flip_y,
                self.state.swap_xy,
            );
            debug!(
                rect = ?geom.rect,
                replication = cutout.replication,
                "geometry and cutout recomputed"
            );
            self.geometry = Some(geom);
            self.cutout = Some(cutout);
            self.normalized = None;
            self.rgb = None;
            self.stats.geometry_passes += 1;
        }

        // Stage 1: level normalization (plus the display-convention row
        // flip, so row 0 of every later buffer is the top of the screen).
        if whence <= CacheStage::Levels || self.normalized.is_none() {
            let cutout = self.cutout.as_ref().expect("cutout computed above");
            let normalized = normalize_cutout(
                cutout,
                self.state.cut_lo,
                self.state.cut_hi,
                self.mapper.hash_size(),
            );
            debug!(
                lo = self.state.cut_lo,
                hi = self.state.cut_hi,
                "levels recomputed"
            );
            self.normalized = Some(normalized);
            self.rgb = None;
            self.stats.level_passes += 1;
        }

        // Stage 2: color mapping.
        if whence <= CacheStage::Color || self.rgb.is_none() {
            let normalized = self.normalized.as_ref().expect("levels computed above");
            self.rgb = Some(self.mapper.map(normalized));
            self.stats.color_passes += 1;
        }

        let geom = self.geometry.as_ref().expect("geometry computed above");
        Ok(RgbFrame {
            pixels: self.rgb.as_ref().expect("color mapped above"),
            offset_x: geom.dst_x,
            offset_y: geom.dst_y,
        })
    }

    fn maybe_autozoom(&mut self) {
        if self.state.autozoom == AutoMode::Off {
            return;
        }
        let (Some((w, h)), Some(image)) = (self.state.window, self.image.as_ref()) else {
            return;
        };
        let (w, h) = if self.state.swap_xy { (h, w) } else { (w, h) };
        let level = zoom_to_fit(
            w,
            h,
            image.width(),
            image.height(),
            self.state.min_auto_zoom,
            self.state.max_auto_zoom,
        );
        if level != self.state.zoom_level {
            debug!(level, "auto zoom to fit");
            self.state.zoom_level = level;
            self.invalidate(CacheStage::Geometry);
        }
    }
}

/// Map a raw sample into [0, top]. Degenerate cut levels threshold instead
/// of dividing: any value different from the cuts goes to the maximum.
/// Invalid samples always land at 0 so they can never poison the buffer.
fn normalize_value(v: f32, lo: f32, hi: f32, top: f32) -> u32 {
    if !v.is_finite() {
        return 0;
    }
    let range = hi - lo;
    if range.abs() < EPSILON {
        if v == lo {
            0
        } else {
            top as u32
        }
    } else {
        (((v - lo) / range).clamp(0.0, 1.0) * top).round() as u32
    }
}

fn normalize_plane(data: ArrayView2<'_, f32>, lo: f32, hi: f32, top: f32) -> Array2<u32> {
    let flipped = data.slice(s![..;-1, ..]);
    let len = flipped.len();
    let mut out = Array2::<u32>::zeros(flipped.dim());
    let zip = Zip::from(&mut out).and(&flipped);
    if len > PARALLEL_PIXEL_THRESHOLD {
        zip.par_for_each(|o, &v| *o = normalize_value(v, lo, hi, top));
    } else {
        zip.for_each(|o, &v| *o = normalize_value(v, lo, hi, top));
    }
    out
}

fn normalize_volume(data: ArrayView3<'_, f32>, lo: f32, hi: f32, top: f32) -> Array3<u32> {
    let flipped = data.slice(s![..;-1, .., ..]);
    let len = flipped.len();
    let mut out = Array3::<u32>::zeros(flipped.dim());
    let zip = Zip::from(&mut out).and(&flipped);
    if len > PARALLEL_PIXEL_THRESHOLD {
        zip.par_for_each(|o, &v| *o = normalize_value(v, lo, hi, top));
    } else {
        zip.for_each(|o, &v| *o = normalize_value(v, lo, hi, top));
    }
    out
}

/// Stage-1 transform: clip raw samples into [cut_lo, cut_hi] and rescale
/// to the hash index domain [0, hash_size - 1].
fn normalize_cutout(cutout: &Cutout, lo: f32, hi: f32, hash_size: usize) -> IndexArray {
    let top = (hash_size - 1) as f32;
    match &cutout.data {
        CutoutData::Mono(a) => IndexArray::Mono(normalize_plane(a.view(), lo, hi, top)),
        CutoutData::Rgb(a) => IndexArray::Rgb(normalize_volume(a.view(), lo, hi, top)),
    }
}
