use std::sync::Arc;

use ndarray::Array2;

use europa_core::autocuts::AutoCutMethod;
use europa_core::error::EuropaError;
use europa_core::image::ImageBuffer;
use europa_core::pipeline::{CacheStage, RenderPipeline, ViewerConfig};
use europa_core::rgbmap::HashAlgorithm;
use europa_core::viewport::AutoMode;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ramp_image(h: usize, w: usize) -> Arc<ImageBuffer> {
    let data = Array2::from_shape_fn((h, w), |(y, x)| (y * w + x) as f32);
    Arc::new(ImageBuffer::from_mono(data).unwrap())
}

fn zero_image(h: usize, w: usize) -> Arc<ImageBuffer> {
    Arc::new(ImageBuffer::from_mono(Array2::zeros((h, w))).unwrap())
}

fn manual_config() -> ViewerConfig {
    ViewerConfig {
        autozoom: AutoMode::Off,
        autolevels: AutoMode::Off,
        ..ViewerConfig::default()
    }
}

/// Pipeline with a ramp image, manual modes, and cut levels spanning the
/// full data range.
fn ramp_pipeline(h: usize, w: usize, win: (u32, u32)) -> RenderPipeline {
    let mut pipeline = RenderPipeline::from_config(&manual_config()).unwrap();
    pipeline.set_window_size(win.0, win.1);
    pipeline.set_image(ramp_image(h, w)).unwrap();
    pipeline.set_cut_levels(0.0, (h * w - 1) as f32);
    pipeline
}

// ---------------------------------------------------------------------------
// Staged cache discipline
// ---------------------------------------------------------------------------

#[test]
fn test_first_render_runs_all_stages() {
    let mut pipeline = ramp_pipeline(100, 100, (100, 100));
    let frame = pipeline.render().unwrap();
    assert_eq!(frame.pixels.dim(), (100, 100, 3));
    let stats = pipeline.stats();
    assert_eq!(stats.geometry_passes, 1);
    assert_eq!(stats.level_passes, 1);
    assert_eq!(stats.color_passes, 1);
}

#[test]
fn test_rerender_reuses_everything() {
    let mut pipeline = ramp_pipeline(100, 100, (100, 100));
    pipeline.render().unwrap();
    let before = pipeline.stats();
    pipeline.render().unwrap();
    assert_eq!(pipeline.stats(), before);
}

#[test]
fn test_cut_level_change_never_reextracts_cutout() {
    let mut pipeline = ramp_pipeline(100, 100, (100, 100));
    pipeline.render().unwrap();
    for step in 1..=10 {
        // Dragging a cut-level slider at interactive rates.
        pipeline.set_cut_levels(0.0, 9999.0 - step as f32 * 100.0);
        pipeline.render().unwrap();
    }
    let stats = pipeline.stats();
    assert_eq!(stats.geometry_passes, 1);
    assert_eq!(stats.level_passes, 11);
    assert_eq!(stats.color_passes, 11);
}

#[test]
fn test_color_map_change_reruns_color_stage_only() {
    let mut pipeline = ramp_pipeline(100, 100, (100, 100));
    pipeline.render().unwrap();
    pipeline.shift_color_map(0.1);
    pipeline.render().unwrap();
    let stats = pipeline.stats();
    assert_eq!(stats.geometry_passes, 1);
    assert_eq!(stats.level_passes, 1);
    assert_eq!(stats.color_passes, 2);
}

#[test]
fn test_zoom_change_reruns_from_geometry() {
    let mut pipeline = ramp_pipeline(100, 100, (100, 100));
    pipeline.render().unwrap();
    pipeline.zoom_in();
    pipeline.render().unwrap();
    assert_eq!(pipeline.stats().geometry_passes, 2);
}

#[test]
fn test_coalesced_invalidations_match_single_severe_one() {
    let image = ramp_image(64, 64);
    let make = || {
        let mut p = RenderPipeline::from_config(&manual_config()).unwrap();
        p.set_window_size(64, 64);
        p.set_image(Arc::clone(&image)).unwrap();
        p.set_cut_levels(0.0, 4095.0);
        p.render().unwrap();
        p
    };

    let mut a = make();
    a.invalidate(CacheStage::Color);
    a.invalidate(CacheStage::Geometry);
    a.invalidate(CacheStage::Levels);
    let frame_a = a.render().unwrap().pixels.to_owned();

    let mut b = make();
    b.invalidate(CacheStage::Geometry);
    let frame_b = b.render().unwrap().pixels.to_owned();

    assert_eq!(frame_a, frame_b);
    // The coalesced run re-ran geometry exactly once more.
    assert_eq!(a.stats().geometry_passes, 2);
}

#[test]
fn test_hash_resize_reruns_levels() {
    let mut pipeline = ramp_pipeline(64, 64, (64, 64));
    pipeline.render().unwrap();
    pipeline.set_hash(HashAlgorithm::Linear, 1024, 4.0).unwrap();
    pipeline.render().unwrap();
    let stats = pipeline.stats();
    assert_eq!(stats.geometry_passes, 1);
    assert_eq!(stats.level_passes, 2);
}

// ---------------------------------------------------------------------------
// Degenerate data
// ---------------------------------------------------------------------------

#[test]
fn test_flat_zero_image_renders_flat() {
    let mut pipeline = RenderPipeline::from_config(&manual_config()).unwrap();
    pipeline.set_window_size(100, 100);
    pipeline.set_image(zero_image(100, 100)).unwrap();
    pipeline.set_autocut_method(AutoCutMethod::MinMax);
    let (lo, hi) = pipeline.auto_cut_levels().unwrap();
    assert_eq!((lo, hi), (0.0, 0.0));

    let frame = pipeline.render().unwrap();
    let first = [
        frame.pixels[[0, 0, 0]],
        frame.pixels[[0, 0, 1]],
        frame.pixels[[0, 0, 2]],
    ];
    for px in frame.pixels.rows() {
        assert_eq!([px[0], px[1], px[2]], first, "image must be flat");
    }
}

#[test]
fn test_render_without_image() {
    let mut pipeline = RenderPipeline::from_config(&manual_config()).unwrap();
    pipeline.set_window_size(100, 100);
    let err = pipeline.render().unwrap_err();
    assert!(matches!(err, EuropaError::NoImage));
}

#[test]
fn test_render_before_layout() {
    let mut pipeline = RenderPipeline::from_config(&manual_config()).unwrap();
    pipeline.set_image(ramp_image(10, 10)).unwrap();
    let err = pipeline.render().unwrap_err();
    assert!(matches!(err, EuropaError::WindowNotReady));
}

// ---------------------------------------------------------------------------
// Blit offsets
// ---------------------------------------------------------------------------

#[test]
fn test_small_image_centered_in_window() {
    let mut pipeline = ramp_pipeline(100, 100, (200, 200));
    let frame = pipeline.render().unwrap();
    assert_eq!((frame.offset_x, frame.offset_y), (50, 50));
    assert_eq!(frame.pixels.dim(), (100, 100, 3));
}

#[test]
fn test_clipped_image_blits_at_origin() {
    let mut pipeline = ramp_pipeline(200, 200, (100, 100));
    let frame = pipeline.render().unwrap();
    assert_eq!((frame.offset_x, frame.offset_y), (0, 0));
}

#[test]
fn test_swapped_image_fills_matching_window() {
    // A 40x100 image transposed is a perfect fit for a 100x40 window; the
    // whole extent must render, not a square patch of it.
    let mut pipeline = ramp_pipeline(100, 40, (100, 40));
    pipeline.set_transforms(false, false, true);
    let frame = pipeline.render().unwrap();
    assert_eq!((frame.offset_x, frame.offset_y), (0, 0));
    assert_eq!(frame.pixels.dim(), (40, 100, 3));
}

#[test]
fn test_zoom_fit_accounts_for_swap() {
    let mut pipeline = ramp_pipeline(100, 40, (100, 40));
    pipeline.set_transforms(false, false, true);
    pipeline.zoom_fit().unwrap();
    assert_eq!(pipeline.viewport().zoom_level, 1);
}

// ---------------------------------------------------------------------------
// Auto modes
// ---------------------------------------------------------------------------

#[test]
fn test_autozoom_fits_new_image() {
    let config = ViewerConfig {
        autolevels: AutoMode::Off,
        ..ViewerConfig::default()
    };
    let mut pipeline = RenderPipeline::from_config(&config).unwrap();
    pipeline.set_window_size(100, 100);
    pipeline.set_image(ramp_image(300, 300)).unwrap();
    assert_eq!(pipeline.viewport().zoom_level, -3);
}

#[test]
fn test_override_autozoom_drops_after_manual_zoom() {
    let config = ViewerConfig {
        autozoom: AutoMode::Override,
        autolevels: AutoMode::Off,
        ..ViewerConfig::default()
    };
    let mut pipeline = RenderPipeline::from_config(&config).unwrap();
    pipeline.set_window_size(100, 100);
    pipeline.set_image(ramp_image(300, 300)).unwrap();
    assert_eq!(pipeline.viewport().zoom_level, -3);

    pipeline.set_zoom(2);
    assert_eq!(pipeline.viewport().autozoom, AutoMode::Off);
    pipeline.set_image(ramp_image(600, 600)).unwrap();
    assert_eq!(pipeline.viewport().zoom_level, 2);
}

#[test]
fn test_autolevels_applied_on_set_image() {
    let config = ViewerConfig {
        autozoom: AutoMode::Off,
        autocut_method: AutoCutMethod::MinMax,
        ..ViewerConfig::default()
    };
    let mut pipeline = RenderPipeline::from_config(&config).unwrap();
    pipeline.set_window_size(100, 100);
    pipeline.set_image(ramp_image(10, 10)).unwrap();
    assert_eq!(pipeline.cut_levels(), (0.0, 99.0));
}

#[test]
fn test_manual_cuts_drop_override_autolevels() {
    let config = ViewerConfig {
        autozoom: AutoMode::Off,
        autolevels: AutoMode::Override,
        autocut_method: AutoCutMethod::MinMax,
        ..ViewerConfig::default()
    };
    let mut pipeline = RenderPipeline::from_config(&config).unwrap();
    pipeline.set_window_size(100, 100);
    pipeline.set_image(ramp_image(10, 10)).unwrap();
    pipeline.set_cut_levels(10.0, 20.0);
    assert_eq!(pipeline.viewport().autolevels, AutoMode::Off);
    pipeline.set_image(ramp_image(20, 20)).unwrap();
    assert_eq!(pipeline.cut_levels(), (10.0, 20.0));
}

// ---------------------------------------------------------------------------
// Coordinate conversion through the pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_round_trip_with_transforms() {
    let mut pipeline = ramp_pipeline(61, 97, (64, 48));
    pipeline.set_transforms(true, false, true);
    pipeline.set_zoom(2);
    pipeline.render().unwrap();

    for &(x, y) in &[(30.0, 20.0), (40.0, 25.0)] {
        let (wx, wy) = pipeline.data_to_window(x, y).unwrap();
        let (bx, by) = pipeline.window_to_data(wx, wy).unwrap();
        assert!((bx - x).abs() <= 1.0 && (by - y).abs() <= 1.0);
    }
}

#[test]
fn test_conversion_before_first_render() {
    // Works from a fresh fit even though no cutout exists yet.
    let mut pipeline = RenderPipeline::from_config(&manual_config()).unwrap();
    pipeline.set_window_size(100, 100);
    pipeline.set_image(ramp_image(100, 100)).unwrap();
    let (wx, wy) = pipeline.data_to_window(0.0, 0.0).unwrap();
    assert!((wx - 0.5).abs() < 1e-9);
    assert!((wy - 99.5).abs() < 1e-9);
}

#[test]
fn test_pan_to_data_recenters() {
    let mut pipeline = ramp_pipeline(200, 200, (100, 100));
    pipeline.pan_to_data(49.5, 149.5).unwrap();
    let state = pipeline.viewport();
    assert!((state.pan_x - 0.25).abs() < 1e-9);
    assert!((state.pan_y - 0.75).abs() < 1e-9);
    pipeline.render().unwrap();
    let geom = pipeline.geometry().unwrap();
    assert_eq!((geom.rect.x1, geom.rect.x2), (0, 100));
    assert_eq!((geom.rect.y1, geom.rect.y2), (100, 200));
}
