use approx::assert_abs_diff_eq;

use europa_core::error::EuropaError;
use europa_core::viewport::{
    clamp_zoom, compute_fit, data_to_window, pan_fraction_for, step_zoom, window_to_data,
    zoom_to_fit, ViewportState, ZoomDirection,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn state_with_window(win_w: u32, win_h: u32) -> ViewportState {
    ViewportState {
        window: Some((win_w, win_h)),
        ..ViewportState::default()
    }
}

// ---------------------------------------------------------------------------
// Zoom stepping and clamping
// ---------------------------------------------------------------------------

#[test]
fn test_step_zoom_crosses_gap() {
    // Stepping out from 1 skips the forbidden {0, -1} gap.
    let l1 = step_zoom(1, ZoomDirection::Out);
    assert_eq!(l1, -2);
    let l2 = step_zoom(l1, ZoomDirection::Out);
    assert_eq!(l2, -3);
    // Stepping back in from -2 returns exactly to 1, never 0 or -1.
    assert_eq!(step_zoom(-3, ZoomDirection::In), -2);
    assert_eq!(step_zoom(-2, ZoomDirection::In), 1);
    assert_eq!(step_zoom(1, ZoomDirection::In), 2);
}

#[test]
fn test_clamp_zoom_skips_forbidden_levels() {
    assert_eq!(clamp_zoom(0, -20, 100), 1);
    assert_eq!(clamp_zoom(-1, -20, 100), -2);
    assert_eq!(clamp_zoom(5, -20, 100), 5);
}

#[test]
fn test_clamp_zoom_range() {
    assert_eq!(clamp_zoom(1000, -20, 100), 100);
    assert_eq!(clamp_zoom(-50, -20, 100), -20);
}

#[test]
fn test_zoom_to_fit_levels() {
    // Limiting axis is the vertical one: ratio exactly 1.
    assert_eq!(zoom_to_fit(200, 100, 100, 100, -20, 100), 1);
    // 2x fits.
    assert_eq!(zoom_to_fit(100, 100, 50, 50, -20, 100), 2);
    // Needs 1/3 minification.
    assert_eq!(zoom_to_fit(100, 100, 300, 300, -20, 100), -3);
    // Between 1/2 and 1: first fitting level is -2.
    assert_eq!(zoom_to_fit(100, 100, 150, 150, -20, 100), -2);
}

// ---------------------------------------------------------------------------
// compute_fit
// ---------------------------------------------------------------------------

#[test]
fn test_compute_fit_requires_window() {
    let state = ViewportState::default();
    let err = compute_fit(&state, 100, 100).unwrap_err();
    assert!(matches!(err, EuropaError::WindowNotReady));
}

#[test]
fn test_compute_fit_centers_small_image() {
    let state = state_with_window(200, 200);
    let geom = compute_fit(&state, 100, 100).unwrap();
    assert_eq!(geom.dst_x, 50);
    assert_eq!(geom.dst_y, 50);
    assert_abs_diff_eq!(geom.src_x, 0.0);
    assert_eq!(geom.visible_width, 100);
    assert_eq!((geom.rect.x1, geom.rect.x2), (0, 100));
    assert_eq!((geom.rect.y1, geom.rect.y2), (0, 100));
}

#[test]
fn test_compute_fit_clips_and_pans_large_image() {
    let mut state = state_with_window(50, 50);
    let geom = compute_fit(&state, 100, 100).unwrap();
    // Centered pan: visible window sits in the middle of the data.
    assert_eq!(geom.dst_x, 0);
    assert_eq!((geom.rect.x1, geom.rect.x2), (25, 75));

    // Pan clamps at both extremes.
    state.pan_x = 0.0;
    state.pan_y = 1.0;
    let geom = compute_fit(&state, 100, 100).unwrap();
    assert_eq!((geom.rect.x1, geom.rect.x2), (0, 50));
    assert_eq!((geom.rect.y1, geom.rect.y2), (50, 100));
}

#[test]
fn test_compute_fit_minified() {
    let mut state = state_with_window(200, 200);
    state.zoom_level = -2;
    let geom = compute_fit(&state, 100, 100).unwrap();
    assert_abs_diff_eq!(geom.zoomed_width, 50.0);
    assert_eq!(geom.dst_x, 75);
    assert_eq!(geom.visible_width, 50);
    assert_eq!((geom.rect.x1, geom.rect.x2), (0, 100));
}

#[test]
fn test_compute_fit_swapped_exact_fit() {
    // 40x100 data transposed exactly fills a 100x40 window: nothing may be
    // clipped and nothing centered.
    let mut state = state_with_window(100, 40);
    state.swap_xy = true;
    let geom = compute_fit(&state, 40, 100).unwrap();
    assert_eq!((geom.dst_x, geom.dst_y), (0, 0));
    assert_eq!((geom.visible_width, geom.visible_height), (100, 40));
    assert_eq!((geom.rect.x1, geom.rect.x2), (0, 40));
    assert_eq!((geom.rect.y1, geom.rect.y2), (0, 100));
}

#[test]
fn test_compute_fit_swapped_clips_along_window_x() {
    // Transposed, the data y extent spans window x and gets clipped there.
    let mut state = state_with_window(50, 40);
    state.swap_xy = true;
    let geom = compute_fit(&state, 40, 100).unwrap();
    assert_eq!((geom.visible_width, geom.visible_height), (50, 40));
    assert_eq!((geom.rect.x1, geom.rect.x2), (0, 40));
    assert_eq!((geom.rect.y1, geom.rect.y2), (25, 75));
}

// ---------------------------------------------------------------------------
// Coordinate round trips
// ---------------------------------------------------------------------------

#[test]
fn test_data_to_window_known_values() {
    // 100x100 data at 2x exactly fills a 200x200 window.
    let mut state = state_with_window(200, 200);
    state.zoom_level = 2;
    let geom = compute_fit(&state, 100, 100).unwrap();
    // Data pixel (0, 0) is the bottom-left cell; its center lands one
    // zoomed half-cell in from each edge.
    let (wx, wy) = data_to_window(&state, &geom, 2, 0.0, 0.0, true);
    assert_abs_diff_eq!(wx, 1.0);
    assert_abs_diff_eq!(wy, 199.0);
    let (wx, wy) = data_to_window(&state, &geom, 2, 99.0, 99.0, true);
    assert_abs_diff_eq!(wx, 199.0);
    assert_abs_diff_eq!(wy, 1.0);
}

#[test]
fn test_round_trip_all_orientations() {
    let data_w = 64;
    let data_h = 48;
    for &zoom in &[2, -2] {
        for flags in 0..8u32 {
            let mut state = state_with_window(100, 80);
            state.zoom_level = zoom;
            state.flip_x = flags & 1 != 0;
            state.flip_y = flags & 2 != 0;
            state.swap_xy = flags & 4 != 0;
            let geom = compute_fit(&state, data_w, data_h).unwrap();

            let xs = [geom.rect.x1, (geom.rect.x1 + geom.rect.x2) / 2, geom.rect.x2 - 1];
            let ys = [geom.rect.y1, (geom.rect.y1 + geom.rect.y2) / 2, geom.rect.y2 - 1];
            for &x in &xs {
                for &y in &ys {
                    let (wx, wy) = data_to_window(&state, &geom, zoom, x as f64, y as f64, true);
                    let (bx, by) = window_to_data(&state, &geom, zoom, wx, wy, true);
                    assert!(
                        (bx - x as f64).abs() <= 1.0 && (by - y as f64).abs() <= 1.0,
                        "round trip failed: zoom={zoom} flags={flags:03b} \
                         ({x},{y}) -> ({wx:.2},{wy:.2}) -> ({bx:.2},{by:.2})"
                    );
                }
            }
        }
    }
}

#[test]
fn test_window_to_data_cursor_readout() {
    let state = state_with_window(100, 100);
    let geom = compute_fit(&state, 100, 100).unwrap();
    // Bottom-left window pixel center maps to data (0, 0).
    let (dx, dy) = window_to_data(&state, &geom, 1, 0.5, 99.5, true);
    assert_abs_diff_eq!(dx, 0.0);
    assert_abs_diff_eq!(dy, 0.0);
}

// ---------------------------------------------------------------------------
// Pan fractions
// ---------------------------------------------------------------------------

#[test]
fn test_pan_fraction_for_center_and_corner() {
    let (px, py) = pan_fraction_for(49.5, 49.5, 100, 100);
    assert_abs_diff_eq!(px, 0.5);
    assert_abs_diff_eq!(py, 0.5);
    let (px, py) = pan_fraction_for(0.0, 0.0, 100, 100);
    assert_abs_diff_eq!(px, 0.005);
    assert_abs_diff_eq!(py, 0.005);
}

#[test]
fn test_pan_fraction_clamps() {
    let (px, py) = pan_fraction_for(-10.0, 500.0, 100, 100);
    assert_abs_diff_eq!(px, 0.0);
    assert_abs_diff_eq!(py, 1.0);
}
