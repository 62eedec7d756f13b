use ndarray::{s, Array2, Array3};

use crate::image::{ImageBuffer, ImageData};
use crate::viewport::DataRect;

/// Pixel data of an extracted cutout, matching the source channel layout.
#[derive(Clone, Debug)]
pub enum CutoutData {
    Mono(Array2<f32>),
    Rgb(Array3<f32>),
}

impl CutoutData {
    pub fn width(&self) -> usize {
        match self {
            Self::Mono(a) => a.ncols(),
            Self::Rgb(a) => a.dim().1,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Self::Mono(a) => a.nrows(),
            Self::Rgb(a) => a.dim().0,
        }
    }
}

/// The minimal subarray of the source covering the visible window, already
/// resampled and flip/swapped for display.
#[derive(Clone, Debug)]
pub struct Cutout {
    pub data: CutoutData,
    /// Resampling record: negative = every |n|-th pixel was taken (stride,
    /// minified view); positive = each pixel was repeated n times
    /// (magnified view). Consumed by every coordinate conversion.
    pub replication: i32,
}

/// Uniform stride for a rect larger than the target on either axis.
fn stride_for(rect_w: usize, rect_h: usize, target_w: usize, target_h: usize) -> usize {
    let sx = (rect_w / target_w).max(1);
    let sy = (rect_h / target_h).max(1);
    sx.max(sy)
}

/// Uniform repeat count for a rect smaller than (or equal to) the target.
fn repeat_for(rect_w: usize, rect_h: usize, target_w: usize, target_h: usize) -> usize {
    let rx = target_w.div_ceil(rect_w).max(1);
    let ry = target_h.div_ceil(rect_h).max(1);
    rx.max(ry)
}

fn resample_mono(src: &Array2<f32>, rect: DataRect, factor: i32) -> Array2<f32> {
    if factor < 0 {
        let skip = (-factor) as usize;
        src.slice(s![rect.y1..rect.y2;skip, rect.x1..rect.x2;skip])
            .to_owned()
    } else {
        let repeat = factor as usize;
        let (rw, rh) = (rect.width(), rect.height());
        Array2::from_shape_fn((rh * repeat, rw * repeat), |(y, x)| {
            src[[rect.y1 + y / repeat, rect.x1 + x / repeat]]
        })
    }
}

fn resample_rgb(src: &Array3<f32>, rect: DataRect, factor: i32) -> Array3<f32> {
    if factor < 0 {
        let skip = (-factor) as usize;
        src.slice(s![rect.y1..rect.y2;skip, rect.x1..rect.x2;skip, ..])
            .to_owned()
    } else {
        let repeat = factor as usize;
        let (rw, rh) = (rect.width(), rect.height());
        Array3::from_shape_fn((rh * repeat, rw * repeat, 3), |(y, x, c)| {
            src[[rect.y1 + y / repeat, rect.x1 + x / repeat, c]]
        })
    }
}

fn orient_mono(arr: Array2<f32>, flip_x: bool, flip_y: bool, swap_xy: bool) -> Array2<f32> {
    let mut v = arr.view();
    if flip_y {
        v = v.slice_move(s![..;-1, ..]);
    }
    if flip_x {
        v = v.slice_move(s![.., ..;-1]);
    }
    if swap_xy {
        v.t().to_owned()
    } else {
        v.to_owned()
    }
}

fn orient_rgb(arr: Array3<f32>, flip_x: bool, flip_y: bool, swap_xy: bool) -> Array3<f32> {
    let mut v = arr.view();
    if flip_y {
        v = v.slice_move(s![..;-1, .., ..]);
    }
    if flip_x {
        v = v.slice_move(s![.., ..;-1, ..]);
    }
    if swap_xy {
        v.permuted_axes([1, 0, 2]).to_owned()
    } else {
        v.to_owned()
    }
}

/// Extract the data rectangle from the source, resampled to cover at least
/// `target_w` x `target_h` pixels (targets are in data orientation, i.e.
/// pre-swap), then apply the display flips/transpose.
///
/// Zoomed-out views stride the source (one uniform skip on both axes);
/// zoomed-in views replicate rows and columns. The produced subarray is
/// never smaller than the target: violating that is a logic error in the
/// caller's geometry, not a data error.
pub fn extract_cutout(
    image: &ImageBuffer,
    rect: DataRect,
    target_w: usize,
    target_h: usize,
    flip_x: bool,
    flip_y: bool,
    swap_xy: bool,
) -> Cutout {
    assert!(target_w > 0 && target_h > 0, "cutout target must be nonzero");
    let (rw, rh) = (rect.width(), rect.height());

    let replication = if rw > target_w || rh > target_h {
        -(stride_for(rw, rh, target_w, target_h) as i32)
    } else {
        repeat_for(rw, rh, target_w, target_h) as i32
    };

    let data = match &image.data {
        ImageData::Mono(src) => {
            let arr = resample_mono(src, rect, replication);
            CutoutData::Mono(orient_mono(arr, flip_x, flip_y, swap_xy))
        }
        ImageData::Rgb(src) => {
            let arr = resample_rgb(src, rect, replication);
            CutoutData::Rgb(orient_rgb(arr, flip_x, flip_y, swap_xy))
        }
    };

    // Post-swap the target orientation follows the data.
    let (need_w, need_h) = if swap_xy {
        (target_h, target_w)
    } else {
        (target_w, target_h)
    };
    assert!(
        data.width() >= need_w && data.height() >= need_h,
        "cutout {}x{} smaller than target {}x{}",
        data.width(),
        data.height(),
        need_w,
        need_h
    );

    Cutout { data, replication }
}
