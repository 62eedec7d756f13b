use ndarray::{Array2, Array3, ArrayViewD};

use crate::error::{EuropaError, Result};

/// Pixel storage for a source image.
///
/// Values are f32 samples in arbitrary units (raw sensor counts, flux, ...).
/// NaN marks an invalid sample and is excluded from statistics.
#[derive(Clone, Debug)]
pub enum ImageData {
    /// Single channel, shape = (height, width).
    Mono(Array2<f32>),
    /// Separated channels, shape = (height, width, 3).
    Rgb(Array3<f32>),
}

/// A source image, owned by the caller and treated as read-only by the
/// rendering pipeline. Share one buffer across several viewports with
/// `Arc<ImageBuffer>`.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    pub data: ImageData,
}

impl ImageBuffer {
    pub fn from_mono(data: Array2<f32>) -> Result<Self> {
        let (h, w) = data.dim();
        if h == 0 || w == 0 {
            return Err(EuropaError::EmptyImage);
        }
        Ok(Self {
            data: ImageData::Mono(data),
        })
    }

    pub fn from_rgb(data: Array3<f32>) -> Result<Self> {
        let (h, w, c) = data.dim();
        if h == 0 || w == 0 {
            return Err(EuropaError::EmptyImage);
        }
        if c != 3 {
            return Err(EuropaError::InvalidDimensions {
                width: w,
                height: h,
                channels: c,
            });
        }
        Ok(Self {
            data: ImageData::Rgb(data),
        })
    }

    pub fn width(&self) -> usize {
        match &self.data {
            ImageData::Mono(a) => a.ncols(),
            ImageData::Rgb(a) => a.dim().1,
        }
    }

    pub fn height(&self) -> usize {
        match &self.data {
            ImageData::Mono(a) => a.nrows(),
            ImageData::Rgb(a) => a.dim().0,
        }
    }

    pub fn channels(&self) -> usize {
        match &self.data {
            ImageData::Mono(_) => 1,
            ImageData::Rgb(_) => 3,
        }
    }

    /// Dynamic-dimension view over all samples, used by the autocut engine.
    pub fn view_dyn(&self) -> ArrayViewD<'_, f32> {
        match &self.data {
            ImageData::Mono(a) => a.view().into_dyn(),
            ImageData::Rgb(a) => a.view().into_dyn(),
        }
    }
}
