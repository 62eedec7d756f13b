use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayViewMut2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_HASH_EXPO, DEFAULT_HASH_SIZE, HASH_LEVELS, MAX_HASH_SIZE, MIN_HASH_SIZE,
    PARALLEL_PIXEL_THRESHOLD,
};
use crate::error::{EuropaError, Result};

/// Spacing curve used to build the quantization hash table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Linear,
    Logarithmic,
    Exponential,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Logarithmic => write!(f, "logarithmic"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = EuropaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Self::Linear),
            "logarithmic" => Ok(Self::Logarithmic),
            "exponential" => Ok(Self::Exponential),
            other => Err(EuropaError::UnknownHashAlgorithm(other.to_string())),
        }
    }
}

/// 256-entry palette with float components in [0, 1].
#[derive(Clone)]
pub struct ColorMap(pub [[f32; 3]; 256]);

impl ColorMap {
    /// Neutral grayscale ramp.
    pub fn grayscale() -> Self {
        let mut colors = [[0.0f32; 3]; 256];
        for (i, c) in colors.iter_mut().enumerate() {
            let v = i as f32 / 255.0;
            *c = [v, v, v];
        }
        Self(colors)
    }
}

impl fmt::Debug for ColorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorMap").finish_non_exhaustive()
    }
}

/// Permutation of the 256 color-table entries. Warps the brightness
/// response without changing the palette itself.
#[derive(Clone)]
pub struct IntensityMap(pub [u8; 256]);

impl IntensityMap {
    pub fn identity() -> Self {
        let mut map = [0u8; 256];
        for (i, m) in map.iter_mut().enumerate() {
            *m = i as u8;
        }
        Self(map)
    }

    pub fn reversed() -> Self {
        let mut map = [0u8; 256];
        for (i, m) in map.iter_mut().enumerate() {
            *m = (255 - i) as u8;
        }
        Self(map)
    }
}

impl fmt::Debug for IntensityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntensityMap").finish_non_exhaustive()
    }
}

/// Normalized intensity indices produced by the level stage, one entry per
/// output pixel (per channel for separated input), each in [0, hash_size).
#[derive(Clone, Debug)]
pub enum IndexArray {
    Mono(Array2<u32>),
    Rgb(Array3<u32>),
}

/// Converts normalized intensity indices into RGB pixels through a
/// quantization hash and a 3x256 color table.
#[derive(Clone, Debug)]
pub struct RgbMapper {
    cmap: ColorMap,
    imap: IntensityMap,
    /// Working 3x256 byte table: the palette reordered by the intensity
    /// map, then shifted by the accumulated shift fraction.
    clut: [[u8; 256]; 3],
    /// Net shift fraction applied on top of the calculated table.
    shift_pct: f64,
    hash: Vec<u8>,
    hash_algorithm: HashAlgorithm,
    hash_size: usize,
    hash_expo: f64,
}

impl Default for RgbMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl RgbMapper {
    pub fn new() -> Self {
        let mut mapper = Self {
            cmap: ColorMap::grayscale(),
            imap: IntensityMap::identity(),
            clut: [[0; 256]; 3],
            shift_pct: 0.0,
            hash: compute_hash(HashAlgorithm::Linear, DEFAULT_HASH_SIZE, DEFAULT_HASH_EXPO),
            hash_algorithm: HashAlgorithm::Linear,
            hash_size: DEFAULT_HASH_SIZE,
            hash_expo: DEFAULT_HASH_EXPO,
        };
        mapper.recalc();
        mapper
    }

    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn hash_expo(&self) -> f64 {
        self.hash_expo
    }

    pub fn hash_table(&self) -> &[u8] {
        &self.hash
    }

    /// The working 3x256 byte color table (R, G, B rows).
    pub fn color_table(&self) -> &[[u8; 256]; 3] {
        &self.clut
    }

    pub fn set_color_map(&mut self, cmap: ColorMap) {
        self.cmap = cmap;
        self.recalc();
    }

    pub fn set_intensity_map(&mut self, imap: IntensityMap) {
        self.imap = imap;
        self.recalc();
    }

    /// Rebuild the quantization hash. `hash_size` outside (255, 1048576]
    /// is a configuration error.
    pub fn set_hash(&mut self, algorithm: HashAlgorithm, hash_size: usize, expo: f64) -> Result<()> {
        if hash_size < MIN_HASH_SIZE || hash_size > MAX_HASH_SIZE {
            return Err(EuropaError::HashSizeOutOfRange(hash_size));
        }
        self.hash = compute_hash(algorithm, hash_size, expo);
        self.hash_algorithm = algorithm;
        self.hash_size = hash_size;
        self.hash_expo = expo;
        Ok(())
    }

    /// Scroll the color ramp by a fraction of its length, accumulating on
    /// top of any previous shift. Not a true rotation: the edge entry is
    /// repeated so the table stays at 256 entries.
    pub fn shift(&mut self, pct: f64) {
        self.shift_pct += pct;
        self.recalc();
    }

    /// Clear any accumulated shift and reapply the current maps.
    pub fn reset(&mut self) {
        self.shift_pct = 0.0;
        self.recalc();
    }

    fn recalc(&mut self) {
        let mut clut = [[0u8; 256]; 3];
        for i in 0..256 {
            let j = self.imap.0[i] as usize;
            for c in 0..3 {
                clut[c][i] = (self.cmap.0[j][c].clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        let amount = (255.0 * self.shift_pct).round() as i32;
        if amount != 0 {
            clut = shift_table(&clut, amount);
        }
        self.clut = clut;
    }

    /// Map normalized intensity indices to an RGB image of shape (h, w, 3).
    /// Indices are clipped to [0, hash_size).
    pub fn map(&self, indices: &IndexArray) -> Array3<u8> {
        match indices {
            IndexArray::Mono(idx) => self.map_mono(idx),
            IndexArray::Rgb(idx) => self.map_rgb(idx),
        }
    }

    fn map_mono(&self, indices: &Array2<u32>) -> Array3<u8> {
        let (h, w) = indices.dim();
        let top = (self.hash_size - 1) as u32;
        let hash = &self.hash;
        let clut = &self.clut;
        let mut out = Array3::<u8>::zeros((h, w, 3));

        let fill_row = |mut orow: ArrayViewMut2<'_, u8>, irow: ArrayView1<'_, u32>| {
            for (mut px, &idx) in orow.outer_iter_mut().zip(irow.iter()) {
                let level = hash[idx.min(top) as usize] as usize;
                px[0] = clut[0][level];
                px[1] = clut[1][level];
                px[2] = clut[2][level];
            }
        };

        let zip = Zip::from(out.axis_iter_mut(Axis(0))).and(indices.axis_iter(Axis(0)));
        if h * w > PARALLEL_PIXEL_THRESHOLD {
            zip.par_for_each(fill_row);
        } else {
            zip.for_each(fill_row);
        }
        out
    }

    fn map_rgb(&self, indices: &Array3<u32>) -> Array3<u8> {
        let (h, w, _) = indices.dim();
        let top = (self.hash_size - 1) as u32;
        let hash = &self.hash;
        let clut = &self.clut;
        let mut out = Array3::<u8>::zeros((h, w, 3));

        let fill_row = |mut orow: ArrayViewMut2<'_, u8>, irow: ArrayView2<'_, u32>| {
            for (mut px, ipx) in orow.outer_iter_mut().zip(irow.outer_iter()) {
                for c in 0..3 {
                    let level = hash[ipx[c].min(top) as usize] as usize;
                    px[c] = clut[c][level];
                }
            }
        };

        let zip = Zip::from(out.axis_iter_mut(Axis(0))).and(indices.axis_iter(Axis(0)));
        if h * w > PARALLEL_PIXEL_THRESHOLD {
            zip.par_for_each(fill_row);
        } else {
            zip.for_each(fill_row);
        }
        out
    }
}

/// Shift each channel row of the table, repeating the boundary entry
/// `|amount| + 1` times so the length stays 256.
fn shift_table(table: &[[u8; 256]; 3], amount: i32) -> [[u8; 256]; 3] {
    let mut out = [[0u8; 256]; 3];
    for c in 0..3 {
        if amount > 0 {
            let n = (amount as usize).min(255);
            for i in 0..256 {
                out[c][i] = if i <= n { table[c][0] } else { table[c][i - n] };
            }
        } else {
            let n = ((-amount) as usize).min(255);
            for i in 0..256 {
                out[c][i] = if i < 255 - n {
                    table[c][i + n]
                } else {
                    table[c][255]
                };
            }
        }
    }
    out
}

/// Build a monotonic hash of exactly `hash_size` entries, each in [0, 255],
/// for the requested spacing curve. `hash_size` must already be validated.
fn compute_hash(algorithm: HashAlgorithm, hash_size: usize, expo: f64) -> Vec<u8> {
    let size = hash_size as f64;
    let levels = HASH_LEVELS as f64;

    let boundary: Box<dyn Fn(usize) -> f64> = match algorithm {
        HashAlgorithm::Linear => {
            // Uniform step per output level.
            let step = (size / levels).round().max(1.0);
            Box::new(move |i| i as f64 * step)
        }
        HashAlgorithm::Logarithmic => {
            if expo.abs() < f64::EPSILON {
                Box::new(move |i| size * i as f64 / levels)
            } else if expo > 0.0 {
                // Denser sampling near the low end.
                let denom = expo.exp() - 1.0;
                Box::new(move |i| size * (((i as f64 / levels) * expo).exp() - 1.0) / denom)
            } else {
                // Mirrored curve: denser sampling near the high end.
                let a = -expo;
                let denom = a.exp() - 1.0;
                Box::new(move |i| {
                    size * (1.0 - ((((levels - i as f64) / levels) * a).exp() - 1.0) / denom)
                })
            }
        }
        HashAlgorithm::Exponential => {
            if expo <= f64::EPSILON {
                // Non-positive exponents have no usable power curve; fall
                // back to the linear ramp.
                Box::new(move |i| size * i as f64 / levels)
            } else {
                Box::new(move |i| size * (i as f64 / levels).powf(expo))
            }
        }
    };

    let mut hash = Vec::with_capacity(hash_size + HASH_LEVELS);
    for level in 0..HASH_LEVELS {
        let start = boundary(level).round().max(0.0) as usize;
        let end = boundary(level + 1).round().max(0.0) as usize;
        if end > start {
            hash.extend(std::iter::repeat(level as u8).take(end - start));
        }
    }

    // Truncate or pad so the length is exact; a mismatch past this point
    // is an internal invariant violation.
    hash.truncate(hash_size);
    let pad = *hash.last().unwrap_or(&255);
    while hash.len() < hash_size {
        hash.push(pad);
    }
    assert_eq!(hash.len(), hash_size, "hash table length mismatch");
    hash
}
