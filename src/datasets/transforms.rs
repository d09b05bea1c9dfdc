//! Image normalisation, the deterministic crop/resize pipeline and the
//! rng-driven augmentation applied before it.

use image::DynamicImage;
use ndarray::{Array2, ArrayView2};
use rand::{Rng, RngCore};

/// Side length every X-ray is resized to before feature extraction.
pub const XRAY_SIZE: usize = 224;

/// Maps raw pixel values in `[0, max_value]` onto `[-1024, 1024]`.
pub fn normalize(img: &mut Array2<f32>, max_value: f32) {
    img.mapv_inplace(|v| v / max_value * 2048.0 - 1024.0);
}

/// The deterministic transform: centre crop to a square, then bilinear
/// resize. Applied after normalisation, so it interpolates floats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrayTransform {
    pub center_crop: bool,
    pub resize_to: Option<usize>,
}

impl Default for XrayTransform {
    fn default() -> Self {
        Self {
            center_crop: true,
            resize_to: Some(XRAY_SIZE),
        }
    }
}

impl XrayTransform {
    /// An identity transform that leaves images untouched.
    pub fn identity() -> Self {
        Self {
            center_crop: false,
            resize_to: None,
        }
    }

    pub fn apply(&self, img: Array2<f32>) -> Array2<f32> {
        let img = if self.center_crop { center_crop(img) } else { img };
        match self.resize_to {
            Some(size) if img.nrows() != size || img.ncols() != size => {
                resize_bilinear(img.view(), size)
            }
            _ => img,
        }
    }
}

/// Crops the central square of the shorter side.
fn center_crop(img: Array2<f32>) -> Array2<f32> {
    let (h, w) = img.dim();
    let side = h.min(w);
    if side == h && side == w {
        return img;
    }
    let top = (h - side) / 2;
    let left = (w - side) / 2;
    img.slice(ndarray::s![top..top + side, left..left + side])
        .to_owned()
}

/// Bilinear interpolation onto a `size` by `size` grid.
fn resize_bilinear(img: ArrayView2<f32>, size: usize) -> Array2<f32> {
    let (h, w) = img.dim();
    let mut out = Array2::zeros((size, size));

    let scale_y = h as f32 / size as f32;
    let scale_x = w as f32 / size as f32;

    for oy in 0..size {
        // Sample at pixel centres so the grid stays symmetric.
        let sy = ((oy as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (h - 1) as f32);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(h - 1);
        let fy = sy - y0 as f32;

        for ox in 0..size {
            let sx = ((ox as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (w - 1) as f32);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);
            let fx = sx - x0 as f32;

            let top = img[[y0, x0]] * (1.0 - fx) + img[[y0, x1]] * fx;
            let bottom = img[[y1, x0]] * (1.0 - fx) + img[[y1, x1]] * fx;
            out[[oy, ox]] = top * (1.0 - fy) + bottom * fy;
        }
    }
    out
}

/// Random augmentation applied to the decoded image before grayscale
/// conversion: flips, quarter-turn rotations and brightness/contrast
/// jitter. Every draw comes from the caller's rng, so a fixed seed
/// reproduces the augmented stream exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmentation {
    pub hflip_prob: f64,
    pub vflip_prob: f64,
    pub quarter_turns: bool,
    /// Brightness offset range in pixel values and contrast range in
    /// percent, both drawn uniformly from `[-jitter, jitter]`.
    pub jitter: f32,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self {
            hflip_prob: 0.5,
            vflip_prob: 0.5,
            quarter_turns: true,
            jitter: 25.0,
        }
    }
}

impl Augmentation {
    pub fn apply(&self, mut img: DynamicImage, rng: &mut dyn RngCore) -> DynamicImage {
        if rng.random_bool(self.hflip_prob) {
            img = img.fliph();
        }
        if rng.random_bool(self.vflip_prob) {
            img = img.flipv();
        }
        if self.quarter_turns {
            img = match rng.random_range(0..4_u8) {
                0 => img,
                1 => img.rotate90(),
                2 => img.rotate180(),
                _ => img.rotate270(),
            };
        }
        if self.jitter > 0.0 {
            let brightness = rng.random_range(-self.jitter..=self.jitter) as i32;
            let contrast = rng.random_range(-self.jitter..=self.jitter);
            img = img.brighten(brightness).adjust_contrast(contrast);
        }
        img
    }
}
