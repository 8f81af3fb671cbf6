//! Mean structural similarity between two grayscale images.
//!
//! Local statistics are taken over every `window`×`window` block that fits
//! inside the image, using summed-area tables so each window costs O(1).
//! Constants follow the usual definition: `C1 = (K1·L)²`, `C2 = (K2·L)²` with
//! sample (N-1) normalisation of variances and covariance.

use image::GrayImage;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SsimError {
    #[error("image sizes differ: {left:?} vs {right:?}")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
    #[error("image has no pixels")]
    Empty,
}

/// SSIM parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ssim {
    /// Side of the square comparison window; shrunk to fit tiny images.
    pub window: u32,
    pub k1: f64,
    pub k2: f64,
    /// Dynamic range of pixel values.
    pub data_range: f64,
}

impl Default for Ssim {
    fn default() -> Self {
        Self { window: 7, k1: 0.01, k2: 0.03, data_range: 255.0 }
    }
}

impl Ssim {
    /// Mean SSIM over all windows. 1.0 means identical.
    pub fn compare(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SsimError> {
        if a.dimensions() != b.dimensions() {
            return Err(SsimError::DimensionMismatch { left: a.dimensions(), right: b.dimensions() });
        }
        let (w, h) = a.dimensions();
        if w == 0 || h == 0 {
            return Err(SsimError::Empty);
        }
        let win = self.window.min(w).min(h).max(1);
        let table = Moments::new(a, b);

        let np = (win * win) as f64;
        let cov_norm = if np > 1.0 { np / (np - 1.0) } else { 1.0 };
        let c1 = (self.k1 * self.data_range).powi(2);
        let c2 = (self.k2 * self.data_range).powi(2);

        let mut total = 0.0;
        let mut count = 0u64;
        for y in 0..=(h - win) {
            for x in 0..=(w - win) {
                let [sx, sy, sxx, syy, sxy] = table.window(x, y, win);
                let ux = sx / np;
                let uy = sy / np;
                let vx = cov_norm * (sxx / np - ux * ux);
                let vy = cov_norm * (syy / np - uy * uy);
                let vxy = cov_norm * (sxy / np - ux * uy);
                let num = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
                let den = (ux * ux + uy * uy + c1) * (vx + vy + c2);
                total += num / den;
                count += 1;
            }
        }
        Ok(total / count as f64)
    }
}

/// Mean SSIM with default parameters.
///
/// ```
/// use bot_2048::vision::ssim;
/// use image::GrayImage;
/// let a = GrayImage::from_fn(16, 16, |x, y| image::Luma([((x * 16 + y) % 256) as u8]));
/// let s = ssim(&a, &a).unwrap();
/// assert!((s - 1.0).abs() < 1e-9);
/// ```
pub fn ssim(a: &GrayImage, b: &GrayImage) -> Result<f64, SsimError> {
    Ssim::default().compare(a, b)
}

// Summed-area tables of x, y, x², y² and xy, (w+1)×(h+1) with a zero border.
struct Moments {
    stride: usize,
    sums: Vec<[f64; 5]>,
}

impl Moments {
    fn new(a: &GrayImage, b: &GrayImage) -> Self {
        let (w, h) = a.dimensions();
        let stride = w as usize + 1;
        let mut sums = vec![[0.0f64; 5]; stride * (h as usize + 1)];
        for y in 0..h as usize {
            let mut row = [0.0f64; 5];
            for x in 0..w as usize {
                let px = a.get_pixel(x as u32, y as u32)[0] as f64;
                let py = b.get_pixel(x as u32, y as u32)[0] as f64;
                let cell = [px, py, px * px, py * py, px * py];
                let above = sums[y * stride + x + 1];
                for k in 0..5 {
                    row[k] += cell[k];
                }
                let out = &mut sums[(y + 1) * stride + x + 1];
                for k in 0..5 {
                    out[k] = above[k] + row[k];
                }
            }
        }
        Moments { stride, sums }
    }

    fn window(&self, x: u32, y: u32, win: u32) -> [f64; 5] {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + win as usize, y0 + win as usize);
        let at = |xx: usize, yy: usize| self.sums[yy * self.stride + xx];
        let (a, b, c, d) = (at(x1, y1), at(x0, y1), at(x1, y0), at(x0, y0));
        let mut out = [0.0; 5];
        for k in 0..5 {
            out[k] = a[k] - b[k] - c[k] + d[k];
        }
        out
    }
}
