//! Pixel and perceptual frame metrics.
//!
//! Each metric takes two frames of identical shape. Their normalisation
//! bases differ on purpose and are kept as they were first defined:
//!
//! - [`mse`] sums squared differences over every channel but divides by
//!   `height * width` only;
//! - [`psnr`] derives from the mean squared difference over every element,
//!   channels included;
//! - [`ssim`] works on a luma conversion of both frames.

use image::GrayImage;

use crate::error::CompareError;
use crate::frame::Frame;

/// PSNR reported for identical frames.
pub const PSNR_IDENTICAL: f64 = 100.0;

/// Peak sample value of an 8-bit channel.
const MAX_SAMPLE: f64 = 255.0;

/// SSIM window side length.
const SSIM_WINDOW: usize = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

fn ensure_same_shape(frame: &Frame, reference: &Frame) -> Result<(), CompareError> {
    if frame.dimensions() != reference.dimensions() {
        return Err(CompareError::DimensionMismatch {
            left: frame.dimensions(),
            right: reference.dimensions(),
        });
    }
    Ok(())
}

fn sum_squared_difference(frame: &Frame, reference: &Frame) -> f64 {
    frame
        .as_raw()
        .iter()
        .zip(reference.as_raw())
        .map(|(&a, &b)| {
            let diff = f64::from(a) - f64::from(b);
            diff * diff
        })
        .sum()
}

/// Sum of squared channel differences divided by the pixel count.
///
/// # Errors
///
/// [`CompareError::DimensionMismatch`] if the frames differ in shape.
pub fn mse(frame: &Frame, reference: &Frame) -> Result<f64, CompareError> {
    ensure_same_shape(frame, reference)?;
    let pixels = f64::from(frame.width()) * f64::from(frame.height());
    if pixels == 0.0 {
        return Ok(0.0);
    }
    Ok(sum_squared_difference(frame, reference) / pixels)
}

/// Peak signal-to-noise ratio in decibels, with a peak of 255.
///
/// Returns [`PSNR_IDENTICAL`] when the frames are identical.
///
/// # Errors
///
/// [`CompareError::DimensionMismatch`] if the frames differ in shape.
pub fn psnr(frame: &Frame, reference: &Frame) -> Result<f64, CompareError> {
    ensure_same_shape(frame, reference)?;
    let elements = frame.as_raw().len() as f64;
    if elements == 0.0 {
        return Ok(PSNR_IDENTICAL);
    }
    let mean_squared = sum_squared_difference(frame, reference) / elements;
    if mean_squared == 0.0 {
        return Ok(PSNR_IDENTICAL);
    }
    Ok(20.0 * (MAX_SAMPLE / mean_squared.sqrt()).log10())
}

/// Mean structural similarity of the luma planes of two frames.
///
/// Uses a 7×7 uniform window with sample covariance, `K1 = 0.01`,
/// `K2 = 0.03` and a data range of 255. The mean is taken over window
/// centres at least three pixels away from every border.
///
/// # Errors
///
/// - [`CompareError::DimensionMismatch`] if the frames differ in shape.
/// - [`CompareError::InvalidConfiguration`] if a frame is smaller than 7×7.
pub fn ssim(frame: &Frame, reference: &Frame) -> Result<f64, CompareError> {
    ensure_same_shape(frame, reference)?;
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return Err(CompareError::InvalidConfiguration(format!(
            "SSIM needs frames of at least {SSIM_WINDOW}x{SSIM_WINDOW}, got {width}x{height}"
        )));
    }

    let x = luma(frame);
    let y = luma(reference);
    let tables = WindowSums::new(&x, &y);

    let samples = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let covariance_norm = samples / (samples - 1.0);
    let c1 = (SSIM_K1 * MAX_SAMPLE).powi(2);
    let c2 = (SSIM_K2 * MAX_SAMPLE).powi(2);
    let pad = SSIM_WINDOW / 2;

    let mut total = 0.0;
    let mut count = 0usize;
    for row in pad..height - pad {
        for column in pad..width - pad {
            let sums = tables.window(row - pad, column - pad);
            let ux = sums.x / samples;
            let uy = sums.y / samples;
            let vx = covariance_norm * (sums.xx / samples - ux * ux);
            let vy = covariance_norm * (sums.yy / samples - uy * uy);
            let vxy = covariance_norm * (sums.xy / samples - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    Ok(total / count as f64)
}

/// ITU-R BT.601 luma, rounded to 8 bits.
fn luma(frame: &Frame) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let value = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
        image::Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct Sums {
    x: f64,
    y: f64,
    xx: f64,
    yy: f64,
    xy: f64,
}

impl Sums {
    fn add(self, other: Sums) -> Sums {
        Sums {
            x: self.x + other.x,
            y: self.y + other.y,
            xx: self.xx + other.xx,
            yy: self.yy + other.yy,
            xy: self.xy + other.xy,
        }
    }

    fn sub(self, other: Sums) -> Sums {
        Sums {
            x: self.x - other.x,
            y: self.y - other.y,
            xx: self.xx - other.xx,
            yy: self.yy - other.yy,
            xy: self.xy - other.xy,
        }
    }
}

/// Summed-area tables of x, y, x², y² and xy.
struct WindowSums {
    stride: usize,
    table: Vec<Sums>,
}

impl WindowSums {
    fn new(x: &GrayImage, y: &GrayImage) -> Self {
        let (width, height) = (x.width() as usize, x.height() as usize);
        let stride = width + 1;
        let mut table = vec![Sums::default(); stride * (height + 1)];

        for row in 0..height {
            let mut running = Sums::default();
            for column in 0..width {
                let a = f64::from(x.get_pixel(column as u32, row as u32).0[0]);
                let b = f64::from(y.get_pixel(column as u32, row as u32).0[0]);
                running = running.add(Sums {
                    x: a,
                    y: b,
                    xx: a * a,
                    yy: b * b,
                    xy: a * b,
                });
                let above = table[row * stride + column + 1];
                table[(row + 1) * stride + column + 1] = running.add(above);
            }
        }

        Self { stride, table }
    }

    /// Sums over the window whose top-left corner is `(top, left)`.
    fn window(&self, top: usize, left: usize) -> Sums {
        let bottom = top + SSIM_WINDOW;
        let right = left + SSIM_WINDOW;
        let at = |row: usize, column: usize| self.table[row * self.stride + column];
        at(bottom, right)
            .sub(at(top, right))
            .sub(at(bottom, left))
            .add(at(top, left))
    }
}
