//! services/api/src/adapters/filters.rs
//!
//! The enhancement catalog, implemented on top of `image` and `imageproc`.
//! It implements the `ImageEnhancer` port from the `core` crate.

use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use image_enhancer_core::domain::Technique;
use image_enhancer_core::ports::{ImageEnhancer, PortError, PortResult};
use rand::Rng;
use rayon::prelude::*;

/// Fraction of pixels replaced by salt or pepper.
const SALT_AND_PEPPER_DENSITY: f64 = 0.05;
const CANNY_LOW_THRESHOLD: f32 = 100.0;
const CANNY_HIGH_THRESHOLD: f32 = 200.0;

/// 5x5 Gaussian taps (binomial, sum 16 per axis).
const GAUSSIAN_TAPS: [i32; 5] = [1, 4, 6, 4, 1];
const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// Non-local means filter strength, patch radius (7x7) and search radius (21x21).
const DENOISE_STRENGTH: f64 = 10.0;
const DENOISE_PATCH_RADIUS: i64 = 3;
const DENOISE_SEARCH_RADIUS: i64 = 10;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// The fixed catalog of image transforms.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageprocEnhancer;

impl ImageprocEnhancer {
    pub fn new() -> Self {
        Self
    }

    /// Applies `technique` drawing any randomness from `rng`. Only salt & pepper
    /// consumes it; every other technique is a pure function of its input.
    pub fn apply_with_rng<R: Rng + ?Sized>(
        &self,
        technique: Technique,
        image: &RgbImage,
        rng: &mut R,
    ) -> PortResult<RgbImage> {
        check_layout(image)?;
        let enhanced = match technique {
            Technique::HistogramEqualization => equalize_luma(image),
            Technique::GaussianBlur => gaussian_blur(image),
            Technique::Sharpening => convolve(image, &SHARPEN_KERNEL, 3, 1),
            Technique::EdgeDetection => edge_map(image),
            Technique::Complement => complement(image),
            Technique::SaltAndPepper => salt_and_pepper(image, rng),
            Technique::Denoise => denoise(image),
        };
        Ok(enhanced)
    }
}

impl ImageEnhancer for ImageprocEnhancer {
    fn enhance(&self, technique: Technique, image: &RgbImage) -> PortResult<RgbImage> {
        self.apply_with_rng(technique, image, &mut rand::rng())
    }
}

/// Rejects buffers that are not a non-empty, tightly packed 3x8-bit layout.
fn check_layout(image: &RgbImage) -> PortResult<()> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PortError::UnsupportedFormat("image has no pixels".to_string()));
    }
    let expected = width as usize * height as usize * 3;
    if image.as_raw().len() != expected {
        return Err(PortError::UnsupportedFormat(format!(
            "expected {} bytes for a {}x{} RGB8 image, found {}",
            expected,
            width,
            height,
            image.as_raw().len()
        )));
    }
    Ok(())
}

/// Broadcasts a single channel to three identical channels for display.
fn replicate(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

//=========================================================================================
// Transforms
//=========================================================================================

/// Equalizes the luma channel in YUV space so hue is left alone.
fn equalize_luma(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity(width as usize * height as usize);

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(f32::from);
        let y_value = 0.299 * r + 0.587 * g + 0.114 * b;
        chroma.push((0.492 * (b - y_value), 0.877 * (r - y_value)));
        luma.put_pixel(x, y, Luma([y_value.round().clamp(0.0, 255.0) as u8]));
    }

    let equalized = imageproc::contrast::equalize_histogram(&luma);

    let mut out = RgbImage::new(width, height);
    for (pixel, (y_pixel, (u, v))) in out.pixels_mut().zip(equalized.pixels().zip(chroma)) {
        let y_value = f32::from(y_pixel[0]);
        let r = y_value + 1.140 * v;
        let g = y_value - 0.395 * u - 0.581 * v;
        let b = y_value + 2.032 * u;
        *pixel = Rgb([to_u8(r), to_u8(g), to_u8(b)]);
    }
    out
}

fn gaussian_blur(image: &RgbImage) -> RgbImage {
    let mut kernel = [0i32; 25];
    for (row, wy) in GAUSSIAN_TAPS.iter().enumerate() {
        for (col, wx) in GAUSSIAN_TAPS.iter().enumerate() {
            kernel[row * 5 + col] = wy * wx;
        }
    }
    convolve(image, &kernel, 5, 256)
}

/// Square-kernel convolution with zero padding outside the image. Each channel
/// sum is divided by `divisor`, rounded to nearest and clamped to 0..=255.
fn convolve(image: &RgbImage, kernel: &[i32], size: u32, divisor: i32) -> RgbImage {
    debug_assert_eq!(kernel.len(), (size * size) as usize);
    let (width, height) = image.dimensions();
    let radius = i64::from(size / 2);

    RgbImage::from_fn(width, height, |x, y| {
        let mut acc = [0i32; 3];
        for ky in 0..size {
            for kx in 0..size {
                let weight = kernel[(ky * size + kx) as usize];
                if weight == 0 {
                    continue;
                }
                let sx = i64::from(x) + i64::from(kx) - radius;
                let sy = i64::from(y) + i64::from(ky) - radius;
                if sx < 0 || sy < 0 || sx >= i64::from(width) || sy >= i64::from(height) {
                    continue;
                }
                let source = image.get_pixel(sx as u32, sy as u32);
                for (channel, sum) in acc.iter_mut().enumerate() {
                    *sum += weight * i32::from(source[channel]);
                }
            }
        }
        Rgb(acc.map(|sum| to_u8(sum as f32 / divisor as f32)))
    })
}

fn edge_map(image: &RgbImage) -> RgbImage {
    let gray = imageops::grayscale(image);
    let edges = imageproc::edges::canny(&gray, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
    replicate(&edges)
}

fn complement(image: &RgbImage) -> RgbImage {
    let mut gray = imageops::grayscale(image);
    imageops::invert(&mut gray);
    replicate(&gray)
}

fn salt_and_pepper<R: Rng + ?Sized>(image: &RgbImage, rng: &mut R) -> RgbImage {
    let mut gray = imageops::grayscale(image);
    for pixel in gray.pixels_mut() {
        if rng.random_bool(SALT_AND_PEPPER_DENSITY) {
            pixel[0] = if rng.random_bool(0.5) { u8::MAX } else { 0 };
        }
    }
    replicate(&gray)
}

/// Colour non-local means. For every offset in the search window the squared
/// difference between the image and its shifted copy is box-summed over the
/// patch with an integral image, so each patch distance costs O(1).
fn denoise(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let pixels: Vec<[f64; 3]> = image.pixels().map(|p| p.0.map(f64::from)).collect();
    let h2 = DENOISE_STRENGTH * DENOISE_STRENGTH;

    let mut weighted = vec![[0f64; 3]; w * h];
    let mut weight_sums = vec![0f64; w * h];
    let clamp = |v: i64, max: usize| v.clamp(0, max as i64 - 1) as usize;

    for dy in -DENOISE_SEARCH_RADIUS..=DENOISE_SEARCH_RADIUS {
        for dx in -DENOISE_SEARCH_RADIUS..=DENOISE_SEARCH_RADIUS {
            // integral[(y + 1) * (w + 1) + (x + 1)] = sum of diffs in [0..=x] x [0..=y]
            let mut integral = vec![0f64; (w + 1) * (h + 1)];
            for y in 0..h {
                let mut row_sum = 0f64;
                let sy = clamp(y as i64 + dy, h);
                for x in 0..w {
                    let sx = clamp(x as i64 + dx, w);
                    let a = pixels[y * w + x];
                    let b = pixels[sy * w + sx];
                    row_sum += (0..3).map(|c| (a[c] - b[c]).powi(2)).sum::<f64>() / 3.0;
                    integral[(y + 1) * (w + 1) + x + 1] = integral[y * (w + 1) + x + 1] + row_sum;
                }
            }

            weighted
                .par_chunks_mut(w)
                .zip(weight_sums.par_chunks_mut(w))
                .enumerate()
                .for_each(|(y, (weighted_row, sums_row))| {
                    let y0 = clamp(y as i64 - DENOISE_PATCH_RADIUS, h);
                    let y1 = clamp(y as i64 + DENOISE_PATCH_RADIUS, h) + 1;
                    let sy = clamp(y as i64 + dy, h);
                    for x in 0..w {
                        let x0 = clamp(x as i64 - DENOISE_PATCH_RADIUS, w);
                        let x1 = clamp(x as i64 + DENOISE_PATCH_RADIUS, w) + 1;
                        let area = ((y1 - y0) * (x1 - x0)) as f64;
                        let patch = integral[y1 * (w + 1) + x1] - integral[y0 * (w + 1) + x1]
                            - integral[y1 * (w + 1) + x0]
                            + integral[y0 * (w + 1) + x0];
                        let weight = (-(patch / area).max(0.0) / h2).exp();
                        let neighbour = pixels[sy * w + clamp(x as i64 + dx, w)];
                        for c in 0..3 {
                            weighted_row[x][c] += weight * neighbour[c];
                        }
                        sums_row[x] += weight;
                    }
                });
        }
    }

    RgbImage::from_fn(width, height, |x, y| {
        let i = y as usize * w + x as usize;
        let sum = weight_sums[i];
        Rgb(weighted[i].map(|v| to_u8((v / sum) as f32)))
    })
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
