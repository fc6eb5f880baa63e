use anyhow::{bail, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::definitions::Image;
use imageproc::filter::separable_filter_equal;

/// Parameters for turning a button crop into a clean black/white OCR input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreprocessOptions {
    /// Upscale factor applied before binarization (small crops OCR poorly)
    pub scale: f32,
    /// Side of the neighborhood used for the local threshold (odd, >= 3)
    pub block_size: u32,
    /// Constant subtracted from the local weighted mean
    pub offset: i32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            block_size: 11,
            offset: 2,
        }
    }
}

/// Upscales, grayscales and binarizes a crop for OCR.
///
/// Output pixels are either 0 or 255.
pub fn prepare_for_ocr(img: &RgbImage, options: &PreprocessOptions) -> Result<GrayImage> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        bail!("cannot preprocess an empty image ({}x{})", w, h);
    }
    if options.scale.is_nan() || options.scale <= 0.0 {
        bail!("invalid scale factor: {}", options.scale);
    }

    let new_w = ((w as f32 * options.scale).round() as u32).max(1);
    let new_h = ((h as f32 * options.scale).round() as u32).max(1);
    let resized = imageops::resize(img, new_w, new_h, FilterType::Triangle);

    let gray = imageops::grayscale(&resized);
    adaptive_threshold_gaussian(&gray, options.block_size, options.offset)
}

/// Binarizes against a Gaussian-weighted local mean.
///
/// A pixel becomes white when it is brighter than the mean of its
/// `block_size`×`block_size` neighborhood minus `offset`, black otherwise.
/// Borders replicate the edge pixels.
pub fn adaptive_threshold_gaussian(
    gray: &GrayImage,
    block_size: u32,
    offset: i32,
) -> Result<GrayImage> {
    let kernel = gaussian_kernel(block_size)?;

    let values: Image<Luma<f32>> = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([f32::from(gray.get_pixel(x, y)[0])])
    });
    let local_mean = separable_filter_equal(&values, &kernel);

    let offset = offset as f32;
    Ok(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = values.get_pixel(x, y)[0];
        if value > local_mean.get_pixel(x, y)[0] - offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    }))
}

/// Normalized Gaussian weights with exactly `block_size` taps.
///
/// Sigma follows `0.3 * ((block_size - 1) * 0.5 - 1) + 0.8`.
fn gaussian_kernel(block_size: u32) -> Result<Vec<f32>> {
    if block_size < 3 || block_size % 2 == 0 {
        bail!("block size must be odd and at least 3, got {}", block_size);
    }

    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (block_size / 2) as f32;
    let weights: Vec<f32> = (0..block_size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / total).collect())
}
