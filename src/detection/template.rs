//! Template matching fallback.
//!
//! Scores every offset of a grayscale reference image over the frame with
//! zero-mean normalized cross-correlation and returns the first offset, in
//! row-major order, that clears the threshold. Window statistics come from
//! integral images and the cross term from an FFT, so a full-screen pass
//! does not depend on the template size.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::GrayImage;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use super::Region;
use crate::automation::config::AcceptConfig;
use crate::capture::Frame;

/// A template hit: top-left offset in the frame plus its correlation score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateMatch {
    pub x: u32,
    pub y: u32,
    pub score: f64,
}

/// Matches a reference image loaded once from disk.
pub struct TemplateMatcher {
    path: PathBuf,
    threshold: f64,
    template: OnceCell<GrayImage>,
}

impl TemplateMatcher {
    pub fn new(path: impl AsRef<Path>, threshold: f64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            threshold,
            template: OnceCell::new(),
        }
    }

    pub fn from_config(config: &AcceptConfig) -> Self {
        Self::new(&config.template_path, config.match_threshold)
    }

    /// Returns the cached template, loading it on first use.
    ///
    /// A failed load is not cached, so the next cycle retries.
    fn template(&self) -> Result<&GrayImage> {
        if let Some(template) = self.template.get() {
            return Ok(template);
        }
        let loaded = image::open(&self.path)
            .with_context(|| format!("Failed to load template image from {}", self.path.display()))?
            .to_luma8();
        tracing::debug!(
            "Loaded template {} ({}x{})",
            self.path.display(),
            loaded.width(),
            loaded.height()
        );
        Ok(self.template.get_or_init(|| loaded))
    }

    /// Looks for the template in `frame`. Any failure counts as no match.
    pub fn find_in(&self, frame: &Frame) -> Option<Region> {
        let template = match self.template() {
            Ok(template) => template,
            Err(e) => {
                tracing::error!("{:#}", e);
                return None;
            }
        };

        if frame.width() == 0 || frame.height() == 0 {
            tracing::error!("Error during template matching: empty frame");
            return None;
        }

        let fitted = fit_template(template, frame.width(), frame.height());
        let gray = frame.to_luma();

        let hit = find_first_match(&gray, &fitted, self.threshold)?;
        tracing::info!(
            "Found button by template at ({}, {}) with score {:.3}",
            hit.x,
            hit.y,
            hit.score
        );
        Some(Region::new(hit.x, hit.y, fitted.width(), fitted.height()))
    }
}

/// Shrinks a template that is larger than the frame in either axis to exactly
/// the frame's dimensions; other templates are returned unchanged.
pub fn fit_template(template: &GrayImage, frame_width: u32, frame_height: u32) -> GrayImage {
    let (tw, th) = template.dimensions();
    if tw > frame_width || th > frame_height {
        tracing::warn!(
            "Resizing template as it is larger than the frame: {}x{} -> {}x{}",
            tw,
            th,
            frame_width,
            frame_height
        );
        imageops::resize(template, frame_width, frame_height, FilterType::Triangle)
    } else {
        template.clone()
    }
}

/// Running sums over a grayscale image for O(1) window sums.
struct IntegralSums {
    width: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralSums {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];

        for y in 0..h {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = u64::from(img.as_raw()[y * w + x]);
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }

        Self {
            width: w,
            sum,
            sum_sq,
        }
    }

    /// Sum and sum of squares over the window at (x, y) of size w×h.
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let stride = self.width + 1;
        let at = |table: &[u64]| {
            table[(y + h) * stride + x + w] + table[y * stride + x]
                - table[y * stride + x + w]
                - table[(y + h) * stride + x]
        };
        (at(self.sum.as_slice()), at(self.sum_sq.as_slice()))
    }
}

/// Returns the first offset (top to bottom, then left to right) whose
/// zero-mean normalized cross-correlation with `template` is at least
/// `threshold`.
///
/// Windows or templates with no brightness variation score 0. The template
/// must fit inside the image.
pub fn find_first_match(
    image: &GrayImage,
    template: &GrayImage,
    threshold: f64,
) -> Option<TemplateMatch> {
    let (iw, ih) = (image.width() as usize, image.height() as usize);
    let (tw, th) = (template.width() as usize, template.height() as usize);
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let n = (tw * th) as i128;
    let t_raw = template.as_raw();
    let t_sum: u64 = t_raw.iter().map(|&v| u64::from(v)).sum();
    let t_sum_sq: u64 = t_raw.iter().map(|&v| u64::from(v) * u64::from(v)).sum();
    let t_var = n * i128::from(t_sum_sq) - i128::from(t_sum) * i128::from(t_sum);
    if t_var == 0 {
        return None;
    }

    let sums = IntegralSums::new(image);
    let approx_cross = cross_correlation(image, template);
    let score =
        |numerator: f64, w_var: i128| numerator / ((w_var as f64) * (t_var as f64)).sqrt();

    for y in 0..=(ih - th) {
        for x in 0..=(iw - tw) {
            let (w_sum, w_sum_sq) = sums.window(x, y, tw, th);
            let w_var = n * i128::from(w_sum_sq) - i128::from(w_sum) * i128::from(w_sum);
            if w_var == 0 {
                continue;
            }

            // The FFT estimate only screens offsets; hits are rescored exactly
            let approx = n as f64 * approx_cross[y * iw + x] - w_sum as f64 * t_sum as f64;
            if score(approx, w_var) < threshold - SCREEN_MARGIN {
                continue;
            }
            let cross = i128::from(exact_cross(image, template, x, y));
            let numerator = n * cross - i128::from(w_sum) * i128::from(t_sum);
            let exact = score(numerator as f64, w_var);
            if exact >= threshold {
                return Some(TemplateMatch {
                    x: x as u32,
                    y: y as u32,
                    score: exact,
                });
            }
        }
    }

    None
}

/// Slack for floating-point error in the FFT estimate.
const SCREEN_MARGIN: f64 = 1e-3;

/// Sum of products of the template with the image window at (x, y).
fn exact_cross(image: &GrayImage, template: &GrayImage, x: usize, y: usize) -> u64 {
    let iw = image.width() as usize;
    let tw = template.width() as usize;
    let (i_raw, t_raw) = (image.as_raw(), template.as_raw());

    t_raw
        .chunks(tw)
        .enumerate()
        .map(|(row, tpl_row)| {
            let start = (y + row) * iw + x;
            i_raw[start..start + tw]
                .iter()
                .zip(tpl_row)
                .map(|(&a, &b)| u64::from(a) * u64::from(b))
                .sum::<u64>()
        })
        .sum()
}

/// Cross term for every offset at once, computed in the frequency domain.
///
/// Entry `y * width + x` approximates `exact_cross(image, template, x, y)`.
/// The transform is the size of the image; offsets where the template fits
/// never wrap around.
fn cross_correlation(image: &GrayImage, template: &GrayImage) -> Vec<f64> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let tw = template.width() as usize;

    let mut planner = FftPlanner::<f64>::new();
    let row_forward = planner.plan_fft_forward(w);
    let col_forward = planner.plan_fft_forward(h);
    let row_inverse = planner.plan_fft_inverse(w);
    let col_inverse = planner.plan_fft_inverse(h);

    let forward = |mut buffer: Vec<Complex<f64>>| {
        row_forward.process(&mut buffer);
        let mut columns = transpose(&buffer, w, h);
        col_forward.process(&mut columns);
        columns
    };

    let image_buffer = image
        .as_raw()
        .iter()
        .map(|&v| Complex::new(f64::from(v), 0.0))
        .collect();
    let mut template_buffer = vec![Complex::new(0.0, 0.0); w * h];
    for (row, values) in template.as_raw().chunks(tw).enumerate() {
        for (col, &v) in values.iter().enumerate() {
            template_buffer[row * w + col] = Complex::new(f64::from(v), 0.0);
        }
    }

    let image_freq = forward(image_buffer);
    let template_freq = forward(template_buffer);
    let mut product: Vec<Complex<f64>> = image_freq
        .iter()
        .zip(&template_freq)
        .map(|(a, b)| *a * b.conj())
        .collect();

    col_inverse.process(&mut product);
    let mut spatial = transpose(&product, h, w);
    row_inverse.process(&mut spatial);

    let scale = 1.0 / (w * h) as f64;
    spatial.iter().map(|c| c.re * scale).collect()
}

/// Transposes a row-major `width`×`height` buffer.
fn transpose(src: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut dst = vec![Complex::new(0.0, 0.0); src.len()];
    for y in 0..height {
        for x in 0..width {
            dst[x * height + y] = src[y * width + x];
        }
    }
    dst
}
