//! Color segmentation: finds button-colored regions in a frame.
//!
//! Pixels are converted to HSV using the 8-bit convention common to vision
//! libraries (hue 0–179, saturation and value 0–255), masked against a
//! `ColorRange`, and the external contours of the mask are reduced to
//! bounding boxes.

use anyhow::{bail, Result};
use image::{GrayImage, Luma, Rgb};
use imageproc::contours::{find_contours, BorderType, Contour};
use serde::{Deserialize, Serialize};

use super::Region;
use crate::capture::Frame;

/// Inclusive HSV bounds describing the button color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    /// Lower (hue, saturation, value) bound
    pub lower: [u8; 3],
    /// Upper (hue, saturation, value) bound
    pub upper: [u8; 3],
}

impl Default for ColorRange {
    /// The green used by matchmaking "ACCEPT" buttons.
    fn default() -> Self {
        Self {
            lower: [50, 100, 100],
            upper: [80, 255, 255],
        }
    }
}

impl ColorRange {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Converts an RGB pixel to 8-bit HSV (H in 0..180, S and V in 0..=255).
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = f32::from(max - min);

    let v = max;
    let s = if max == 0 {
        0
    } else {
        (255.0 * delta / f32::from(max)).round() as u8
    };

    if delta == 0.0 {
        return [0, s, v];
    }

    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let mut h = if max == pixel[0] {
        60.0 * (g - b) / delta
    } else if max == pixel[1] {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = ((h / 2.0).round() as u32 % 180) as u8;
    [h, s, v]
}

/// Builds a binary mask: 255 where the pixel's HSV lies within `range`, 0 elsewhere.
pub fn color_mask(frame: &Frame, range: &ColorRange) -> GrayImage {
    let img = frame.image();
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if range.contains(rgb_to_hsv(img.get_pixel(x, y))) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Returns the bounding boxes of all button-colored blobs in `frame`.
///
/// Failures degrade to an empty list so the caller can continue with the
/// template fallback.
pub fn find_regions(frame: &Frame, range: &ColorRange) -> Vec<Region> {
    match try_find_regions(frame, range) {
        Ok(regions) => {
            tracing::debug!("Found {} color region(s)", regions.len());
            regions
        }
        Err(e) => {
            tracing::error!("Error detecting color regions: {}", e);
            Vec::new()
        }
    }
}

fn try_find_regions(frame: &Frame, range: &ColorRange) -> Result<Vec<Region>> {
    if frame.width() == 0 || frame.height() == 0 {
        bail!("frame is empty ({}x{})", frame.width(), frame.height());
    }
    if (0..3).any(|i| range.lower[i] > range.upper[i]) {
        bail!("invalid color range: {:?}", range);
    }

    tracing::trace!("Creating color mask...");
    let mask = pad_with_background(&color_mask(frame, range));

    let contours: Vec<Contour<u32>> = find_contours(&mask);
    Ok(contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(bounding_box)
        .collect())
}

/// Surrounds the mask with a 1-pixel background border.
///
/// `find_contours` only starts an outer border at x > 0, so blobs touching
/// the left edge would otherwise be missed.
fn pad_with_background(mask: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut padded, mask, 1, 1);
    padded
}

/// Bounding box of a contour traced on the padded mask, inclusive of its
/// edge pixels, in frame coordinates.
fn bounding_box(contour: &Contour<u32>) -> Option<Region> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    // Foreground pixels of the padded mask start at (1, 1)
    Some(Region::new(
        min_x.saturating_sub(1),
        min_y.saturating_sub(1),
        max_x - min_x + 1,
        max_y - min_y + 1,
    ))
}
