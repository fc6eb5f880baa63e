//! The captured pixel buffer for one scan iteration.

use image::{GrayImage, RgbImage};

use crate::detection::Region;

/// A captured screen image plus the screen-space position of its top-left pixel.
///
/// Frames are immutable once captured and are dropped at the end of the
/// iteration that produced them.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    origin: (i32, i32),
}

impl Frame {
    /// Creates a frame captured at the given screen origin.
    pub fn new(image: RgbImage, origin: (i32, i32)) -> Self {
        Self { image, origin }
    }

    /// Creates a frame whose pixels map 1:1 to screen coordinates.
    #[cfg(test)]
    pub fn from_image(image: RgbImage) -> Self {
        Self::new(image, (0, 0))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    /// Returns the grayscale version of the whole frame.
    pub fn to_luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }

    /// Crops the sub-image bounded by `region`, clamped to the frame bounds.
    pub fn crop(&self, region: &Region) -> RgbImage {
        let (w, h) = self.image.dimensions();

        let x0 = region.x.min(w);
        let y0 = region.y.min(h);
        let rw = region.width.min(w - x0);
        let rh = region.height.min(h - y0);

        image::imageops::crop_imm(&self.image, x0, y0, rw, rh).to_image()
    }

    /// Converts a point in frame coordinates to screen coordinates.
    pub fn to_screen(&self, (x, y): (u32, u32)) -> (i32, i32) {
        (self.origin.0 + x as i32, self.origin.1 + y as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_crop() {
        let img = RgbImage::from_fn(100, 200, |x, y| Rgb([x as u8, y as u8, 0]));
        let frame = Frame::from_image(img);

        let cropped = frame.crop(&Region::new(10, 50, 50, 20));

        assert_eq!(cropped.dimensions(), (50, 20));
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }

    #[test]
    fn test_crop_clamps() {
        let frame = Frame::from_image(RgbImage::new(100, 100));
        let cropped = frame.crop(&Region::new(90, 90, 50, 50));

        // Only the remaining 10x10 pixels are available
        assert_eq!(cropped.dimensions(), (10, 10));
    }

    #[test]
    fn test_to_screen_applies_origin() {
        let frame = Frame::new(RgbImage::new(10, 10), (-1920, 40));
        assert_eq!(frame.to_screen((5, 6)), (-1915, 46));
    }
}
