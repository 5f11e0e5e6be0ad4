//! Pixel-level preparation shared by the matcher and the OCR path.

use image::{ImageBuffer, Luma};

use crate::capture::Frame;
use crate::config::RelativeRect;

pub type GrayImage = ImageBuffer<Luma<u8>, Vec<u8>>;

/// Converts an RGBA frame to grayscale with the BT.601 luma weights
/// (Y = 0.299 R + 0.587 G + 0.114 B).
pub fn to_luma(img: &Frame) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let y601 = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([y601.round().min(255.0) as u8])
    })
}

/// Binarizes a frame for OCR: pixels bright on every RGB channel become
/// black text on a white background, everything else becomes background.
/// Game UI text is bright on dark panels, so a per-channel floor separates
/// it cleanly.
pub fn threshold_bright_pixels(img: &Frame, threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let bright = p[0] > threshold && p[1] > threshold && p[2] > threshold;
        Luma([if bright { 0 } else { 255 }])
    })
}

/// Cuts the sub-image described by a relative rect, clamped to the frame.
pub fn crop_region(img: &Frame, region: &RelativeRect) -> Frame {
    let (w, h) = img.dimensions();

    let x0 = ((region.x * w as f32) as u32).min(w);
    let y0 = ((region.y * h as f32) as u32).min(h);
    let crop_w = ((region.width * w as f32) as u32).min(w - x0);
    let crop_h = ((region.height * h as f32) as u32).min(h - y0);

    image::imageops::crop_imm(img, x0, y0, crop_w, crop_h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_to_luma_weights() {
        let mut img = Frame::new(3, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        // Pure green: 0.587 * 255 ~= 150
        img.put_pixel(2, 0, Rgba([0, 255, 0, 255]));

        let gray = to_luma(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
        assert_eq!(gray.get_pixel(2, 0)[0], 150);
    }

    #[test]
    fn test_threshold_keeps_only_fully_bright_pixels() {
        let mut img = Frame::new(3, 1);
        img.put_pixel(0, 0, Rgba([80, 80, 80, 255]));
        img.put_pixel(1, 0, Rgba([240, 240, 240, 255]));
        // One dim channel disqualifies the pixel
        img.put_pixel(2, 0, Rgba([240, 240, 90, 255]));

        let binary = threshold_bright_pixels(&img, 190);
        assert_eq!(binary.get_pixel(0, 0)[0], 255);
        assert_eq!(binary.get_pixel(1, 0)[0], 0);
        assert_eq!(binary.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_crop_region_maps_relative_rect() {
        let img = Frame::from_fn(200, 100, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let region = RelativeRect {
            x: 0.25,
            y: 0.1,
            width: 0.5,
            height: 0.4,
        };
        let cropped = crop_region(&img, &region);

        assert_eq!(cropped.dimensions(), (100, 40));
        assert_eq!(cropped.get_pixel(0, 0)[0], 50);
        assert_eq!(cropped.get_pixel(0, 0)[1], 10);
    }

    #[test]
    fn test_crop_region_clamps_to_frame() {
        let img = Frame::new(60, 60);
        let region = RelativeRect {
            x: 0.75,
            y: 0.75,
            width: 1.0,
            height: 1.0,
        };
        assert_eq!(crop_region(&img, &region).dimensions(), (15, 15));
    }
}
