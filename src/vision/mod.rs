//! Perception primitives: template matching, image preprocessing, and OCR.

pub mod matcher;
pub mod ocr;
pub mod preprocess;

pub use matcher::{ImageMatcher, MatchError, MatchResult, Point};
pub use ocr::{Recognized, TesseractRecognizer, TextRecognizer};
pub use preprocess::{crop_region, threshold_bright_pixels, to_luma, GrayImage};
