//! Template matching via zero-mean normalized cross-correlation.
//!
//! Confidence is the best correlation score clamped to [0, 1]; a template is
//! accepted when confidence >= its configured threshold (inclusive). "No
//! match" is an ordinary result with `matched = false`, never an error. The
//! only error path is a resolution mismatch the matcher cannot reconcile,
//! which would otherwise surface as a silent low-confidence false negative.

use image::imageops::{self, FilterType};

use crate::capture::Capture;
use crate::screen::Template;
use crate::vision::preprocess::{to_luma, GrayImage};

/// Pixel location within a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Outcome of matching one template against one capture.
///
/// Derived per iteration and never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    /// Name of the template that was searched for.
    pub template: String,
    /// Correlation confidence in [0, 1].
    pub confidence: f32,
    /// Best-scoring top-left position, in capture pixel coordinates.
    pub location: Point,
    /// Whether confidence reached the template's threshold.
    pub matched: bool,
}

/// Hard failure modes of the matcher. Everything else is `matched = false`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchError {
    /// The capture cannot hold the template and no reference resolution is
    /// configured to rescale against.
    ResolutionMismatch {
        capture: (u32, u32),
        template: (u32, u32),
    },
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::ResolutionMismatch { capture, template } => write!(
                f,
                "capture {}x{} cannot be matched against template {}x{}",
                capture.0, capture.1, template.0, template.1
            ),
        }
    }
}

impl std::error::Error for MatchError {}

/// Deterministic, side-effect-free template matcher.
#[derive(Clone, Debug)]
pub struct ImageMatcher {
    /// Resolution the templates were authored at. Captures at any other
    /// resolution are rescaled to this before matching.
    reference_resolution: Option<(u32, u32)>,
}

impl ImageMatcher {
    pub fn new(reference_resolution: Option<(u32, u32)>) -> Self {
        Self {
            reference_resolution,
        }
    }

    /// Searches the capture for the template's best match location.
    ///
    /// When the template carries an expected region, the search is limited
    /// to that region. The returned location is always in the capture's own
    /// pixel coordinates, even when matching ran against a rescaled copy.
    pub fn find(&self, capture: &Capture, template: &Template) -> Result<MatchResult, MatchError> {
        let (cap_w, cap_h) = capture.resolution();
        let (tpl_w, tpl_h) = template.image.dimensions();

        // Rescale the capture to the template authoring resolution if they
        // disagree; guessing would just produce low-confidence noise.
        let (frame, scale_x, scale_y) = match self.reference_resolution {
            Some((ref_w, ref_h)) if (cap_w, cap_h) != (ref_w, ref_h) => {
                let resized =
                    imageops::resize(&capture.image, ref_w, ref_h, FilterType::Triangle);
                (
                    to_luma(&resized),
                    cap_w as f32 / ref_w as f32,
                    cap_h as f32 / ref_h as f32,
                )
            }
            _ => (to_luma(&capture.image), 1.0, 1.0),
        };

        let (frame_w, frame_h) = frame.dimensions();
        if tpl_w > frame_w || tpl_h > frame_h || tpl_w == 0 || tpl_h == 0 {
            return Err(MatchError::ResolutionMismatch {
                capture: (frame_w, frame_h),
                template: (tpl_w, tpl_h),
            });
        }

        let tpl = to_luma(&template.image);

        // Restrict the search window to the template's expected region.
        let (x0, y0, x1, y1) = match &template.region {
            Some(region) => {
                let rx0 = ((region.x * frame_w as f32) as u32).min(frame_w);
                let ry0 = ((region.y * frame_h as f32) as u32).min(frame_h);
                let rx1 = (rx0 + (region.width * frame_w as f32) as u32).min(frame_w);
                let ry1 = (ry0 + (region.height * frame_h as f32) as u32).min(frame_h);
                if rx1.saturating_sub(rx0) < tpl_w || ry1.saturating_sub(ry0) < tpl_h {
                    return Err(MatchError::ResolutionMismatch {
                        capture: (rx1 - rx0, ry1 - ry0),
                        template: (tpl_w, tpl_h),
                    });
                }
                (rx0, ry0, rx1 - tpl_w, ry1 - tpl_h)
            }
            None => (0, 0, frame_w - tpl_w, frame_h - tpl_h),
        };

        let (tpl_mean, tpl_norm) = mean_and_norm(&tpl);

        let mut best_score = f32::MIN;
        let mut best = Point { x: x0, y: y0 };

        for y in y0..=y1 {
            for x in x0..=x1 {
                let score = correlate(&frame, &tpl, x, y, tpl_mean, tpl_norm);
                if score > best_score {
                    best_score = score;
                    best = Point { x, y };
                }
            }
        }

        let confidence = best_score.clamp(0.0, 1.0);
        Ok(MatchResult {
            template: template.name.clone(),
            confidence,
            location: Point {
                x: (best.x as f32 * scale_x).round() as u32,
                y: (best.y as f32 * scale_y).round() as u32,
            },
            matched: confidence >= template.threshold,
        })
    }
}

/// Mean and zero-mean L2 norm of a grayscale image.
fn mean_and_norm(img: &GrayImage) -> (f32, f32) {
    let count = (img.width() * img.height()) as f64;
    let sum: f64 = img.pixels().map(|p| p[0] as f64).sum();
    let mean = sum / count;
    let sq: f64 = img
        .pixels()
        .map(|p| {
            let d = p[0] as f64 - mean;
            d * d
        })
        .sum();
    (mean as f32, sq.sqrt() as f32)
}

/// Zero-mean normalized cross-correlation of the template against the frame
/// window at (x, y). Returns 0.0 for flat (zero-variance) regions.
fn correlate(
    frame: &GrayImage,
    tpl: &GrayImage,
    x: u32,
    y: u32,
    tpl_mean: f32,
    tpl_norm: f32,
) -> f32 {
    let (tw, th) = tpl.dimensions();
    let count = (tw * th) as f64;

    let mut window_sum = 0.0f64;
    for ty in 0..th {
        for tx in 0..tw {
            window_sum += frame.get_pixel(x + tx, y + ty)[0] as f64;
        }
    }
    let window_mean = window_sum / count;

    let mut cross = 0.0f64;
    let mut window_sq = 0.0f64;
    for ty in 0..th {
        for tx in 0..tw {
            let fv = frame.get_pixel(x + tx, y + ty)[0] as f64 - window_mean;
            let tv = tpl.get_pixel(tx, ty)[0] as f64 - tpl_mean as f64;
            cross += fv * tv;
            window_sq += fv * fv;
        }
    }

    let denom = window_sq.sqrt() * tpl_norm as f64;
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (cross / denom) as f32
}
