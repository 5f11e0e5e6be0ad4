//! Screen capture contract and capture geometry.
//!
//! The actual capture backend is platform territory; the loop only depends
//! on [`ScreenSource`], which a front-end implements on top of whatever
//! capture API the platform offers.

pub mod window;

use anyhow::Result;
use image::{ImageBuffer, Rgba};
use std::time::Instant;

pub use window::{WindowLocator, WindowRegion};

/// RGBA pixel buffer type used throughout the perception pipeline.
pub type Frame = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// A single screen snapshot.
///
/// Owned exclusively by the loop iteration that produced it and dropped when
/// the iteration completes; captures are never cached across iterations.
pub struct Capture {
    /// The captured pixels, client area only.
    pub image: Frame,
    /// Monotonic timestamp taken when the snapshot was produced.
    pub taken_at: Instant,
}

impl Capture {
    pub fn new(image: Frame) -> Self {
        Self {
            image,
            taken_at: Instant::now(),
        }
    }

    /// Capture resolution as (width, height).
    pub fn resolution(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Supplies fresh captures of the game window.
///
/// Implementations may block on OS calls; the loop treats a capture error as
/// a transient failure feeding the retry policy.
pub trait ScreenSource {
    fn capture(&mut self) -> Result<Capture>;
}
