//! Window location contract.
//!
//! Finding the game window by title or process name is platform-specific and
//! lives in the front-end. The core only needs a client-area rectangle in
//! screen coordinates and the ability to re-assert focus before injecting
//! input.

use crate::config::RelativePoint;

/// Client area of the located game window, in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowRegion {
    /// Screen X of the client area's top-left corner.
    pub x: i32,
    /// Screen Y of the client area's top-left corner.
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowRegion {
    /// Converts a relative point (0.0-1.0 within the client area) to
    /// absolute screen coordinates.
    pub fn to_screen(&self, point: RelativePoint) -> (i32, i32) {
        let x = self.x + (point.x * self.width as f32).round() as i32;
        let y = self.y + (point.y * self.height as f32).round() as i32;
        (x, y)
    }
}

/// Locates and focuses the game window.
///
/// "Window not found" is an expected condition, reported as `None` rather
/// than an error; the loop retries it a bounded number of times before
/// surfacing a fatal failure.
pub trait WindowLocator {
    /// Finds the game window's client area, if the window currently exists.
    fn locate(&mut self) -> Option<WindowRegion>;

    /// Brings the window to the foreground. Returns false if focus could not
    /// be asserted (e.g. the window vanished between locate and focus).
    fn focus(&mut self, region: &WindowRegion) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_screen_maps_relative_point() {
        let region = WindowRegion {
            x: 100,
            y: 50,
            width: 1280,
            height: 720,
        };
        let (x, y) = region.to_screen(RelativePoint { x: 0.5, y: 0.5 });
        assert_eq!((x, y), (740, 410));

        let (x, y) = region.to_screen(RelativePoint { x: 0.0, y: 0.0 });
        assert_eq!((x, y), (100, 50));

        let (x, y) = region.to_screen(RelativePoint { x: 1.0, y: 1.0 });
        assert_eq!((x, y), (1380, 770));
    }
}
