//! Window context for absolute pointer moves

use serde::{Deserialize, Serialize};

use crate::os_input::ABS_MAX;

/// Client-area origin of the target window and the screen size it lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl WindowGeometry {
    /// Translate a window-local point into the normalized `0..=ABS_MAX` range.
    ///
    /// Returns `None` for a zero-sized screen.
    pub fn to_normalized(&self, local_x: i32, local_y: i32) -> Option<(i32, i32)> {
        let sx = normalize(self.x as i64 + local_x as i64, self.screen_width)?;
        let sy = normalize(self.y as i64 + local_y as i64, self.screen_height)?;
        Some((sx, sy))
    }
}

fn normalize(screen: i64, extent: u32) -> Option<i32> {
    if extent == 0 {
        return None;
    }
    let scaled = screen * ABS_MAX as i64 / extent as i64;
    Some(scaled.clamp(0, ABS_MAX as i64) as i32)
}
