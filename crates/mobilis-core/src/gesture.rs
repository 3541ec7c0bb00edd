//! Swipe geometry.
//!
//! A swipe covers a fraction of the viewport along one axis and is centered
//! on the viewport. The cross axis stays at the viewport's midline. There is
//! no element-relative swiping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::{Point, Rect};

/// Direction the finger travels.
///
/// `Up` moves from the bottom of the screen towards the top, which scrolls
/// content down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    pub fn is_vertical(&self) -> bool {
        matches!(self, SwipeDirection::Up | SwipeDirection::Down)
    }
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        };
        f.write_str(s)
    }
}

impl FromStr for SwipeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(SwipeDirection::Up),
            "down" => Ok(SwipeDirection::Down),
            "left" => Ok(SwipeDirection::Left),
            "right" => Ok(SwipeDirection::Right),
            other => Err(format!(
                "invalid swipe direction '{other}'. Use: up, down, left, right"
            )),
        }
    }
}

/// Share of the viewport a swipe travels unless configured otherwise.
pub const DEFAULT_SWIPE_FRACTION: f64 = 0.6;

/// Computes start and end points for a swipe across `viewport`.
///
/// `fraction` is clamped to `0.0..=1.0`; NaN and infinities fall back to
/// [`DEFAULT_SWIPE_FRACTION`]. The travelled distance equals `fraction` of
/// the axis extent, up to one point of rounding.
pub fn swipe_path(viewport: Rect, direction: SwipeDirection, fraction: f64) -> (Point, Point) {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        DEFAULT_SWIPE_FRACTION
    };
    let extent = if direction.is_vertical() {
        viewport.height
    } else {
        viewport.width
    };
    let origin = if direction.is_vertical() {
        viewport.y
    } else {
        viewport.x
    };

    let half = f64::from(extent) * fraction / 2.0;
    let mid = f64::from(extent) / 2.0;
    let near = origin + (mid - half).round() as i32;
    let far = origin + (mid + half).round() as i32;

    let center = viewport.center();
    match direction {
        SwipeDirection::Up => (Point::new(center.x, far), Point::new(center.x, near)),
        SwipeDirection::Down => (Point::new(center.x, near), Point::new(center.x, far)),
        SwipeDirection::Left => (Point::new(far, center.y), Point::new(near, center.y)),
        SwipeDirection::Right => (Point::new(near, center.y), Point::new(far, center.y)),
    }
}
