//! Element handles and screen geometry.
//!
//! These types are shared between the wire client and the page facade. They
//! carry no behaviour beyond simple geometry helpers.

use serde::{Deserialize, Serialize};

/// JSON key under which W3C servers return element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// A server-side reference to a located element.
///
/// Only valid for the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub id: String,
}

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A point in screen coordinates, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in screen coordinates.
///
/// Used both for element frames and for the window viewport. Servers report
/// these as floats; they are rounded to whole points on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    #[serde(deserialize_with = "de_rounded")]
    pub x: i32,
    #[serde(deserialize_with = "de_rounded")]
    pub y: i32,
    #[serde(deserialize_with = "de_rounded")]
    pub width: i32,
    #[serde(deserialize_with = "de_rounded")]
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The center point, rounded down.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

fn de_rounded<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as i32)
}
