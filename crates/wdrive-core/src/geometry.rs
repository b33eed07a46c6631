//! Screen geometry shared by gestures and element queries.
//!
//! Gesture helpers on [`Client`](crate::client::Client) take coordinates as
//! fractions of the screen (`0.0..=1.0`) and translate them to points with
//! [`percent_to_pixels`] against the reported [`WindowSize`].

use serde::{Deserialize, Serialize};

/// The frame (position and dimensions) of a UI element.
///
/// Coordinates are in screen points, with the origin at the top-left
/// corner of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// The x-coordinate of the element's top-left corner.
    pub x: f64,
    /// The y-coordinate of the element's top-left corner.
    pub y: f64,
    /// The width of the element in points.
    pub width: f64,
    /// The height of the element in points.
    pub height: f64,
}

impl Rect {
    /// The centre of the frame, truncated to whole points.
    pub fn center(&self) -> Point {
        Point {
            x: (self.x + self.width / 2.0) as i64,
            y: (self.y + self.height / 2.0) as i64,
        }
    }
}

/// Size of the application window, as reported by `GET /window/size`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
}

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Translate fractional screen coordinates to points.
///
/// Values are truncated toward zero, so `(0.5, 0.5)` on a 400x800 window is
/// `(200, 400)`.
pub fn percent_to_pixels(x: f64, y: f64, size: WindowSize) -> Point {
    Point {
        x: (x * size.width) as i64,
        y: (y * size.height) as i64,
    }
}
