use serde::{Deserialize, Serialize};

/// Canvas-space position of a node box. Layout works in whole canvas units so
/// that subtree shifts are exact and repeated reflows converge bit-for-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub top: i32,
    pub left: i32,
}

impl Position {
    pub const fn new(left: i32, top: i32) -> Self {
        Self { top, left }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Rounds a measured (fractional) size up to whole canvas units.
    pub fn from_measured(width: f32, height: f32) -> Self {
        Self {
            width: width.ceil().max(1.0) as i32,
            height: height.ceil().max(1.0) as i32,
        }
    }
}

/// Free-floating point, used for screen coordinates and connector geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<Position> for Point {
    fn from(p: Position) -> Self {
        Point::new(p.left as f32, p.top as f32)
    }
}
