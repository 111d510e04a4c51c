//! Axis-aligned rectangles in world (pixel) space.
//!
//! The engine uses screen-style coordinates: `x` grows to the right and `y`
//! grows downwards, so `top` is the smaller `y` value.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle stored as its top-left corner plus extents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Horizontal extent. Never negative.
    pub width: f32,
    /// Vertical extent. Never negative.
    pub height: f32,
}

impl Rect {
    /// Build a rectangle from its top-left corner and extents.
    ///
    /// Negative extents are clamped to zero.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Build a rectangle of the given extents centred on `center`.
    pub fn from_center(center: Vec2, width: f32, height: f32) -> Self {
        let mut rect = Self::new(0.0, 0.0, width, height);
        rect.set_center(center);
        rect
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Top-left corner.
    #[inline]
    pub fn top_left(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Width and height as a vector.
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Geometric centre.
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Move the rectangle so that its centre lands on `center`. Extents are
    /// unchanged.
    pub fn set_center(&mut self, center: Vec2) {
        self.x = center.x - self.width * 0.5;
        self.y = center.y - self.height * 0.5;
    }

    /// Whether `point` lies inside the rectangle (left/top inclusive,
    /// right/bottom exclusive).
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left()
            && point.x < self.right()
            && point.y >= self.top()
            && point.y < self.bottom()
    }

    /// Whether two rectangles share any interior area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_roundtrip() {
        let mut r = Rect::new(0.0, 0.0, 10.0, 4.0);
        r.set_center(Vec2::new(5.0, -3.0));
        assert_eq!(r.center(), Vec2::new(5.0, -3.0));
        assert_eq!(r.top_left(), Vec2::new(0.0, -5.0));
    }

    #[test]
    fn negative_extents_clamp_to_zero() {
        let r = Rect::new(1.0, 1.0, -5.0, 2.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.center(), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9.0, 9.0, 5.0, 5.0)));
    }

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(0.0, 0.0, 2.0, 2.0);
        assert!(r.contains(Vec2::ZERO));
        assert!(!r.contains(Vec2::new(2.0, 1.0)));
    }
}
