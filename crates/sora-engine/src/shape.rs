//! Collision shapes and cardinal-axis interval math.
//!
//! A [`Shape`] is a component describing a rectangle attached to an entity,
//! centred on the entity position plus an offset. Shapes never cache their
//! world-space corners: [`Shape::vertices`] recomputes them from the position
//! passed in, which is usually the entity's projected position for the frame.
//!
//! Overlap is decided by projecting both shapes onto the world X and Y axes
//! only. That is exact for axis-aligned boxes and an approximation for rotated
//! ones, whose own edge normals are not tested.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use sora_ecs::component::Component;

/// World X axis.
pub const X_AXIS: Vec2 = Vec2::X;
/// World Y axis.
pub const Y_AXIS: Vec2 = Vec2::Y;

// ---------------------------------------------------------------------------
// Shape types
// ---------------------------------------------------------------------------

/// Concrete shape type, used to dispatch collision resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeKind {
    Aabb,
    Rotated,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Aabb => f.write_str("AABB"),
            ShapeKind::Rotated => f.write_str("RotatedBox"),
        }
    }
}

/// Checks the extents every box-like constructor accepts.
///
/// # Panics
///
/// Panics if `width` or `height` is negative or not finite.
pub(crate) fn assert_extents(what: &str, width: f32, height: f32) {
    assert!(
        width >= 0.0 && height >= 0.0 && width.is_finite() && height.is_finite(),
        "{what} extents must be finite and non-negative, got {width}x{height}"
    );
}

/// Axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub width: f32,
    pub height: f32,
    /// Offset of the box centre from the entity position.
    pub offset: Vec2,
}

impl Aabb {
    /// # Panics
    ///
    /// Panics if `width` or `height` is negative or not finite.
    pub fn new(width: f32, height: f32) -> Self {
        assert_extents("box", width, height);
        Self {
            width,
            height,
            offset: Vec2::ZERO,
        }
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }
}

/// Box rotated about its own centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedBox {
    pub width: f32,
    pub height: f32,
    pub offset: Vec2,
    /// Rotation in degrees.
    pub angle: f32,
}

impl RotatedBox {
    /// # Panics
    ///
    /// Panics if `width` or `height` is negative or not finite.
    pub fn new(width: f32, height: f32, angle: f32) -> Self {
        assert_extents("box", width, height);
        Self {
            width,
            height,
            offset: Vec2::ZERO,
            angle,
        }
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }
}

/// A collision shape component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Aabb(Aabb),
    Rotated(RotatedBox),
}

impl Component for Shape {}

impl From<Aabb> for Shape {
    fn from(aabb: Aabb) -> Self {
        Shape::Aabb(aabb)
    }
}

impl From<RotatedBox> for Shape {
    fn from(rotated: RotatedBox) -> Self {
        Shape::Rotated(rotated)
    }
}

impl Shape {
    /// Axis-aligned box of the given extents, centred on the entity.
    pub fn aabb(width: f32, height: f32) -> Self {
        Aabb::new(width, height).into()
    }

    /// Box of the given extents rotated by `angle` degrees, centred on the
    /// entity.
    pub fn rotated(width: f32, height: f32, angle: f32) -> Self {
        RotatedBox::new(width, height, angle).into()
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Aabb(_) => ShapeKind::Aabb,
            Shape::Rotated(_) => ShapeKind::Rotated,
        }
    }

    /// Extents before rotation.
    pub fn size(&self) -> Vec2 {
        match self {
            Shape::Aabb(b) => Vec2::new(b.width, b.height),
            Shape::Rotated(b) => Vec2::new(b.width, b.height),
        }
    }

    pub fn offset(&self) -> Vec2 {
        match self {
            Shape::Aabb(b) => b.offset,
            Shape::Rotated(b) => b.offset,
        }
    }

    /// World-space centre when the owner sits at `position`.
    pub fn center(&self, position: Vec2) -> Vec2 {
        position + self.offset()
    }

    /// Lazy walk over the four world-space corners when the owner sits at
    /// `position`: top-left, top-right, bottom-right, bottom-left before
    /// rotation.
    pub fn vertices(&self, position: Vec2) -> Vertices {
        let rotation = match self {
            Shape::Aabb(_) => None,
            Shape::Rotated(b) => Some(Vec2::from_angle(b.angle.to_radians())),
        };
        Vertices {
            center: self.center(position),
            half: self.size() * 0.5,
            rotation,
            next: 0,
        }
    }

    /// Projection of the shape onto `axis`.
    pub fn interval(&self, position: Vec2, axis: Vec2) -> Interval {
        interval(self.vertices(position), axis)
    }
}

// ---------------------------------------------------------------------------
// Vertices
// ---------------------------------------------------------------------------

/// Corner iterator returned by [`Shape::vertices`].
#[derive(Debug, Clone)]
pub struct Vertices {
    center: Vec2,
    half: Vec2,
    /// `(cos, sin)` of the rotation.
    rotation: Option<Vec2>,
    next: u8,
}

const CORNER_SIGNS: [Vec2; 4] = [
    Vec2::new(-1.0, -1.0),
    Vec2::new(1.0, -1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(-1.0, 1.0),
];

impl Iterator for Vertices {
    type Item = Vec2;

    fn next(&mut self) -> Option<Vec2> {
        let sign = CORNER_SIGNS.get(self.next as usize)?;
        self.next += 1;
        let local = self.half * *sign;
        let local = match self.rotation {
            Some(rotation) => rotation.rotate(local),
            None => local,
        };
        Some(self.center + local)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = CORNER_SIGNS.len() - self.next as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Vertices {}

// ---------------------------------------------------------------------------
// Intervals
// ---------------------------------------------------------------------------

/// Closed range of projections onto an axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Inclusive: touching intervals overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Length of the shared range, or a negative gap when disjoint.
    pub fn overlap_depth(&self, other: &Interval) -> f32 {
        self.max.min(other.max) - self.min.max(other.min)
    }

    pub fn length(&self) -> f32 {
        self.max - self.min
    }
}

/// Project every point onto `axis` and keep the extremes. An empty input
/// yields the degenerate interval `[0, 0]`.
pub fn interval(points: impl IntoIterator<Item = Vec2>, axis: Vec2) -> Interval {
    let mut points = points.into_iter();
    let Some(first) = points.next() else {
        return Interval::new(0.0, 0.0);
    };
    let start = first.dot(axis);
    points.fold(Interval::new(start, start), |acc, p| {
        let d = p.dot(axis);
        Interval::new(acc.min.min(d), acc.max.max(d))
    })
}

/// Whether the two shapes' projections onto `axis` overlap.
pub fn overlaps_on_axis(a: &Shape, pos_a: Vec2, b: &Shape, pos_b: Vec2, axis: Vec2) -> bool {
    a.interval(pos_a, axis).overlaps(&b.interval(pos_b, axis))
}

/// Whether the shapes overlap on both world axes.
pub fn overlaps(a: &Shape, pos_a: Vec2, b: &Shape, pos_b: Vec2) -> bool {
    overlaps_on_axis(a, pos_a, b, pos_b, X_AXIS) && overlaps_on_axis(a, pos_a, b, pos_b, Y_AXIS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn aabb_vertices_are_centred_on_position() {
        let shape = Shape::aabb(10.0, 4.0);
        let corners: Vec<Vec2> = shape.vertices(Vec2::new(100.0, 50.0)).collect();
        assert_eq!(
            corners,
            vec![
                Vec2::new(95.0, 48.0),
                Vec2::new(105.0, 48.0),
                Vec2::new(105.0, 52.0),
                Vec2::new(95.0, 52.0),
            ]
        );
    }

    #[test]
    fn offset_shifts_vertices() {
        let shape: Shape = Aabb::new(2.0, 2.0).with_offset(Vec2::new(5.0, 0.0)).into();
        let first = shape.vertices(Vec2::ZERO).next().unwrap();
        assert_eq!(first, Vec2::new(4.0, -1.0));
    }

    #[test]
    fn vertices_follow_the_position_passed_in() {
        let shape = Shape::aabb(2.0, 2.0);
        let a: Vec<Vec2> = shape.vertices(Vec2::ZERO).collect();
        let b: Vec<Vec2> = shape.vertices(Vec2::new(3.0, 0.0)).collect();
        assert!(a.iter().zip(&b).all(|(p, q)| *q == *p + Vec2::new(3.0, 0.0)));
    }

    #[test]
    fn rotated_box_spins_about_its_centre() {
        let shape = Shape::rotated(4.0, 2.0, 90.0);
        let corners: Vec<Vec2> = shape.vertices(Vec2::new(10.0, 10.0)).collect();
        assert_eq!(corners.len(), 4);
        // A quarter turn swaps the extents.
        let x = interval(corners.iter().copied(), X_AXIS);
        let y = interval(corners.iter().copied(), Y_AXIS);
        assert!((x.length() - 2.0).abs() < 1e-4);
        assert!((y.length() - 4.0).abs() < 1e-4);
        assert!(approx(Vec2::new((x.min + x.max) / 2.0, (y.min + y.max) / 2.0), Vec2::new(10.0, 10.0)));
    }

    #[test]
    fn rotated_box_at_zero_matches_aabb() {
        let r: Vec<Vec2> = Shape::rotated(6.0, 3.0, 0.0).vertices(Vec2::ONE).collect();
        let a: Vec<Vec2> = Shape::aabb(6.0, 3.0).vertices(Vec2::ONE).collect();
        assert!(r.iter().zip(&a).all(|(p, q)| approx(*p, *q)));
    }

    #[test]
    fn vertices_iterator_is_exact_size() {
        let mut it = Shape::aabb(1.0, 1.0).vertices(Vec2::ZERO);
        assert_eq!(it.len(), 4);
        it.next();
        assert_eq!(it.len(), 3);
    }

    #[test]
    fn interval_of_points() {
        let pts = [Vec2::new(1.0, 5.0), Vec2::new(-2.0, 3.0), Vec2::new(4.0, 0.0)];
        assert_eq!(interval(pts, X_AXIS), Interval::new(-2.0, 4.0));
        assert_eq!(interval(pts, Y_AXIS), Interval::new(0.0, 5.0));
        assert_eq!(interval(std::iter::empty(), X_AXIS), Interval::new(0.0, 0.0));
    }

    #[test]
    fn touching_intervals_overlap() {
        let a = Interval::new(0.0, 1.0);
        let b = Interval::new(1.0, 2.0);
        assert!(a.overlaps(&b));
        assert_eq!(a.overlap_depth(&b), 0.0);
        let c = Interval::new(1.5, 2.0);
        assert!(!a.overlaps(&c));
        assert!(a.overlap_depth(&c) < 0.0);
    }

    #[test]
    fn overlap_requires_both_axes() {
        let s = Shape::aabb(10.0, 10.0);
        assert!(overlaps(&s, Vec2::ZERO, &s, Vec2::new(5.0, 5.0)));
        // Overlap on X only.
        assert!(overlaps_on_axis(&s, Vec2::ZERO, &s, Vec2::new(5.0, 50.0), X_AXIS));
        assert!(!overlaps(&s, Vec2::ZERO, &s, Vec2::new(5.0, 50.0)));
    }

    #[test]
    fn kind_display() {
        assert_eq!(Shape::aabb(1.0, 1.0).kind().to_string(), "AABB");
        assert_eq!(Shape::rotated(1.0, 1.0, 5.0).kind().to_string(), "RotatedBox");
    }

    // -- constructors -----------------------------------------------------------

    #[test]
    #[should_panic(expected = "box extents must be finite and non-negative")]
    fn negative_box_extent_panics() {
        Aabb::new(-1.0, 4.0);
    }

    #[test]
    #[should_panic(expected = "box extents must be finite and non-negative")]
    fn nan_rotated_box_extent_panics() {
        RotatedBox::new(4.0, f32::NAN, 30.0);
    }

    #[test]
    fn zero_extent_box_is_allowed() {
        assert_eq!(Shape::aabb(0.0, 0.0).size(), Vec2::ZERO);
    }
}
