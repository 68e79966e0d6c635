//! Geometric primitives for diagram layout and edge routing.
//!
//! This module provides the value types used throughout MicroSynth to place
//! nodes, clip edges against node outlines and fit the viewport.
//!
//! # Overview
//!
//! - [`Point`] - A 2D coordinate in diagram space
//! - [`Size`] - Width and height dimensions
//! - [`Bounds`] - A rectangular bounding box defined by minimum and maximum coordinates
//!
//! # Coordinate System
//!
//! MicroSynth uses the screen coordinate system of the editor canvas:
//!
//! ```text
//!   (0,0) ────────► +X
//!     │
//!     │
//!     ▼
//!    +Y
//! ```
//!
//! Node positions are the *centre* of the node outline.
//!
//! Every function in this module is total: degenerate input such as a
//! zero-length segment produces a documented fallback instead of `NaN` or a
//! panic, since these helpers run on every render tick.

use serde::{Deserialize, Serialize};

/// A 2D point representing a position in diagram coordinate space.
///
/// # Examples
///
/// ```
/// # use microsynth_core::geometry::Point;
/// let p1 = Point::new(10.0, 20.0);
/// let p2 = Point::new(5.0, 5.0);
///
/// let sum = p1.add_point(p2);
/// assert_eq!(sum.x(), 15.0);
/// assert_eq!(sum.y(), 25.0);
///
/// let mid = p1.midpoint(p2);
/// assert_eq!(mid.x(), 7.5);
/// assert_eq!(mid.y(), 12.5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    /// Creates a new point with the specified coordinates
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the x-coordinate of the point
    pub fn x(self) -> f32 {
        self.x
    }

    /// Returns the y-coordinate of the point
    pub fn y(self) -> f32 {
        self.y
    }

    /// Checks if both coordinates are finite numbers
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Adds another point to this point, returning a new point
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Subtracts another point from this point, returning a new point
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Calculates the midpoint between this point and another point
    pub fn midpoint(self, other: Point) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Calculates the hypotenuse (Euclidean distance from origin)
    pub fn hypot(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance between two points
    pub fn distance(self, other: Point) -> f32 {
        other.sub_point(self).hypot()
    }

    /// Multiplies both coordinates by the given factor
    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Point, t: f32) -> Self {
        Self {
            x: (other.x - self.x).mul_add(t, self.x),
            y: (other.y - self.y).mul_add(t, self.y),
        }
    }

    /// Midpoint of the segment `self → other` pushed sideways by `distance`.
    ///
    /// The displacement is perpendicular to the segment direction `u`:
    /// `mid + (u.y · distance, −u.x · distance)`. Reversing the segment
    /// reverses the side the point lands on, which keeps an `A → B` and a
    /// `B → A` edge apart.
    ///
    /// A zero-length segment has no direction; the midpoint is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use microsynth_core::geometry::Point;
    /// let bend = Point::new(0.0, 0.0).perpendicular_offset(Point::new(100.0, 0.0), 20.0);
    /// assert_eq!(bend, Point::new(50.0, -20.0));
    /// ```
    pub fn perpendicular_offset(self, other: Point, distance: f32) -> Self {
        let mid = self.midpoint(other);
        let delta = other.sub_point(self);
        let length = delta.hypot();
        if length <= f32::EPSILON || !length.is_finite() {
            return mid;
        }

        let ux = delta.x / length;
        let uy = delta.y / length;
        Self {
            x: uy.mul_add(distance, mid.x),
            y: (-ux).mul_add(distance, mid.y),
        }
    }

    /// Converts a point and size into a bounds rectangle
    ///
    /// The point is treated as the center of the bounds, and the size
    /// is distributed equally in all directions around that center.
    pub fn to_bounds(self, size: Size) -> Bounds {
        Bounds::new_from_center(self, size)
    }
}

/// Represents the dimensions of an element with width and height
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns the width dimension of this size
    pub fn width(self) -> f32 {
        self.width
    }

    /// Returns the height dimension of this size
    pub fn height(self) -> f32 {
        self.height
    }

    /// Half of the width and height, i.e. the semi-axes of an inscribed ellipse
    pub fn half(self) -> Self {
        self.scale(0.5)
    }

    /// Multiplies both dimension by the given factor
    pub fn scale(self, factor: f32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Represents a rectangular bounding box with minimum and maximum coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    /// Creates a new bounds from a center point and a size
    pub fn new_from_center(center: Point, size: Size) -> Self {
        let half = size.half();
        Self {
            min_x: center.x - half.width,
            min_y: center.y - half.height,
            max_x: center.x + half.width,
            max_y: center.y + half.height,
        }
    }

    /// Smallest bounds containing every item, or `None` for an empty iterator.
    pub fn merge_all(items: impl IntoIterator<Item = Bounds>) -> Option<Self> {
        items.into_iter().reduce(|acc, bounds| acc.merge(&bounds))
    }

    /// Returns the minimum x-coordinate of the bounds
    pub fn min_x(self) -> f32 {
        self.min_x
    }

    /// Returns the minimum y-coordinate of the bounds
    pub fn min_y(self) -> f32 {
        self.min_y
    }

    /// Returns the maximum x-coordinate of the bounds
    pub fn max_x(self) -> f32 {
        self.max_x
    }

    /// Returns the maximum y-coordinate of the bounds
    pub fn max_y(self) -> f32 {
        self.max_y
    }

    /// Returns the width of the bounds
    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounds
    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    /// Returns the center point of the bounds
    pub fn center(self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Merges two bounds to create a larger bounds that contains both
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_new() {
        let point = Point::new(3.5, 4.2);
        assert_eq!(point.x(), 3.5);
        assert_eq!(point.y(), 4.2);
    }

    #[test]
    fn test_point_default() {
        let point = Point::default();
        assert_eq!(point, Point::new(0.0, 0.0));
        assert!(point.is_finite());
    }

    #[test]
    fn test_point_add_sub() {
        let p1 = Point::new(5.0, 8.0);
        let p2 = Point::new(2.0, 3.0);
        assert_eq!(p1.add_point(p2), Point::new(7.0, 11.0));
        assert_eq!(p1.sub_point(p2), Point::new(3.0, 5.0));
    }

    #[test]
    fn test_point_distance() {
        assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_point_lerp() {
        let from = Point::new(0.0, 10.0);
        let to = Point::new(100.0, 30.0);

        assert_eq!(from.lerp(to, 0.0), from);
        assert_eq!(from.lerp(to, 1.0), to);
        assert_eq!(from.lerp(to, 0.5), Point::new(50.0, 20.0));
    }

    #[test]
    fn test_perpendicular_offset_horizontal() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(200.0, 0.0);

        let bend = start.perpendicular_offset(end, 20.0);
        assert_eq!(bend, Point::new(100.0, -20.0));

        // The reverse direction bends to the other side
        let reverse = end.perpendicular_offset(start, 20.0);
        assert_eq!(reverse, Point::new(100.0, 20.0));
    }

    #[test]
    fn test_perpendicular_offset_vertical() {
        let bend = Point::new(0.0, 0.0).perpendicular_offset(Point::new(0.0, 100.0), 10.0);
        assert_eq!(bend, Point::new(10.0, 50.0));
    }

    #[test]
    fn test_perpendicular_offset_zero_length() {
        let p = Point::new(7.0, -3.0);
        let bend = p.perpendicular_offset(p, 20.0);
        assert_eq!(bend, p);
        assert!(bend.is_finite());
    }

    #[test]
    fn test_point_to_bounds() {
        let bounds = Point::new(10.0, 20.0).to_bounds(Size::new(6.0, 8.0));

        assert_eq!(bounds.min_x(), 7.0);
        assert_eq!(bounds.min_y(), 16.0);
        assert_eq!(bounds.max_x(), 13.0);
        assert_eq!(bounds.max_y(), 24.0);
        assert_eq!(bounds.center(), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_size_half_and_scale() {
        let size = Size::new(140.0, 60.0);
        assert_eq!(size.half(), Size::new(70.0, 30.0));
        assert_eq!(size.scale(2.0), Size::new(280.0, 120.0));
    }

    #[test]
    fn test_bounds_merge() {
        let b1 = Bounds::new_from_center(Point::new(3.0, 4.0), Size::new(4.0, 4.0));
        let b2 = Bounds::new_from_center(Point::new(5.5, 2.0), Size::new(5.0, 4.0));

        let merged = b1.merge(&b2);
        assert_eq!(merged.min_x(), 1.0);
        assert_eq!(merged.min_y(), 0.0);
        assert_eq!(merged.max_x(), 8.0);
        assert_eq!(merged.max_y(), 6.0);
    }

    #[test]
    fn test_bounds_merge_all() {
        assert!(Bounds::merge_all(Vec::new()).is_none());

        let merged = Bounds::merge_all([
            Point::new(0.0, 0.0).to_bounds(Size::new(10.0, 10.0)),
            Point::new(100.0, 50.0).to_bounds(Size::new(10.0, 10.0)),
        ])
        .unwrap();
        assert_eq!(merged.min_x(), -5.0);
        assert_eq!(merged.min_y(), -5.0);
        assert_eq!(merged.width(), 110.0);
        assert_eq!(merged.height(), 60.0);
    }

    #[test]
    fn test_point_serde() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, r#"{"x":1.5,"y":-2.0}"#);

        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Point::new(1.5, -2.0));
    }
}

#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    fn distance_strategy() -> impl Strategy<Value = f32> {
        1.0f32..100.0
    }

    // ===================
    // Property Test Functions
    // ===================

    /// The bend point lies exactly `distance` away from the segment midpoint.
    fn check_offset_distance_from_midpoint(
        p1: Point,
        p2: Point,
        distance: f32,
    ) -> Result<(), TestCaseError> {
        prop_assume!(p1.distance(p2) > 1.0);

        let bend = p1.perpendicular_offset(p2, distance);
        let mid = p1.midpoint(p2);
        prop_assert!(approx_eq!(
            f32,
            bend.distance(mid),
            distance,
            epsilon = 0.01
        ));
        Ok(())
    }

    /// The displacement is orthogonal to the segment direction.
    fn check_offset_is_perpendicular(
        p1: Point,
        p2: Point,
        distance: f32,
    ) -> Result<(), TestCaseError> {
        prop_assume!(p1.distance(p2) > 1.0);

        let bend = p1.perpendicular_offset(p2, distance);
        let displacement = bend.sub_point(p1.midpoint(p2));
        let direction = p2.sub_point(p1);
        let length = direction.hypot();
        let dot = (displacement.x() * direction.x() + displacement.y() * direction.y()) / length;
        prop_assert!(approx_eq!(f32, dot, 0.0, epsilon = 0.01));
        Ok(())
    }

    /// Reversing the segment mirrors the bend through the midpoint.
    fn check_offset_reverses_side(
        p1: Point,
        p2: Point,
        distance: f32,
    ) -> Result<(), TestCaseError> {
        prop_assume!(p1.distance(p2) > 1.0);

        let forward = p1.perpendicular_offset(p2, distance);
        let backward = p2.perpendicular_offset(p1, distance);
        let mid = forward.midpoint(backward);
        let expected = p1.midpoint(p2);
        prop_assert!(approx_eq!(f32, mid.x(), expected.x(), epsilon = 0.01));
        prop_assert!(approx_eq!(f32, mid.y(), expected.y(), epsilon = 0.01));
        Ok(())
    }

    fn check_lerp_endpoints(p1: Point, p2: Point) -> Result<(), TestCaseError> {
        let start = p1.lerp(p2, 0.0);
        let end = p1.lerp(p2, 1.0);
        prop_assert!(approx_eq!(f32, start.x(), p1.x(), epsilon = 0.001));
        prop_assert!(approx_eq!(f32, start.y(), p1.y(), epsilon = 0.001));
        prop_assert!(approx_eq!(f32, end.x(), p2.x(), epsilon = 0.001));
        prop_assert!(approx_eq!(f32, end.y(), p2.y(), epsilon = 0.001));
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn offset_distance_from_midpoint(p1 in point_strategy(), p2 in point_strategy(), d in distance_strategy()) {
            check_offset_distance_from_midpoint(p1, p2, d)?;
        }

        #[test]
        fn offset_is_perpendicular(p1 in point_strategy(), p2 in point_strategy(), d in distance_strategy()) {
            check_offset_is_perpendicular(p1, p2, d)?;
        }

        #[test]
        fn offset_reverses_side(p1 in point_strategy(), p2 in point_strategy(), d in distance_strategy()) {
            check_offset_reverses_side(p1, p2, d)?;
        }

        #[test]
        fn lerp_endpoints(p1 in point_strategy(), p2 in point_strategy()) {
            check_lerp_endpoints(p1, p2)?;
        }
    }
}
