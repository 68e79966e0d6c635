//! Node outlines and the math that attaches edges to them.
//!
//! A node is drawn as one of a closed set of shapes. The shape fixes the
//! node's size and how many label characters fit inside it, and decides
//! where an edge touches the node boundary.
//!
//! Intersection math treats the node position as the centre of its outline
//! and never panics: when no boundary crossing exists the documented
//! fallback point is returned instead.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Point, Size};

/// Error returned when a string does not name a known [`Shape`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node shape '{0}', expected one of: circle, ellipse, rect")]
pub struct ParseShapeError(String);

/// Outline of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Circle,
    Ellipse,
    Rect,
}

/// Dimensions tied to a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeProps {
    size: Size,
    label_max_length: usize,
}

impl ShapeProps {
    /// Size of a node drawn with this shape
    pub fn size(self) -> Size {
        self.size
    }

    /// Maximum number of label characters rendered inside the outline
    pub fn label_max_length(self) -> usize {
        self.label_max_length
    }
}

impl Shape {
    /// All shapes, in the order the editor offers them.
    pub const ALL: [Shape; 3] = [Shape::Circle, Shape::Ellipse, Shape::Rect];

    /// Returns the size and label limit for this shape.
    pub fn props(self) -> ShapeProps {
        match self {
            Shape::Circle => ShapeProps {
                size: Size::new(80.0, 80.0),
                label_max_length: 10,
            },
            Shape::Ellipse => ShapeProps {
                size: Size::new(140.0, 60.0),
                label_max_length: 6,
            },
            Shape::Rect => ShapeProps {
                size: Size::new(140.0, 60.0),
                label_max_length: 10,
            },
        }
    }

    /// Default size of a node with this shape.
    pub fn size(self) -> Size {
        self.props().size()
    }

    /// The serialized name of the shape.
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Ellipse => "ellipse",
            Shape::Rect => "rect",
        }
    }

    /// Cuts `label` to the number of characters that fit inside this shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use microsynth_core::shape::Shape;
    ///
    /// assert_eq!(Shape::Ellipse.truncate_label("Payments"), "Paymen");
    /// assert_eq!(Shape::Circle.truncate_label("Orders"), "Orders");
    /// ```
    pub fn truncate_label(self, label: &str) -> &str {
        let limit = self.props().label_max_length();
        match label.char_indices().nth(limit) {
            Some((byte_idx, _)) => &label[..byte_idx],
            None => label,
        }
    }

    /// Point where the segment from `center` towards `external` crosses the outline.
    ///
    /// `size` is the node size and `center` its position. See
    /// [`rect_intersection`] and [`ellipse_intersection`] for the per-shape
    /// rules and fallbacks.
    pub fn intersection(self, size: Size, center: Point, external: Point) -> Point {
        match self {
            Shape::Rect => rect_intersection(size, center, external),
            Shape::Circle | Shape::Ellipse => ellipse_intersection(size, center, external),
        }
    }

    /// Two control points that route a self-loop away from the node body.
    ///
    /// The first point sits right of the node and slightly above its centre,
    /// the second above the node and slightly right of its centre:
    ///
    /// ```text
    ///   p1 = (c.x + w/2 + offset, c.y − scale·h)
    ///   p2 = (c.x + scale·w,      c.y − (h/2 + offset))
    /// ```
    pub fn loop_control_points(
        size: Size,
        center: Point,
        loop_offset: f32,
        loop_scale: f32,
    ) -> (Point, Point) {
        let distance_x = size.width() / 2.0 + loop_offset;
        let distance_y = size.height() / 2.0 + loop_offset;

        let p1 = Point::new(
            center.x() + distance_x,
            loop_scale.mul_add(-size.height(), center.y()),
        );
        let p2 = Point::new(
            loop_scale.mul_add(size.width(), center.x()),
            center.y() - distance_y,
        );
        (p1, p2)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = ParseShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "circle" => Ok(Shape::Circle),
            "ellipse" => Ok(Shape::Ellipse),
            "rect" => Ok(Shape::Rect),
            other => Err(ParseShapeError(other.to_string())),
        }
    }
}

/// Intersection of the ray `center → external` with an axis-aligned rectangle.
///
/// The ray is parametrised as `center + t · (external − center)`. The `t`
/// of each of the four borders is computed and only finite values in
/// `[0, 1]` are kept; the smallest is the near-side crossing.
///
/// Returns `center` when no border qualifies: a zero-length ray, or an
/// external point that lies inside the rectangle.
pub fn rect_intersection(size: Size, center: Point, external: Point) -> Point {
    let half = size.half();
    let direction = external.sub_point(center);

    let t_left = -half.width() / direction.x();
    let t_right = half.width() / direction.x();
    let t_top = -half.height() / direction.y();
    let t_bottom = half.height() / direction.y();

    let nearest = [t_left, t_right, t_top, t_bottom]
        .into_iter()
        .filter(|t| t.is_finite() && (0.0..=1.0).contains(t))
        .reduce(f32::min);

    match nearest {
        Some(t) => center.add_point(direction.scale(t)),
        None => center,
    }
}

/// Intersection of the ray `center → external` with an ellipse inscribed in `size`.
///
/// When the external point is already within the smaller semi-axis of the
/// centre the edge is too short to clip and `external` is returned as is.
/// Otherwise the point on the outline at the angle of the ray is returned,
/// each component scaled by its own radius.
pub fn ellipse_intersection(size: Size, center: Point, external: Point) -> Point {
    let radius = size.half();
    let delta = external.sub_point(center);
    let distance = delta.hypot();

    if distance <= radius.width().min(radius.height()) {
        return external;
    }

    let angle = delta.y().atan2(delta.x());
    Point::new(
        radius.width().mul_add(angle.cos(), center.x()),
        radius.height().mul_add(angle.sin(), center.y()),
    )
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn shape_strategy() -> impl Strategy<Value = Shape> {
        prop_oneof![Just(Shape::Circle), Just(Shape::Ellipse), Just(Shape::Rect)]
    }

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    /// Intersections are always finite, whatever the input.
    fn check_intersection_is_finite(
        shape: Shape,
        center: Point,
        external: Point,
    ) -> Result<(), TestCaseError> {
        let point = shape.intersection(shape.size(), center, external);
        prop_assert!(point.is_finite());
        Ok(())
    }

    /// A far-away point is clipped onto the node's bounding box border.
    fn check_far_point_lands_on_bounds(
        shape: Shape,
        center: Point,
        external: Point,
    ) -> Result<(), TestCaseError> {
        let size = shape.size();
        prop_assume!(center.distance(external) > size.width().max(size.height()));

        let point = shape.intersection(size, center, external);
        let bounds = center.to_bounds(size);
        let tolerance = 0.01;
        prop_assert!(point.x() >= bounds.min_x() - tolerance);
        prop_assert!(point.x() <= bounds.max_x() + tolerance);
        prop_assert!(point.y() >= bounds.min_y() - tolerance);
        prop_assert!(point.y() <= bounds.max_y() + tolerance);

        if shape == Shape::Rect {
            let on_vertical = approx_eq!(f32, point.x(), bounds.min_x(), epsilon = tolerance)
                || approx_eq!(f32, point.x(), bounds.max_x(), epsilon = tolerance);
            let on_horizontal = approx_eq!(f32, point.y(), bounds.min_y(), epsilon = tolerance)
                || approx_eq!(f32, point.y(), bounds.max_y(), epsilon = tolerance);
            prop_assert!(on_vertical || on_horizontal);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn intersection_is_finite(shape in shape_strategy(), center in point_strategy(), external in point_strategy()) {
            check_intersection_is_finite(shape, center, external)?;
        }

        #[test]
        fn far_point_lands_on_bounds(shape in shape_strategy(), center in point_strategy(), external in point_strategy()) {
            check_far_point_lands_on_bounds(shape, center, external)?;
        }
    }
}
