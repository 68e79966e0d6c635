//! Anchor points where connections touch node outlines.
//!
//! Connections are computed centre to centre and then clipped so they start
//! and end on the node borders. Self-connections are drawn as a loop that
//! leaves the node on its right and comes back from above.

use microsynth_core::{geometry::Point, shape::Shape};

use crate::{config::RoutingConfig, graph::Node};

/// Clips connection paths at node outlines.
#[derive(Debug, Clone, Copy)]
pub struct SocketPositioner {
    loop_offset: f32,
    loop_scale: f32,
}

impl SocketPositioner {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            loop_offset: config.loop_offset(),
            loop_scale: config.loop_scale(),
        }
    }

    /// Point on the outline of `node` towards `external`.
    pub fn intersection(&self, node: &Node, external: Point) -> Point {
        node.shape()
            .intersection(node.size(), node.position(), external)
    }

    /// Straight path between two nodes, clipped at both outlines.
    ///
    /// The source end is clipped against the target centre, then the target
    /// end against the clipped source point.
    pub fn clip(&self, source: &Node, target: &Node) -> [Point; 2] {
        let start = self.intersection(source, target.position());
        let end = self.intersection(target, start);
        [start, end]
    }

    /// Path of a self-loop on `node`: `[start, p1, p2, end]`.
    pub fn loop_path(&self, node: &Node) -> Vec<Point> {
        let (p1, p2) = Shape::loop_control_points(
            node.size(),
            node.position(),
            self.loop_offset,
            self.loop_scale,
        );
        vec![
            self.intersection(node, p1),
            p1,
            p2,
            self.intersection(node, p2),
        ]
    }
}
