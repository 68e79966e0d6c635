//! Path shaping for parallel connections.
//!
//! Two services may be linked by several connections, in the same or in
//! opposite directions. Drawn as straight lines they would sit on top of
//! each other, so every member of a multi-member route group is bent
//! through a point displaced perpendicular to the line.
//!
//! Self-connections never belong to a route group; they get their own loop
//! geometry from the [`socket`](crate::socket) module.

use microsynth_core::{geometry::Point, identifier::ConnectionId};

use crate::{
    config::RoutingConfig,
    graph::{Connection, GraphModel},
};

/// Position of a connection within its route group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteGroup {
    index: usize,
    len: usize,
}

impl RouteGroup {
    pub fn new(index: usize, len: usize) -> Self {
        Self { index, len }
    }

    /// A group with one member.
    pub fn single() -> Self {
        Self::new(0, 1)
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub fn len(self) -> usize {
        self.len
    }

    /// Whether the group has more than one member and its paths need bending.
    pub fn is_bundled(self) -> bool {
        self.len > 1
    }
}

/// Bends paths of connections that share a node pair.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRouter {
    bend_offset: f32,
    fan_out: bool,
}

impl EdgeRouter {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            bend_offset: config.bend_offset(),
            fan_out: config.fan_out(),
        }
    }

    /// Locates a connection within its route group.
    ///
    /// Unknown connections and self-connections get [`RouteGroup::single`].
    pub fn group(&self, model: &GraphModel, id: &ConnectionId) -> RouteGroup {
        let members = model.route_group(id);
        members
            .iter()
            .position(|member| member.id() == id)
            .map_or_else(RouteGroup::single, |index| {
                RouteGroup::new(index, members.len())
            })
    }

    /// Distance of the bend point from the straight line for a group member.
    pub fn offset_for(&self, group: RouteGroup) -> f32 {
        if self.fan_out {
            self.bend_offset * (group.index() + 1) as f32
        } else {
            self.bend_offset
        }
    }

    /// Transforms the straight-line `points` of a connection.
    ///
    /// A two-point path in a bundled group becomes `[start, bend, end]`,
    /// where `bend` is the midpoint pushed sideways by
    /// [`offset_for`](Self::offset_for). Any other path is returned as is.
    ///
    /// # Examples
    ///
    /// ```
    /// # use microsynth::{config::RoutingConfig, routing::{EdgeRouter, RouteGroup}};
    /// # use microsynth_core::geometry::Point;
    /// let router = EdgeRouter::new(&RoutingConfig::default());
    /// let line = [Point::new(0.0, 0.0), Point::new(200.0, 0.0)];
    ///
    /// assert_eq!(router.transform(&line, RouteGroup::single()), line.to_vec());
    ///
    /// let bent = router.transform(&line, RouteGroup::new(0, 2));
    /// assert_eq!(bent, vec![line[0], Point::new(100.0, -20.0), line[1]]);
    /// ```
    pub fn transform(&self, points: &[Point], group: RouteGroup) -> Vec<Point> {
        match points {
            [start, end] if group.is_bundled() => {
                let bend = start.perpendicular_offset(*end, self.offset_for(group));
                vec![*start, bend, *end]
            }
            _ => points.to_vec(),
        }
    }

    /// Computes the path of a connection from its straight-line points.
    pub fn compute_path(
        &self,
        model: &GraphModel,
        id: &ConnectionId,
        straight: &[Point],
    ) -> Vec<Point> {
        self.transform(straight, self.group(model, id))
    }

    /// Connections whose path may change after `removed` is gone.
    ///
    /// Every remaining connection sharing an endpoint node with the removed
    /// one is reported, in insertion order.
    pub fn affected_by_removal(model: &GraphModel, removed: &Connection) -> Vec<ConnectionId> {
        model
            .connections()
            .filter(|connection| {
                connection.touches(removed.source()) || connection.touches(removed.target())
            })
            .map(|connection| connection.id().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;
    use crate::graph::{ConnectionSpec, NodeSpec};

    fn model() -> GraphModel {
        let mut model = GraphModel::new(true);
        for id in ["A", "B", "C"] {
            model.add_node(NodeSpec::new(id).with_id(id)).unwrap();
        }
        model
    }

    fn line() -> [Point; 2] {
        [Point::new(0.0, 0.0), Point::new(200.0, 0.0)]
    }

    #[test]
    fn test_group_single_and_bundled() {
        let mut model = model();
        model
            .add_connection(ConnectionSpec::new("ab", "A", "B"))
            .unwrap();
        let router = EdgeRouter::new(&RoutingConfig::default());
        assert_eq!(router.group(&model, &"ab".into()), RouteGroup::single());

        model
            .add_connection(ConnectionSpec::new("ba", "B", "A"))
            .unwrap();
        assert_eq!(router.group(&model, &"ab".into()), RouteGroup::new(0, 2));
        assert_eq!(router.group(&model, &"ba".into()), RouteGroup::new(1, 2));
        assert_eq!(router.group(&model, &"zz".into()), RouteGroup::single());
    }

    #[test]
    fn test_self_connection_never_grouped() {
        let mut model = model();
        model
            .add_connection(ConnectionSpec::new("aa", "A", "A"))
            .unwrap();
        model
            .add_connection(ConnectionSpec::new("aa2", "A", "A"))
            .unwrap();
        let router = EdgeRouter::new(&RoutingConfig::default());
        assert!(!router.group(&model, &"aa".into()).is_bundled());
    }

    #[test]
    fn test_reverse_pair_bends_to_opposite_sides() {
        let router = EdgeRouter::new(&RoutingConfig::default());
        let group = RouteGroup::new(0, 2);
        let [start, end] = line();

        let forward = router.transform(&[start, end], group);
        let backward = router.transform(&[end, start], group);
        assert_eq!(forward[1], Point::new(100.0, -20.0));
        assert_eq!(backward[1], Point::new(100.0, 20.0));
    }

    #[test]
    fn test_fixed_offset_ignores_index() {
        let router = EdgeRouter::new(&RoutingConfig::default());
        assert_approx_eq!(f32, router.offset_for(RouteGroup::new(0, 3)), 20.0);
        assert_approx_eq!(f32, router.offset_for(RouteGroup::new(2, 3)), 20.0);
    }

    #[test]
    fn test_fan_out_separates_siblings() {
        let router = EdgeRouter::new(&RoutingConfig::default().with_fan_out(true));
        assert_approx_eq!(f32, router.offset_for(RouteGroup::new(0, 3)), 20.0);
        assert_approx_eq!(f32, router.offset_for(RouteGroup::new(2, 3)), 60.0);

        let first = router.transform(&line(), RouteGroup::new(0, 2));
        let second = router.transform(&line(), RouteGroup::new(1, 2));
        assert_ne!(first[1], second[1]);
    }

    #[test]
    fn test_longer_paths_untouched() {
        let router = EdgeRouter::new(&RoutingConfig::default());
        let path = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 0.0),
        ];
        assert_eq!(router.transform(&path, RouteGroup::new(0, 2)), path.to_vec());
    }

    #[test]
    fn test_affected_by_removal() {
        let mut model = model();
        model
            .add_connection(ConnectionSpec::new("ab", "A", "B"))
            .unwrap();
        model
            .add_connection(ConnectionSpec::new("ba", "B", "A"))
            .unwrap();
        model
            .add_connection(ConnectionSpec::new("bc", "B", "C"))
            .unwrap();

        let removed = model.remove_connection(&"ba".into()).unwrap();
        let affected = EdgeRouter::affected_by_removal(&model, &removed);
        assert_eq!(affected, vec![ConnectionId::from("ab"), ConnectionId::from("bc")]);
    }
}
