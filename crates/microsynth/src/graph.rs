//! The canonical graph of a diagram.
//!
//! [`GraphModel`] exclusively owns every [`Node`] and [`Connection`] of an
//! editing session. Other components read through its query methods and
//! change it only through its mutation methods; fields are never poked
//! directly.
//!
//! # Architecture
//!
//! - Nodes and connections are kept in insertion order (`IndexMap`) so that
//!   exports list them in the order they were created.
//! - A connection stores only the ids of its endpoints. The endpoint nodes
//!   are looked up on demand through [`GraphModel::resolve`], which hands out
//!   a short-lived [`ConnectionEnds`] view that can never go stale.
//! - The cycle [`ExclusionSet`] lives here so that [`GraphModel::clear`]
//!   empties it together with nodes and connections.
//!
//! Mutations are synchronous. Declined operations (unknown endpoint,
//! duplicate id) return `None` or `false` rather than an error.

use std::fmt;

use indexmap::IndexMap;
use log::{debug, trace};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use microsynth_core::{
    geometry::{Point, Size},
    identifier::{ConnectionId, NodeId},
    payload::{ConnectionPayload, Endpoint, NodePayload},
    shape::Shape,
};

use crate::cycle::{ExclusionSet, find_cycle};

/// Offset applied to the position of a duplicated node.
const DUPLICATE_OFFSET: f32 = 30.0;

// =============================================================================
// Entities
// =============================================================================

/// A service in the diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    label: String,
    shape: Shape,
    size: Size,
    weight: f32,
    payload: NodePayload,
    position: Point,
}

impl Node {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The label cut to what fits inside the node's shape.
    pub fn display_label(&self) -> &str {
        self.shape.truncate_label(&self.label)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Size of the node, always the size of its shape.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn payload(&self) -> &NodePayload {
        &self.payload
    }

    /// Centre of the node.
    pub fn position(&self) -> Point {
        self.position
    }

    fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
        self.size = shape.size();
    }
}

/// A call from one service to another.
///
/// Both ports are the nodes' single default port, so a connection is fully
/// described by its endpoint ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    id: ConnectionId,
    source: NodeId,
    target: NodeId,
    is_loop: bool,
    label: String,
    weight: f32,
    payload: ConnectionPayload,
}

impl Connection {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn source(&self) -> &NodeId {
        &self.source
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    /// Whether this is a self-loop created while loops were enabled.
    pub fn is_loop(&self) -> bool {
        self.is_loop
    }

    /// Whether source and target are the same node.
    pub fn is_self_connection(&self) -> bool {
        self.source == self.target
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn payload(&self) -> &ConnectionPayload {
        &self.payload
    }

    /// Returns whether this connection links `a` and `b` in either direction.
    pub fn joins(&self, a: &NodeId, b: &NodeId) -> bool {
        (&self.source == a && &self.target == b) || (&self.source == b && &self.target == a)
    }

    /// Returns whether `node` is the source or the target.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}

/// Endpoint nodes of a connection, resolved on demand.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionEnds<'a> {
    pub source: &'a Node,
    pub target: &'a Node,
}

// =============================================================================
// Creation specs and partial updates
// =============================================================================

/// Description of a node to create.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    id: Option<NodeId>,
    label: String,
    shape: Shape,
    weight: f32,
    payload: NodePayload,
    position: Point,
}

impl NodeSpec {
    /// A circle at the origin with the preset service payload.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            shape: Shape::default(),
            weight: 0.0,
            payload: NodePayload::preset(),
            position: Point::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_payload(mut self, payload: NodePayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn at(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> Option<&NodeId> {
        self.id.as_ref()
    }
}

/// Description of a connection to create.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    id: ConnectionId,
    source: NodeId,
    target: NodeId,
    label: Option<String>,
    weight: f32,
    payload: ConnectionPayload,
}

impl ConnectionSpec {
    /// A connection with the preset payload.
    ///
    /// Without an explicit label the connection is labelled
    /// `"<source label> - <target label>"` when it is added.
    pub fn new(
        id: impl Into<ConnectionId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
            weight: 0.0,
            payload: ConnectionPayload::preset(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_payload(mut self, payload: ConnectionPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn source(&self) -> &NodeId {
        &self.source
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }
}

/// Error for a property change the model cannot interpret.
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("unknown property '{0}'")]
    UnknownField(String),

    #[error("invalid value for property '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl PropertyError {
    fn invalid(field: &str, reason: impl fmt::Display) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Partial update of a node. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub label: Option<String>,
    pub shape: Option<Shape>,
    pub weight: Option<f32>,
    pub payload: Option<NodePayload>,
    pub position: Option<Point>,
}

impl NodePatch {
    /// Builds a patch from a form-style `(field, value)` change.
    ///
    /// Known fields are `label`, `shape`, `weight`, `payload` and `position`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use microsynth::graph::NodePatch;
    /// # use serde_json::json;
    /// let patch = NodePatch::from_property("weight", json!(0.25)).unwrap();
    /// assert_eq!(patch.weight, Some(0.25));
    /// assert!(NodePatch::from_property("colour", json!("red")).is_err());
    /// ```
    pub fn from_property(field: &str, value: Value) -> Result<Self, PropertyError> {
        let mut patch = Self::default();
        match field {
            "label" => patch.label = Some(string_property(field, value)?),
            "shape" => {
                let name = string_property(field, value)?;
                let shape = name
                    .parse::<Shape>()
                    .map_err(|err| PropertyError::invalid(field, err))?;
                patch.shape = Some(shape);
            }
            "weight" => patch.weight = Some(weight_property(field, &value)?),
            "payload" => {
                patch.payload = Some(
                    serde_json::from_value(value)
                        .map_err(|err| PropertyError::invalid(field, err))?,
                )
            }
            "position" => {
                patch.position = Some(
                    serde_json::from_value(value)
                        .map_err(|err| PropertyError::invalid(field, err))?,
                )
            }
            other => return Err(PropertyError::UnknownField(other.to_string())),
        }
        Ok(patch)
    }
}

/// Partial update of a connection. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ConnectionPatch {
    pub label: Option<String>,
    pub weight: Option<f32>,
    pub payload: Option<ConnectionPayload>,
}

impl ConnectionPatch {
    /// Builds a patch from a form-style `(field, value)` change.
    ///
    /// Known fields are `label`, `weight` and `payload`.
    pub fn from_property(field: &str, value: Value) -> Result<Self, PropertyError> {
        let mut patch = Self::default();
        match field {
            "label" => patch.label = Some(string_property(field, value)?),
            "weight" => patch.weight = Some(weight_property(field, &value)?),
            "payload" => {
                patch.payload = Some(
                    serde_json::from_value(value)
                        .map_err(|err| PropertyError::invalid(field, err))?,
                )
            }
            other => return Err(PropertyError::UnknownField(other.to_string())),
        }
        Ok(patch)
    }
}

fn string_property(field: &str, value: Value) -> Result<String, PropertyError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(PropertyError::invalid(
            field,
            format!("expected a string, got {other}"),
        )),
    }
}

fn weight_property(field: &str, value: &Value) -> Result<f32, PropertyError> {
    value
        .as_f64()
        .map(|w| w as f32)
        .ok_or_else(|| PropertyError::invalid(field, format!("expected a number, got {value}")))
}

/// Assigns `new` to `slot` when it differs, reporting whether it did.
fn replace_if_changed<T: PartialEq>(slot: &mut T, new: Option<T>) -> bool {
    match new {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

/// Everything a node removal took out of the graph.
#[derive(Debug, Clone)]
pub struct NodeRemoval {
    pub node: Node,
    /// Connections removed by the cascade, in insertion order.
    pub connections: Vec<Connection>,
}

// =============================================================================
// Graph model
// =============================================================================

/// Owner of all nodes and connections of a diagram.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: IndexMap<NodeId, Node>,
    connections: IndexMap<ConnectionId, Connection>,
    exclusions: ExclusionSet,
    loop_connections_enabled: bool,
}

impl GraphModel {
    /// Creates an empty graph.
    ///
    /// `loop_connections_enabled` decides whether a self-connection is
    /// treated as a loop.
    pub fn new(loop_connections_enabled: bool) -> Self {
        Self {
            loop_connections_enabled,
            ..Self::default()
        }
    }

    pub fn loop_connections_enabled(&self) -> bool {
        self.loop_connections_enabled
    }

    /// Returns a fresh node id not used in this graph.
    pub fn generate_node_id(&self) -> NodeId {
        loop {
            let id = NodeId::new(random_uid());
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Returns a fresh connection id not used in this graph.
    pub fn generate_connection_id(&self) -> ConnectionId {
        loop {
            let id = ConnectionId::new(random_uid());
            if !self.connections.contains_key(&id) {
                return id;
            }
        }
    }

    /// Adds a node.
    ///
    /// A spec without an id gets a generated one. Returns `None` when the id
    /// is already taken.
    pub fn add_node(&mut self, spec: NodeSpec) -> Option<NodeId> {
        let id = match spec.id {
            Some(id) => id,
            None => self.generate_node_id(),
        };
        if self.nodes.contains_key(&id) {
            debug!(node = id.as_str(); "Node declined, id already in use");
            return None;
        }

        let node = Node {
            id: id.clone(),
            label: spec.label,
            shape: spec.shape,
            size: spec.shape.size(),
            weight: spec.weight,
            payload: spec.payload,
            position: spec.position,
        };
        debug!(node = id.as_str(), shape = node.shape.as_str(); "Node added");
        self.nodes.insert(id.clone(), node);
        Some(id)
    }

    /// Adds a copy of a node under a fresh id, labelled `"<label> - Copy"`.
    pub fn duplicate_node(&mut self, id: &NodeId) -> Option<NodeId> {
        let original = self.nodes.get(id)?;
        let spec = NodeSpec::new(format!("{} - Copy", original.label))
            .with_shape(original.shape)
            .with_weight(original.weight)
            .with_payload(original.payload.clone())
            .at(original
                .position
                .add_point(Point::new(DUPLICATE_OFFSET, DUPLICATE_OFFSET)));
        self.add_node(spec)
    }

    /// Removes a node and, first, every connection touching it.
    ///
    /// The returned [`NodeRemoval`] lists the cascaded connections. Returns
    /// `None` when the node does not exist.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<NodeRemoval> {
        if !self.nodes.contains_key(id) {
            return None;
        }

        let touching: Vec<ConnectionId> = self
            .connections_touching(id)
            .map(|connection| connection.id.clone())
            .collect();
        let connections = touching
            .iter()
            .filter_map(|connection_id| self.connections.shift_remove(connection_id))
            .collect::<Vec<_>>();

        let node = self.nodes.shift_remove(id)?;
        debug!(
            node = id.as_str(),
            cascaded = connections.len();
            "Node removed"
        );
        Some(NodeRemoval { node, connections })
    }

    /// Adds a connection.
    ///
    /// Declined with `None` when either endpoint does not exist or the id is
    /// already taken.
    pub fn add_connection(&mut self, spec: ConnectionSpec) -> Option<ConnectionId> {
        let (Some(source), Some(target)) = (self.nodes.get(&spec.source), self.nodes.get(&spec.target))
        else {
            debug!(
                connection = spec.id.as_str(),
                source = spec.source.as_str(),
                target = spec.target.as_str();
                "Connection declined, endpoint missing"
            );
            return None;
        };
        if self.connections.contains_key(&spec.id) {
            debug!(connection = spec.id.as_str(); "Connection declined, id already in use");
            return None;
        }

        let label = spec.label.unwrap_or_else(|| {
            if source.label.is_empty() {
                String::new()
            } else {
                format!("{} - {}", source.label, target.label)
            }
        });
        let is_loop = spec.source == spec.target && self.loop_connections_enabled;
        let connection = Connection {
            id: spec.id.clone(),
            source: spec.source,
            target: spec.target,
            is_loop,
            label,
            weight: spec.weight,
            payload: spec.payload,
        };
        debug!(
            connection = connection.id.as_str(),
            source = connection.source.as_str(),
            target = connection.target.as_str();
            "Connection added"
        );
        self.connections.insert(spec.id.clone(), connection);
        Some(spec.id)
    }

    /// Removes a connection, returning it.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Option<Connection> {
        let connection = self.connections.shift_remove(id)?;
        debug!(connection = id.as_str(); "Connection removed");
        Some(connection)
    }

    /// Applies a partial update to a node.
    ///
    /// Returns whether anything changed; re-applying the same patch returns
    /// `false`. A shape change also resizes the node.
    pub fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };

        let mut changed = replace_if_changed(&mut node.label, patch.label);
        changed |= replace_if_changed(&mut node.weight, patch.weight);
        changed |= replace_if_changed(&mut node.payload, patch.payload);
        changed |= replace_if_changed(&mut node.position, patch.position);
        match patch.shape {
            Some(shape) if shape != node.shape => {
                node.set_shape(shape);
                changed = true;
            }
            _ => {}
        }

        if changed {
            trace!(node = id.as_str(); "Node updated");
        }
        changed
    }

    /// Applies a partial update to a connection. Returns whether anything changed.
    pub fn update_connection(&mut self, id: &ConnectionId, patch: ConnectionPatch) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            return false;
        };

        let mut changed = replace_if_changed(&mut connection.label, patch.label);
        changed |= replace_if_changed(&mut connection.weight, patch.weight);
        changed |= replace_if_changed(&mut connection.payload, patch.payload);

        if changed {
            trace!(connection = id.as_str(); "Connection updated");
        }
        changed
    }

    /// Gives every node the same shape. Returns the ids of the nodes that changed.
    pub fn apply_shape_to_all(&mut self, shape: Shape) -> Vec<NodeId> {
        let changed: Vec<NodeId> = self
            .nodes
            .values_mut()
            .filter(|node| node.shape != shape)
            .map(|node| {
                node.set_shape(shape);
                node.id.clone()
            })
            .collect();
        debug!(shape = shape.as_str(), changed = changed.len(); "Shape applied to all nodes");
        changed
    }

    /// Moves a node without counting as an edit.
    pub(crate) fn move_node(&mut self, id: &NodeId, position: Point) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Empties nodes, connections and the exclusion set together.
    pub fn clear(&mut self) {
        debug!(
            nodes = self.nodes.len(),
            connections = self.connections.len();
            "Graph cleared"
        );
        self.nodes.clear();
        self.connections.clear();
        self.exclusions.clear();
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Connections in insertion order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty()
    }

    /// Looks up the endpoint nodes of a connection.
    pub fn resolve(&self, connection: &Connection) -> Option<ConnectionEnds<'_>> {
        Some(ConnectionEnds {
            source: self.nodes.get(&connection.source)?,
            target: self.nodes.get(&connection.target)?,
        })
    }

    /// Connections with `node` as source or target.
    pub fn connections_touching<'a>(
        &'a self,
        node: &'a NodeId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .values()
            .filter(move |connection| connection.touches(node))
    }

    /// The route group of a connection, in insertion order.
    ///
    /// Connections joining the same unordered node pair form a group. A
    /// self-connection is never grouped and gets a group of one.
    pub fn route_group(&self, id: &ConnectionId) -> Vec<&Connection> {
        let Some(connection) = self.connections.get(id) else {
            return Vec::new();
        };
        if connection.is_self_connection() {
            return vec![connection];
        }
        self.connections
            .values()
            .filter(|other| other.joins(&connection.source, &connection.target))
            .collect()
    }

    /// Sum of the weights of connections leaving `source`, except `except`.
    pub fn outgoing_weight_sum(&self, source: &NodeId, except: &ConnectionId) -> f32 {
        self.connections
            .values()
            .filter(|connection| &connection.source == source && &connection.id != except)
            .map(|connection| connection.weight)
            .sum()
    }

    /// The endpoint of the target node that the connection's API call binds, if any.
    pub fn bound_endpoint(&self, id: &ConnectionId) -> Option<&Endpoint> {
        let connection = self.connections.get(id)?;
        let call = connection.payload.api_call.as_ref()?;
        let target = self.nodes.get(&connection.target)?;
        target
            .payload
            .endpoints
            .iter()
            .find(|endpoint| call.matches(endpoint))
    }

    /// Finds a directed cycle over all connections, ignoring exclusions.
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        find_cycle(
            self.nodes.keys(),
            self.connections
                .values()
                .map(|connection| (connection.source.as_str(), connection.target.as_str())),
        )
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn exclusions_mut(&mut self) -> &mut ExclusionSet {
        &mut self.exclusions
    }
}

/// Random 16 hex character id.
fn random_uid() -> String {
    format!("{:016x}", rand::rng().random::<u64>())
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use serde_json::json;

    use microsynth_core::payload::ApiCall;

    use super::*;

    fn sample_model() -> GraphModel {
        let mut model = GraphModel::new(false);
        for id in ["A", "B", "C"] {
            model.add_node(NodeSpec::new(id).with_id(id)).unwrap();
        }
        model
            .add_connection(ConnectionSpec::new("ab", "A", "B"))
            .unwrap();
        model
            .add_connection(ConnectionSpec::new("bc", "B", "C"))
            .unwrap();
        model
    }

    #[test]
    fn test_add_node_generates_unique_ids() {
        let mut model = GraphModel::new(false);
        let a = model.add_node(NodeSpec::new("Orders")).unwrap();
        let b = model.add_node(NodeSpec::new("Orders")).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert_eq!(model.node_count(), 2);
    }

    #[test]
    fn test_add_node_declines_duplicate_id() {
        let mut model = GraphModel::new(false);
        assert!(model.add_node(NodeSpec::new("x").with_id("n1")).is_some());
        assert!(model.add_node(NodeSpec::new("y").with_id("n1")).is_none());
        assert_eq!(model.node(&"n1".into()).unwrap().label(), "x");
    }

    #[test]
    fn test_node_size_follows_shape() {
        let mut model = GraphModel::new(false);
        let id = model
            .add_node(NodeSpec::new("Gateway").with_shape(Shape::Rect))
            .unwrap();
        assert_eq!(model.node(&id).unwrap().size(), Size::new(140.0, 60.0));

        let patch = NodePatch {
            shape: Some(Shape::Circle),
            ..NodePatch::default()
        };
        assert!(model.update_node(&id, patch));
        assert_eq!(model.node(&id).unwrap().size(), Size::new(80.0, 80.0));
    }

    #[test]
    fn test_add_connection_declines_missing_endpoint() {
        let mut model = sample_model();
        assert!(
            model
                .add_connection(ConnectionSpec::new("ax", "A", "X"))
                .is_none()
        );
        assert!(
            model
                .add_connection(ConnectionSpec::new("ab", "A", "C"))
                .is_none(),
            "duplicate id"
        );
        assert_eq!(model.connection_count(), 2);
    }

    #[test]
    fn test_connection_default_label() {
        let mut model = GraphModel::new(false);
        model
            .add_node(NodeSpec::new("Orders").with_id("o"))
            .unwrap();
        model
            .add_node(NodeSpec::new("Billing").with_id("b"))
            .unwrap();
        model.add_node(NodeSpec::new("").with_id("e")).unwrap();

        let id = model
            .add_connection(ConnectionSpec::new("c1", "o", "b"))
            .unwrap();
        assert_eq!(model.connection(&id).unwrap().label(), "Orders - Billing");

        let id = model
            .add_connection(ConnectionSpec::new("c2", "e", "b"))
            .unwrap();
        assert_eq!(model.connection(&id).unwrap().label(), "");

        let id = model
            .add_connection(ConnectionSpec::new("c3", "o", "e").with_label("calls"))
            .unwrap();
        assert_eq!(model.connection(&id).unwrap().label(), "calls");
    }

    #[test]
    fn test_self_connection_loop_flag() {
        let mut model = GraphModel::new(true);
        model.add_node(NodeSpec::new("A").with_id("A")).unwrap();
        let id = model
            .add_connection(ConnectionSpec::new("aa", "A", "A"))
            .unwrap();
        assert!(model.connection(&id).unwrap().is_loop());

        let mut model = GraphModel::new(false);
        model.add_node(NodeSpec::new("A").with_id("A")).unwrap();
        let id = model
            .add_connection(ConnectionSpec::new("aa", "A", "A"))
            .unwrap();
        let connection = model.connection(&id).unwrap();
        assert!(!connection.is_loop());
        assert!(connection.is_self_connection());
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut model = sample_model();
        let removal = model.remove_node(&"B".into()).unwrap();

        assert_eq!(removal.node.id(), &NodeId::from("B"));
        assert_eq!(removal.connections.len(), 2);
        assert_eq!(model.connection_count(), 0);
        assert!(model.remove_node(&"B".into()).is_none());
    }

    #[test]
    fn test_update_node_is_idempotent() {
        let mut model = sample_model();
        let id = NodeId::from("A");
        let patch = NodePatch {
            label: Some("Accounts".to_string()),
            weight: Some(0.5),
            ..NodePatch::default()
        };

        assert!(model.update_node(&id, patch.clone()));
        assert!(!model.update_node(&id, patch));
        assert!(!model.update_node(&id, NodePatch::default()));
        assert!(!model.update_node(&"missing".into(), NodePatch::default()));

        let node = model.node(&id).unwrap();
        assert_eq!(node.label(), "Accounts");
        assert_approx_eq!(f32, node.weight(), 0.5);
    }

    #[test]
    fn test_update_connection_is_idempotent() {
        let mut model = sample_model();
        let id = ConnectionId::from("ab");
        let patch = ConnectionPatch::from_property("weight", json!(0.4)).unwrap();
        assert!(model.update_connection(&id, patch.clone()));
        assert!(!model.update_connection(&id, patch));
    }

    #[test]
    fn test_patch_from_property() {
        let patch = NodePatch::from_property("shape", json!("ellipse")).unwrap();
        assert_eq!(patch.shape, Some(Shape::Ellipse));

        let patch = NodePatch::from_property("position", json!({"x": 1.0, "y": 2.0})).unwrap();
        assert_eq!(patch.position, Some(Point::new(1.0, 2.0)));

        assert!(matches!(
            NodePatch::from_property("shape", json!("hexagon")),
            Err(PropertyError::InvalidValue { .. })
        ));
        assert!(matches!(
            NodePatch::from_property("label", json!(3)),
            Err(PropertyError::InvalidValue { .. })
        ));
        assert!(matches!(
            ConnectionPatch::from_property("shape", json!("rect")),
            Err(PropertyError::UnknownField(_))
        ));
    }

    #[test]
    fn test_duplicate_node() {
        let mut model = GraphModel::new(false);
        let id = model
            .add_node(
                NodeSpec::new("Orders")
                    .with_shape(Shape::Rect)
                    .with_weight(0.3)
                    .at(Point::new(10.0, 10.0)),
            )
            .unwrap();
        let copy_id = model.duplicate_node(&id).unwrap();
        let copy = model.node(&copy_id).unwrap();

        assert_ne!(copy_id, id);
        assert_eq!(copy.label(), "Orders - Copy");
        assert_eq!(copy.shape(), Shape::Rect);
        assert_approx_eq!(f32, copy.weight(), 0.3);
        assert_eq!(copy.position(), Point::new(40.0, 40.0));
        assert!(model.duplicate_node(&"missing".into()).is_none());
    }

    #[test]
    fn test_apply_shape_to_all() {
        let mut model = sample_model();
        model
            .update_node(
                &"C".into(),
                NodePatch {
                    shape: Some(Shape::Rect),
                    ..NodePatch::default()
                },
            );
        let changed = model.apply_shape_to_all(Shape::Rect);
        assert_eq!(changed, vec![NodeId::from("A"), NodeId::from("B")]);
        assert!(model.nodes().all(|node| node.size() == Size::new(140.0, 60.0)));
    }

    #[test]
    fn test_route_group_unordered_pair() {
        let mut model = sample_model();
        model
            .add_connection(ConnectionSpec::new("ba", "B", "A"))
            .unwrap();
        model
            .add_connection(ConnectionSpec::new("ab2", "A", "B"))
            .unwrap();

        let group: Vec<&str> = model
            .route_group(&"ba".into())
            .iter()
            .map(|connection| connection.id().as_str())
            .collect();
        assert_eq!(group, ["ab", "ba", "ab2"]);
        assert_eq!(model.route_group(&"bc".into()).len(), 1);
        assert!(model.route_group(&"missing".into()).is_empty());
    }

    #[test]
    fn test_outgoing_weight_sum() {
        let mut model = sample_model();
        model
            .add_connection(ConnectionSpec::new("ac", "A", "C").with_weight(0.25))
            .unwrap();
        model.update_connection(
            &"ab".into(),
            ConnectionPatch {
                weight: Some(0.5),
                ..ConnectionPatch::default()
            },
        );
        assert_approx_eq!(f32, model.outgoing_weight_sum(&"A".into(), &"ab".into()), 0.25);
        assert_approx_eq!(f32, model.outgoing_weight_sum(&"A".into(), &"none".into()), 0.75);
    }

    #[test]
    fn test_resolve_is_derived() {
        let mut model = sample_model();
        let connection = model.connection(&"ab".into()).unwrap().clone();
        let ends = model.resolve(&connection).unwrap();
        assert_eq!(ends.source.id(), &NodeId::from("A"));
        assert_eq!(ends.target.id(), &NodeId::from("B"));

        model.update_node(
            &"B".into(),
            NodePatch {
                label: Some("Billing".to_string()),
                ..NodePatch::default()
            },
        );
        assert_eq!(model.resolve(&connection).unwrap().target.label(), "Billing");

        model.remove_node(&"A".into());
        assert!(model.resolve(&connection).is_none());
    }

    #[test]
    fn test_bound_endpoint() {
        let mut model = sample_model();
        let payload = ConnectionPayload {
            api_call: Some(ApiCall {
                path: "/getObject".to_string(),
                method: "GET".to_string(),
                parameter_values: vec![],
                ..ApiCall::default()
            }),
            ..ConnectionPayload::preset()
        };
        model
            .add_connection(ConnectionSpec::new("ca", "C", "A").with_payload(payload))
            .unwrap();

        let endpoint = model.bound_endpoint(&"ca".into()).unwrap();
        assert_eq!(endpoint.summary, "getObject description");
        assert!(model.bound_endpoint(&"ab".into()).is_none());
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut model = sample_model();
        model
            .exclusions_mut()
            .insert("ab".into(), "A".into(), "B".into());
        model.clear();

        assert!(model.is_empty());
        assert!(model.exclusions().is_empty());
    }

    #[test]
    fn test_find_cycle_ignores_exclusions() {
        let mut model = sample_model();
        assert!(model.find_cycle().is_none());

        model
            .add_connection(ConnectionSpec::new("ca", "C", "A"))
            .unwrap();
        model
            .exclusions_mut()
            .insert("ca".into(), "C".into(), "A".into());
        assert_eq!(model.find_cycle().unwrap().len(), 3);
    }
}
