//! The serialisable diagram format.
//!
//! A [`DiagramSnapshot`] is what gets persisted, imported and exported: the
//! node and connection records in insertion order plus an optional viewport
//! transform. It is plain data; turning it into a live graph is the job of
//! [`DiagramEditor::load_snapshot`](crate::DiagramEditor::load_snapshot).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use microsynth_core::{
    geometry::Point,
    identifier::{ConnectionId, NodeId},
    payload::{ConnectionPayload, NodePayload},
    shape::Shape,
};

use crate::{
    error::MicrosynthError,
    graph::{Connection, GraphModel, Node},
};

/// Pan and zoom of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

impl Viewport {
    pub fn new(x: f32, y: f32, k: f32) -> Self {
        Self { x, y, k }
    }
}

/// A node as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub payload: NodePayload,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub position: Point,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id().clone(),
            label: node.label().to_string(),
            shape: node.shape(),
            payload: node.payload().clone(),
            weight: node.weight(),
            position: node.position(),
        }
    }
}

/// A connection as stored in a snapshot.
///
/// `is_loop` is exported for hosts; on load it is recomputed from the
/// endpoints and the editor's loop setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub is_loop: bool,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub payload: ConnectionPayload,
}

impl From<&Connection> for ConnectionRecord {
    fn from(connection: &Connection) -> Self {
        Self {
            id: connection.id().clone(),
            source: connection.source().clone(),
            target: connection.target().clone(),
            is_loop: connection.is_loop(),
            weight: connection.weight(),
            label: connection.label().to_string(),
            payload: connection.payload().clone(),
        }
    }
}

/// Nodes, connections and viewport of a diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl DiagramSnapshot {
    /// Captures the current state of a graph.
    pub fn from_model(model: &GraphModel, viewport: Option<Viewport>) -> Self {
        Self {
            nodes: model.nodes().map(NodeRecord::from).collect(),
            connections: model.connections().map(ConnectionRecord::from).collect(),
            viewport,
        }
    }

    /// Parses a snapshot from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`MicrosynthError::Snapshot`] carrying the source text when
    /// the JSON is malformed or does not have the snapshot shape.
    pub fn from_json(src: &str) -> Result<Self, MicrosynthError> {
        serde_json::from_str(src).map_err(|err| MicrosynthError::new_snapshot_error(err, src))
    }

    /// Serialises the snapshot as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, MicrosynthError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| MicrosynthError::InvalidSnapshot(err.to_string()))
    }

    /// Checks that node ids and connection ids are unique.
    ///
    /// Dangling connections are not an error here; loading skips them.
    pub fn validate(&self) -> Result<(), MicrosynthError> {
        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(&node.id) {
                return Err(MicrosynthError::InvalidSnapshot(format!(
                    "duplicate node id `{}`",
                    node.id
                )));
            }
        }

        let mut connection_ids = HashSet::new();
        for connection in &self.connections {
            if !connection_ids.insert(&connection.id) {
                return Err(MicrosynthError::InvalidSnapshot(format!(
                    "duplicate connection id `{}`",
                    connection.id
                )));
            }
        }
        Ok(())
    }

    /// Connections referring to a node id that is not in the snapshot.
    pub fn dangling_connections(&self) -> Vec<&ConnectionId> {
        let node_ids: HashSet<&NodeId> = self.nodes.iter().map(|node| &node.id).collect();
        self.connections
            .iter()
            .filter(|c| !node_ids.contains(&c.source) || !node_ids.contains(&c.target))
            .map(|c| &c.id)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConnectionSpec, NodeSpec};

    const SAMPLE: &str = r#"{
        "nodes": [
            {
                "id": "a",
                "label": "Orders",
                "shape": "rect",
                "payload": { "code": "", "language": "java", "type": "service", "endpoints": [] },
                "weight": 0.5,
                "position": { "x": 10.0, "y": 20.0 }
            },
            {
                "id": "b",
                "label": "Billing",
                "shape": "circle",
                "payload": { "code": "", "language": "python" },
                "weight": 0,
                "position": { "x": 200.0, "y": 20.0 }
            }
        ],
        "connections": [
            {
                "id": "ab",
                "source": "a",
                "target": "b",
                "isLoop": false,
                "weight": 0.25,
                "label": "Orders - Billing",
                "payload": { "code": "{}", "language": "json" }
            }
        ],
        "viewport": { "x": 5.0, "y": -5.0, "k": 0.5 }
    }"#;

    #[test]
    fn test_parse_sample() {
        let snapshot = DiagramSnapshot::from_json(SAMPLE).unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.nodes[0].shape, Shape::Rect);
        assert_eq!(snapshot.nodes[0].payload.kind.as_deref(), Some("service"));
        assert_eq!(snapshot.connections[0].weight, 0.25);
        assert_eq!(snapshot.viewport, Some(Viewport::new(5.0, -5.0, 0.5)));
        assert!(snapshot.validate().is_ok());
        assert!(snapshot.dangling_connections().is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = DiagramSnapshot::from_json(SAMPLE).unwrap();
        let json = snapshot.to_json_pretty().unwrap();
        assert!(json.contains("\"isLoop\""));
        assert_eq!(DiagramSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_missing_viewport_is_not_serialised() {
        let snapshot = DiagramSnapshot::default();
        let json = snapshot.to_json_pretty().unwrap();
        assert!(!json.contains("viewport"));
    }

    #[test]
    fn test_malformed_json_keeps_source() {
        let src = "{ \"nodes\": [ { \"id\": 1 } ] }";
        match DiagramSnapshot::from_json(src) {
            Err(MicrosynthError::Snapshot { src: kept, .. }) => assert_eq!(kept, src),
            other => panic!("expected a snapshot error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_shape_is_rejected() {
        let src = r#"{ "nodes": [ { "id": "a", "shape": "hexagon" } ] }"#;
        assert!(DiagramSnapshot::from_json(src).is_err());
    }

    #[test]
    fn test_validate_duplicates() {
        let mut snapshot = DiagramSnapshot::from_json(SAMPLE).unwrap();
        snapshot.nodes.push(snapshot.nodes[0].clone());
        assert!(matches!(
            snapshot.validate(),
            Err(MicrosynthError::InvalidSnapshot(msg)) if msg.contains("`a`")
        ));

        let mut snapshot = DiagramSnapshot::from_json(SAMPLE).unwrap();
        snapshot.connections.push(snapshot.connections[0].clone());
        assert!(matches!(
            snapshot.validate(),
            Err(MicrosynthError::InvalidSnapshot(msg)) if msg.contains("connection")
        ));
    }

    #[test]
    fn test_dangling_connections() {
        let mut snapshot = DiagramSnapshot::from_json(SAMPLE).unwrap();
        let mut dangling = snapshot.connections[0].clone();
        dangling.id = ConnectionId::from("ax");
        dangling.target = NodeId::from("x");
        snapshot.connections.push(dangling);

        assert_eq!(snapshot.dangling_connections(), vec![&ConnectionId::from("ax")]);
    }

    #[test]
    fn test_from_model_preserves_order() {
        let mut model = GraphModel::new(true);
        for id in ["z", "a", "m"] {
            model.add_node(NodeSpec::new(id).with_id(id)).unwrap();
        }
        model
            .add_connection(ConnectionSpec::new("loop", "m", "m"))
            .unwrap();

        let snapshot = DiagramSnapshot::from_model(&model, None);
        let ids: Vec<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "m"]);
        assert!(snapshot.connections[0].is_loop);
        assert_eq!(snapshot.connections[0].label, "m - m");
    }
}
