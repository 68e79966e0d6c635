//! MicroSynth - A diagram graph engine for designing microservice architectures.
//!
//! The engine keeps the graph of a service diagram consistent while a user
//! edits it: nodes are services, connections are calls between them. It
//! gates connections that would close a cycle behind a user confirmation,
//! bends parallel connections apart, clips connection ends at node outlines,
//! reports every change as an ordered event stream, and drives an external
//! layout algorithm for auto-arranging.
//!
//! [`DiagramEditor`] is the entry point a host application talks to. It
//! owns all the parts and translates diagrams in and out of the
//! [`DiagramSnapshot`](snapshot::DiagramSnapshot) JSON format.

pub mod config;
pub mod cycle;
pub mod events;
pub mod generator;
pub mod graph;
pub mod layout;
pub mod routing;
pub mod snapshot;
pub mod socket;

mod error;

pub use microsynth_core::{geometry, identifier, payload, shape};

pub use error::MicrosynthError;

use log::{debug, info, warn};
use serde_json::Value;

use geometry::Point;
use identifier::{ConnectionId, NodeId};
use payload::Endpoint;
use shape::Shape;

use config::EditorConfig;
use cycle::{Admission, CycleGuard, PendingConnection};
use events::{EditorEvent, EditorListener, EventPipeline, RenderRequest, Selection};
use generator::GenerationParams;
use graph::{
    Connection, ConnectionPatch, ConnectionSpec, GraphModel, Node, NodePatch, NodeSpec,
    PropertyError,
};
use layout::{LayoutCoordinator, LayoutEngine, LoadMode, ReflowOutcome, SugiyamaEngine, TickReport};
use routing::EdgeRouter;
use snapshot::{DiagramSnapshot, Viewport};
use socket::SocketPositioner;

/// Result of asking for a new connection.
#[derive(Debug)]
#[must_use]
pub enum ConnectOutcome {
    /// The connection exists now.
    Created(ConnectionId),
    /// The connection would close a cycle. Pass the ticket to
    /// [`DiagramEditor::resolve_connection`] with the user's answer.
    NeedsConfirmation(PendingConnection),
    /// Nothing was created.
    Declined,
}

impl ConnectOutcome {
    pub fn created(&self) -> Option<&ConnectionId> {
        match self {
            ConnectOutcome::Created(id) => Some(id),
            _ => None,
        }
    }
}

/// What a snapshot load put into the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub nodes: usize,
    pub connections: usize,
    /// Connections skipped because an endpoint does not exist.
    pub skipped: Vec<ConnectionId>,
}

/// The editing session of one diagram.
///
/// All mutations go through this type so that the graph, the event stream,
/// the cycle exclusions and the render queue stay in step.
///
/// # Examples
///
/// ```
/// use microsynth::{ConnectOutcome, DiagramEditor, geometry::Point, graph::NodeSpec};
///
/// let mut editor = DiagramEditor::default();
/// let a = editor.add_node(NodeSpec::new("Orders")).unwrap();
/// let b = editor
///     .add_node(NodeSpec::new("Billing").at(Point::new(200.0, 0.0)))
///     .unwrap();
///
/// let outcome = editor.request_connection(&a, &b);
/// assert!(matches!(outcome, ConnectOutcome::Created(_)));
///
/// // Closing the cycle needs the user's confirmation
/// let ConnectOutcome::NeedsConfirmation(pending) = editor.request_connection(&b, &a) else {
///     panic!("expected a confirmation request");
/// };
/// assert!(matches!(
///     editor.resolve_connection(pending, false),
///     ConnectOutcome::Declined
/// ));
/// assert_eq!(editor.connections().count(), 1);
/// ```
pub struct DiagramEditor {
    model: GraphModel,
    guard: CycleGuard,
    router: EdgeRouter,
    sockets: SocketPositioner,
    pipeline: EventPipeline,
    layout: LayoutCoordinator,
    viewport: Viewport,
}

impl Default for DiagramEditor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl std::fmt::Debug for DiagramEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramEditor")
            .field("model", &self.model)
            .field("pipeline", &self.pipeline)
            .field("layout", &self.layout)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl DiagramEditor {
    /// Creates an editor arranging diagrams with [`SugiyamaEngine`].
    pub fn new(config: EditorConfig) -> Self {
        Self::with_engine(config, Box::new(SugiyamaEngine::new()))
    }

    /// Creates an editor with a custom layout engine.
    pub fn with_engine(config: EditorConfig, engine: Box<dyn LayoutEngine>) -> Self {
        let loops = config.graph().loop_connections_enabled();
        Self {
            model: GraphModel::new(loops),
            guard: CycleGuard::new(loops),
            router: EdgeRouter::new(config.routing()),
            sockets: SocketPositioner::new(config.routing()),
            pipeline: EventPipeline::new(),
            layout: LayoutCoordinator::new(config.layout(), engine),
            viewport: Viewport::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.model.node(id)
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.model.connection(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.model.nodes()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.model.connections()
    }

    pub fn selection(&self) -> &Selection {
        self.pipeline.selection()
    }

    /// The target endpoint a connection's API call is bound to.
    pub fn bound_endpoint(&self, id: &ConnectionId) -> Option<&Endpoint> {
        self.model.bound_endpoint(id)
    }

    /// Whether the connections, exclusions ignored, contain a directed cycle.
    pub fn has_cycle(&self) -> bool {
        self.model.find_cycle().is_some()
    }

    /// The node path of a directed cycle, if there is one.
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        self.model.find_cycle()
    }

    /// Whether the graph changed since it was loaded or saved.
    pub fn is_touched(&self) -> bool {
        self.pipeline.is_touched()
    }

    /// Records that the current graph has been persisted.
    pub fn mark_saved(&mut self) {
        self.pipeline.mark_saved();
    }

    /// Whether the diagram may be exported for code generation: it has
    /// content, everything is saved and no cycle is present.
    pub fn can_export(&self) -> bool {
        !self.model.is_empty() && !self.is_touched() && !self.has_cycle()
    }

    pub fn is_loading(&self) -> bool {
        self.layout.is_loading()
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// Adds a node. Returns `None` when its id is already in use.
    pub fn add_node(&mut self, spec: NodeSpec) -> Option<NodeId> {
        let id = self.model.add_node(spec)?;
        self.emit(EditorEvent::NodeCreated { id: id.clone() });
        self.pipeline.request_render(RenderRequest::Node(id.clone()));
        Some(id)
    }

    /// Adds a copy of a node next to it.
    pub fn duplicate_node(&mut self, id: &NodeId) -> Option<NodeId> {
        let copy = self.model.duplicate_node(id)?;
        self.emit(EditorEvent::NodeCreated { id: copy.clone() });
        self.pipeline
            .request_render(RenderRequest::Node(copy.clone()));
        Some(copy)
    }

    /// Removes a node together with its connections.
    ///
    /// A `ConnectionRemoved` event is emitted for every cascaded connection
    /// before the `NodeRemoved` event.
    pub fn remove_node(&mut self, id: &NodeId) -> bool {
        let Some(removal) = self.model.remove_node(id) else {
            return false;
        };
        for connection in &removal.connections {
            self.connection_removed(connection);
        }
        self.emit(EditorEvent::NodeRemoved {
            id: removal.node.id().clone(),
        });
        true
    }

    /// Applies a partial update to a node. Returns whether anything changed.
    pub fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> bool {
        if !self.model.update_node(id, patch) {
            return false;
        }
        self.emit(EditorEvent::NodeUpdated { id: id.clone() });
        self.render_node_with_connections(id);
        true
    }

    /// Applies a form-style `(field, value)` change to a node.
    pub fn set_node_property(
        &mut self,
        id: &NodeId,
        field: &str,
        value: Value,
    ) -> Result<bool, PropertyError> {
        let patch = NodePatch::from_property(field, value)?;
        Ok(self.update_node(id, patch))
    }

    /// Gives every node `shape`. Returns how many nodes changed.
    pub fn apply_shape_to_all(&mut self, shape: Shape) -> usize {
        let changed = self.model.apply_shape_to_all(shape);
        for id in &changed {
            self.emit(EditorEvent::NodeUpdated { id: id.clone() });
            self.render_node_with_connections(id);
        }
        changed.len()
    }

    // -------------------------------------------------------------------------
    // Connections
    // -------------------------------------------------------------------------

    /// Asks for a connection from `source` to `target`, as drawn by a user.
    ///
    /// The connection gets a fresh id and the preset payload. A connection
    /// that would close a cycle is not created; the returned ticket waits
    /// for the user's answer.
    pub fn request_connection(&mut self, source: &NodeId, target: &NodeId) -> ConnectOutcome {
        if self.model.node(source).is_none() || self.model.node(target).is_none() {
            debug!(
                source = source.as_str(),
                target = target.as_str();
                "Connection request declined, endpoint missing"
            );
            return ConnectOutcome::Declined;
        }
        let spec = ConnectionSpec::new(
            self.model.generate_connection_id(),
            source.clone(),
            target.clone(),
        );
        self.add_connection(spec)
    }

    /// Adds a connection built by the caller, gated by the cycle check.
    pub fn add_connection(&mut self, spec: ConnectionSpec) -> ConnectOutcome {
        match self
            .guard
            .admit(spec, self.model.connections(), self.model.exclusions())
        {
            Admission::Allowed(spec) => self.create_connection(spec),
            Admission::NeedsConfirmation(pending) => ConnectOutcome::NeedsConfirmation(pending),
            Admission::SelfLoopDisabled => ConnectOutcome::Declined,
        }
    }

    /// Settles a cycle confirmation.
    ///
    /// On acceptance the connection is created and remembered as approved,
    /// so it does not trigger another confirmation.
    pub fn resolve_connection(
        &mut self,
        pending: PendingConnection,
        accepted: bool,
    ) -> ConnectOutcome {
        match self
            .guard
            .resolve(pending, accepted, self.model.exclusions_mut())
        {
            Some(spec) => self.create_connection(spec),
            None => ConnectOutcome::Declined,
        }
    }

    /// Removes a connection.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        match self.model.remove_connection(id) {
            Some(connection) => {
                self.connection_removed(&connection);
                true
            }
            None => false,
        }
    }

    /// Applies a partial update to a connection. Returns whether anything
    /// changed.
    pub fn update_connection(&mut self, id: &ConnectionId, patch: ConnectionPatch) -> bool {
        if !self.model.update_connection(id, patch) {
            return false;
        }
        self.emit(EditorEvent::ConnectionUpdated { id: id.clone() });
        self.pipeline
            .request_render(RenderRequest::Connection(id.clone()));
        true
    }

    /// Applies a form-style `(field, value)` change to a connection.
    pub fn set_connection_property(
        &mut self,
        id: &ConnectionId,
        field: &str,
        value: Value,
    ) -> Result<bool, PropertyError> {
        let patch = ConnectionPatch::from_property(field, value)?;
        Ok(self.update_connection(id, patch))
    }

    /// The drawn path of a connection.
    ///
    /// A self-connection is a loop; any other connection is clipped at both
    /// node outlines and then bent if it shares its node pair with others.
    pub fn connection_path(&self, id: &ConnectionId) -> Option<Vec<Point>> {
        let connection = self.model.connection(id)?;
        let ends = self.model.resolve(connection)?;
        if connection.is_self_connection() {
            return Some(self.sockets.loop_path(ends.source));
        }
        let straight = self.sockets.clip(ends.source, ends.target);
        Some(self.router.compute_path(&self.model, id, &straight))
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Selects a node, keeping the previous node selection if `accumulate`.
    pub fn select_node(&mut self, id: &NodeId, accumulate: bool) -> bool {
        if self.model.node(id).is_none() {
            return false;
        }
        self.emit(EditorEvent::NodeSelected {
            id: id.clone(),
            accumulate,
        });
        true
    }

    /// Selects a connection, returning the largest weight it may take.
    pub fn select_connection(&mut self, id: &ConnectionId) -> Option<f32> {
        let max_weight = events::max_assignable_weight(&self.model, id)?;
        self.emit(EditorEvent::ConnectionSelected {
            id: id.clone(),
            max_weight,
        });
        Some(max_weight)
    }

    /// A press on empty canvas; drops the selection.
    pub fn pointer_down(&mut self) {
        self.emit(EditorEvent::PointerDown);
    }

    // -------------------------------------------------------------------------
    // Whole diagram
    // -------------------------------------------------------------------------

    /// Empties the diagram.
    ///
    /// Removal events are emitted for every connection and node, followed by
    /// `Cleared`. Cycle exclusions are dropped with the graph, and a running
    /// reflow transition is cancelled.
    pub fn clear(&mut self) {
        self.layout.cancel();
        let connections: Vec<Connection> = self.model.connections().cloned().collect();
        let nodes: Vec<NodeId> = self.model.nodes().map(|node| node.id().clone()).collect();
        self.model.clear();

        for connection in connections {
            self.emit(EditorEvent::ConnectionRemoved {
                id: connection.id().clone(),
                source: connection.source().clone(),
                target: connection.target().clone(),
            });
        }
        for id in nodes {
            self.emit(EditorEvent::NodeRemoved { id });
        }
        self.emit(EditorEvent::Cleared);
    }

    /// Loads a snapshot into the editor.
    ///
    /// The snapshot is validated before anything changes. A running reflow
    /// transition is cancelled. Then, in order: the graph is cleared if `clear_first`, all nodes are created, all
    /// connections are created, and finally a [`LoadMode::Generate`] load is
    /// auto-arranged while the other modes restore the stored viewport.
    /// Connections with a missing endpoint are skipped and listed in the
    /// report. Connections are not cycle-checked.
    ///
    /// # Errors
    ///
    /// Returns [`MicrosynthError::InvalidSnapshot`] for duplicate ids,
    /// [`MicrosynthError::LoadInProgress`] when called during another load,
    /// and [`MicrosynthError::Layout`] when arranging a generated diagram
    /// fails.
    pub fn load_snapshot(
        &mut self,
        snapshot: DiagramSnapshot,
        clear_first: bool,
        mode: LoadMode,
    ) -> Result<LoadReport, MicrosynthError> {
        snapshot.validate()?;
        self.layout.begin_load()?;
        // positions from an earlier reflow must not land on the loaded nodes
        self.layout.cancel();
        self.pipeline.set_loading(true);

        info!(
            mode:? = mode,
            nodes = snapshot.nodes.len(),
            connections = snapshot.connections.len();
            "Loading diagram"
        );

        if clear_first {
            self.clear();
        }
        let report = self.populate(snapshot.nodes, snapshot.connections);

        self.pipeline.set_loading(false);
        self.layout.end_load();

        if mode.marks_touched() {
            self.pipeline.mark_touched();
        } else {
            self.pipeline.mark_saved();
        }

        if mode.reflows() {
            self.reflow()?;
        } else if let Some(viewport) = snapshot.viewport {
            self.set_viewport(viewport);
        }

        info!(
            nodes = report.nodes,
            connections = report.connections,
            skipped = report.skipped.len();
            "Diagram loaded"
        );
        Ok(report)
    }

    fn populate(
        &mut self,
        nodes: Vec<snapshot::NodeRecord>,
        connections: Vec<snapshot::ConnectionRecord>,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        for record in nodes {
            let spec = NodeSpec::new(record.label)
                .with_id(record.id)
                .with_shape(record.shape)
                .with_weight(record.weight)
                .with_payload(record.payload)
                .at(record.position);
            if self.add_node(spec).is_some() {
                report.nodes += 1;
            }
        }

        for record in connections {
            let spec = ConnectionSpec::new(record.id.clone(), record.source, record.target)
                .with_label(record.label)
                .with_weight(record.weight)
                .with_payload(record.payload);
            match self.create_connection(spec) {
                ConnectOutcome::Created(_) => report.connections += 1,
                _ => {
                    warn!(connection = record.id.as_str(); "Skipping connection with missing endpoint");
                    report.skipped.push(record.id);
                }
            }
        }
        report
    }

    /// Parses a JSON snapshot and loads it in place of the current diagram.
    ///
    /// # Errors
    ///
    /// A malformed or invalid snapshot is rejected with the live graph left
    /// untouched. See also [`load_snapshot`](Self::load_snapshot).
    pub fn import_json(&mut self, src: &str) -> Result<LoadReport, MicrosynthError> {
        let snapshot = DiagramSnapshot::from_json(src)?;
        self.load_snapshot(snapshot, true, LoadMode::Import)
    }

    /// Generates a random architecture and loads it in place of the current
    /// diagram.
    pub fn load_generated(
        &mut self,
        params: &GenerationParams,
    ) -> Result<LoadReport, MicrosynthError> {
        let snapshot = generator::generate(params)?;
        self.load_snapshot(snapshot, true, LoadMode::Generate)
    }

    /// The current diagram as a snapshot.
    pub fn export_snapshot(&self) -> DiagramSnapshot {
        DiagramSnapshot::from_model(&self.model, Some(self.viewport))
    }

    /// The current diagram as indented JSON.
    pub fn export_json(&self) -> Result<String, MicrosynthError> {
        self.export_snapshot().to_json_pretty()
    }

    // -------------------------------------------------------------------------
    // Layout and viewport
    // -------------------------------------------------------------------------

    /// Starts auto-arranging the diagram.
    pub fn reflow(&mut self) -> Result<ReflowOutcome, MicrosynthError> {
        self.layout.reflow(&self.model)
    }

    /// Advances a running reflow by `dt_ms` milliseconds.
    pub fn tick(&mut self, dt_ms: f64) -> Option<TickReport> {
        let report = self.layout.tick(&mut self.model, dt_ms)?;
        self.after_tick(&report);
        Some(report)
    }

    /// Runs a reflow to its end.
    pub fn finish_reflow(&mut self) -> Option<TickReport> {
        let report = self.layout.finish(&mut self.model)?;
        self.after_tick(&report);
        Some(report)
    }

    pub fn is_animating(&self) -> bool {
        self.layout.is_animating()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.pipeline
            .request_render(RenderRequest::Viewport(viewport));
    }

    // -------------------------------------------------------------------------
    // Event and render streams
    // -------------------------------------------------------------------------

    /// Registers a listener for every event from now on.
    pub fn subscribe(&mut self, listener: impl EditorListener + 'static) {
        self.pipeline.subscribe(listener);
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.pipeline.drain_events()
    }

    pub fn drain_render_requests(&mut self) -> Vec<RenderRequest> {
        self.pipeline.drain_render_requests()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn emit(&mut self, event: EditorEvent) {
        self.pipeline.dispatch(event, self.model.exclusions_mut());
    }

    fn create_connection(&mut self, spec: ConnectionSpec) -> ConnectOutcome {
        let Some(id) = self.model.add_connection(spec) else {
            return ConnectOutcome::Declined;
        };
        let (source, target) = match self.model.connection(&id) {
            Some(connection) => (connection.source().clone(), connection.target().clone()),
            None => return ConnectOutcome::Declined,
        };
        self.emit(EditorEvent::ConnectionCreated {
            id: id.clone(),
            source,
            target,
        });

        // Siblings in the route group bend differently now
        let group: Vec<ConnectionId> = self
            .model
            .route_group(&id)
            .into_iter()
            .map(|connection| connection.id().clone())
            .collect();
        for member in group {
            self.pipeline
                .request_render(RenderRequest::Connection(member));
        }
        ConnectOutcome::Created(id)
    }

    fn connection_removed(&mut self, connection: &Connection) {
        self.emit(EditorEvent::ConnectionRemoved {
            id: connection.id().clone(),
            source: connection.source().clone(),
            target: connection.target().clone(),
        });
        for id in EdgeRouter::affected_by_removal(&self.model, connection) {
            self.pipeline.request_render(RenderRequest::Connection(id));
        }
    }

    fn render_node_with_connections(&mut self, id: &NodeId) {
        self.pipeline.request_render(RenderRequest::Node(id.clone()));
        let touching: Vec<ConnectionId> = self
            .model
            .connections_touching(id)
            .map(|connection| connection.id().clone())
            .collect();
        for connection in touching {
            self.pipeline
                .request_render(RenderRequest::Connection(connection));
        }
    }

    fn after_tick(&mut self, report: &TickReport) {
        for id in &report.moved {
            self.render_node_with_connections(id);
        }
        if let Some(viewport) = report.viewport {
            self.set_viewport(viewport);
        }
    }
}
