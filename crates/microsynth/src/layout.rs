//! Auto-arrange and load sequencing.
//!
//! The editor does not lay out graphs itself. A [`LayoutEngine`] computes
//! target positions from a [`LayoutGraph`] and a [`LayoutOptions`] bag;
//! [`SugiyamaEngine`] is the layered engine used by default.
//!
//! [`LayoutCoordinator`] drives the engine and animates the result:
//!
//! - a reflow starts a linear [`Transition`] from the current positions to
//!   the computed ones, and a second reflow is refused while one is running;
//! - [`cancel`](LayoutCoordinator::cancel) drops a running transition, which
//!   the editor does before clearing or loading a diagram;
//! - every [`tick`](LayoutCoordinator::tick) moves the nodes and re-fits the
//!   viewport to wherever the nodes currently are;
//! - only one snapshot load may be in progress at a time.

mod sugiyama;

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use thiserror::Error;

use microsynth_core::{
    geometry::{Bounds, Point, Size},
    identifier::NodeId,
};

use crate::{config::LayoutConfig, error::MicrosynthError, graph::GraphModel, snapshot::Viewport};

pub use sugiyama::SugiyamaEngine;

/// Error raised by a layout engine.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout engine panicked: {0}")]
    EnginePanicked(String),

    #[error("layout engine returned no layout")]
    EmptyResult,
}

/// How a snapshot load was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Opening a stored diagram. The viewport is restored and the diagram
    /// starts out saved.
    Init,
    /// Importing a file. The viewport is restored and the diagram counts as
    /// unsaved.
    Import,
    /// Loading a generated diagram. The graph is auto-arranged and counts as
    /// unsaved.
    Generate,
}

impl LoadMode {
    /// Whether the load ends with a reflow instead of a viewport restore.
    pub fn reflows(self) -> bool {
        matches!(self, LoadMode::Generate)
    }

    /// Whether the loaded graph differs from anything persisted.
    pub fn marks_touched(self) -> bool {
        !matches!(self, LoadMode::Init)
    }
}

/// Result of asking for a reflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowOutcome {
    /// A transition towards the new layout started.
    Started,
    /// Another reflow is still animating; nothing was done.
    Busy,
    /// The graph has no nodes.
    Empty,
}

/// The graph as seen by a layout engine: node ids and directed edges.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
}

impl LayoutGraph {
    pub fn new(nodes: Vec<NodeId>, edges: Vec<(NodeId, NodeId)>) -> Self {
        Self { nodes, edges }
    }

    /// Captures the nodes and connections of a model, in insertion order.
    pub fn from_model(model: &GraphModel) -> Self {
        Self {
            nodes: model.nodes().map(|node| node.id().clone()).collect(),
            edges: model
                .connections()
                .map(|connection| (connection.source().clone(), connection.target().clone()))
                .collect(),
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.edges.iter().map(|(source, target)| (source, target))
    }
}

/// Constraint bag handed to a layout engine.
///
/// The spacing values cover what every engine needs; `extra` carries
/// engine-specific string options.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    node_spacing: f32,
    layer_spacing: f32,
    edge_spacing: f32,
    extra: BTreeMap<String, String>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl LayoutOptions {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            node_spacing: config.node_spacing(),
            layer_spacing: config.layer_spacing(),
            edge_spacing: config.edge_spacing(),
            extra: BTreeMap::new(),
        }
    }

    /// Distance between neighbouring nodes of the same layer.
    pub fn node_spacing(&self) -> f32 {
        self.node_spacing
    }

    /// Distance between consecutive layers.
    pub fn layer_spacing(&self) -> f32 {
        self.layer_spacing
    }

    /// Distance between parallel edges, for engines that route edges.
    pub fn edge_spacing(&self) -> f32 {
        self.edge_spacing
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// A layout algorithm.
pub trait LayoutEngine {
    /// Computes a centre position for every node of `graph`.
    fn arrange(
        &self,
        graph: &LayoutGraph,
        options: &LayoutOptions,
    ) -> Result<HashMap<NodeId, Point>, LayoutError>;
}

/// Linear animation of node positions.
#[derive(Debug, Clone)]
pub struct Transition {
    moves: Vec<(NodeId, Point, Point)>,
    elapsed_ms: f64,
    duration_ms: u64,
}

impl Transition {
    pub fn new(moves: Vec<(NodeId, Point, Point)>, duration_ms: u64) -> Self {
        Self {
            moves,
            elapsed_ms: 0.0,
            duration_ms,
        }
    }

    /// Fraction of the animation done, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        (self.elapsed_ms / self.duration_ms as f64).clamp(0.0, 1.0) as f32
    }

    pub fn advance(&mut self, dt_ms: f64) {
        self.elapsed_ms += dt_ms.max(0.0);
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Current position of every animated node.
    pub fn positions(&self) -> impl Iterator<Item = (&NodeId, Point)> {
        let t = self.progress();
        self.moves
            .iter()
            .map(move |(id, from, to)| (id, from.lerp(*to, t)))
    }
}

/// What one animation tick did.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Nodes moved by this tick.
    pub moved: Vec<NodeId>,
    /// Viewport fitted to the nodes after the move.
    pub viewport: Option<Viewport>,
    /// Whether the transition has completed.
    pub finished: bool,
}

/// Drives the layout engine, reflow animation and load gating.
pub struct LayoutCoordinator {
    engine: Box<dyn LayoutEngine>,
    options: LayoutOptions,
    transition_ms: u64,
    viewport_size: Size,
    zoom_factor: f32,
    transition: Option<Transition>,
    loading: bool,
}

impl std::fmt::Debug for LayoutCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCoordinator")
            .field("options", &self.options)
            .field("transition_ms", &self.transition_ms)
            .field("transition", &self.transition)
            .field("loading", &self.loading)
            .finish_non_exhaustive()
    }
}

impl LayoutCoordinator {
    pub fn new(config: &LayoutConfig, engine: Box<dyn LayoutEngine>) -> Self {
        Self {
            engine,
            options: LayoutOptions::from_config(config),
            transition_ms: config.transition_ms(),
            viewport_size: Size::new(config.viewport_width(), config.viewport_height()),
            zoom_factor: config.zoom_factor(),
            transition: None,
            loading: false,
        }
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// Marks a load as started.
    ///
    /// # Errors
    ///
    /// Returns [`MicrosynthError::LoadInProgress`] when a load is already
    /// running.
    pub fn begin_load(&mut self) -> Result<(), MicrosynthError> {
        if self.loading {
            warn!("Diagram load refused, another load is in progress");
            return Err(MicrosynthError::LoadInProgress);
        }
        self.loading = true;
        Ok(())
    }

    pub fn end_load(&mut self) {
        self.loading = false;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a reflow transition is running.
    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Computes a new layout and starts animating towards it.
    ///
    /// # Errors
    ///
    /// Returns [`MicrosynthError::Layout`] when the engine fails.
    pub fn reflow(&mut self, model: &GraphModel) -> Result<ReflowOutcome, MicrosynthError> {
        if self.transition.is_some() {
            warn!("Reflow refused, a transition is still running");
            return Ok(ReflowOutcome::Busy);
        }
        if model.node_count() == 0 {
            return Ok(ReflowOutcome::Empty);
        }

        let graph = LayoutGraph::from_model(model);
        let targets = self.engine.arrange(&graph, &self.options)?;

        let moves: Vec<(NodeId, Point, Point)> = model
            .nodes()
            .filter_map(|node| {
                let target = targets.get(node.id())?;
                Some((node.id().clone(), node.position(), *target))
            })
            .collect();

        info!(
            nodes = moves.len(),
            duration_ms = self.transition_ms;
            "Reflow started"
        );
        self.transition = Some(Transition::new(moves, self.transition_ms));
        Ok(ReflowOutcome::Started)
    }

    /// Advances the running transition by `dt_ms` milliseconds.
    ///
    /// Moves the animated nodes and fits the viewport to the current node
    /// set. Returns `None` when no transition is running.
    pub fn tick(&mut self, model: &mut GraphModel, dt_ms: f64) -> Option<TickReport> {
        let transition = self.transition.as_mut()?;
        transition.advance(dt_ms);

        let mut moved = Vec::new();
        for (id, position) in transition.positions() {
            if model.move_node(id, position) {
                moved.push(id.clone());
            }
        }

        let finished = transition.is_finished();
        if finished {
            self.transition = None;
            debug!(nodes = moved.len(); "Reflow finished");
        }

        Some(TickReport {
            moved,
            viewport: self.fit_viewport(model),
            finished,
        })
    }

    /// Drops the running transition, leaving nodes where they currently are.
    pub fn cancel(&mut self) {
        if let Some(transition) = self.transition.take() {
            debug!(progress = transition.progress(); "Reflow cancelled");
        }
    }

    /// Runs the transition to its end in one step.
    pub fn finish(&mut self, model: &mut GraphModel) -> Option<TickReport> {
        let remaining = self.transition.as_ref().map(|t| t.duration_ms as f64)?;
        self.tick(model, remaining)
    }

    /// Viewport that centres all nodes and scales them to fit.
    ///
    /// The zoom is the largest that fits the node bounds into the viewport,
    /// times the configured zoom factor. Returns `None` for an empty graph.
    pub fn fit_viewport(&self, model: &GraphModel) -> Option<Viewport> {
        let bounds = Bounds::merge_all(
            model
                .nodes()
                .map(|node| node.position().to_bounds(node.size())),
        )?;
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return None;
        }

        let width = self.viewport_size.width();
        let height = self.viewport_size.height();
        let k = (width / bounds.width()).min(height / bounds.height()) * self.zoom_factor;
        let center = bounds.center();

        Some(Viewport::new(
            width / 2.0 - center.x() * k,
            height / 2.0 - center.y() * k,
            k,
        ))
    }
}
