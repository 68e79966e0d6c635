//! The ordered stream of editor events.
//!
//! Every structural change of the graph, every selection change and every
//! area-level reset is expressed as one [`EditorEvent`] and pushed through
//! [`EventPipeline::dispatch`]. Dispatch runs the editor's own bookkeeping
//! first (unsaved-changes flag, cycle exclusions, selection) and only then
//! forwards the event to listeners, so a listener always observes the state
//! that follows the event.
//!
//! The pipeline also carries the render side of the editor: a queue of
//! [`RenderRequest`]s the host drains to know what to redraw.

use std::{collections::VecDeque, fmt};

use log::{debug, trace};

use microsynth_core::identifier::{ConnectionId, NodeId};

use crate::{cycle::ExclusionSet, graph::GraphModel, snapshot::Viewport};

/// Something that happened in the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    NodeCreated {
        id: NodeId,
    },
    NodeRemoved {
        id: NodeId,
    },
    NodeUpdated {
        id: NodeId,
    },
    ConnectionCreated {
        id: ConnectionId,
        source: NodeId,
        target: NodeId,
    },
    ConnectionRemoved {
        id: ConnectionId,
        source: NodeId,
        target: NodeId,
    },
    ConnectionUpdated {
        id: ConnectionId,
    },
    /// A node was picked; `accumulate` keeps the previous node selection.
    NodeSelected {
        id: NodeId,
        accumulate: bool,
    },
    /// A connection was picked. `max_weight` is the largest weight it may
    /// take without the outgoing weights of its source exceeding 1.
    ConnectionSelected {
        id: ConnectionId,
        max_weight: f32,
    },
    /// The whole diagram was emptied.
    Cleared,
    /// The user pressed on empty canvas.
    PointerDown,
}

impl EditorEvent {
    /// Whether the event changes the graph and so counts as an unsaved edit.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EditorEvent::NodeCreated { .. }
                | EditorEvent::NodeRemoved { .. }
                | EditorEvent::NodeUpdated { .. }
                | EditorEvent::ConnectionCreated { .. }
                | EditorEvent::ConnectionRemoved { .. }
                | EditorEvent::ConnectionUpdated { .. }
        )
    }
}

/// Receiver of forwarded editor events.
///
/// Closures taking `&EditorEvent` are listeners too.
pub trait EditorListener {
    fn on_event(&mut self, event: &EditorEvent);
}

impl<F> EditorListener for F
where
    F: FnMut(&EditorEvent),
{
    fn on_event(&mut self, event: &EditorEvent) {
        self(event)
    }
}

/// What the host should redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    Node(NodeId),
    Connection(ConnectionId),
    Viewport(Viewport),
}

/// Currently selected nodes and connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    nodes: Vec<NodeId>,
    connection: Option<(ConnectionId, f32)>,
}

impl Selection {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The selected connection, if any.
    pub fn connection(&self) -> Option<&ConnectionId> {
        self.connection.as_ref().map(|(id, _)| id)
    }

    /// The maximum assignable weight computed when the connection was selected.
    pub fn max_weight(&self) -> Option<f32> {
        self.connection.as_ref().map(|(_, max_weight)| *max_weight)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connection.is_none()
    }

    fn select_node(&mut self, id: &NodeId, accumulate: bool) {
        self.connection = None;
        if !accumulate {
            self.nodes.clear();
        }
        if !self.nodes.contains(id) {
            self.nodes.push(id.clone());
        }
    }

    fn select_connection(&mut self, id: &ConnectionId, max_weight: f32) {
        self.nodes.clear();
        self.connection = Some((id.clone(), max_weight));
    }

    fn forget_node(&mut self, id: &NodeId) {
        self.nodes.retain(|node| node != id);
    }

    fn forget_connection(&mut self, id: &ConnectionId) {
        if self.connection() == Some(id) {
            self.connection = None;
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.connection = None;
    }
}

/// Largest weight `id` may take so that the outgoing weights of its source
/// stay within 1. Advisory only; nothing rejects a larger weight.
pub fn max_assignable_weight(model: &GraphModel, id: &ConnectionId) -> Option<f32> {
    let connection = model.connection(id)?;
    let others = model.outgoing_weight_sum(connection.source(), id);
    Some((1.0 - others).max(0.0))
}

/// Processes editor events in emission order.
#[derive(Default)]
pub struct EventPipeline {
    touched: bool,
    loading: bool,
    selection: Selection,
    listeners: Vec<Box<dyn EditorListener>>,
    outbox: VecDeque<EditorEvent>,
    render_queue: VecDeque<RenderRequest>,
}

impl fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPipeline")
            .field("touched", &self.touched)
            .field("loading", &self.loading)
            .field("selection", &self.selection)
            .field("listeners", &self.listeners.len())
            .field("outbox", &self.outbox.len())
            .field("render_queue", &self.render_queue.len())
            .finish()
    }
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one event.
    ///
    /// In order: flip the unsaved-changes flag for structural events unless
    /// a bulk load is running, prune or clear the cycle exclusions, update
    /// the selection, then forward the event to listeners and the outbox.
    pub fn dispatch(&mut self, event: EditorEvent, exclusions: &mut ExclusionSet) {
        trace!(event:? = event; "Dispatching editor event");

        if event.is_structural() && !self.loading {
            self.touched = true;
        }

        match &event {
            EditorEvent::ConnectionRemoved { id, source, target } => {
                let pruned = exclusions.prune(source, target);
                if pruned > 0 {
                    debug!(
                        source = source.as_str(),
                        target = target.as_str(),
                        pruned = pruned;
                        "Cycle exclusions pruned"
                    );
                }
                self.selection.forget_connection(id);
            }
            EditorEvent::NodeRemoved { id } => self.selection.forget_node(id),
            EditorEvent::NodeSelected { id, accumulate } => {
                self.selection.select_node(id, *accumulate)
            }
            EditorEvent::ConnectionSelected { id, max_weight } => {
                self.selection.select_connection(id, *max_weight)
            }
            EditorEvent::Cleared => {
                exclusions.clear();
                self.selection.clear();
            }
            EditorEvent::PointerDown => self.selection.clear(),
            EditorEvent::NodeCreated { .. }
            | EditorEvent::NodeUpdated { .. }
            | EditorEvent::ConnectionCreated { .. }
            | EditorEvent::ConnectionUpdated { .. } => {}
        }

        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
        self.outbox.push_back(event);
    }

    /// Registers a listener for every event dispatched from now on.
    pub fn subscribe(&mut self, listener: impl EditorListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Takes every event dispatched since the last drain.
    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.outbox.drain(..).collect()
    }

    /// Queues a redraw request. Consecutive duplicates are collapsed.
    pub fn request_render(&mut self, request: RenderRequest) {
        if self.render_queue.back() != Some(&request) {
            self.render_queue.push_back(request);
        }
    }

    /// Takes every pending redraw request.
    pub fn drain_render_requests(&mut self) -> Vec<RenderRequest> {
        self.render_queue.drain(..).collect()
    }

    /// Sets the bulk-load flag that suppresses unsaved-change tracking.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the graph changed since it was last loaded or saved.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn mark_touched(&mut self) {
        self.touched = true;
    }

    /// Records that the current graph has been persisted.
    pub fn mark_saved(&mut self) {
        self.touched = false;
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use float_cmp::assert_approx_eq;

    use super::*;
    use crate::graph::{ConnectionPatch, ConnectionSpec, NodeSpec};

    fn created(id: &str) -> EditorEvent {
        EditorEvent::NodeCreated { id: id.into() }
    }

    #[test]
    fn test_structural_events_touch() {
        let mut pipeline = EventPipeline::new();
        let mut exclusions = ExclusionSet::new();

        pipeline.dispatch(EditorEvent::PointerDown, &mut exclusions);
        assert!(!pipeline.is_touched());

        pipeline.dispatch(created("a"), &mut exclusions);
        assert!(pipeline.is_touched());

        pipeline.mark_saved();
        assert!(!pipeline.is_touched());
    }

    #[test]
    fn test_loading_suppresses_touch() {
        let mut pipeline = EventPipeline::new();
        let mut exclusions = ExclusionSet::new();

        pipeline.set_loading(true);
        pipeline.dispatch(created("a"), &mut exclusions);
        pipeline.dispatch(
            EditorEvent::ConnectionCreated {
                id: "c".into(),
                source: "a".into(),
                target: "a".into(),
            },
            &mut exclusions,
        );
        assert!(!pipeline.is_touched());

        pipeline.set_loading(false);
        pipeline.dispatch(EditorEvent::NodeUpdated { id: "a".into() }, &mut exclusions);
        assert!(pipeline.is_touched());
    }

    #[test]
    fn test_connection_removed_prunes_before_listeners() {
        let mut pipeline = EventPipeline::new();
        let mut exclusions = ExclusionSet::new();
        exclusions.insert("c1".into(), "a".into(), "b".into());
        exclusions.insert("c2".into(), "b".into(), "a".into());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        pipeline.subscribe(move |event: &EditorEvent| sink.borrow_mut().push(event.clone()));

        pipeline.dispatch(
            EditorEvent::ConnectionRemoved {
                id: "c1".into(),
                source: "a".into(),
                target: "b".into(),
            },
            &mut exclusions,
        );

        assert_eq!(exclusions.len(), 1);
        assert!(exclusions.contains(&"c2".into()));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_cleared_resets_exclusions_and_selection() {
        let mut pipeline = EventPipeline::new();
        let mut exclusions = ExclusionSet::new();
        exclusions.insert("c1".into(), "a".into(), "b".into());

        pipeline.dispatch(
            EditorEvent::NodeSelected {
                id: "a".into(),
                accumulate: false,
            },
            &mut exclusions,
        );
        pipeline.dispatch(EditorEvent::Cleared, &mut exclusions);

        assert!(exclusions.is_empty());
        assert!(pipeline.selection().is_empty());
    }

    #[test]
    fn test_selection_rules() {
        let mut pipeline = EventPipeline::new();
        let mut exclusions = ExclusionSet::new();
        let select = |id: &str, accumulate| EditorEvent::NodeSelected {
            id: id.into(),
            accumulate,
        };

        pipeline.dispatch(select("a", false), &mut exclusions);
        pipeline.dispatch(select("b", true), &mut exclusions);
        pipeline.dispatch(select("b", true), &mut exclusions);
        assert_eq!(
            pipeline.selection().nodes(),
            [NodeId::from("a"), NodeId::from("b")]
        );

        pipeline.dispatch(select("c", false), &mut exclusions);
        assert_eq!(pipeline.selection().nodes(), [NodeId::from("c")]);

        pipeline.dispatch(
            EditorEvent::ConnectionSelected {
                id: "x".into(),
                max_weight: 0.5,
            },
            &mut exclusions,
        );
        assert!(pipeline.selection().nodes().is_empty());
        assert_eq!(pipeline.selection().max_weight(), Some(0.5));

        pipeline.dispatch(EditorEvent::PointerDown, &mut exclusions);
        assert!(pipeline.selection().is_empty());
    }

    #[test]
    fn test_removed_items_leave_selection() {
        let mut pipeline = EventPipeline::new();
        let mut exclusions = ExclusionSet::new();
        pipeline.dispatch(
            EditorEvent::NodeSelected {
                id: "a".into(),
                accumulate: false,
            },
            &mut exclusions,
        );
        pipeline.dispatch(EditorEvent::NodeRemoved { id: "a".into() }, &mut exclusions);
        assert!(pipeline.selection().nodes().is_empty());
    }

    #[test]
    fn test_outbox_preserves_order() {
        let mut pipeline = EventPipeline::new();
        let mut exclusions = ExclusionSet::new();
        pipeline.dispatch(created("a"), &mut exclusions);
        pipeline.dispatch(created("b"), &mut exclusions);
        pipeline.dispatch(EditorEvent::Cleared, &mut exclusions);

        assert_eq!(
            pipeline.drain_events(),
            vec![created("a"), created("b"), EditorEvent::Cleared]
        );
        assert!(pipeline.drain_events().is_empty());
    }

    #[test]
    fn test_render_queue_collapses_repeats() {
        let mut pipeline = EventPipeline::new();
        pipeline.request_render(RenderRequest::Node("a".into()));
        pipeline.request_render(RenderRequest::Node("a".into()));
        pipeline.request_render(RenderRequest::Connection("c".into()));
        pipeline.request_render(RenderRequest::Node("a".into()));

        assert_eq!(pipeline.drain_render_requests().len(), 3);
        assert!(pipeline.drain_render_requests().is_empty());
    }

    #[test]
    fn test_max_assignable_weight() {
        let mut model = GraphModel::new(false);
        for id in ["A", "B", "C", "D"] {
            model.add_node(NodeSpec::new(id).with_id(id)).unwrap();
        }
        model
            .add_connection(ConnectionSpec::new("ab", "A", "B").with_weight(0.3))
            .unwrap();
        model
            .add_connection(ConnectionSpec::new("ac", "A", "C").with_weight(0.5))
            .unwrap();
        model
            .add_connection(ConnectionSpec::new("ad", "A", "D"))
            .unwrap();

        let max = max_assignable_weight(&model, &"ad".into()).unwrap();
        assert_approx_eq!(f32, max, 0.2, epsilon = 0.00001);

        model.update_connection(
            &"ab".into(),
            ConnectionPatch {
                weight: Some(0.9),
                ..ConnectionPatch::default()
            },
        );
        assert_approx_eq!(f32, max_assignable_weight(&model, &"ad".into()).unwrap(), 0.0);
        assert!(max_assignable_weight(&model, &"missing".into()).is_none());
    }
}
