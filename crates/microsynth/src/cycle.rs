//! Cycle detection and the confirmation gate for new connections.
//!
//! A diagram is expected to be acyclic, but the user may knowingly close a
//! cycle. [`CycleGuard::admit`] checks a candidate connection against the
//! current edge set. When the candidate closes a cycle the guard hands back
//! a [`PendingConnection`] ticket instead of a verdict; the host asks the
//! user and settles the ticket with [`CycleGuard::resolve`]. An accepted
//! ticket lands in the [`ExclusionSet`] so the same connection is not
//! reported again.
//!
//! The check only runs when a connection is created interactively. Bulk
//! loads trust their source and bypass the guard.

use std::collections::HashMap;

use log::{debug, trace};
use petgraph::{
    graphmap::DiGraphMap,
    visit::{Control, DfsEvent, depth_first_search},
};

use microsynth_core::identifier::{ConnectionId, NodeId};

use crate::graph::{Connection, ConnectionSpec};

/// Finds a directed cycle in the graph formed by `nodes` and `edges`.
///
/// Runs a depth-first search from every node in the order given. The first
/// back edge `u → v` (an edge to a node still on the search stack) closes a
/// cycle; the returned path starts at `v` and ends at `u`. A self-loop is
/// reported as a single-node path.
///
/// # Examples
///
/// ```
/// # use microsynth::cycle::find_cycle;
/// # use microsynth_core::identifier::NodeId;
/// let nodes = ["a", "b", "c"].map(NodeId::from);
/// let edges = [("a", "b"), ("b", "c"), ("c", "a")];
/// let cycle = find_cycle(&nodes, edges).unwrap();
/// assert_eq!(cycle, ["a", "b", "c"].map(NodeId::from));
///
/// assert!(find_cycle(&nodes, [("a", "b"), ("b", "c")]).is_none());
/// ```
pub fn find_cycle<'a>(
    nodes: impl IntoIterator<Item = &'a NodeId>,
    edges: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Option<Vec<NodeId>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for node in nodes {
        graph.add_node(node.as_str());
    }
    for (source, target) in edges {
        graph.add_edge(source, target, ());
    }

    let mut parents: HashMap<&str, &str> = HashMap::new();
    let (tail, head) = depth_first_search(&graph, graph.nodes(), |event| match event {
        DfsEvent::TreeEdge(u, v) => {
            parents.insert(v, u);
            Control::Continue
        }
        DfsEvent::BackEdge(u, v) => Control::Break((u, v)),
        _ => Control::Continue,
    })
    .break_value()?;

    let mut path = vec![NodeId::from(tail)];
    let mut current = tail;
    while current != head {
        current = *parents.get(current)?;
        path.push(NodeId::from(current));
    }
    path.reverse();

    trace!(cycle:? = path; "Cycle found");
    Some(path)
}

/// A connection the user approved despite it closing a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedConnection {
    id: ConnectionId,
    source: NodeId,
    target: NodeId,
}

impl ExcludedConnection {
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

/// Connections exempted from cycle warnings.
///
/// Entries are matched by connection id when checking and by the
/// `(source, target)` pair when pruning after a removal.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: Vec<ExcludedConnection>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the connection with this id is exempted.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    /// Adds a connection. Inserting the same id twice keeps one entry.
    pub fn insert(&mut self, id: ConnectionId, source: NodeId, target: NodeId) {
        if self.contains(&id) {
            return;
        }
        self.entries.push(ExcludedConnection { id, source, target });
    }

    /// Removes every entry with this `(source, target)` pair.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, source: &NodeId, target: &NodeId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !(&entry.source == source && &entry.target == target));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExcludedConnection> {
        self.entries.iter()
    }
}

/// A connection waiting for the user to confirm that it may close a cycle.
///
/// Dropping the ticket without resolving it is the same as declining.
#[derive(Debug, Clone)]
#[must_use = "a pending connection must be resolved to be added"]
pub struct PendingConnection {
    spec: ConnectionSpec,
    cycle: Vec<NodeId>,
}

impl PendingConnection {
    /// The connection that would be created.
    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    /// The cycle the connection closes, as a node path.
    pub fn cycle(&self) -> &[NodeId] {
        &self.cycle
    }
}

/// Verdict of [`CycleGuard::admit`].
#[derive(Debug, Clone)]
pub enum Admission {
    /// No cycle: the connection may be created right away.
    Allowed(ConnectionSpec),
    /// The connection closes a cycle and needs confirmation.
    NeedsConfirmation(PendingConnection),
    /// Source and target are the same node while self-loops are disabled.
    SelfLoopDisabled,
}

/// Gate deciding whether a connection may be created.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleGuard {
    loop_connections_enabled: bool,
}

impl CycleGuard {
    pub fn new(loop_connections_enabled: bool) -> Self {
        Self {
            loop_connections_enabled,
        }
    }

    /// Checks `candidate` against the existing `connections`.
    ///
    /// Connections in `exclusions` are left out of the edge set, so a cycle
    /// the user already approved does not trigger another confirmation.
    pub fn admit<'a>(
        &self,
        candidate: ConnectionSpec,
        connections: impl IntoIterator<Item = &'a Connection>,
        exclusions: &ExclusionSet,
    ) -> Admission {
        if candidate.source() == candidate.target() && !self.loop_connections_enabled {
            debug!(node = candidate.source().as_str(); "Self connection declined, loops disabled");
            return Admission::SelfLoopDisabled;
        }

        let connections: Vec<&Connection> = connections
            .into_iter()
            .filter(|connection| !exclusions.contains(connection.id()))
            .collect();

        let mut nodes: Vec<&NodeId> = Vec::new();
        for connection in &connections {
            nodes.push(connection.source());
            nodes.push(connection.target());
        }
        nodes.push(candidate.source());
        nodes.push(candidate.target());

        let edges = connections
            .iter()
            .map(|connection| (connection.source().as_str(), connection.target().as_str()))
            .chain(std::iter::once((
                candidate.source().as_str(),
                candidate.target().as_str(),
            )));

        match find_cycle(nodes, edges) {
            None => Admission::Allowed(candidate),
            Some(cycle) => {
                debug!(
                    connection = candidate.id().as_str(),
                    cycle_len = cycle.len();
                    "Connection closes a cycle, confirmation required"
                );
                Admission::NeedsConfirmation(PendingConnection {
                    spec: candidate,
                    cycle,
                })
            }
        }
    }

    /// Settles a pending confirmation.
    ///
    /// On acceptance the connection is added to `exclusions` and its spec is
    /// returned for creation. On decline nothing changes and `None` is
    /// returned.
    pub fn resolve(
        &self,
        pending: PendingConnection,
        accepted: bool,
        exclusions: &mut ExclusionSet,
    ) -> Option<ConnectionSpec> {
        if !accepted {
            debug!(connection = pending.spec.id().as_str(); "Cycle confirmation declined");
            return None;
        }
        let spec = pending.spec;
        exclusions.insert(
            spec.id().clone(),
            spec.source().clone(),
            spec.target().clone(),
        );
        debug!(connection = spec.id().as_str(); "Cycle confirmation accepted");
        Some(spec)
    }
}
