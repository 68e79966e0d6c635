use std::collections::HashMap;

use log::debug;
use rust_sugiyama::configure::Config;

use microsynth_core::{geometry::Point, identifier::NodeId};

use super::{LayoutEngine, LayoutError, LayoutGraph, LayoutOptions};

/// Layered layout through the `rust-sugiyama` crate.
///
/// Layers run left to right, sources first. Every connected component is
/// laid out on its own and the components are stacked top to bottom;
/// nodes without edges go on a final row. Self-loops and repeated edges
/// do not influence the layering.
#[derive(Debug, Clone, Copy, Default)]
pub struct SugiyamaEngine;

impl SugiyamaEngine {
    pub fn new() -> Self {
        Self
    }
}

impl LayoutEngine for SugiyamaEngine {
    fn arrange(
        &self,
        graph: &LayoutGraph,
        options: &LayoutOptions,
    ) -> Result<HashMap<NodeId, Point>, LayoutError> {
        let nodes = graph.nodes();
        let linked: Vec<(&NodeId, &NodeId)> = graph
            .edges()
            .filter(|(source, target)| source != target)
            .collect();

        // rust-sugiyama works on sequential u32 vertex ids; only nodes with
        // an edge get one so that every vertex is part of an edge
        let vertices: Vec<&NodeId> = nodes
            .iter()
            .filter(|id| linked.iter().any(|(s, t)| s == id || t == id))
            .collect();
        let indices: HashMap<&NodeId, u32> = vertices
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i as u32))
            .collect();

        let mut edges: Vec<(u32, u32)> = Vec::new();
        for (source, target) in linked {
            let (Some(&source), Some(&target)) = (indices.get(source), indices.get(target)) else {
                continue;
            };
            if !edges.contains(&(source, target)) {
                edges.push((source, target));
            }
        }

        let mut positions = HashMap::new();
        let mut offset_y = 0.0f32;

        if !edges.is_empty() {
            debug!(
                nodes = nodes.len(),
                edges = edges.len();
                "Applying Sugiyama algorithm"
            );
            for coords in run_sugiyama(edges.clone())? {
                let placed = place_component(&coords, &edges, options);
                let height = placed.iter().map(|(_, p)| p.y()).fold(0.0f32, f32::max);

                for (index, point) in placed {
                    if let Some(&id) = vertices.get(index) {
                        positions.insert(id.clone(), point.add_point(Point::new(0.0, offset_y)));
                    } else {
                        debug!(index = index; "Vertex from rust-sugiyama result is out of range");
                    }
                }
                offset_y += height + options.node_spacing();
            }
        }

        let isolated: Vec<&NodeId> = nodes
            .iter()
            .filter(|id| !positions.contains_key(*id))
            .collect();
        for (i, id) in isolated.into_iter().enumerate() {
            let x = i as f32 * options.node_spacing();
            positions.insert(id.clone(), Point::new(x, offset_y));
        }

        debug!(positioned = positions.len(); "Sugiyama layout generated");
        Ok(positions)
    }
}

type Coordinates = Vec<(usize, (f64, f64))>;

/// Runs rust-sugiyama, turning a panic inside it into an error.
fn run_sugiyama(edges: Vec<(u32, u32)>) -> Result<Vec<Coordinates>, LayoutError> {
    let layouts = std::panic::catch_unwind(move || {
        let config = Config {
            minimum_length: 1,
            vertex_spacing: 1.0,
            ..Default::default()
        };
        rust_sugiyama::from_edges(&edges, &config)
    });

    match layouts {
        Ok(results) if !results.is_empty() => Ok(results
            .into_iter()
            .map(|(coords, _, _)| coords)
            .collect()),
        Ok(_) => Err(LayoutError::EmptyResult),
        Err(err) => {
            let message = err
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "unknown error".to_string());
            Err(LayoutError::EnginePanicked(message))
        }
    }
}

/// Converts one component's raw coordinates into spaced positions with the
/// top-left node centre at the origin.
///
/// rust-sugiyama stacks layers along its y axis; which way depends on the
/// version, so the direction is read off the edges and normalised so that
/// every edge points towards a later layer.
fn place_component(
    coords: &[(usize, (f64, f64))],
    edges: &[(u32, u32)],
    options: &LayoutOptions,
) -> Vec<(usize, Point)> {
    let raw: HashMap<usize, (f64, f64)> = coords.iter().copied().collect();

    let reversed = edges.iter().any(|&(source, target)| {
        match (raw.get(&(source as usize)), raw.get(&(target as usize))) {
            (Some(&(_, source_y)), Some(&(_, target_y))) => source_y > target_y,
            _ => false,
        }
    });
    let layer_of = |y: f64| if reversed { -y } else { y };

    let min_layer = raw.values().map(|&(_, y)| layer_of(y)).fold(f64::INFINITY, f64::min);
    let min_rank = raw.values().map(|&(x, _)| x).fold(f64::INFINITY, f64::min);

    coords
        .iter()
        .map(|&(index, (x, y))| {
            let layer = (layer_of(y) - min_layer) as f32;
            let rank = (x - min_rank) as f32;
            (
                index,
                Point::new(
                    layer * options.layer_spacing(),
                    rank * options.node_spacing(),
                ),
            )
        })
        .collect()
}
