//! Random architecture generation.
//!
//! Produces a [`DiagramSnapshot`] of `nodes` services wired into a directed
//! acyclic graph. Edges only run from an earlier service to a later one, and
//! never into one of the chosen roots, so the roots are the entry points of
//! the generated system. Every connection is bound to the single endpoint
//! its target exposes.
//!
//! The snapshot has every node at the origin; loading it in
//! [`LoadMode::Generate`](crate::layout::LoadMode::Generate) arranges it.

use indexmap::IndexMap;
use log::{debug, info};
use rand::{
    Rng, SeedableRng,
    rngs::StdRng,
    seq::{IndexedRandom, SliceRandom, index},
};
use serde_json::{Value, json};

use microsynth_core::{
    geometry::Point,
    identifier::{ConnectionId, NodeId},
    payload::{
        ApiCall, ApiResponse, ConnectionPayload, Endpoint, LANGUAGES, NodePayload, Parameter,
        ParameterType, ParameterValue,
    },
    shape::Shape,
};

use crate::{
    error::MicrosynthError,
    snapshot::{ConnectionRecord, DiagramSnapshot, NodeRecord, Viewport},
};

/// Smallest weight a connection gets when outgoing weights are normalised.
const MIN_NORMALIZED_WEIGHT: f64 = 0.1;

/// Methods a generated endpoint may use.
const GENERATED_METHODS: [&str; 2] = ["GET", "POST"];

/// Shape of the diagram to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Number of services, at least 1.
    pub nodes: usize,
    /// Number of services that never receive a connection.
    pub roots: usize,
    /// Fraction of the possible forward edges to create, in `[0, 1]`.
    pub density: f64,
    /// Languages to pick service implementations from.
    pub languages: Vec<String>,
    /// Make the weights leaving each service sum to 1.
    pub normalize_outgoing: bool,
    /// Seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            nodes: 5,
            roots: 1,
            density: 0.5,
            languages: LANGUAGES.iter().map(|l| l.to_string()).collect(),
            normalize_outgoing: false,
            seed: None,
        }
    }
}

impl GenerationParams {
    /// Checks the parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`MicrosynthError::Generation`] naming the offending
    /// parameter.
    pub fn validate(&self) -> Result<(), MicrosynthError> {
        if self.nodes == 0 {
            return Err(MicrosynthError::Generation(
                "number of nodes must be at least 1".to_string(),
            ));
        }
        if self.roots > self.nodes {
            return Err(MicrosynthError::Generation(format!(
                "number of roots ({}) cannot be greater than number of nodes ({})",
                self.roots, self.nodes
            )));
        }
        if !(0.0..=1.0).contains(&self.density) {
            return Err(MicrosynthError::Generation(format!(
                "density must be within [0, 1], got {}",
                self.density
            )));
        }
        if self.languages.is_empty() {
            return Err(MicrosynthError::Generation(
                "at least one language is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generates a diagram, seeded from `params.seed` when present.
pub fn generate(params: &GenerationParams) -> Result<DiagramSnapshot, MicrosynthError> {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    generate_with_rng(params, &mut rng)
}

/// Generates a diagram drawing every random choice from `rng`.
pub fn generate_with_rng<R: Rng>(
    params: &GenerationParams,
    rng: &mut R,
) -> Result<DiagramSnapshot, MicrosynthError> {
    params.validate()?;
    let n = params.nodes;

    let mut nodes: Vec<NodeRecord> = (1..=n)
        .map(|i| generate_node(i, &params.languages, rng))
        .collect::<Result<_, _>>()?;

    let roots: Vec<usize> = index::sample(rng, n, params.roots).into_vec();
    let mut candidates: Vec<(usize, usize)> = (0..n)
        .flat_map(|from| (from + 1..n).map(move |to| (from, to)))
        .filter(|(_, to)| !roots.contains(to))
        .collect();

    let max_connections = candidates.len();
    let target_connections =
        ((params.density * max_connections as f64).round() as usize).min(max_connections);
    candidates.shuffle(rng);
    candidates.truncate(target_connections);

    debug!(
        nodes = n,
        roots = params.roots,
        max_connections = max_connections,
        connections = target_connections;
        "Generating diagram"
    );

    let mut by_source: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for (from, to) in candidates {
        by_source.entry(from).or_default().push(to);
    }

    let mut connections = Vec::with_capacity(target_connections);
    for (from, targets) in by_source {
        let weights = if params.normalize_outgoing {
            normalized_weights(targets.len(), rng)
        } else {
            (0..targets.len()).map(|_| free_weight(rng)).collect()
        };

        for (to, weight) in targets.into_iter().zip(weights) {
            let payload = generate_connection_payload(&nodes[to].payload, rng);
            nodes[to].payload.initiator = false;

            let label = payload
                .api_call
                .as_ref()
                .map(|call| format!("{}_{}", call.method, call.path.replace('/', "")))
                .unwrap_or_default();

            connections.push(ConnectionRecord {
                id: ConnectionId::new(random_uid(rng)),
                source: nodes[from].id.clone(),
                target: nodes[to].id.clone(),
                is_loop: false,
                weight: weight as f32,
                label,
                payload,
            });
        }
    }

    info!(
        nodes = nodes.len(),
        connections = connections.len();
        "Diagram generated"
    );

    Ok(DiagramSnapshot {
        nodes,
        connections,
        viewport: Some(Viewport::default()),
    })
}

fn generate_node<R: Rng>(
    index: usize,
    languages: &[String],
    rng: &mut R,
) -> Result<NodeRecord, MicrosynthError> {
    let language = languages
        .choose(rng)
        .ok_or_else(|| MicrosynthError::Generation("no language to choose from".to_string()))?;
    let method = GENERATED_METHODS.choose(rng).copied().unwrap_or("GET");

    let endpoint = Endpoint {
        path: format!("/path-{index}"),
        method: method.to_string(),
        parameters: vec![
            Parameter {
                name: "id".to_string(),
                kind: ParameterType::String,
                required: true,
                ..Parameter::default()
            },
            Parameter {
                name: "active".to_string(),
                kind: ParameterType::Boolean,
                required: false,
                ..Parameter::default()
            },
        ],
        responses: vec![ApiResponse {
            description: "Successful response".to_string(),
            content: json!({}),
            ..ApiResponse::default()
        }],
        ..Endpoint::default()
    };

    let payload = NodePayload {
        language: language.clone(),
        kind: Some("controller".to_string()),
        base_path: Some("/api".to_string()),
        description: Some(format!("Service s-{index}")),
        endpoints: vec![endpoint],
        initiator: true,
        ..NodePayload::default()
    };

    Ok(NodeRecord {
        id: NodeId::new(random_uid(rng)),
        label: format!("S {index}"),
        shape: Shape::Circle,
        payload,
        weight: 0.0,
        position: Point::default(),
    })
}

/// A call to a random endpoint of the target service, with random values
/// for its parameters.
fn generate_connection_payload<R: Rng>(target: &NodePayload, rng: &mut R) -> ConnectionPayload {
    let endpoint = target.endpoints.choose(rng).cloned();

    let (path, method, parameters) = match &endpoint {
        Some(endpoint) => (
            non_empty_or(&endpoint.path, "/path-x"),
            non_empty_or(&endpoint.method, "GET"),
            endpoint.parameters.clone(),
        ),
        None => ("/path-x".to_string(), "GET".to_string(), Vec::new()),
    };

    let parameter_values = parameters
        .iter()
        .map(|parameter| {
            ParameterValue::new(parameter.name.clone(), random_value(&parameter.kind, rng))
        })
        .collect();

    ConnectionPayload {
        api_call: Some(ApiCall {
            path,
            method,
            parameter_values,
            ..ApiCall::default()
        }),
        endpoint,
        ..ConnectionPayload::preset()
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn random_value<R: Rng>(kind: &ParameterType, rng: &mut R) -> Value {
    match kind {
        ParameterType::String => json!(format!("value_{}", rng.random_range(0..1000))),
        ParameterType::Integer => json!(rng.random_range(0..100)),
        ParameterType::Float => json!(rng.random::<f64>() * 100.0),
        ParameterType::Boolean => json!(rng.random_bool(0.5)),
        ParameterType::Array => json!(["a", "b", "c"]),
        ParameterType::Json => json!({
            "id": rng.random_range(0..1000),
            "active": rng.random_bool(0.5),
        }),
        ParameterType::Object => json!({ "key": format!("value_{}", rng.random_range(0..1000)) }),
        ParameterType::Other(_) => json!(format!("value_{}", rng.random_range(0..1000))),
    }
}

/// A weight in `[0.1, 1]` rounded to two decimals.
fn free_weight<R: Rng>(rng: &mut R) -> f64 {
    round2(MIN_NORMALIZED_WEIGHT + rng.random::<f64>() * 0.9)
}

/// `count` weights rounded to two decimals that sum to 1.
///
/// Each weight but the last leaves at least the minimum weight for every
/// connection still to come; the last takes what remains.
fn normalized_weights<R: Rng>(count: usize, rng: &mut R) -> Vec<f64> {
    let mut weights = Vec::with_capacity(count);
    let mut remaining = 1.0;
    for i in 0..count {
        let left = count - i;
        let weight = if left == 1 {
            round2(remaining)
        } else {
            let max = remaining - MIN_NORMALIZED_WEIGHT * (left - 1) as f64;
            round2(MIN_NORMALIZED_WEIGHT + rng.random::<f64>() * (max - MIN_NORMALIZED_WEIGHT))
        };
        remaining -= weight;
        weights.push(weight);
    }
    weights
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn random_uid<R: Rng>(rng: &mut R) -> String {
    format!("{:016x}", rng.random::<u64>())
}
