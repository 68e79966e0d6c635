//! CLI logic for the MicroSynth diagram tool.
//!
//! This module contains the core CLI logic: checking, arranging and
//! generating diagram snapshots.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command};

use std::{fmt, fs};

use log::info;

use microsynth::{
    DiagramEditor, MicrosynthError,
    config::EditorConfig,
    generator::GenerationParams,
    identifier::{ConnectionId, NodeId},
    layout::LoadMode,
    snapshot::DiagramSnapshot,
};

/// Findings of `microsynth check`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub nodes: usize,
    pub connections: usize,
    /// Connections dropped because an endpoint is missing.
    pub skipped: Vec<ConnectionId>,
    /// A directed cycle, as a node path.
    pub cycle: Option<Vec<NodeId>>,
    /// Whether the diagram could be exported for code generation.
    pub exportable: bool,
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes: {}", self.nodes)?;
        writeln!(f, "connections: {}", self.connections)?;
        for id in &self.skipped {
            writeln!(f, "skipped connection: {id}")?;
        }
        if let Some(cycle) = &self.cycle {
            let path: Vec<&str> = cycle.iter().map(NodeId::as_str).collect();
            writeln!(f, "cycle: {}", path.join(" -> "))?;
        }
        write!(f, "exportable: {}", self.exportable)
    }
}

/// Run the MicroSynth CLI application
///
/// # Errors
///
/// Returns `MicrosynthError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed or invalid snapshots
/// - Layout errors
/// - Invalid generation parameters
pub fn run(args: &Args) -> Result<(), MicrosynthError> {
    let config = config::load_config(args.config.as_ref())?;

    match &args.command {
        Command::Check { input } => {
            let report = check(input, config)?;
            println!("{report}");
        }
        Command::Arrange { input, output } => arrange(input, output, config)?,
        Command::Generate {
            nodes,
            roots,
            density,
            languages,
            seed,
            normalize,
            output,
        } => {
            let mut params = GenerationParams {
                nodes: *nodes,
                roots: *roots,
                density: *density,
                normalize_outgoing: *normalize,
                seed: *seed,
                ..GenerationParams::default()
            };
            if !languages.is_empty() {
                params.languages = languages.clone();
            }
            generate(&params, output, config)?;
        }
    }
    Ok(())
}

/// Loads a snapshot file and reports on it.
pub fn check(input: &str, config: EditorConfig) -> Result<CheckReport, MicrosynthError> {
    info!(input_path = input; "Checking diagram");

    let mut editor = DiagramEditor::new(config);
    let report = load_file(&mut editor, input)?;

    Ok(CheckReport {
        nodes: report.nodes,
        connections: report.connections,
        skipped: report.skipped,
        cycle: editor.find_cycle(),
        exportable: editor.can_export(),
    })
}

/// Loads a snapshot file, auto-arranges it and writes the result.
pub fn arrange(input: &str, output: &str, config: EditorConfig) -> Result<(), MicrosynthError> {
    info!(
        input_path = input,
        output_path = output;
        "Arranging diagram"
    );

    let mut editor = DiagramEditor::new(config);
    load_file(&mut editor, input)?;
    editor.reflow()?;
    editor.finish_reflow();

    fs::write(output, editor.export_json()?)?;
    info!(output_file = output; "Arranged diagram exported successfully");
    Ok(())
}

/// Generates an arranged random diagram and writes it.
pub fn generate(
    params: &GenerationParams,
    output: &str,
    config: EditorConfig,
) -> Result<(), MicrosynthError> {
    info!(
        nodes = params.nodes,
        roots = params.roots,
        density = params.density;
        "Generating diagram"
    );

    let mut editor = DiagramEditor::new(config);
    editor.load_generated(params)?;
    editor.finish_reflow();

    fs::write(output, editor.export_json()?)?;
    info!(output_file = output; "Generated diagram exported successfully");
    Ok(())
}

fn load_file(
    editor: &mut DiagramEditor,
    input: &str,
) -> Result<microsynth::LoadReport, MicrosynthError> {
    let source = fs::read_to_string(input)?;
    let snapshot = DiagramSnapshot::from_json(&source)?;
    editor.load_snapshot(snapshot, true, LoadMode::Init)
}
