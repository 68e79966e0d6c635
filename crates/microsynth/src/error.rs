//! Error types for MicroSynth operations.
//!
//! This module provides the main error type [`MicrosynthError`]. Declined
//! domain operations (a dangling connection, a rejected cycle, a reflow
//! while another is animating) are reported as values by the operations
//! themselves and never show up here.

use std::io;

use thiserror::Error;

use crate::layout::LayoutError;

/// The main error type for MicroSynth operations.
///
/// # Diagnostic Variants
///
/// The `Snapshot` variant keeps the JSON text that failed to parse so that
/// hosts can point at the offending line and column.
#[derive(Debug, Error)]
pub enum MicrosynthError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed snapshot: {err}")]
    Snapshot { err: serde_json::Error, src: String },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("A diagram load is already in progress")]
    LoadInProgress,

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MicrosynthError {
    /// Create a new `Snapshot` error with the associated JSON source.
    pub fn new_snapshot_error(err: serde_json::Error, src: impl Into<String>) -> Self {
        Self::Snapshot {
            err,
            src: src.into(),
        }
    }
}
