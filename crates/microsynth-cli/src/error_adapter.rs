//! Error adapter for converting MicrosynthError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI.
//!
//! A malformed snapshot is rendered with the offending JSON source and a
//! label at the line and column reported by the JSON parser. Every other
//! error is rendered as a plain message with an error code.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use microsynth::MicrosynthError;

/// Adapter for a snapshot that failed to parse.
pub struct SnapshotAdapter<'a> {
    err: &'a serde_json::Error,
    src: &'a str,
}

impl<'a> SnapshotAdapter<'a> {
    /// Create a new snapshot adapter.
    pub fn new(err: &'a serde_json::Error, src: &'a str) -> Self {
        Self { err, src }
    }

    /// Byte span of the parser position in the source.
    fn span(&self) -> SourceSpan {
        let offset = line_column_to_offset(self.src, self.err.line(), self.err.column());
        let len = usize::from(offset < self.src.len());
        SourceSpan::new(offset.into(), len)
    }
}

impl fmt::Debug for SnapshotAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotAdapter")
            .field("err", &self.err)
            .finish()
    }
}

impl fmt::Display for SnapshotAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed snapshot")
    }
}

impl std::error::Error for SnapshotAdapter<'_> {}

impl MietteDiagnostic for SnapshotAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("microsynth::snapshot"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(
            "a snapshot is a JSON object with `nodes`, `connections` and an optional `viewport`",
        ))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new_primary_with_span(Some(self.err.to_string()), self.span());
        Some(Box::new(std::iter::once(label)))
    }
}

/// Adapter for [`MicrosynthError`] variants without source information.
pub struct ErrorAdapter<'a>(pub &'a MicrosynthError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0)
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            MicrosynthError::Io(_) => "microsynth::io",
            MicrosynthError::Snapshot { .. } => "microsynth::snapshot",
            MicrosynthError::InvalidSnapshot(_) => "microsynth::invalid_snapshot",
            MicrosynthError::Layout(_) => "microsynth::layout",
            MicrosynthError::LoadInProgress => "microsynth::load",
            MicrosynthError::Generation(_) => "microsynth::generation",
            MicrosynthError::Config(_) => "microsynth::config",
        };
        Some(Box::new(code))
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A malformed snapshot with its source.
    Snapshot(SnapshotAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Snapshot(s) => fmt::Display::fmt(s, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Snapshot(_) => None,
            Reportable::Error(e) => std::error::Error::source(e),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Snapshot(s) => s.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Snapshot(s) => s.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Snapshot(s) => s.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Snapshot(s) => s.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

/// Byte offset of a 1-based line and column, clamped to the source length.
///
/// serde_json reports column 0 for errors at the start of a line.
fn line_column_to_offset(src: &str, line: usize, column: usize) -> usize {
    let line_start: usize = src
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(src.len())
}

/// Convert a [`MicrosynthError`] into a list of reportable errors.
pub fn to_reportables(err: &MicrosynthError) -> Vec<Reportable<'_>> {
    match err {
        MicrosynthError::Snapshot { err, src } => {
            vec![Reportable::Snapshot(SnapshotAdapter::new(err, src))]
        }
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

#[cfg(test)]
mod tests {
    use microsynth::snapshot::DiagramSnapshot;

    use super::*;

    #[test]
    fn test_line_column_to_offset() {
        let src = "ab\ncde\nf";
        assert_eq!(line_column_to_offset(src, 1, 1), 0);
        assert_eq!(line_column_to_offset(src, 2, 2), 4);
        assert_eq!(line_column_to_offset(src, 3, 1), 7);
        assert_eq!(line_column_to_offset(src, 9, 9), src.len());
    }

    #[test]
    fn test_snapshot_error_points_at_source() {
        let src = "{\n  \"nodes\": [\n    { \"id\": 7 }\n  ]\n}";
        let err = DiagramSnapshot::from_json(src).unwrap_err();

        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 1);
        match &reportables[0] {
            Reportable::Snapshot(s) => {
                let labels: Vec<_> = s.labels().unwrap().collect();
                assert_eq!(labels.len(), 1);
                assert!(labels[0].primary());
                // The label sits on the third line
                assert!(labels[0].offset() >= src.find("{ \"id\"").unwrap());
            }
            Reportable::Error(_) => panic!("Expected Snapshot"),
        }
    }

    #[test]
    fn test_non_snapshot_error() {
        let err = MicrosynthError::Generation("bad density".to_string());

        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 1);
        match &reportables[0] {
            Reportable::Error(e) => {
                assert_eq!(e.to_string(), "Generation error: bad density");
                assert_eq!(e.code().unwrap().to_string(), "microsynth::generation");
            }
            Reportable::Snapshot(_) => panic!("Expected Error"),
        }
    }
}
