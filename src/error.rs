//! Failures of the external collaborators that feed the aggregator.
//!
//! None of these abort a run. Each is rendered with `Display` into
//! `Summary.errors`, keyed by [`CollectError::collaborator`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The tool binary could not be started.
    #[error("{tool}: failed to spawn `{command}`: {source}")]
    Spawn {
        tool: &'static str,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but its stdout was not usable JSON.
    #[error("{tool}: exited with {status}: {reason}")]
    Output {
        tool: &'static str,
        status: String,
        reason: String,
    },

    /// A pre-fetched payload file could not be read or parsed.
    #[error("{tool}: cannot load {path}: {reason}")]
    PayloadFile {
        tool: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// The payload parsed as JSON but matched none of the known shapes.
    #[error("{tool}: unrecognized payload shape: {reason}")]
    Shape { tool: &'static str, reason: String },

    /// An in-process scan (e.g. source imports) failed as a whole.
    #[error("{tool}: {reason}")]
    Scan { tool: &'static str, reason: String },
}

impl CollectError {
    /// Name of the collaborator that failed, used as the summary error key.
    pub fn collaborator(&self) -> &'static str {
        match self {
            CollectError::Spawn { tool, .. }
            | CollectError::Output { tool, .. }
            | CollectError::PayloadFile { tool, .. }
            | CollectError::Shape { tool, .. }
            | CollectError::Scan { tool, .. } => *tool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_tool() {
        let err = CollectError::Shape {
            tool: "audit",
            reason: "expected object".to_string(),
        };
        assert_eq!(err.collaborator(), "audit");
        assert_eq!(
            err.to_string(),
            "audit: unrecognized payload shape: expected object"
        );
    }
}
