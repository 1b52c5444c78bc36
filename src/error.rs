// Error taxonomy for the pipeline stages.
//
// Item-level failures (one seed query, one malformed record) are recovered
// locally and counted. These typed errors surface only when a stage cannot
// continue, and they travel inside `anyhow::Error` so the CLI can tell them
// apart with `downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A reference, embedding or fetch source is unreachable or rate-limited.
    #[error("{source_name} unavailable: {message}")]
    ExternalResource {
        source_name: String,
        message: String,
    },

    /// A document or term file failed schema validation.
    #[error("malformed input in {}: {message}", path.display())]
    MalformedInput { path: PathBuf, message: String },

    /// A stage's required input artifact does not exist.
    #[error(
        "required artifact not found: {}\nRun the upstream stage first to produce it.",
        path.display()
    )]
    MissingArtifact { path: PathBuf },

    /// I/O error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serde serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn external(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalResource {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the fatal "upstream stage never ran" case.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, Self::MissingArtifact { .. })
    }
}

/// Result type for pipeline operations that expose the typed taxonomy.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_message_names_path() {
        let err = PipelineError::MissingArtifact {
            path: PathBuf::from("data/expanded_terms.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("data/expanded_terms.json"), "got: {msg}");
        assert!(err.is_missing_artifact());
    }

    #[test]
    fn external_resource_message() {
        let err = PipelineError::external("Wikipedia", "connection refused");
        assert_eq!(err.to_string(), "Wikipedia unavailable: connection refused");
        assert!(!err.is_missing_artifact());
    }
}
