//! Error taxonomy for paraprobe jobs.

use std::path::PathBuf;

use crate::job::JobStatus;
use crate::manifest::ArtifactKind;
use crate::summary::SummaryError;
use crate::tool::{Stage, Tool};

/// Errors produced while configuring, running or collecting a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("missing required input: {0} is not set")]
    MissingInput(&'static str),

    #[error("{stage} job needs a {required} job")]
    MissingPredecessor { stage: Stage, required: Stage },

    #[error("{stage} manifest has no {tool} {kind} artifact")]
    MissingArtifact {
        stage: Stage,
        tool: Tool,
        kind: ArtifactKind,
    },

    #[error("file {} not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("digest mismatch for {}: expected {expected}, got {actual}", .path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("job {job} is {actual:?}, expected {expected:?}")]
    InvalidState {
        job: String,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("{tool} exited with code {exit_code}, see {}", .log.display())]
    ToolFailed {
        tool: String,
        exit_code: i32,
        log: PathBuf,
    },

    #[error("ranging summary: {0}")]
    Summary(#[from] SummaryError),

    #[error("results error: {0}")]
    Results(String),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_names_the_field() {
        let err = JobError::MissingInput("pos_file");
        assert!(err.to_string().contains("pos_file"));
    }

    #[test]
    fn test_missing_predecessor_display() {
        let err = JobError::MissingPredecessor {
            stage: Stage::Distancer,
            required: Stage::Surfacer,
        };
        assert_eq!(err.to_string(), "distancer job needs a surfacer job");
    }

    #[test]
    fn test_tool_failed_mentions_log() {
        let err = JobError::ToolFailed {
            tool: "paraprobe-ranger".to_string(),
            exit_code: 3,
            log: PathBuf::from("/tmp/job/log.out"),
        };
        let msg = err.to_string();
        assert!(msg.contains("paraprobe-ranger"));
        assert!(msg.contains("code 3"));
        assert!(msg.contains("log.out"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = JobError::DigestMismatch {
            path: PathBuf::from("a.h5"),
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }
}
