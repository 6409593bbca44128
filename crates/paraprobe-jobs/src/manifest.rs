//! Artifact manifests handed from one stage to the next.
//!
//! A collected job describes the files it produced in an [`ArtifactManifest`].
//! Downstream jobs copy what they need out of the manifest instead of reaching
//! into another job's working directory. Every artifact carries the SHA-256
//! digest taken at collection time so copies can be verified.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{JobError, Result};
use crate::tool::{SimulationId, Stage, Tool};

/// What an artifact is to the tool that produced it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Config,
    Results,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Config => f.write_str("config"),
            ArtifactKind::Results => f.write_str("results"),
        }
    }
}

impl ArtifactKind {
    /// File name the tool gives this artifact for `sim_id`.
    pub fn file_name(&self, tool: Tool, sim_id: SimulationId) -> String {
        match self {
            ArtifactKind::Config => tool.config_file_name(sim_id),
            ArtifactKind::Results => tool.results_file_name(sim_id),
        }
    }
}

/// A single file produced by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub tool: Tool,
    pub kind: ArtifactKind,
    /// Absolute path inside the producing job's working directory.
    pub path: PathBuf,
    /// SHA-256 hex digest of the file contents.
    pub digest: String,
}

impl Artifact {
    /// Describe an existing file, hashing its contents.
    pub fn from_file(tool: Tool, kind: ArtifactKind, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let digest = file_digest(&path)?;
        Ok(Self {
            tool,
            kind,
            path,
            digest,
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Files produced by one collected stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub stage: Stage,
    pub sim_id: SimulationId,
    pub working_directory: PathBuf,
    pub artifacts: Vec<Artifact>,
}

impl ArtifactManifest {
    pub fn new(stage: Stage, sim_id: SimulationId, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            sim_id,
            working_directory: working_directory.into(),
            artifacts: Vec::new(),
        }
    }

    /// Add `<working_directory>/<file_name>` to the manifest.
    pub fn with_file(mut self, tool: Tool, kind: ArtifactKind, file_name: &str) -> Result<Self> {
        let path = self.working_directory.join(file_name);
        self.artifacts.push(Artifact::from_file(tool, kind, path)?);
        Ok(self)
    }

    /// Add the conventionally named `tool` artifact of this simulation.
    pub fn with_artifact(self, tool: Tool, kind: ArtifactKind) -> Result<Self> {
        let file_name = kind.file_name(tool, self.sim_id);
        self.with_file(tool, kind, &file_name)
    }

    pub fn get(&self, tool: Tool, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.tool == tool && a.kind == kind)
    }

    pub fn require(&self, tool: Tool, kind: ArtifactKind) -> Result<&Artifact> {
        self.get(tool, kind).ok_or(JobError::MissingArtifact {
            stage: self.stage,
            tool,
            kind,
        })
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Streaming SHA-256 of a file, hex encoded.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            JobError::FileNotFound(path.to_path_buf())
        } else {
            JobError::Io(e)
        }
    })?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Check that the file at `path` still hashes to the artifact's digest.
pub fn verify_copy(artifact: &Artifact, path: &Path) -> Result<()> {
    let actual = file_digest(path)?;
    if actual != artifact.digest {
        return Err(JobError::DigestMismatch {
            path: path.to_path_buf(),
            expected: artifact.digest.clone(),
            actual,
        });
    }
    Ok(())
}
