//! Pipeline settings: simulation id, executable lookup and MPI launch.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};
use crate::tool::SimulationId;

/// Codename of the summary reporter.
pub const DEFAULT_REPORTER: &str = "paraprobe-autoreporter";

/// Settings shared by every job of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Simulation id used in every artifact name.
    pub sim_id: SimulationId,

    /// Directories searched for the paraprobe executables before `PATH`.
    pub resource_paths: Vec<PathBuf>,

    /// MPI ranks for the parallel tools; `None` runs them directly.
    pub mpi_ranks: Option<u32>,

    /// MPI launcher used when `mpi_ranks` is set.
    pub mpi_launcher: String,

    /// Executable producing the ranging and nanochem summaries.
    pub reporter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sim_id: std::env::var("PARAPROBE_SIM_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(SimulationId)
                .unwrap_or_default(),
            resource_paths: std::env::var_os("PARAPROBE_RESOURCE_PATHS")
                .map(|v| std::env::split_paths(&v).collect())
                .unwrap_or_default(),
            mpi_ranks: std::env::var("PARAPROBE_MPI_RANKS")
                .ok()
                .and_then(|v| v.parse().ok()),
            mpi_launcher: std::env::var("PARAPROBE_MPI_LAUNCHER")
                .unwrap_or_else(|_| "mpiexec".to_string()),
            reporter: DEFAULT_REPORTER.to_string(),
        }
    }
}

impl Settings {
    /// Settings from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file. Missing keys fall back to the environment defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                JobError::FileNotFound(path.to_path_buf())
            } else {
                JobError::Io(e)
            }
        })?;
        let settings: Settings = toml::from_str(&text)
            .map_err(|e| JobError::Settings(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_sim_id(mut self, sim_id: SimulationId) -> Self {
        self.sim_id = sim_id;
        self
    }

    pub fn with_resource_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.resource_paths.push(path.into());
        self
    }

    pub fn with_mpi_ranks(mut self, ranks: u32) -> Self {
        self.mpi_ranks = Some(ranks);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.mpi_ranks == Some(0) {
            return Err(JobError::Settings("mpi_ranks must be at least 1".to_string()));
        }
        if self.mpi_ranks.is_some() && self.mpi_launcher.trim().is_empty() {
            return Err(JobError::Settings(
                "mpi_launcher must be set when mpi_ranks is".to_string(),
            ));
        }
        if self.reporter.trim().is_empty() {
            return Err(JobError::Settings("reporter must not be empty".to_string()));
        }
        Ok(())
    }
}
