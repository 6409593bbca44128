//! Tool and stage definitions for the paraprobe tool chain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Simulation id shared by every artifact of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(pub u64);

impl SimulationId {
    pub const DEFAULT: SimulationId = SimulationId(636502001);
}

impl Default for SimulationId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External paraprobe executables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Converts the reconstruction and ranging definitions to the tool-chain format.
    Transcoder,

    /// Assigns ion identities from mass-to-charge data.
    Ranger,

    /// Reconstructs the edge model of the point cloud.
    Surfacer,

    /// Computes ion to edge-model distances.
    Distancer,

    /// Tessellates the full volume.
    Tessellator,

    /// Delocalization and isosurface extraction.
    Nanochem,
}

impl Tool {
    /// Lowercase name used in log keys and log file names.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Transcoder => "transcoder",
            Tool::Ranger => "ranger",
            Tool::Surfacer => "surfacer",
            Tool::Distancer => "distancer",
            Tool::Tessellator => "tessellator",
            Tool::Nanochem => "nanochem",
        }
    }

    /// Capitalised name used in artifact file names.
    pub fn title(&self) -> &'static str {
        match self {
            Tool::Transcoder => "Transcoder",
            Tool::Ranger => "Ranger",
            Tool::Surfacer => "Surfacer",
            Tool::Distancer => "Distancer",
            Tool::Tessellator => "Tessellator",
            Tool::Nanochem => "Nanochem",
        }
    }

    /// Executable name resolved on the resource paths.
    pub fn codename(&self) -> &'static str {
        match self {
            Tool::Transcoder => "paraprobe-transcoder",
            Tool::Ranger => "paraprobe-ranger",
            Tool::Surfacer => "paraprobe-surfacer",
            Tool::Distancer => "paraprobe-distancer",
            Tool::Tessellator => "paraprobe-tessellator",
            Tool::Nanochem => "paraprobe-nanochem",
        }
    }

    /// Whether the executable is an MPI program.
    pub fn is_parallel(&self) -> bool {
        !matches!(self, Tool::Transcoder)
    }

    pub fn from_codename(codename: &str) -> Option<Tool> {
        Tool::all().into_iter().find(|t| t.codename() == codename)
    }

    pub fn all() -> [Tool; 6] {
        [
            Tool::Transcoder,
            Tool::Ranger,
            Tool::Surfacer,
            Tool::Distancer,
            Tool::Tessellator,
            Tool::Nanochem,
        ]
    }

    /// `PARAPROBE.<Tool>.Config.SimID.<id>.json`
    pub fn config_file_name(&self, sim_id: SimulationId) -> String {
        format!("PARAPROBE.{}.Config.SimID.{}.json", self.title(), sim_id)
    }

    /// `PARAPROBE.<Tool>.Results.SimID.<id>.h5`
    pub fn results_file_name(&self, sim_id: SimulationId) -> String {
        format!("PARAPROBE.{}.Results.SimID.{}.h5", self.title(), sim_id)
    }

    /// Log the configuration step writes into the working directory.
    pub fn config_log_name(&self) -> String {
        format!("config_{}.log", self.name())
    }

    /// Log the reporter writes when results are collected.
    pub fn result_log_name(&self) -> String {
        format!("result_{}.log", self.name())
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Analysis stages a top-level job can enable, in dependency order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ranger,
    Surfacer,
    Distancer,
    Tessellator,
    Nanochem,
}

impl Stage {
    pub fn all() -> [Stage; 5] {
        [
            Stage::Ranger,
            Stage::Surfacer,
            Stage::Distancer,
            Stage::Tessellator,
            Stage::Nanochem,
        ]
    }

    pub fn name(&self) -> &'static str {
        self.tool().name()
    }

    /// The executable that runs this stage.
    pub fn tool(&self) -> Tool {
        match self {
            Stage::Ranger => Tool::Ranger,
            Stage::Surfacer => Tool::Surfacer,
            Stage::Distancer => Tool::Distancer,
            Stage::Tessellator => Tool::Tessellator,
            Stage::Nanochem => Tool::Nanochem,
        }
    }

    /// Stages that must run before this one.
    ///
    /// The distancer consumes the surfacer's edge model, so everything
    /// downstream of it needs the surfacer as well.
    pub fn prerequisites(&self) -> &'static [Stage] {
        match self {
            Stage::Ranger => &[],
            Stage::Surfacer => &[Stage::Ranger],
            Stage::Distancer => &[Stage::Ranger, Stage::Surfacer],
            Stage::Tessellator => &[Stage::Ranger, Stage::Surfacer, Stage::Distancer],
            Stage::Nanochem => &[Stage::Ranger, Stage::Surfacer, Stage::Distancer],
        }
    }

    /// Tools whose logs a job of this stage records.
    pub fn tools(&self) -> &'static [Tool] {
        match self {
            Stage::Ranger => &[Tool::Transcoder, Tool::Ranger],
            Stage::Surfacer => &[Tool::Surfacer],
            Stage::Distancer => &[Tool::Distancer],
            Stage::Tessellator => &[Tool::Tessellator],
            Stage::Nanochem => &[Tool::Nanochem],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::all()
            .into_iter()
            .find(|stage| stage.name() == s.trim().to_lowercase())
            .ok_or_else(|| JobError::Settings(format!("unknown analysis stage: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_file_names() {
        let sim = SimulationId(636502001);
        assert_eq!(
            Tool::Ranger.results_file_name(sim),
            "PARAPROBE.Ranger.Results.SimID.636502001.h5"
        );
        assert_eq!(
            Tool::Transcoder.config_file_name(sim),
            "PARAPROBE.Transcoder.Config.SimID.636502001.json"
        );
    }

    #[test]
    fn test_log_names() {
        assert_eq!(Tool::Surfacer.config_log_name(), "config_surfacer.log");
        assert_eq!(Tool::Ranger.result_log_name(), "result_ranger.log");
    }

    #[test]
    fn test_codename_roundtrip() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_codename(tool.codename()), Some(tool));
        }
        assert_eq!(Tool::from_codename("paraprobe-autoreporter"), None);
    }

    #[test]
    fn test_transcoder_is_serial() {
        assert!(!Tool::Transcoder.is_parallel());
        assert!(Tool::Tessellator.is_parallel());
    }

    #[test]
    fn test_prerequisites_precede_stage() {
        for stage in Stage::all() {
            for pre in stage.prerequisites() {
                assert!(pre < &stage, "{pre} must come before {stage}");
            }
        }
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("Nanochem".parse::<Stage>().unwrap(), Stage::Nanochem);
        assert!("voronoi".parse::<Stage>().is_err());
    }
}
