//! Configuration descriptors written for each paraprobe executable.
//!
//! Each configuration step serialises one [`ToolConfig`] to
//! `PARAPROBE.<Tool>.Config.SimID.<id>.json`; the executable receives the path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scoped::StepLog;
use crate::tool::{SimulationId, Tool};

/// Smallest distance to the edge model that still counts as inside.
pub const EDGE_THRESHOLD_EPSILON: f64 = 1.0e-6;

/// Simulation ids of the transcoded dataset and its ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangedDataset {
    pub transcoder_config_sim_id: SimulationId,
    pub transcoder_results_sim_id: SimulationId,
    pub ranger_results_sim_id: SimulationId,
}

impl RangedDataset {
    pub fn new(sim_id: SimulationId) -> Self {
        Self {
            transcoder_config_sim_id: sim_id,
            transcoder_results_sim_id: sim_id,
            ranger_results_sim_id: sim_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscoderConfig {
    pub sim_id: SimulationId,
    /// Reconstructed point cloud, relative to the working directory.
    pub reconstruction: String,
    /// Ranging definitions, relative to the working directory.
    pub ranging_definitions: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangingMethod {
    /// Apply the ranging definitions read by the transcoder.
    ApplyExistentRanging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangerConfig {
    pub method: RangingMethod,
    #[serde(flatten)]
    pub dataset: RangedDataset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeModelMethod {
    ConvexHull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfacerConfig {
    pub method: EdgeModelMethod,
    #[serde(flatten)]
    pub dataset: RangedDataset,
    pub surfacer_results_sim_id: SimulationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistancingMethod {
    IonToEdgeModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistancerConfig {
    pub method: DistancingMethod,
    #[serde(flatten)]
    pub dataset: RangedDataset,
    pub distancer_results_sim_id: SimulationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TessellationMethod {
    CompleteVoronoi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TessellatorConfig {
    pub method: TessellationMethod,
    #[serde(flatten)]
    pub dataset: RangedDataset,
    pub distancer_results_sim_id: SimulationId,
    pub tessellator_results_sim_id: SimulationId,
}

/// Triangulated edge model inside the surfacer results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeModelSource {
    pub file_name: PathBuf,
    pub vertices: String,
    pub facet_indices: String,
}

/// Ion to edge-model distances inside the distancer results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceSource {
    pub file_name: PathBuf,
    pub dataset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NanochemDataset {
    pub ranging_applied: bool,
    #[serde(flatten)]
    pub dataset: RangedDataset,
    pub edge_model: EdgeModelSource,
    pub ion_to_edge_distances: DistanceSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelocalizationReports {
    pub fields_and_gradients: bool,
    pub triangle_soup: bool,
    pub objects: bool,
    pub objects_properties: bool,
    pub objects_geometry: bool,
    pub objects_optimal_bounding_box: bool,
    pub objects_ions: bool,
    pub objects_edge_contact: bool,
    pub proxies: bool,
    pub proxies_properties: bool,
    pub proxies_geometry: bool,
    pub proxies_optimal_bounding_box: bool,
    pub proxies_ions: bool,
}

/// Kernel smoothing of the elemental composition and isosurface extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delocalization {
    pub input: String,
    pub normalization: String,
    pub elements: Vec<String>,
    /// Grid resolutions (nm).
    pub grid_resolutions: Vec<f64>,
    /// Gaussian kernel sigmas (nm).
    pub kernel_sigma: Vec<f64>,
    /// Kernel half-size in grid cells.
    pub kernel_size: u32,
    pub isosurface_phi: Vec<f64>,
    pub edge_handling: String,
    pub edge_threshold: f64,
    pub reports: DelocalizationReports,
}

impl Default for Delocalization {
    fn default() -> Self {
        Self {
            input: "default".to_string(),
            normalization: "composition".to_string(),
            elements: vec!["Y".to_string(), "Ti".to_string(), "O".to_string()],
            grid_resolutions: vec![1.0],
            kernel_sigma: vec![1.0],
            kernel_size: 3,
            isosurface_phi: linspace(0.01, 0.21, 21),
            edge_handling: "default".to_string(),
            edge_threshold: EDGE_THRESHOLD_EPSILON,
            reports: DelocalizationReports {
                fields_and_gradients: true,
                triangle_soup: true,
                objects: true,
                objects_properties: true,
                objects_geometry: true,
                objects_optimal_bounding_box: true,
                objects_ions: true,
                objects_edge_contact: true,
                proxies: false,
                proxies_properties: false,
                proxies_geometry: false,
                proxies_optimal_bounding_box: false,
                proxies_ions: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NanochemConfig {
    pub sim_id: SimulationId,
    pub dataset: NanochemDataset,
    pub tasks: Vec<Delocalization>,
}

/// Configuration of one executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolConfig {
    Transcoder(TranscoderConfig),
    Ranger(RangerConfig),
    Surfacer(SurfacerConfig),
    Distancer(DistancerConfig),
    Tessellator(TessellatorConfig),
    Nanochem(NanochemConfig),
}

impl ToolConfig {
    pub fn tool(&self) -> Tool {
        match self {
            ToolConfig::Transcoder(_) => Tool::Transcoder,
            ToolConfig::Ranger(_) => Tool::Ranger,
            ToolConfig::Surfacer(_) => Tool::Surfacer,
            ToolConfig::Distancer(_) => Tool::Distancer,
            ToolConfig::Tessellator(_) => Tool::Tessellator,
            ToolConfig::Nanochem(_) => Tool::Nanochem,
        }
    }

    /// Serialise to `<dir>/PARAPROBE.<Tool>.Config.SimID.<id>.json` and note it in `log`.
    pub fn write(&self, dir: &Path, sim_id: SimulationId, log: &mut StepLog) -> Result<PathBuf> {
        let tool = self.tool();
        let path = dir.join(tool.config_file_name(sim_id));
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&path, &json)?;

        log.line(format!("{} configuration for simulation {}", tool.title(), sim_id))?;
        log.line(String::from_utf8_lossy(&json))?;
        log.line(format!("Wrote {}", path.display()))?;
        Ok(path)
    }
}

/// `num` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}
