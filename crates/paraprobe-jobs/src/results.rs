//! Reading tool results and post-processing the tessellation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};
use crate::tool::SimulationId;

/// Reads datasets out of result artifacts.
pub trait ResultsReader: Send + Sync {
    /// Per-cell volumes of tessellation task `task_id`, in file order.
    fn cell_volumes(
        &self,
        results_file: &Path,
        sim_id: SimulationId,
        task_id: u32,
    ) -> Result<Vec<f64>>;
}

/// Dataset holding the cell volumes of one tessellation task.
pub fn cell_volume_dataset(sim_id: SimulationId, task_id: u32) -> String {
    format!("/entry{sim_id}/tessellation/voronoi_cells/task{task_id}/cell_volume")
}

/// Empirical cumulative distribution of tessellation cell volumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellVolumeCdf {
    /// Cell volumes in ascending order (nm^3).
    pub volumes: Vec<f64>,
    /// Cumulated fraction `(i + 1) / n` for each sorted volume.
    pub cumulative: Vec<f64>,
}

impl CellVolumeCdf {
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Volume below which `fraction` of the cells lie.
    pub fn quantile(&self, fraction: f64) -> Option<f64> {
        let idx = self.cumulative.iter().position(|&c| c >= fraction)?;
        self.volumes.get(idx).copied()
    }
}

/// Sort the volumes and pair them with linearly spaced cumulated fractions.
pub fn cell_volume_cdf(mut volumes: Vec<f64>) -> Result<CellVolumeCdf> {
    if let Some(bad) = volumes.iter().find(|v| !v.is_finite()) {
        return Err(JobError::Results(format!("non-finite cell volume {bad}")));
    }
    volumes.sort_by(f64::total_cmp);
    let n = volumes.len() as f64;
    let cumulative = (1..=volumes.len()).map(|i| i as f64 / n).collect();
    Ok(CellVolumeCdf {
        volumes,
        cumulative,
    })
}

/// Reader for builds without HDF5 support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedReader;

impl ResultsReader for UnsupportedReader {
    fn cell_volumes(&self, results_file: &Path, _: SimulationId, _: u32) -> Result<Vec<f64>> {
        Err(JobError::Results(format!(
            "cannot read {}: built without the `hdf5` feature",
            results_file.display()
        )))
    }
}

/// Reads result artifacts with libhdf5.
#[cfg(feature = "hdf5")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Hdf5ResultsReader;

#[cfg(feature = "hdf5")]
impl ResultsReader for Hdf5ResultsReader {
    fn cell_volumes(
        &self,
        results_file: &Path,
        sim_id: SimulationId,
        task_id: u32,
    ) -> Result<Vec<f64>> {
        if !results_file.exists() {
            return Err(JobError::FileNotFound(results_file.to_path_buf()));
        }
        let name = cell_volume_dataset(sim_id, task_id);
        let err = |e: hdf5::Error| JobError::Results(format!("{}:{name}: {e}", results_file.display()));

        let file = hdf5::File::open(results_file).map_err(err)?;
        let dataset = file.dataset(&name).map_err(err)?;
        // Volumes live in the first column of an (n, k) dataset.
        let columns = dataset.shape().get(1).copied().unwrap_or(1).max(1);
        let raw: Vec<f32> = dataset.read_raw().map_err(err)?;
        Ok(raw.into_iter().step_by(columns).map(f64::from).collect())
    }
}

/// The reader matching the enabled cargo features.
pub fn default_reader() -> std::sync::Arc<dyn ResultsReader> {
    #[cfg(feature = "hdf5")]
    {
        std::sync::Arc::new(Hdf5ResultsReader)
    }
    #[cfg(not(feature = "hdf5"))]
    {
        std::sync::Arc::new(UnsupportedReader)
    }
}
