//! Voronoi tessellation of the complete dataset.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::descriptor::{RangedDataset, TessellationMethod, TessellatorConfig, ToolConfig};
use crate::error::{JobError, Result};
use crate::job::ranger::RANGER_ARTIFACTS;
use crate::job::{predecessor, BaseJob, Job, JobContext, JobStatus, Project};
use crate::manifest::{ArtifactKind, ArtifactManifest};
use crate::results::{cell_volume_cdf, CellVolumeCdf};
use crate::scoped;
use crate::tool::{Stage, Tool};

/// Tessellation task whose cell volumes are post-processed.
pub const CELL_VOLUME_TASK: u32 = 0;

#[derive(Debug)]
pub struct TessellatorJob {
    base: BaseJob,
    ranger: Option<ArtifactManifest>,
    distancer: Option<ArtifactManifest>,
    skip_copy_results: bool,
}

impl TessellatorJob {
    pub fn new(project: &Project, name: impl Into<String>, ctx: JobContext) -> Result<Self> {
        Ok(Self {
            base: BaseJob::new(project, name, ctx)?,
            ranger: None,
            distancer: None,
            skip_copy_results: false,
        })
    }

    pub fn set_ranger(&mut self, manifest: ArtifactManifest) {
        self.ranger = Some(manifest);
    }

    pub fn set_distancer(&mut self, manifest: ArtifactManifest) {
        self.distancer = Some(manifest);
    }

    pub fn set_skip_copy_results(&mut self, skip: bool) {
        self.skip_copy_results = skip;
    }

    /// Cell-volume distribution, available once collected.
    pub fn cell_volumes(&self) -> Option<&CellVolumeCdf> {
        self.base.output().tessellator.as_ref()
    }

    fn predecessors(&self) -> Result<(&ArtifactManifest, &ArtifactManifest)> {
        Ok((
            predecessor(self.ranger.as_ref(), Stage::Tessellator, Stage::Ranger)?,
            predecessor(self.distancer.as_ref(), Stage::Tessellator, Stage::Distancer)?,
        ))
    }

    fn summarize(&self, cdf: &CellVolumeCdf) -> Result<()> {
        scoped::capture(
            self.base.working_directory(),
            &Tool::Tessellator.result_log_name(),
            |log| {
                log.line(format!("cells {}", cdf.len()))?;
                if let (Some(min), Some(max)) = (cdf.volumes.first(), cdf.volumes.last()) {
                    log.line(format!("volume_min {min}"))?;
                    log.line(format!("volume_max {max}"))?;
                }
                if let Some(median) = cdf.quantile(0.5) {
                    log.line(format!("volume_median {median}"))?;
                }
                Ok(())
            },
        )
    }
}

#[async_trait]
impl Job for TessellatorJob {
    fn stage(&self) -> Stage {
        Stage::Tessellator
    }

    fn base(&self) -> &BaseJob {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseJob {
        &mut self.base
    }

    async fn write_input(&mut self) -> Result<()> {
        self.base.expect_status(JobStatus::Created)?;
        self.base.input().require()?;
        if !self.skip_copy_results {
            self.predecessors()?;
        }

        self.base.copy_inputs()?;
        if self.skip_copy_results {
            warn!(job = %self.base.name(), "Skipping copy of ranger and distancer results");
        } else {
            let (ranger, distancer) = self.predecessors()?;
            self.base.copy_artifacts(ranger, RANGER_ARTIFACTS)?;
            self.base
                .copy_artifacts(distancer, &[(Tool::Distancer, ArtifactKind::Results)])?;
        }

        let sim_id = self.base.sim_id();
        self.base.configure(&ToolConfig::Tessellator(TessellatorConfig {
            method: TessellationMethod::CompleteVoronoi,
            dataset: RangedDataset::new(sim_id),
            distancer_results_sim_id: sim_id,
            tessellator_results_sim_id: sim_id,
        }))?;
        self.base.set_status(JobStatus::Configured);
        Ok(())
    }

    async fn collect_output(&mut self) -> Result<()> {
        self.base.expect_status(JobStatus::Executed)?;

        let results = self.base.results_file(Tool::Tessellator);
        if !results.is_file() {
            return Err(JobError::FileNotFound(results));
        }
        let volumes = self.base.context().reader().cell_volumes(
            &results,
            self.base.sim_id(),
            CELL_VOLUME_TASK,
        )?;
        let cdf = cell_volume_cdf(volumes)?;
        info!(job = %self.base.name(), cells = cdf.len(), "Cell volumes collected");
        self.summarize(&cdf)?;
        self.base.output_mut().tessellator = Some(cdf);

        self.base.collect_tool_logs(Tool::Tessellator)?;
        self.base.set_status(JobStatus::Collected);
        Ok(())
    }

    fn manifest(&self) -> Result<ArtifactManifest> {
        self.base.expect_status(JobStatus::Collected)?;
        ArtifactManifest::new(
            Stage::Tessellator,
            self.base.sim_id(),
            self.base.working_directory(),
        )
        .with_artifact(Tool::Tessellator, ArtifactKind::Config)?
        .with_artifact(Tool::Tessellator, ArtifactKind::Results)
    }
}
