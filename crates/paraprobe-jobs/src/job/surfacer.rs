//! Edge model of the reconstructed volume.

use async_trait::async_trait;
use tracing::warn;

use crate::descriptor::{EdgeModelMethod, RangedDataset, SurfacerConfig, ToolConfig};
use crate::error::Result;
use crate::job::ranger::RANGER_ARTIFACTS;
use crate::job::{predecessor, BaseJob, Job, JobContext, JobStatus, Project};
use crate::manifest::{ArtifactKind, ArtifactManifest};
use crate::tool::{Stage, Tool};

#[derive(Debug)]
pub struct SurfacerJob {
    base: BaseJob,
    ranger: Option<ArtifactManifest>,
    skip_copy_results: bool,
}

impl SurfacerJob {
    pub fn new(project: &Project, name: impl Into<String>, ctx: JobContext) -> Result<Self> {
        Ok(Self {
            base: BaseJob::new(project, name, ctx)?,
            ranger: None,
            skip_copy_results: false,
        })
    }

    pub fn set_ranger(&mut self, manifest: ArtifactManifest) {
        self.ranger = Some(manifest);
    }

    /// Reuse ranger artifacts already present in the working directory.
    pub fn set_skip_copy_results(&mut self, skip: bool) {
        self.skip_copy_results = skip;
    }

    fn copy_results(&self) -> Result<()> {
        if self.skip_copy_results {
            warn!(job = %self.base.name(), "Skipping copy of ranger results");
            return Ok(());
        }
        let ranger = predecessor(self.ranger.as_ref(), Stage::Surfacer, Stage::Ranger)?;
        self.base.copy_artifacts(ranger, RANGER_ARTIFACTS)
    }
}

#[async_trait]
impl Job for SurfacerJob {
    fn stage(&self) -> Stage {
        Stage::Surfacer
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
            predecessor(self.ranger.as_ref(), Stage::Surfacer, Stage::Ranger)?;
        }

        self.base.copy_inputs()?;
        self.copy_results()?;

        let sim_id = self.base.sim_id();
        self.base.configure(&ToolConfig::Surfacer(SurfacerConfig {
            method: EdgeModelMethod::ConvexHull,
            dataset: RangedDataset::new(sim_id),
            surfacer_results_sim_id: sim_id,
        }))?;
        self.base.set_status(JobStatus::Configured);
        Ok(())
    }

    async fn collect_output(&mut self) -> Result<()> {
        self.base.expect_status(JobStatus::Executed)?;
        self.base.collect_tool_logs(Tool::Surfacer)?;
        self.base.set_status(JobStatus::Collected);
        Ok(())
    }

    fn manifest(&self) -> Result<ArtifactManifest> {
        self.base.expect_status(JobStatus::Collected)?;
        ArtifactManifest::new(
            Stage::Surfacer,
            self.base.sim_id(),
            self.base.working_directory(),
        )
        .with_artifact(Tool::Surfacer, ArtifactKind::Config)?
        .with_artifact(Tool::Surfacer, ArtifactKind::Results)
    }
}
