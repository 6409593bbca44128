//! Distances of every ion to the surfacer's edge model.

use async_trait::async_trait;
use tracing::warn;

use crate::descriptor::{DistancerConfig, DistancingMethod, RangedDataset, ToolConfig};
use crate::error::Result;
use crate::job::ranger::RANGER_ARTIFACTS;
use crate::job::{predecessor, BaseJob, Job, JobContext, JobStatus, Project};
use crate::manifest::{ArtifactKind, ArtifactManifest};
use crate::tool::{Stage, Tool};

const SURFACER_ARTIFACTS: &[(Tool, ArtifactKind)] = &[
    (Tool::Surfacer, ArtifactKind::Config),
    (Tool::Surfacer, ArtifactKind::Results),
];

#[derive(Debug)]
pub struct DistancerJob {
    base: BaseJob,
    ranger: Option<ArtifactManifest>,
    surfacer: Option<ArtifactManifest>,
    skip_copy_results: bool,
}

impl DistancerJob {
    pub fn new(project: &Project, name: impl Into<String>, ctx: JobContext) -> Result<Self> {
        Ok(Self {
            base: BaseJob::new(project, name, ctx)?,
            ranger: None,
            surfacer: None,
            skip_copy_results: false,
        })
    }

    pub fn set_ranger(&mut self, manifest: ArtifactManifest) {
        self.ranger = Some(manifest);
    }

    pub fn set_surfacer(&mut self, manifest: ArtifactManifest) {
        self.surfacer = Some(manifest);
    }

    pub fn set_skip_copy_results(&mut self, skip: bool) {
        self.skip_copy_results = skip;
    }

    fn predecessors(&self) -> Result<(&ArtifactManifest, &ArtifactManifest)> {
        Ok((
            predecessor(self.ranger.as_ref(), Stage::Distancer, Stage::Ranger)?,
            predecessor(self.surfacer.as_ref(), Stage::Distancer, Stage::Surfacer)?,
        ))
    }
}

#[async_trait]
impl Job for DistancerJob {
    fn stage(&self) -> Stage {
        Stage::Distancer
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
            warn!(job = %self.base.name(), "Skipping copy of ranger and surfacer results");
        } else {
            let (ranger, surfacer) = self.predecessors()?;
            self.base.copy_artifacts(ranger, RANGER_ARTIFACTS)?;
            self.base.copy_artifacts(surfacer, SURFACER_ARTIFACTS)?;
        }

        let sim_id = self.base.sim_id();
        self.base.configure(&ToolConfig::Distancer(DistancerConfig {
            method: DistancingMethod::IonToEdgeModel,
            dataset: RangedDataset::new(sim_id),
            distancer_results_sim_id: sim_id,
        }))?;
        self.base.set_status(JobStatus::Configured);
        Ok(())
    }

    async fn collect_output(&mut self) -> Result<()> {
        self.base.expect_status(JobStatus::Executed)?;
        self.base.collect_tool_logs(Tool::Distancer)?;
        self.base.set_status(JobStatus::Collected);
        Ok(())
    }

    fn manifest(&self) -> Result<ArtifactManifest> {
        self.base.expect_status(JobStatus::Collected)?;
        ArtifactManifest::new(
            Stage::Distancer,
            self.base.sim_id(),
            self.base.working_directory(),
        )
        .with_artifact(Tool::Distancer, ArtifactKind::Config)?
        .with_artifact(Tool::Distancer, ArtifactKind::Results)
    }
}
