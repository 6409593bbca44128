//! Delocalization of the elemental composition and isosurface objects.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::descriptor::{
    Delocalization, DistanceSource, EdgeModelSource, NanochemConfig, NanochemDataset,
    RangedDataset, ToolConfig,
};
use crate::error::Result;
use crate::job::ranger::RANGER_ARTIFACTS;
use crate::job::{predecessor, BaseJob, Job, JobContext, JobStatus, Project};
use crate::manifest::{ArtifactKind, ArtifactManifest};
use crate::tool::{Stage, Tool};

/// Triangle vertices of the edge model in the surfacer results.
pub const EDGE_MODEL_VERTICES: &str =
    "/entry/process0/point_set_wrapping0/alpha_complex/triangle_set/triangles/vertices";

/// Triangle facet indices of the edge model in the surfacer results.
pub const EDGE_MODEL_FACETS: &str =
    "/entry/process0/point_set_wrapping0/alpha_complex/triangle_set/triangles/faces";

/// Ion to edge-model distances in the distancer results.
pub const ION_TO_EDGE_DISTANCES: &str = "/entry/process0/point_to_triangle_set/distance";

#[derive(Debug)]
pub struct NanochemJob {
    base: BaseJob,
    ranger: Option<ArtifactManifest>,
    surfacer: Option<ArtifactManifest>,
    distancer: Option<ArtifactManifest>,
    skip_copy_results: bool,
}

impl NanochemJob {
    pub fn new(project: &Project, name: impl Into<String>, ctx: JobContext) -> Result<Self> {
        Ok(Self {
            base: BaseJob::new(project, name, ctx)?,
            ranger: None,
            surfacer: None,
            distancer: None,
            skip_copy_results: false,
        })
    }

    pub fn set_ranger(&mut self, manifest: ArtifactManifest) {
        self.ranger = Some(manifest);
    }

    pub fn set_surfacer(&mut self, manifest: ArtifactManifest) {
        self.surfacer = Some(manifest);
    }

    pub fn set_distancer(&mut self, manifest: ArtifactManifest) {
        self.distancer = Some(manifest);
    }

    pub fn set_skip_copy_results(&mut self, skip: bool) {
        self.skip_copy_results = skip;
    }

    /// Raw delocalization report, available once collected.
    pub fn report(&self) -> Option<&str> {
        self.base.output().nanochem.as_deref()
    }

    fn copy_results(&self) -> Result<()> {
        if self.skip_copy_results {
            warn!(job = %self.base.name(), "Skipping copy of upstream results");
            return Ok(());
        }
        let ranger = predecessor(self.ranger.as_ref(), Stage::Nanochem, Stage::Ranger)?;
        let surfacer = predecessor(self.surfacer.as_ref(), Stage::Nanochem, Stage::Surfacer)?;
        let distancer = predecessor(self.distancer.as_ref(), Stage::Nanochem, Stage::Distancer)?;

        self.base.copy_artifacts(ranger, RANGER_ARTIFACTS)?;
        self.base
            .copy_artifacts(surfacer, &[(Tool::Surfacer, ArtifactKind::Results)])?;
        self.base
            .copy_artifacts(distancer, &[(Tool::Distancer, ArtifactKind::Results)])
    }

    fn config(&self) -> ToolConfig {
        let sim_id = self.base.sim_id();
        ToolConfig::Nanochem(NanochemConfig {
            sim_id,
            dataset: NanochemDataset {
                ranging_applied: true,
                dataset: RangedDataset::new(sim_id),
                edge_model: EdgeModelSource {
                    file_name: Tool::Surfacer.results_file_name(sim_id).into(),
                    vertices: EDGE_MODEL_VERTICES.to_string(),
                    facet_indices: EDGE_MODEL_FACETS.to_string(),
                },
                ion_to_edge_distances: DistanceSource {
                    file_name: Tool::Distancer.results_file_name(sim_id).into(),
                    dataset: ION_TO_EDGE_DISTANCES.to_string(),
                },
            },
            tasks: vec![Delocalization::default()],
        })
    }
}

#[async_trait]
impl Job for NanochemJob {
    fn stage(&self) -> Stage {
        Stage::Nanochem
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
            predecessor(self.ranger.as_ref(), Stage::Nanochem, Stage::Ranger)?;
            predecessor(self.surfacer.as_ref(), Stage::Nanochem, Stage::Surfacer)?;
            predecessor(self.distancer.as_ref(), Stage::Nanochem, Stage::Distancer)?;
        }

        self.base.copy_inputs()?;
        self.copy_results()?;
        self.base.configure(&self.config())?;
        self.base.set_status(JobStatus::Configured);
        Ok(())
    }

    async fn collect_output(&mut self) -> Result<()> {
        self.base.expect_status(JobStatus::Executed)?;

        self.base.report(Tool::Nanochem).await?;
        let report = self.base.read_text(&Tool::Nanochem.result_log_name())?;
        info!(job = %self.base.name(), bytes = report.len(), "Delocalization report collected");
        self.base.output_mut().nanochem = Some(report);

        self.base.collect_tool_logs(Tool::Nanochem)?;
        self.base.set_status(JobStatus::Collected);
        Ok(())
    }

    fn manifest(&self) -> Result<ArtifactManifest> {
        self.base.expect_status(JobStatus::Collected)?;
        ArtifactManifest::new(
            Stage::Nanochem,
            self.base.sim_id(),
            self.base.working_directory(),
        )
        .with_artifact(Tool::Nanochem, ArtifactKind::Config)?
        .with_artifact(Tool::Nanochem, ArtifactKind::Results)
    }
}
