//! Top-level paraprobe job: runs the enabled stages in dependency order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{JobError, Result};
use crate::job::distancer::DistancerJob;
use crate::job::nanochem::NanochemJob;
use crate::job::ranger::RangerJob;
use crate::job::surfacer::SurfacerJob;
use crate::job::tessellator::TessellatorJob;
use crate::job::{BaseJob, Job, JobContext, JobOutput, JobStatus, Project};
use crate::manifest::ArtifactManifest;
use crate::publication::Publication;
use crate::results::CellVolumeCdf;
use crate::summary::RangerSummary;
use crate::tool::Stage;

/// Which stages a pipeline run includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFlags {
    pub ranger: bool,
    pub surfacer: bool,
    pub distancer: bool,
    pub tessellator: bool,
    pub nanochem: bool,
}

impl AnalysisFlags {
    /// Flags with `stages` and all their prerequisites enabled.
    pub fn from_stages(stages: impl IntoIterator<Item = Stage>) -> Self {
        let mut flags = Self::default();
        for stage in stages {
            flags.enable(stage);
        }
        flags
    }

    /// Enable `stage` and, transitively, every stage it depends on.
    pub fn enable(&mut self, stage: Stage) {
        for &pre in stage.prerequisites() {
            self.enable(pre);
        }
        *self.flag_mut(stage) = true;
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Ranger => self.ranger,
            Stage::Surfacer => self.surfacer,
            Stage::Distancer => self.distancer,
            Stage::Tessellator => self.tessellator,
            Stage::Nanochem => self.nanochem,
        }
    }

    /// Enabled stages in execution order.
    pub fn enabled(&self) -> Vec<Stage> {
        Stage::all()
            .into_iter()
            .filter(|&stage| self.is_enabled(stage))
            .collect()
    }

    fn flag_mut(&mut self, stage: Stage) -> &mut bool {
        match stage {
            Stage::Ranger => &mut self.ranger,
            Stage::Surfacer => &mut self.surfacer,
            Stage::Distancer => &mut self.distancer,
            Stage::Tessellator => &mut self.tessellator,
            Stage::Nanochem => &mut self.nanochem,
        }
    }
}

/// Outcome of one sub-job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub job_name: String,
    pub working_directory: PathBuf,
    pub duration_ms: u64,
    /// Number of artifacts handed downstream.
    pub artifacts: usize,
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Stages in the order they ran.
    pub stages: Vec<StageReport>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Manifest of every collected stage.
    pub manifests: BTreeMap<Stage, ArtifactManifest>,
}

impl PipelineResult {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }
}

/// Facade over the whole paraprobe analysis.
///
/// Sub-jobs are created next to the top job as `<name>_<stage>` and always
/// start from an empty working directory.
pub struct ParaprobeJob {
    base: BaseJob,
    project: Project,
    flags: AnalysisFlags,
    jobs: Vec<Box<dyn Job>>,
    manifests: BTreeMap<Stage, ArtifactManifest>,
}

impl ParaprobeJob {
    pub fn new(project: Project, name: impl Into<String>, ctx: JobContext) -> Result<Self> {
        let base = BaseJob::new(&project, name, ctx)?;
        Ok(Self {
            base,
            project,
            flags: AnalysisFlags::default(),
            jobs: Vec::new(),
            manifests: BTreeMap::new(),
        })
    }

    pub fn base(&self) -> &BaseJob {
        &self.base
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn working_directory(&self) -> &Path {
        self.base.working_directory()
    }

    pub fn status(&self) -> JobStatus {
        self.base.status()
    }

    pub fn set_pos_file(&mut self, path: impl Into<PathBuf>) {
        self.base.set_pos_file(path);
    }

    pub fn set_rrng_file(&mut self, path: impl Into<PathBuf>) {
        self.base.set_rrng_file(path);
    }

    pub fn flags(&self) -> AnalysisFlags {
        self.flags
    }

    pub fn analyse(&mut self, stage: Stage) -> &mut Self {
        self.flags.enable(stage);
        self
    }

    pub fn analyse_ranger(&mut self) -> &mut Self {
        self.analyse(Stage::Ranger)
    }

    pub fn analyse_surfacer(&mut self) -> &mut Self {
        self.analyse(Stage::Surfacer)
    }

    pub fn analyse_distancer(&mut self) -> &mut Self {
        self.analyse(Stage::Distancer)
    }

    pub fn analyse_tessellator(&mut self) -> &mut Self {
        self.analyse(Stage::Tessellator)
    }

    pub fn analyse_nanochem(&mut self) -> &mut Self {
        self.analyse(Stage::Nanochem)
    }

    /// Aggregated logs and results of every sub-job.
    pub fn output(&self) -> &JobOutput {
        self.base.output()
    }

    pub fn ranger_summary(&self) -> Option<&RangerSummary> {
        self.base.output().ranger.as_ref()
    }

    /// Data for plotting the tessellator's cell-volume distribution.
    pub fn tessellator_cdf(&self) -> Option<&CellVolumeCdf> {
        self.base.output().tessellator.as_ref()
    }

    pub fn nanochem_report(&self) -> Option<&str> {
        self.base.output().nanochem.as_deref()
    }

    pub fn publications(&self) -> &'static [Publication] {
        self.base.context().publications()
    }

    /// Sub-jobs that ran, in order.
    pub fn jobs(&self) -> &[Box<dyn Job>] {
        &self.jobs
    }

    pub fn job(&self, stage: Stage) -> Option<&dyn Job> {
        self.jobs
            .iter()
            .find(|job| job.stage() == stage)
            .map(|job| job.as_ref())
    }

    /// Run every enabled stage, then aggregate and save the results.
    pub async fn run(&mut self) -> Result<PipelineResult> {
        let start = Instant::now();
        self.base.expect_status(JobStatus::Created)?;
        self.base.input().require()?;

        let stages = self.flags.enabled();
        info!(job = %self.base.name(), stages = ?stages, "Starting paraprobe pipeline");
        self.base.set_status(JobStatus::Configured);

        let mut reports = Vec::with_capacity(stages.len());
        for stage in stages {
            reports.push(self.run_stage(stage).await?);
        }
        self.base.set_status(JobStatus::Executed);

        self.collect_output();
        self.base.set_status(JobStatus::Collected);
        self.base.save(None)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            job = %self.base.name(),
            stages = reports.len(),
            duration_ms,
            "Paraprobe pipeline finished"
        );
        Ok(PipelineResult {
            stages: reports,
            duration_ms,
            manifests: self.manifests.clone(),
        })
    }

    async fn run_stage(&mut self, stage: Stage) -> Result<StageReport> {
        let start = Instant::now();
        let job_name = format!("{}_{}", self.base.name(), stage);
        self.project.remove_job(&job_name)?;

        let mut job = self.create_job(stage, &job_name)?;
        if let Some(pos) = self.base.pos_file() {
            job.base_mut().set_pos_file(pos);
        }
        if let Some(rrng) = self.base.rrng_file() {
            job.base_mut().set_rrng_file(rrng);
        }

        let manifest = job.run().await?;
        let report = StageReport {
            stage,
            job_name,
            working_directory: job.base().working_directory().to_path_buf(),
            duration_ms: start.elapsed().as_millis() as u64,
            artifacts: manifest.len(),
        };
        self.manifests.insert(stage, manifest);
        self.jobs.push(job);
        Ok(report)
    }

    /// Build the sub-job for `stage`, wired to the manifests of its predecessors.
    fn create_job(&self, stage: Stage, job_name: &str) -> Result<Box<dyn Job>> {
        let ctx = self.base.context().clone();
        let job: Box<dyn Job> = match stage {
            Stage::Ranger => Box::new(RangerJob::new(&self.project, job_name, ctx)?),
            Stage::Surfacer => {
                let mut job = SurfacerJob::new(&self.project, job_name, ctx)?;
                job.set_ranger(self.upstream(stage, Stage::Ranger)?);
                Box::new(job)
            }
            Stage::Distancer => {
                let mut job = DistancerJob::new(&self.project, job_name, ctx)?;
                job.set_ranger(self.upstream(stage, Stage::Ranger)?);
                job.set_surfacer(self.upstream(stage, Stage::Surfacer)?);
                Box::new(job)
            }
            Stage::Tessellator => {
                let mut job = TessellatorJob::new(&self.project, job_name, ctx)?;
                job.set_ranger(self.upstream(stage, Stage::Ranger)?);
                job.set_distancer(self.upstream(stage, Stage::Distancer)?);
                Box::new(job)
            }
            Stage::Nanochem => {
                let mut job = NanochemJob::new(&self.project, job_name, ctx)?;
                job.set_ranger(self.upstream(stage, Stage::Ranger)?);
                job.set_surfacer(self.upstream(stage, Stage::Surfacer)?);
                job.set_distancer(self.upstream(stage, Stage::Distancer)?);
                Box::new(job)
            }
        };
        Ok(job)
    }

    fn upstream(&self, stage: Stage, required: Stage) -> Result<ArtifactManifest> {
        self.manifests
            .get(&required)
            .cloned()
            .ok_or(JobError::MissingPredecessor { stage, required })
    }

    fn collect_output(&mut self) {
        let mut output = JobOutput::default();
        for job in &self.jobs {
            output.merge(job.base().output());
        }
        *self.base.output_mut() = output;
    }
}

impl std::fmt::Debug for ParaprobeJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParaprobeJob")
            .field("name", &self.base.name())
            .field("status", &self.base.status())
            .field("flags", &self.flags)
            .field("stages_run", &self.jobs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_is_transitive() {
        let mut flags = AnalysisFlags::default();
        flags.enable(Stage::Nanochem);
        assert!(flags.ranger && flags.surfacer && flags.distancer && flags.nanochem);
        assert!(!flags.tessellator);
    }

    #[test]
    fn test_tessellator_enables_surfacer() {
        let flags = AnalysisFlags::from_stages([Stage::Tessellator]);
        assert_eq!(
            flags.enabled(),
            vec![
                Stage::Ranger,
                Stage::Surfacer,
                Stage::Distancer,
                Stage::Tessellator
            ]
        );
    }

    #[test]
    fn test_enabled_order_ignores_request_order() {
        let flags = AnalysisFlags::from_stages([Stage::Surfacer, Stage::Ranger]);
        assert_eq!(flags.enabled(), vec![Stage::Ranger, Stage::Surfacer]);
        assert!(AnalysisFlags::default().enabled().is_empty());
    }
}
