//! Ranging: transcode the reconstruction, then apply the ranging definitions.

use async_trait::async_trait;
use tracing::info;

use crate::descriptor::{RangedDataset, RangerConfig, RangingMethod, ToolConfig, TranscoderConfig};
use crate::error::{JobError, Result};
use crate::job::{BaseJob, Job, JobContext, JobStatus, Phase, Project, EXECUTE_LOG};
use crate::manifest::{ArtifactKind, ArtifactManifest};
use crate::summary::RangerSummary;
use crate::tool::{Stage, Tool};

/// Log of the transcoder run, kept apart from the ranger's `log.out`.
pub const TRANSCODER_LOG: &str = "execute_transcoder.log";

/// Artifacts every downstream stage copies from a ranger job.
pub const RANGER_ARTIFACTS: &[(Tool, ArtifactKind)] = &[
    (Tool::Transcoder, ArtifactKind::Config),
    (Tool::Transcoder, ArtifactKind::Results),
    (Tool::Ranger, ArtifactKind::Config),
    (Tool::Ranger, ArtifactKind::Results),
];

#[derive(Debug)]
pub struct RangerJob {
    base: BaseJob,
}

impl RangerJob {
    pub fn new(project: &Project, name: impl Into<String>, ctx: JobContext) -> Result<Self> {
        Ok(Self {
            base: BaseJob::new(project, name, ctx)?,
        })
    }

    /// Parsed summary, available once collected.
    pub fn summary(&self) -> Option<&RangerSummary> {
        self.base.output().ranger.as_ref()
    }

    fn file_name(path: Option<&std::path::Path>, input: &'static str) -> Result<String> {
        path.and_then(|p| p.to_str())
            .map(str::to_string)
            .ok_or(JobError::MissingInput(input))
    }

    fn transcoder_config(&self) -> Result<ToolConfig> {
        Ok(ToolConfig::Transcoder(TranscoderConfig {
            sim_id: self.base.sim_id(),
            reconstruction: Self::file_name(self.base.pos_file(), "pos_file")?,
            ranging_definitions: Self::file_name(self.base.rrng_file(), "rrng_file")?,
        }))
    }

    fn ranger_config(&self) -> ToolConfig {
        ToolConfig::Ranger(RangerConfig {
            method: RangingMethod::ApplyExistentRanging,
            dataset: RangedDataset::new(self.base.sim_id()),
        })
    }
}

#[async_trait]
impl Job for RangerJob {
    fn stage(&self) -> Stage {
        Stage::Ranger
    }

    fn base(&self) -> &BaseJob {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseJob {
        &mut self.base
    }

    async fn write_input(&mut self) -> Result<()> {
        self.base.expect_status(JobStatus::Created)?;
        self.base.copy_inputs()?;

        // The ranger reads the transcoder's results, so the transcoder runs now.
        self.base.configure(&self.transcoder_config()?)?;
        self.base.run_tool(Tool::Transcoder, TRANSCODER_LOG).await?;

        self.base.configure(&self.ranger_config())?;
        self.base.set_status(JobStatus::Configured);
        Ok(())
    }

    async fn collect_output(&mut self) -> Result<()> {
        self.base.expect_status(JobStatus::Executed)?;

        self.base.report(Tool::Ranger).await?;
        let tokens = self.base.read_tokens(&Tool::Ranger.result_log_name())?;
        let summary = RangerSummary::from_tokens(&tokens)?;
        info!(job = %self.base.name(), ions = summary.ion_count, "Ranging summary collected");
        self.base.output_mut().ranger = Some(summary);

        self.base.collect_log(
            Phase::Configure,
            Tool::Transcoder,
            &Tool::Transcoder.config_log_name(),
        )?;
        self.base
            .collect_log(Phase::Execute, Tool::Transcoder, TRANSCODER_LOG)?;
        self.base
            .collect_log(Phase::Configure, Tool::Ranger, &Tool::Ranger.config_log_name())?;
        self.base
            .collect_log(Phase::Execute, Tool::Ranger, EXECUTE_LOG)?;

        self.base.set_status(JobStatus::Collected);
        Ok(())
    }

    fn manifest(&self) -> Result<ArtifactManifest> {
        self.base.expect_status(JobStatus::Collected)?;
        RANGER_ARTIFACTS.iter().try_fold(
            ArtifactManifest::new(
                Stage::Ranger,
                self.base.sim_id(),
                self.base.working_directory(),
            ),
            |manifest, &(tool, kind)| manifest.with_artifact(tool, kind),
        )
    }
}
