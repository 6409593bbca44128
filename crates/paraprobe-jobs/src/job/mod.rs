//! Job lifecycle shared by every paraprobe tool wrapper.
//!
//! A job owns a working directory and moves through
//! `Created -> Configured -> Executed -> Collected`:
//!
//! - `write_input` copies the input files (and upstream artifacts) into the
//!   working directory and writes the tool configuration,
//! - `execute` runs the tool,
//! - `collect_output` reads logs and results back into [`JobOutput`].
//!
//! Once collected, a job describes its files in an [`ArtifactManifest`].

pub mod distancer;
pub mod nanochem;
pub mod output;
pub mod ranger;
pub mod surfacer;
pub mod tessellator;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::descriptor::ToolConfig;
use crate::error::{JobError, Result};
use crate::executor::{Executor, Invocation, ProcessExecutor, ToolRun};
use crate::manifest::{verify_copy, ArtifactKind, ArtifactManifest};
use crate::publication::{Publication, PARAPROBE_PUBLICATIONS};
use crate::results::{default_reader, ResultsReader};
use crate::scoped;
use crate::settings::Settings;
use crate::tool::{SimulationId, Stage, Tool};

pub use output::{log_key, JobOutput, Phase};

/// Log every tool execution writes into the working directory.
pub const EXECUTE_LOG: &str = "log.out";

/// Persisted job record inside the working directory.
pub const RECORD_FILE: &str = "job.json";

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Configured,
    Executed,
    Collected,
}

/// Input container of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    /// Reconstructed point cloud (POS/APT/...).
    pub pos_file: Option<PathBuf>,
    /// Ranging definitions (RRNG/RNG/...).
    pub rrng_file: Option<PathBuf>,
}

impl JobInput {
    /// Both input files, or the first one missing.
    pub fn require(&self) -> Result<(&Path, &Path)> {
        let pos = self
            .pos_file
            .as_deref()
            .ok_or(JobError::MissingInput("pos_file"))?;
        let rrng = self
            .rrng_file
            .as_deref()
            .ok_or(JobError::MissingInput("rrng_file"))?;
        Ok((pos, rrng))
    }
}

/// Everything a job needs from the outside world, fixed for a pipeline run.
#[derive(Clone)]
pub struct JobContext {
    settings: Arc<Settings>,
    executor: Arc<dyn Executor>,
    reader: Arc<dyn ResultsReader>,
    publications: &'static [Publication],
}

impl JobContext {
    pub fn new(
        settings: Settings,
        executor: Arc<dyn Executor>,
        reader: Arc<dyn ResultsReader>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            executor,
            reader,
            publications: PARAPROBE_PUBLICATIONS,
        }
    }

    /// Child-process execution and the results reader of this build.
    pub fn from_settings(settings: Settings) -> Self {
        let executor = Arc::new(ProcessExecutor::from_settings(&settings));
        Self::new(settings, executor, default_reader())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sim_id(&self) -> SimulationId {
        self.settings.sim_id
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub fn reader(&self) -> &dyn ResultsReader {
        self.reader.as_ref()
    }

    pub fn publications(&self) -> &'static [Publication] {
        self.publications
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Directory holding one working directory per job.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Create `root` if needed. The stored root is absolute, since tools run
    /// inside their job directories rather than the caller's.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root: std::fs::canonicalize(&root)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_directory(&self, job_name: &str) -> PathBuf {
        self.root.join(job_name)
    }

    /// Delete the working directory of `job_name` if it exists.
    pub fn remove_job(&self, job_name: &str) -> Result<()> {
        let dir = self.job_directory(job_name);
        if dir.exists() {
            debug!(dir = %dir.display(), "Removing existing job directory");
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Modes of [`BaseJob::read_temporary_output_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// One whitespace-token vector per line.
    Tokenized,
    /// The file verbatim.
    Raw,
}

/// Contents of a temporary output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporaryOutput {
    Tokens(Vec<Vec<String>>),
    Text(String),
}

/// Persisted form of a job, written to [`RECORD_FILE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub name: String,
    pub stage: Option<Stage>,
    pub status: JobStatus,
    pub sim_id: SimulationId,
    pub input: JobInput,
    pub output: JobOutput,
    pub created_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

/// State and helpers shared by all jobs.
#[derive(Debug)]
pub struct BaseJob {
    id: Uuid,
    name: String,
    working_directory: PathBuf,
    ctx: JobContext,
    input: JobInput,
    output: JobOutput,
    status: JobStatus,
    created_at: DateTime<Utc>,
}

impl BaseJob {
    /// Create the job with its working directory `<project>/<name>`.
    pub fn new(project: &Project, name: impl Into<String>, ctx: JobContext) -> Result<Self> {
        let name = name.into();
        let working_directory = project.job_directory(&name);
        Self::in_directory(name, working_directory, ctx)
    }

    pub fn in_directory(
        name: impl Into<String>,
        working_directory: impl Into<PathBuf>,
        ctx: JobContext,
    ) -> Result<Self> {
        let working_directory = working_directory.into();
        std::fs::create_dir_all(&working_directory)?;
        let working_directory = std::fs::canonicalize(&working_directory)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            working_directory,
            ctx,
            input: JobInput::default(),
            output: JobOutput::default(),
            status: JobStatus::Created,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }

    pub fn sim_id(&self) -> SimulationId {
        self.ctx.sim_id()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn input(&self) -> &JobInput {
        &self.input
    }

    pub fn output(&self) -> &JobOutput {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut JobOutput {
        &mut self.output
    }

    pub fn pos_file(&self) -> Option<&Path> {
        self.input.pos_file.as_deref()
    }

    pub fn set_pos_file(&mut self, path: impl Into<PathBuf>) {
        self.input.pos_file = Some(path.into());
    }

    pub fn rrng_file(&self) -> Option<&Path> {
        self.input.rrng_file.as_deref()
    }

    pub fn set_rrng_file(&mut self, path: impl Into<PathBuf>) {
        self.input.rrng_file = Some(path.into());
    }

    pub fn expect_status(&self, expected: JobStatus) -> Result<()> {
        if self.status != expected {
            return Err(JobError::InvalidState {
                job: self.name.clone(),
                expected,
                actual: self.status,
            });
        }
        Ok(())
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        debug!(job = %self.name, ?status, "Job state changed");
        self.status = status;
    }

    /// Copy `source` into the working directory and return its file name.
    pub fn copy_file(&self, source: &Path) -> Result<String> {
        if !source.is_file() {
            return Err(JobError::FileNotFound(source.to_path_buf()));
        }
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| JobError::FileNotFound(source.to_path_buf()))?
            .to_string();
        let target = self.working_directory.join(&file_name);

        // Copying a file onto itself would truncate it.
        let same_file = target.exists()
            && std::fs::canonicalize(source)? == std::fs::canonicalize(&target)?;
        if !same_file {
            std::fs::copy(source, &target)?;
        }
        debug!(job = %self.name, source = %source.display(), "Copied file");
        Ok(file_name)
    }

    /// Copy both input files into the working directory; the input then names the copies.
    pub fn copy_inputs(&mut self) -> Result<()> {
        let (pos, rrng) = self.input.require()?;
        let (pos, rrng) = (pos.to_path_buf(), rrng.to_path_buf());
        let pos = self.copy_file(&pos)?;
        let rrng = self.copy_file(&rrng)?;
        self.input.pos_file = Some(PathBuf::from(pos));
        self.input.rrng_file = Some(PathBuf::from(rrng));
        Ok(())
    }

    /// Copy the listed artifacts of an upstream manifest and verify each copy.
    pub fn copy_artifacts(
        &self,
        manifest: &ArtifactManifest,
        wanted: &[(Tool, ArtifactKind)],
    ) -> Result<()> {
        for &(tool, kind) in wanted {
            let artifact = manifest.require(tool, kind)?;
            let file_name = self.copy_file(&artifact.path)?;
            verify_copy(artifact, &self.working_directory.join(file_name))?;
        }
        Ok(())
    }

    /// Read a log or summary the tools left in the working directory.
    pub fn read_temporary_output_file(
        &self,
        file_name: &str,
        mode: ReadMode,
    ) -> Result<TemporaryOutput> {
        Ok(match mode {
            ReadMode::Raw => TemporaryOutput::Text(self.read_text(file_name)?),
            ReadMode::Tokenized => TemporaryOutput::Tokens(self.read_tokens(file_name)?),
        })
    }

    pub fn read_tokens(&self, file_name: &str) -> Result<Vec<Vec<String>>> {
        let text = self.read_text(file_name)?;
        Ok(text
            .lines()
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect())
    }

    pub fn read_text(&self, file_name: &str) -> Result<String> {
        let path = self.working_directory.join(file_name);
        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                JobError::FileNotFound(path)
            } else {
                JobError::Io(e)
            }
        })
    }

    /// Store a verbatim log under `<phase>/<tool>`.
    pub fn collect_log(&mut self, phase: Phase, tool: Tool, file_name: &str) -> Result<()> {
        let text = self.read_text(file_name)?;
        self.output.set_log(phase, tool, text);
        Ok(())
    }

    /// Collect `configure/<tool>` and `execute/<tool>` for a single-tool job.
    pub fn collect_tool_logs(&mut self, tool: Tool) -> Result<()> {
        self.collect_log(Phase::Configure, tool, &tool.config_log_name())?;
        self.collect_log(Phase::Execute, tool, EXECUTE_LOG)
    }

    pub fn config_file(&self, tool: Tool) -> PathBuf {
        self.working_directory
            .join(tool.config_file_name(self.sim_id()))
    }

    pub fn results_file(&self, tool: Tool) -> PathBuf {
        self.working_directory
            .join(tool.results_file_name(self.sim_id()))
    }

    /// Write `config` into the working directory, logging to `config_<tool>.log`.
    pub fn configure(&self, config: &ToolConfig) -> Result<PathBuf> {
        let tool = config.tool();
        info!(job = %self.name, tool = %tool, "Configuring");
        scoped::capture(&self.working_directory, &tool.config_log_name(), |log| {
            config.write(&self.working_directory, self.sim_id(), log)
        })
    }

    /// Run `tool` on its configuration, capturing output in `log_name`.
    pub async fn run_tool(&self, tool: Tool, log_name: &str) -> Result<ToolRun> {
        let config = self.config_file(tool);
        if !config.is_file() {
            return Err(JobError::FileNotFound(config));
        }
        let config_name = PathBuf::from(tool.config_file_name(self.sim_id()));
        let invocation = Invocation::tool(
            tool,
            self.sim_id(),
            &config_name,
            &self.working_directory,
            log_name,
        );
        let run = self.ctx.executor().execute(&invocation).await?;
        info!(job = %self.name, tool = %tool, duration_ms = run.duration_ms, "Tool finished");
        Ok(run)
    }

    /// Run the configured tool of this job: `Configured -> Executed`.
    pub async fn execute_tool(&mut self, tool: Tool) -> Result<()> {
        self.expect_status(JobStatus::Configured)?;
        self.run_tool(tool, EXECUTE_LOG).await?;
        self.set_status(JobStatus::Executed);
        Ok(())
    }

    /// Run the reporter over the results of `tool` into `result_<tool>.log`.
    pub async fn report(&self, tool: Tool) -> Result<()> {
        let results = self.results_file(tool);
        if !results.is_file() {
            return Err(JobError::FileNotFound(results));
        }
        let results_name = PathBuf::from(tool.results_file_name(self.sim_id()));
        let invocation = Invocation::report(
            &self.ctx.settings().reporter,
            tool,
            &results_name,
            self.sim_id(),
            &self.working_directory,
            &tool.result_log_name(),
        );
        self.ctx.executor().execute(&invocation).await?;
        Ok(())
    }

    pub fn record(&self, stage: Option<Stage>) -> JobRecord {
        JobRecord {
            id: self.id,
            name: self.name.clone(),
            stage,
            status: self.status,
            sim_id: self.sim_id(),
            input: self.input.clone(),
            output: self.output.clone(),
            created_at: self.created_at,
            saved_at: Utc::now(),
        }
    }

    /// Persist the job record to `<working_directory>/job.json`.
    pub fn save(&self, stage: Option<Stage>) -> Result<PathBuf> {
        let path = self.working_directory.join(RECORD_FILE);
        let json = serde_json::to_vec_pretty(&self.record(stage))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Read the record saved in `dir`.
    pub fn load_record(dir: &Path) -> Result<JobRecord> {
        let path = dir.join(RECORD_FILE);
        let json = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                JobError::FileNotFound(path.clone())
            } else {
                JobError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// The manifest a `stage` job received from its `required` predecessor.
pub(crate) fn predecessor(
    manifest: Option<&ArtifactManifest>,
    stage: Stage,
    required: Stage,
) -> Result<&ArtifactManifest> {
    manifest.ok_or(JobError::MissingPredecessor { stage, required })
}

/// A wrapper around one paraprobe analysis stage.
#[async_trait]
pub trait Job: Send {
    fn stage(&self) -> Stage;

    fn base(&self) -> &BaseJob;

    fn base_mut(&mut self) -> &mut BaseJob;

    /// Copy inputs and upstream artifacts, write the configuration.
    async fn write_input(&mut self) -> Result<()>;

    /// Run the stage's executable.
    async fn execute(&mut self) -> Result<()> {
        let tool = self.stage().tool();
        self.base_mut().execute_tool(tool).await
    }

    /// Read logs and results back into the output container.
    async fn collect_output(&mut self) -> Result<()>;

    /// Files this job hands downstream. Only available once collected.
    fn manifest(&self) -> Result<ArtifactManifest>;

    /// Configure, execute, collect and save; returns the manifest.
    async fn run(&mut self) -> Result<ArtifactManifest> {
        let stage = self.stage();
        info!(job = %self.base().name(), %stage, "Running job");
        self.write_input().await?;
        self.execute().await?;
        self.collect_output().await?;
        self.base().save(Some(stage))?;
        self.manifest()
    }
}
