//! Paraprobe Jobs - atom probe analysis pipelines
//!
//! Wraps the paraprobe toolkit executables as jobs:
//! - Transcode and range a reconstruction (ranger)
//! - Build an edge model (surfacer) and ion distances to it (distancer)
//! - Tessellate the volume (tessellator) and analyse nanochemistry (nanochem)
//!
//! Each job owns a working directory, writes the tool configuration, runs
//! the executable and collects logs and results. `ParaprobeJob` chains the
//! stages, handing artifact manifests from one stage to the next.

pub mod descriptor;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod job;
pub mod manifest;
pub mod pipeline;
pub mod publication;
pub mod results;
pub mod scoped;
pub mod settings;
pub mod summary;
pub mod telemetry;
pub mod tool;

// Re-export key types
pub use error::{JobError, Result};
pub use executor::{ExecutableResolver, Executor, Invocation, ProcessExecutor, ToolRun};
pub use job::distancer::DistancerJob;
pub use job::nanochem::NanochemJob;
pub use job::ranger::RangerJob;
pub use job::surfacer::SurfacerJob;
pub use job::tessellator::TessellatorJob;
pub use job::{
    BaseJob, Job, JobContext, JobInput, JobOutput, JobRecord, JobStatus, Phase, Project,
    ReadMode, TemporaryOutput,
};
pub use manifest::{Artifact, ArtifactKind, ArtifactManifest};
pub use pipeline::{AnalysisFlags, ParaprobeJob, PipelineResult, StageReport};
pub use publication::{Publication, PARAPROBE_PUBLICATIONS};
pub use results::{cell_volume_cdf, CellVolumeCdf, ResultsReader};
pub use settings::Settings;
pub use summary::{RangerSummary, SummaryError};
pub use telemetry::init_tracing;
pub use tool::{SimulationId, Stage, Tool};
