//! Paraprobe - atom probe analysis pipeline CLI
//!
//! The `paraprobe` command runs the paraprobe tool chain as a sequence of jobs.
//!
//! ## Commands
//!
//! - `run`: Range a reconstruction and run the requested analyses
//! - `show`: Print a saved job record
//! - `citations`: Print the publications to cite
//!
//! Build with `--features hdf5` to run the tessellator stage.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paraprobe_jobs::{
    init_tracing, AnalysisFlags, BaseJob, JobContext, ParaprobeJob, PipelineResult, Project, Settings,
    SimulationId, Stage, PARAPROBE_PUBLICATIONS,
};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "paraprobe")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run the paraprobe atom probe analysis tools as jobs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and results
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the analysis pipeline on a reconstruction
    Run {
        /// Reconstructed point cloud (POS, APT, ...)
        #[arg(long)]
        pos: PathBuf,

        /// Ranging definitions (RRNG, RNG, ...)
        #[arg(long)]
        rrng: PathBuf,

        /// Name of the top-level job
        #[arg(short, long, default_value = "paraprobe")]
        name: String,

        /// Directory holding the job working directories
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Stages to run; prerequisites are added automatically
        #[arg(
            short,
            long,
            value_delimiter = ',',
            default_value = "ranger",
            value_name = "STAGE,..."
        )]
        analyse: Vec<Stage>,

        /// TOML settings file (default: PARAPROBE_* environment variables)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Simulation id used in artifact names
        #[arg(long)]
        sim_id: Option<u64>,

        /// Run the parallel tools on this many MPI ranks
        #[arg(long)]
        mpi_ranks: Option<u32>,

        /// Directory searched for the paraprobe executables (repeatable)
        #[arg(long = "resource-path")]
        resource_paths: Vec<PathBuf>,
    },

    /// Print a saved job record
    Show {
        /// Working directory of the job
        job_dir: PathBuf,
    },

    /// Print the publications to cite for paraprobe results
    Citations,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            pos,
            rrng,
            name,
            project,
            analyse,
            settings,
            sim_id,
            mpi_ranks,
            resource_paths,
        } => {
            let settings = load_settings(settings.as_deref(), sim_id, mpi_ranks, resource_paths)?;
            cmd_run(settings, &project, &name, pos, rrng, &analyse, cli.json).await
        }
        Commands::Show { job_dir } => cmd_show(&job_dir, cli.json),
        Commands::Citations => cmd_citations(cli.json),
    }
}

/// Settings from the file or environment, with command-line overrides.
fn load_settings(
    path: Option<&Path>,
    sim_id: Option<u64>,
    mpi_ranks: Option<u32>,
    resource_paths: Vec<PathBuf>,
) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => Settings::from_toml_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::from_env(),
    };
    if let Some(sim_id) = sim_id {
        settings = settings.with_sim_id(SimulationId(sim_id));
    }
    if let Some(ranks) = mpi_ranks {
        settings = settings.with_mpi_ranks(ranks);
    }
    for path in resource_paths {
        settings = settings.with_resource_path(path);
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

/// Run the pipeline
async fn cmd_run(
    settings: Settings,
    project: &Path,
    name: &str,
    pos: PathBuf,
    rrng: PathBuf,
    stages: &[Stage],
    json: bool,
) -> Result<()> {
    check_stages_supported(stages)?;
    let project = Project::new(project)
        .with_context(|| format!("Failed to create project at {}", project.display()))?;
    let ctx = JobContext::from_settings(settings);

    let mut job = ParaprobeJob::new(project, name, ctx).context("Failed to create job")?;
    job.set_pos_file(pos);
    job.set_rrng_file(rrng);
    for &stage in stages {
        job.analyse(stage);
    }

    info!(job = %name, "Running paraprobe pipeline");
    let result = job.run().await.context("Pipeline failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&job, &result);
    }
    Ok(())
}

/// Refuse stages whose results this build cannot read, before any tool runs.
fn check_stages_supported(stages: &[Stage]) -> Result<()> {
    let flags = AnalysisFlags::from_stages(stages.iter().copied());
    if flags.tessellator && !cfg!(feature = "hdf5") {
        anyhow::bail!(
            "the tessellator stage needs HDF5 support; rebuild with `--features hdf5`"
        );
    }
    Ok(())
}

fn print_result(job: &ParaprobeJob, result: &PipelineResult) {
    println!("Job: {}", job.name());
    println!("Working directory: {}", job.working_directory().display());
    println!("Duration: {} ms", result.duration_ms);
    println!();

    for stage in &result.stages {
        println!(
            "  {:<12} {:>8} ms  {} artifacts  {}",
            stage.stage.to_string(),
            stage.duration_ms,
            stage.artifacts,
            stage.working_directory.display()
        );
    }

    if let Some(summary) = job.ranger_summary() {
        println!();
        println!("Ranged ions: {}", summary.ion_count);
        for (key, value) in &summary.values {
            println!("  {key:<8} {value:>10.4} {}", summary.unit);
        }
    }

    if let Some(cdf) = job.tessellator_cdf() {
        println!();
        println!("Tessellation cells: {}", cdf.len());
        if let Some(median) = cdf.quantile(0.5) {
            println!("  median cell volume: {median:.4} nm^3");
        }
    }

    if let Some(report) = job.nanochem_report() {
        println!();
        println!("Nanochem report:");
        println!("{report}");
    }
}

/// Print a saved job record
fn cmd_show(job_dir: &Path, json: bool) -> Result<()> {
    let record = BaseJob::load_record(job_dir)
        .with_context(|| format!("Failed to read job record in {}", job_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("job {}", record.id);
    println!("Name:    {}", record.name);
    if let Some(stage) = record.stage {
        println!("Stage:   {stage}");
    }
    println!("Status:  {:?}", record.status);
    println!("SimID:   {}", record.sim_id);
    println!(
        "Saved:   {}",
        record.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(pos) = &record.input.pos_file {
        println!("Pos:     {}", pos.display());
    }
    if let Some(rrng) = &record.input.rrng_file {
        println!("Rrng:    {}", rrng.display());
    }
    println!();
    for (key, log) in &record.output.logs {
        println!("log/{key}: {} lines", log.lines().count());
    }
    if let Some(summary) = &record.output.ranger {
        println!("ranger: {} ions, {} keys", summary.ion_count, summary.values.len());
    }
    if let Some(cdf) = &record.output.tessellator {
        println!("tessellator: {} cells", cdf.len());
    }
    Ok(())
}

/// Print the publications to cite
fn cmd_citations(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(PARAPROBE_PUBLICATIONS)?);
        return Ok(());
    }
    for publication in PARAPROBE_PUBLICATIONS {
        println!("{}", publication.citation());
        println!("  {}", publication.url);
    }
    Ok(())
}
