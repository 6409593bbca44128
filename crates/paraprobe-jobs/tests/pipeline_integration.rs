//! Integration tests for the paraprobe pipeline with fake tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use paraprobe_jobs::fakes::{FakeExecutor, MemoryResultsReader};
use paraprobe_jobs::{
    BaseJob, JobContext, JobError, JobStatus, ParaprobeJob, Phase, Project, Settings,
    SimulationId, Stage, Tool,
};

const SIM: SimulationId = SimulationId(636502001);

struct Fixture {
    _dir: tempfile::TempDir,
    inputs: PathBuf,
    project: Project,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let inputs = dir.path().join("inputs");
    std::fs::create_dir(&inputs).unwrap();
    std::fs::write(inputs.join("R5076_44076.pos"), b"reconstruction").unwrap();
    std::fs::write(inputs.join("R5076_44076.rrng"), b"ranging").unwrap();
    let project = Project::new(dir.path().join("project")).unwrap();
    Fixture {
        _dir: dir,
        inputs,
        project,
    }
}

fn context(executor: Arc<FakeExecutor>, volumes: Vec<f64>) -> JobContext {
    JobContext::new(
        Settings::default().with_sim_id(SIM),
        executor,
        Arc::new(MemoryResultsReader::new(volumes)),
    )
}

fn top_job(fx: &Fixture, ctx: JobContext) -> ParaprobeJob {
    let mut job = ParaprobeJob::new(fx.project.clone(), "apt", ctx).unwrap();
    job.set_pos_file(fx.inputs.join("R5076_44076.pos"));
    job.set_rrng_file(fx.inputs.join("R5076_44076.rrng"));
    job
}

fn has_file(dir: &Path, name: &str) -> bool {
    dir.join(name).is_file()
}

/// Test: four stages run in order and leave configure/execute logs
#[tokio::test]
async fn test_four_stage_pipeline() {
    let fx = fixture();
    let executor = Arc::new(FakeExecutor::new());
    let mut job = top_job(&fx, context(executor.clone(), vec![2.0, 0.5, 1.0, 4.0]));
    job.analyse_tessellator();

    let result = job.run().await.expect("pipeline failed");

    let stages: Vec<Stage> = result.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Ranger,
            Stage::Surfacer,
            Stage::Distancer,
            Stage::Tessellator
        ]
    );
    assert_eq!(job.status(), JobStatus::Collected);

    let output = job.output();
    for tool in [
        Tool::Transcoder,
        Tool::Ranger,
        Tool::Surfacer,
        Tool::Distancer,
        Tool::Tessellator,
    ] {
        assert!(output.log(Phase::Configure, tool).is_some(), "configure/{tool}");
        assert!(output.log(Phase::Execute, tool).is_some(), "execute/{tool}");
    }
    assert!(!output.has_logs_for(Tool::Nanochem));
    assert!(job.nanochem_report().is_none());

    assert_eq!(
        executor.programs(),
        vec![
            "paraprobe-transcoder",
            "paraprobe-ranger",
            "paraprobe-autoreporter",
            "paraprobe-surfacer",
            "paraprobe-distancer",
            "paraprobe-tessellator",
        ]
    );
}

/// Test: ranger summary and tessellator distribution reach the top job
#[tokio::test]
async fn test_results_are_aggregated() {
    let fx = fixture();
    let executor = Arc::new(FakeExecutor::new());
    let mut job = top_job(&fx, context(executor, vec![3.0, 1.0, 2.0]));
    job.analyse_tessellator();
    job.run().await.expect("pipeline failed");

    let summary = job.ranger_summary().expect("ranger summary");
    assert_eq!(summary.ion_count, 250_000);
    assert_eq!(summary.get("Fe"), Some(70.5));
    assert_eq!(summary.unit, "at. wt%");

    let cdf = job.tessellator_cdf().expect("cell volume distribution");
    assert_eq!(cdf.volumes, vec![1.0, 2.0, 3.0]);
    assert_eq!(*cdf.cumulative.last().unwrap(), 1.0);

    let tess_dir = fx.project.job_directory("apt_tessellator");
    let report = std::fs::read_to_string(tess_dir.join("result_tessellator.log")).unwrap();
    assert!(report.contains("cells 3"));
}

/// Test: sub-jobs get their own working directories with copied artifacts
#[tokio::test]
async fn test_artifacts_are_copied_forward() {
    let fx = fixture();
    let mut job = top_job(&fx, context(Arc::new(FakeExecutor::new()), vec![1.0]));
    job.analyse_distancer();
    let result = job.run().await.expect("pipeline failed");

    let distancer_dir = fx.project.job_directory("apt_distancer");
    assert_eq!(result.stages[2].working_directory, distancer_dir);
    for name in [
        "R5076_44076.pos",
        "R5076_44076.rrng",
        "PARAPROBE.Transcoder.Config.SimID.636502001.json",
        "PARAPROBE.Transcoder.Results.SimID.636502001.h5",
        "PARAPROBE.Ranger.Config.SimID.636502001.json",
        "PARAPROBE.Ranger.Results.SimID.636502001.h5",
        "PARAPROBE.Surfacer.Config.SimID.636502001.json",
        "PARAPROBE.Surfacer.Results.SimID.636502001.h5",
        "PARAPROBE.Distancer.Config.SimID.636502001.json",
        "PARAPROBE.Distancer.Results.SimID.636502001.h5",
    ] {
        assert!(has_file(&distancer_dir, name), "{name} missing");
    }

    let ranger = &result.manifests[&Stage::Ranger];
    assert_eq!(ranger.len(), 4);
    assert_eq!(result.manifests[&Stage::Distancer].len(), 2);
}

/// Test: enabling nanochem pulls in its prerequisites and collects the report
#[tokio::test]
async fn test_nanochem_implies_prerequisites() {
    let fx = fixture();
    let executor = Arc::new(FakeExecutor::new().with_nanochem_report("isosurface objects 3\n"));
    let mut job = top_job(&fx, context(executor, Vec::new()));
    job.analyse_nanochem();

    let flags = job.flags();
    assert!(flags.ranger && flags.surfacer && flags.distancer && flags.nanochem);
    assert!(!flags.tessellator);

    let result = job.run().await.expect("pipeline failed");
    assert_eq!(result.stage_count(), 4);
    assert!(!result.ran(Stage::Tessellator));
    assert_eq!(job.nanochem_report(), Some("isosurface objects 3\n"));
    assert!(job.output().has_logs_for(Tool::Nanochem));
    assert!(job.tessellator_cdf().is_none());
}

/// Test: a failing tool aborts the pipeline and later stages never run
#[tokio::test]
async fn test_tool_failure_aborts_pipeline() {
    let fx = fixture();
    let executor = Arc::new(FakeExecutor::new().failing_on(Tool::Surfacer.codename()));
    let mut job = top_job(&fx, context(executor.clone(), Vec::new()));
    job.analyse_distancer();

    match job.run().await {
        Err(JobError::ToolFailed { tool, exit_code, log }) => {
            assert_eq!(tool, "paraprobe-surfacer");
            assert_eq!(exit_code, 1);
            assert!(log.ends_with("log.out"));
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
    assert!(!executor
        .programs()
        .iter()
        .any(|p| p == "paraprobe-distancer"));
    assert!(!fx.project.job_directory("apt_distancer").exists());
}

/// Test: an unparsable ranging summary is a typed error
#[tokio::test]
async fn test_bad_ranging_summary_fails() {
    let fx = fixture();
    let executor = Arc::new(FakeExecutor::new().with_ranging_summary("Total ions: many\n"));
    let mut job = top_job(&fx, context(executor, Vec::new()));
    job.analyse_ranger();

    assert!(matches!(job.run().await, Err(JobError::Summary(_))));
}

/// Test: the top job and every sub-job leave a loadable record
#[tokio::test]
async fn test_records_are_saved() {
    let fx = fixture();
    let mut job = top_job(&fx, context(Arc::new(FakeExecutor::new()), Vec::new()));
    job.analyse_surfacer();
    job.run().await.expect("pipeline failed");

    let top = BaseJob::load_record(job.working_directory()).unwrap();
    assert_eq!(top.status, JobStatus::Collected);
    assert_eq!(top.stage, None);
    assert!(top.output.ranger.is_some());
    assert!(top.output.log(Phase::Execute, Tool::Surfacer).is_some());

    let surfacer = BaseJob::load_record(&fx.project.job_directory("apt_surfacer")).unwrap();
    assert_eq!(surfacer.stage, Some(Stage::Surfacer));
    assert_eq!(surfacer.sim_id, SIM);
}

/// Test: rerunning replaces stale sub-job directories
#[tokio::test]
async fn test_rerun_starts_from_clean_directories() {
    let fx = fixture();
    let stale = fx.project.job_directory("apt_ranger").join("stale.txt");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, b"old").unwrap();

    let mut job = top_job(&fx, context(Arc::new(FakeExecutor::new()), Vec::new()));
    job.analyse_ranger();
    job.run().await.expect("pipeline failed");
    assert!(!stale.exists());
}

/// Test: the top job needs both input files before anything runs
#[tokio::test]
async fn test_missing_inputs_run_nothing() {
    let fx = fixture();
    let executor = Arc::new(FakeExecutor::new());
    let mut job = ParaprobeJob::new(fx.project.clone(), "apt", context(executor.clone(), Vec::new()))
        .unwrap();
    job.set_pos_file(fx.inputs.join("R5076_44076.pos"));
    job.analyse_ranger();

    assert!(matches!(
        job.run().await,
        Err(JobError::MissingInput("rrng_file"))
    ));
    assert!(executor.invocations().is_empty());
}
