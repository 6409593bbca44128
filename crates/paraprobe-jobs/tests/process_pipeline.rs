//! End-to-end run through `ProcessExecutor` with shell-script tools.
//!
//! The test changes the process directory to exercise relative project and
//! resource paths, so this file holds a single test.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use paraprobe_jobs::fakes::{MemoryResultsReader, DEFAULT_RANGING_SUMMARY};
use paraprobe_jobs::{
    JobContext, ParaprobeJob, Phase, ProcessExecutor, Project, Settings, SimulationId, Stage,
    Tool,
};

const SIM: SimulationId = SimulationId(3);
const REPORTER: &str = "paraprobe-autoreporter";

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Tools that insist on their configuration in the current directory.
fn install_tools(dir: &Path) {
    std::fs::create_dir_all(dir.join("bin")).unwrap();
    for tool in Tool::all() {
        let body = format!(
            "test -f \"$2\" || {{ echo \"no config $2 in $(pwd)\"; exit 5; }}\n\
             echo \"{} $1 $2\"\n\
             : > \"{}\"",
            tool.codename(),
            tool.results_file_name(SIM)
        );
        write_script(&dir.join("bin"), tool.codename(), &body);
    }

    let reporter = format!(
        "test -f \"$2\" || {{ echo \"missing $2 from $(pwd)\"; exit 4; }}\n\
         case \"$1\" in\n\
         ranger)\n\
         cat <<'SUMMARY'\n\
         {DEFAULT_RANGING_SUMMARY}SUMMARY\n\
         ;;\n\
         nanochem) echo \"delocalization finished\" ;;\n\
         esac"
    );
    write_script(dir, REPORTER, &reporter);
}

#[tokio::test]
async fn test_relative_paths_with_script_tools() {
    let dir = tempfile::tempdir().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    install_tools(Path::new("tools"));
    std::fs::write("R5076.pos", b"reconstruction").unwrap();
    std::fs::write("R5076.rrng", b"ranging").unwrap();

    let mut settings = Settings::default().with_sim_id(SIM);
    settings.resource_paths = vec![PathBuf::from("tools")];
    settings.mpi_ranks = None;
    settings.reporter = REPORTER.to_string();
    let executor = Arc::new(ProcessExecutor::from_settings(&settings));
    let ctx = JobContext::new(
        settings,
        executor,
        Arc::new(MemoryResultsReader::new(vec![2.0, 0.5, 1.0])),
    );

    let project = Project::new("proj").unwrap();
    let mut job = ParaprobeJob::new(project, "apt", ctx).unwrap();
    job.set_pos_file("R5076.pos");
    job.set_rrng_file("R5076.rrng");
    job.analyse_tessellator().analyse_nanochem();

    let result = job.run().await;
    std::env::set_current_dir(previous).unwrap();
    let result = result.expect("pipeline failed");

    assert_eq!(result.stage_count(), Stage::all().len());
    assert!(job.working_directory().is_absolute());
    for report in &result.stages {
        assert!(report.working_directory.is_absolute());
        assert!(report.working_directory.starts_with(job.working_directory().parent().unwrap()));
    }

    let summary = job.ranger_summary().expect("no ranging summary");
    assert_eq!(summary.ion_count, 250_000);
    assert_eq!(job.tessellator_cdf().map(|cdf| cdf.len()), Some(3));
    assert!(job
        .nanochem_report()
        .is_some_and(|report| report.contains("delocalization finished")));

    let ranger_log = job
        .output()
        .log(Phase::Execute, Tool::Ranger)
        .expect("no ranger log");
    assert!(ranger_log.contains("paraprobe-ranger 3 PARAPROBE.Ranger.Config.SimID.3.json"));
}
