//! Invocation of the external paraprobe executables.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{JobError, Result};
use crate::settings::Settings;
use crate::tool::{SimulationId, Tool};

/// One call of an external executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Codename resolved on the resource paths.
    pub program: String,

    pub args: Vec<String>,

    /// Directory the process runs in.
    pub working_directory: PathBuf,

    /// File receiving stdout and stderr.
    pub log_file: PathBuf,

    /// Launch through the MPI launcher when ranks are configured.
    pub parallel: bool,
}

impl Invocation {
    /// `<codename> <sim_id> <config_file>` for a paraprobe tool.
    pub fn tool(
        tool: Tool,
        sim_id: SimulationId,
        config_file: &Path,
        working_directory: &Path,
        log_name: &str,
    ) -> Self {
        Self {
            program: tool.codename().to_string(),
            args: vec![sim_id.to_string(), config_file.display().to_string()],
            working_directory: working_directory.to_path_buf(),
            log_file: working_directory.join(log_name),
            parallel: tool.is_parallel(),
        }
    }

    /// `<reporter> <tool> <results_file> <sim_id>`, writing the summary to `log_name`.
    ///
    /// Like the configuration of a tool, `results_file` is resolved against
    /// `working_directory` by the reporter.
    pub fn report(
        reporter: &str,
        tool: Tool,
        results_file: &Path,
        sim_id: SimulationId,
        working_directory: &Path,
        log_name: &str,
    ) -> Self {
        Self {
            program: reporter.to_string(),
            args: vec![
                tool.name().to_string(),
                results_file.display().to_string(),
                sim_id.to_string(),
            ],
            working_directory: working_directory.to_path_buf(),
            log_file: working_directory.join(log_name),
            parallel: false,
        }
    }
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub program: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Process-execution facility used by every job.
///
/// A non-zero exit status is an error; callers never see a failed `ToolRun`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Result<ToolRun>;
}

/// Finds executables in the configured resource paths, then on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ExecutableResolver {
    resource_paths: Vec<PathBuf>,
}

impl ExecutableResolver {
    pub fn new(resource_paths: Vec<PathBuf>) -> Self {
        Self { resource_paths }
    }

    /// Absolute path of `codename`.
    ///
    /// Tools are spawned inside their job directory, so a path relative to
    /// the caller's directory would no longer point at the executable.
    pub fn resolve(&self, codename: &str) -> Result<PathBuf> {
        for root in &self.resource_paths {
            for candidate in [root.join(codename), root.join("bin").join(codename)] {
                if candidate.is_file() {
                    return Ok(std::path::absolute(&candidate)?);
                }
            }
        }
        let found = which::which(codename)
            .map_err(|_| JobError::ExecutableNotFound(codename.to_string()))?;
        Ok(std::path::absolute(found)?)
    }
}

/// Runs executables as child processes.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    resolver: ExecutableResolver,
    mpi_ranks: Option<u32>,
    mpi_launcher: String,
}

impl ProcessExecutor {
    pub fn new(resolver: ExecutableResolver) -> Self {
        Self {
            resolver,
            mpi_ranks: None,
            mpi_launcher: "mpiexec".to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            resolver: ExecutableResolver::new(settings.resource_paths.clone()),
            mpi_ranks: settings.mpi_ranks,
            mpi_launcher: settings.mpi_launcher.clone(),
        }
    }

    fn command(&self, invocation: &Invocation) -> Result<Command> {
        let program = self.resolver.resolve(&invocation.program)?;
        debug!(program = %program.display(), "Resolved executable");

        let mut command = match (invocation.parallel, self.mpi_ranks) {
            (true, Some(ranks)) => {
                let launcher = self.resolver.resolve(&self.mpi_launcher)?;
                let mut cmd = Command::new(launcher);
                cmd.arg("-n").arg(ranks.to_string()).arg(program);
                cmd
            }
            _ => Command::new(program),
        };
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_directory);
        Ok(command)
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<ToolRun> {
        let start = Instant::now();
        let mut command = self.command(invocation)?;

        let log = File::create(&invocation.log_file)?;
        command
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));

        info!(program = %invocation.program, args = ?invocation.args, "Executing");
        let status = command.spawn()?.wait().await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);
        if !status.success() {
            return Err(JobError::ToolFailed {
                tool: invocation.program.clone(),
                exit_code,
                log: invocation.log_file.clone(),
            });
        }

        Ok(ToolRun {
            program: invocation.program.clone(),
            exit_code,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_invocation_args() {
        let wd = Path::new("/work/job_ranger");
        let config = wd.join("PARAPROBE.Ranger.Config.SimID.1.json");
        let inv = Invocation::tool(Tool::Ranger, SimulationId(1), &config, wd, "log.out");
        assert_eq!(inv.program, "paraprobe-ranger");
        assert_eq!(inv.args[0], "1");
        assert!(inv.args[1].ends_with("PARAPROBE.Ranger.Config.SimID.1.json"));
        assert_eq!(inv.log_file, wd.join("log.out"));
        assert!(inv.parallel);
    }

    #[test]
    fn test_report_invocation_is_serial() {
        let wd = Path::new("/work/job_ranger");
        let inv = Invocation::report(
            "paraprobe-autoreporter",
            Tool::Ranger,
            Path::new("PARAPROBE.Ranger.Results.SimID.1.h5"),
            SimulationId(1),
            wd,
            "result_ranger.log",
        );
        assert_eq!(inv.args[0], "ranger");
        assert_eq!(inv.args[2], "1");
        assert!(!inv.parallel);
    }

    #[test]
    fn test_resolver_unknown_executable() {
        let resolver = ExecutableResolver::new(vec![]);
        let err = resolver.resolve("paraprobe-does-not-exist-anywhere").unwrap_err();
        assert!(matches!(err, JobError::ExecutableNotFound(_)));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_resolver_prefers_resource_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        let script = write_script(&dir.path().join("bin"), "paraprobe-ranger", "exit 0");

        let resolver = ExecutableResolver::new(vec![dir.path().to_path_buf()]);
        assert_eq!(resolver.resolve("paraprobe-ranger").unwrap(), script);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolver_makes_relative_resource_path_absolute() {
        // Unit tests run in the package directory.
        let scratch = tempfile::tempdir_in(".").unwrap();
        write_script(scratch.path(), "paraprobe-surfacer", "exit 0");
        let relative = PathBuf::from(scratch.path().file_name().unwrap());
        assert!(relative.is_relative());

        let resolved = ExecutableResolver::new(vec![relative])
            .resolve("paraprobe-surfacer")
            .unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(
            std::fs::canonicalize(&resolved).unwrap(),
            std::fs::canonicalize(scratch.path().join("paraprobe-surfacer")).unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_relative_resource_path_from_other_directory() {
        let scratch = tempfile::tempdir_in(".").unwrap();
        let work = tempfile::tempdir().unwrap();
        write_script(scratch.path(), "paraprobe-distancer", "echo distancing $1");

        let relative = PathBuf::from(scratch.path().file_name().unwrap());
        let executor = ProcessExecutor::new(ExecutableResolver::new(vec![relative]));
        let inv = Invocation::tool(
            Tool::Distancer,
            SimulationId(2),
            Path::new("cfg.json"),
            work.path(),
            "log.out",
        );

        executor.execute(&inv).await.expect("execute failed");
        let log = std::fs::read_to_string(work.path().join("log.out")).unwrap();
        assert!(log.contains("distancing 2"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_captures_output_in_working_directory() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_script(tools.path(), "paraprobe-ranger", "echo \"ranging $1 $2\"\npwd -P");

        let executor = ProcessExecutor::new(ExecutableResolver::new(vec![tools
            .path()
            .to_path_buf()]));
        let inv = Invocation::tool(
            Tool::Ranger,
            SimulationId(11),
            Path::new("cfg.json"),
            work.path(),
            "log.out",
        );

        let run = executor.execute(&inv).await.expect("execute failed");
        assert_eq!(run.exit_code, 0);

        let log = std::fs::read_to_string(work.path().join("log.out")).unwrap();
        assert!(log.contains("ranging 11 cfg.json"));
        let cwd = std::fs::canonicalize(work.path()).unwrap();
        assert!(log.contains(cwd.to_str().unwrap()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_failing_tool_is_error() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_script(tools.path(), "paraprobe-surfacer", "echo boom >&2\nexit 3");

        let executor = ProcessExecutor::new(ExecutableResolver::new(vec![tools
            .path()
            .to_path_buf()]));
        let inv = Invocation::tool(
            Tool::Surfacer,
            SimulationId(1),
            Path::new("cfg.json"),
            work.path(),
            "log.out",
        );

        match executor.execute(&inv).await {
            Err(JobError::ToolFailed { tool, exit_code, log }) => {
                assert_eq!(tool, "paraprobe-surfacer");
                assert_eq!(exit_code, 3);
                assert!(std::fs::read_to_string(log).unwrap().contains("boom"));
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
    }
}
