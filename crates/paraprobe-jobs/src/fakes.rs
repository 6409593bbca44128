//! In-memory fakes for the external tools (testing only)
//!
//! `FakeExecutor` stands in for the paraprobe executables and the reporter,
//! `MemoryResultsReader` for HDF5 access.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{JobError, Result};
use crate::executor::{Executor, Invocation, ToolRun};
use crate::results::ResultsReader;
use crate::tool::{SimulationId, Tool};

/// Ranging summary the fake reporter prints by default.
pub const DEFAULT_RANGING_SUMMARY: &str = "Total ions: 250000, ranged\n\
                                           Fe 70.5, at.%, Fe\n\
                                           Cr 18.25, at.%, Cr\n\
                                           Ni 11.25, at.%, Ni\n";

/// Delocalization report the fake reporter prints by default.
pub const DEFAULT_NANOCHEM_REPORT: &str = "delocalization task 0\n\
                                           isosurface 0.01 objects 12 volume 5.2\n";

// ---------------------------------------------------------------------------
// FakeExecutor
// ---------------------------------------------------------------------------

/// Executor that behaves like a successful paraprobe installation.
///
/// Tool invocations check that their configuration exists, write `log_file`
/// and drop a results file into the working directory. Any other program is
/// treated as the reporter and prints the configured summaries.
#[derive(Debug)]
pub struct FakeExecutor {
    invocations: Mutex<Vec<Invocation>>,
    ranging_summary: String,
    nanochem_report: String,
    failing: Option<String>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            ranging_summary: DEFAULT_RANGING_SUMMARY.to_string(),
            nanochem_report: DEFAULT_NANOCHEM_REPORT.to_string(),
            failing: None,
        }
    }
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ranging_summary(mut self, summary: impl Into<String>) -> Self {
        self.ranging_summary = summary.into();
        self
    }

    pub fn with_nanochem_report(mut self, report: impl Into<String>) -> Self {
        self.nanochem_report = report.into();
        self
    }

    /// Make `program` exit with code 1.
    pub fn failing_on(mut self, program: impl Into<String>) -> Self {
        self.failing = Some(program.into());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Programs invoked so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|inv| inv.program)
            .collect()
    }

    fn run_tool(&self, tool: Tool, invocation: &Invocation) -> Result<()> {
        let wd = &invocation.working_directory;
        let (sim, config) = match invocation.args.as_slice() {
            [sim, config] => (sim, config),
            args => return Err(usage(invocation, &format!("unexpected arguments {args:?}"))),
        };
        let sim_id = sim
            .parse::<u64>()
            .map(SimulationId)
            .map_err(|_| usage(invocation, &format!("invalid simulation id {sim}")))?;

        let config = wd.join(config);
        if !config.is_file() {
            return Err(JobError::FileNotFound(config));
        }
        std::fs::write(
            &invocation.log_file,
            format!("{} {sim_id} {}\nfinished\n", tool.codename(), config.display()),
        )?;
        std::fs::write(
            wd.join(tool.results_file_name(sim_id)),
            format!("{} results for simulation {sim_id}\n", tool.title()),
        )?;
        Ok(())
    }

    fn run_reporter(&self, invocation: &Invocation) -> Result<()> {
        let (tool, results) = match invocation.args.as_slice() {
            [tool, results, _sim] => (tool.as_str(), invocation.working_directory.join(results)),
            args => return Err(usage(invocation, &format!("unexpected arguments {args:?}"))),
        };
        // The reporter runs inside the working directory like the real one.
        if !results.is_file() {
            return Err(JobError::FileNotFound(results));
        }
        let text = match tool {
            "ranger" => self.ranging_summary.as_str(),
            "nanochem" => self.nanochem_report.as_str(),
            _ => "",
        };
        std::fs::write(&invocation.log_file, text)?;
        Ok(())
    }
}

/// Fail like a tool printing its usage: message in the log, exit code 2.
fn usage(invocation: &Invocation, message: &str) -> JobError {
    if let Err(e) = std::fs::write(&invocation.log_file, format!("{message}\n")) {
        return JobError::Io(e);
    }
    JobError::ToolFailed {
        tool: invocation.program.clone(),
        exit_code: 2,
        log: invocation.log_file.clone(),
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<ToolRun> {
        self.invocations.lock().unwrap().push(invocation.clone());

        if self.failing.as_deref() == Some(invocation.program.as_str()) {
            std::fs::write(&invocation.log_file, "fake failure\n")?;
            return Err(JobError::ToolFailed {
                tool: invocation.program.clone(),
                exit_code: 1,
                log: invocation.log_file.clone(),
            });
        }

        match Tool::from_codename(&invocation.program) {
            Some(tool) => self.run_tool(tool, invocation)?,
            None => self.run_reporter(invocation)?,
        }

        Ok(ToolRun {
            program: invocation.program.clone(),
            exit_code: 0,
            duration_ms: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryResultsReader
// ---------------------------------------------------------------------------

/// Returns the same cell volumes for every results file.
#[derive(Debug, Default, Clone)]
pub struct MemoryResultsReader {
    volumes: Vec<f64>,
}

impl MemoryResultsReader {
    pub fn new(volumes: Vec<f64>) -> Self {
        Self { volumes }
    }
}

impl ResultsReader for MemoryResultsReader {
    fn cell_volumes(&self, results_file: &Path, _: SimulationId, _: u32) -> Result<Vec<f64>> {
        if !results_file.is_file() {
            return Err(JobError::FileNotFound(results_file.to_path_buf()));
        }
        Ok(self.volumes.clone())
    }
}
