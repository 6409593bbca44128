//! Output container of a job.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::results::CellVolumeCdf;
use crate::summary::RangerSummary;
use crate::tool::Tool;

/// Which step of a tool produced a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Configure,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Configure => f.write_str("configure"),
            Phase::Execute => f.write_str("execute"),
        }
    }
}

/// `<phase>/<tool>`, e.g. `configure/transcoder`.
pub fn log_key(phase: Phase, tool: Tool) -> String {
    format!("{phase}/{tool}")
}

/// Logs and parsed results of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Verbatim logs keyed by [`log_key`].
    pub logs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranger: Option<RangerSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tessellator: Option<CellVolumeCdf>,

    /// Raw delocalization report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nanochem: Option<String>,
}

impl JobOutput {
    pub fn set_log(&mut self, phase: Phase, tool: Tool, text: String) {
        self.logs.insert(log_key(phase, tool), text);
    }

    pub fn log(&self, phase: Phase, tool: Tool) -> Option<&str> {
        self.logs.get(&log_key(phase, tool)).map(String::as_str)
    }

    pub fn has_logs_for(&self, tool: Tool) -> bool {
        self.log(Phase::Configure, tool).is_some() || self.log(Phase::Execute, tool).is_some()
    }

    /// Copy every log and result of `other` into `self`.
    pub fn merge(&mut self, other: &JobOutput) {
        self.logs
            .extend(other.logs.iter().map(|(k, v)| (k.clone(), v.clone())));
        if other.ranger.is_some() {
            self.ranger = other.ranger.clone();
        }
        if other.tessellator.is_some() {
            self.tessellator = other.tessellator.clone();
        }
        if other.nanochem.is_some() {
            self.nanochem = other.nanochem.clone();
        }
    }
}
