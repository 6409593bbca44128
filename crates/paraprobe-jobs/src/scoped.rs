//! Scoped capture of a step's log into the job's working directory.
//!
//! A [`StepLog`] owns the log file for the lifetime of one step. The file is
//! flushed and closed when the guard drops, so the log is complete on every
//! exit path, including `?` returns from inside the step.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Log file owned by a single configuration or collection step.
pub struct StepLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl StepLog {
    /// Create (or truncate) `<dir>/<file_name>`.
    pub fn create(dir: &Path, file_name: &str) -> Result<Self> {
        let path = dir.join(file_name);
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line to the log and mirror it to tracing at debug level.
    pub fn line(&mut self, text: impl AsRef<str>) -> Result<()> {
        let text = text.as_ref();
        tracing::debug!(log = %self.path.display(), "{}", text);
        writeln!(self.writer, "{text}")?;
        Ok(())
    }
}

impl Write for StepLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for StepLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Run `step` with its output captured into `<dir>/<file_name>`.
///
/// The log is flushed whether `step` succeeds or fails. A failed step
/// reports its own error; flush errors only surface after a success.
pub fn capture<T>(
    dir: &Path,
    file_name: &str,
    step: impl FnOnce(&mut StepLog) -> Result<T>,
) -> Result<T> {
    let mut log = StepLog::create(dir, file_name)?;
    let value = step(&mut log)?;
    log.flush()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;

    #[test]
    fn test_capture_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let value = capture(dir.path(), "config_ranger.log", |log| {
            log.line("first")?;
            log.line("second")?;
            Ok(7)
        })
        .unwrap();

        assert_eq!(value, 7);
        let text = std::fs::read_to_string(dir.path().join("config_ranger.log")).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn test_capture_flushes_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = capture::<()>(dir.path(), "config_surfacer.log", |log| {
            log.line("before failure")?;
            Err(JobError::MissingInput("rrng_file"))
        })
        .unwrap_err();

        assert!(matches!(err, JobError::MissingInput("rrng_file")));
        let text = std::fs::read_to_string(dir.path().join("config_surfacer.log")).unwrap();
        assert_eq!(text, "before failure\n");
    }

    #[test]
    fn test_create_truncates_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "stale content\n").unwrap();
        capture(dir.path(), "a.log", |log| log.line("fresh")).unwrap();
        let text = std::fs::read_to_string(dir.path().join("a.log")).unwrap();
        assert_eq!(text, "fresh\n");
    }

    // Writes to /dev/full are buffered until the flush fails with ENOSPC.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_step_error_wins_over_flush_error() {
        let err = capture::<()>(Path::new("/dev"), "full", |log| {
            log.line("partial")?;
            Err(JobError::MissingInput("pos_file"))
        })
        .unwrap_err();
        assert!(matches!(err, JobError::MissingInput("pos_file")));

        let err = capture(Path::new("/dev"), "full", |log| log.line("complete")).unwrap_err();
        assert!(matches!(err, JobError::Io(_)));
    }
}
