//! JSON report output adapter.
//!
//! Serializes assembled reports to a file, or to stdout when no path is
//! given.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::error::StratlabError;
use crate::domain::report::BacktestReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter {
    target: Option<PathBuf>,
}

impl JsonReportAdapter {
    /// Write reports to the given file path.
    pub fn to_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            target: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Write reports to stdout.
    pub fn to_stdout() -> Self {
        Self { target: None }
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport) -> Result<(), StratlabError> {
        let json = report.to_json()?;
        match &self.target {
            Some(path) => fs::write(path, json)?,
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(json.as_bytes())?;
                handle.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}
