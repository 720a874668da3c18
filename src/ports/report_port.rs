//! Report output port trait.

use crate::domain::error::StratlabError;
use crate::domain::report::BacktestReport;

/// Port for emitting assembled reports (file, stdout, a response body).
pub trait ReportPort {
    fn write(&self, report: &BacktestReport) -> Result<(), StratlabError>;
}
