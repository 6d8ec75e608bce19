//! Run output persistence port.

use crate::domain::error::RunnerError;
use crate::domain::report::RunOutput;
use std::path::Path;

pub trait ReportPort {
    fn write(&self, output: &RunOutput, path: &Path) -> Result<(), RunnerError>;
}
