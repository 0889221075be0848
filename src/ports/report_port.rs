//! Report presentation port trait.

use std::io::Write;

use crate::domain::error::PerfolioError;
use crate::domain::report::Report;

/// Port for rendering a [`Report`] to an output stream.
pub trait ReportPort {
    fn write(&self, report: &Report, out: &mut dyn Write) -> Result<(), PerfolioError>;
}
