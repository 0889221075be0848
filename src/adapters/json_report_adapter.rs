//! JSON report rendering.

use crate::domain::error::PerfolioError;
use crate::domain::report::Report;
use crate::ports::report_port::ReportPort;
use std::io::Write;

pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// One report per line, for piping into other tools.
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &Report, out: &mut dyn Write) -> Result<(), PerfolioError> {
        let result = if self.pretty {
            serde_json::to_writer_pretty(&mut *out, report)
        } else {
            serde_json::to_writer(&mut *out, report)
        };
        result.map_err(|e| PerfolioError::Report {
            reason: e.to_string(),
        })?;
        writeln!(out)?;
        Ok(())
    }
}
