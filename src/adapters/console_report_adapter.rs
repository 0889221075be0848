//! Plain-text report rendering for terminals.

use crate::domain::error::PerfolioError;
use crate::domain::report::{Cell, Report, Table};
use crate::ports::report_port::ReportPort;
use std::io::Write;

pub struct ConsoleReportAdapter;

impl ConsoleReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// `1234567.891` -> `"$ 1,234,567.89"`.
pub fn fmt_money(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("$ {}{}.{}", sign, group_thousands(int_part), frac_part)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn fmt_pct(value: f64) -> String {
    if value.is_nan() {
        return "n/a".to_string();
    }
    format!("{:.2}%", value * 100.0)
}

fn fmt_quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        let s = format!("{value:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn fmt_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        Cell::Quantity(q) if q.is_nan() => "n/a".to_string(),
        Cell::Quantity(q) => fmt_quantity(*q),
        Cell::Money(m) => fmt_money(*m),
        Cell::Percent(p) => fmt_pct(*p),
        Cell::Factor(f) if f.is_nan() => "n/a".to_string(),
        Cell::Factor(f) => format!("{f:.2}"),
        Cell::Flag(true) => "yes".to_string(),
        Cell::Flag(false) => "no".to_string(),
    }
}

fn right_aligned(cell: &Cell) -> bool {
    !matches!(cell, Cell::Text(_) | Cell::Date(_) | Cell::Flag(_))
}

fn write_table(table: &Table, out: &mut dyn Write) -> Result<(), PerfolioError> {
    if table.is_empty() {
        writeln!(out, "(no rows)")?;
        return Ok(());
    }

    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(fmt_cell).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rendered
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    // Column alignment follows the first row's cell types.
    let align_right: Vec<bool> = table.rows[0].iter().map(right_aligned).collect();

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .zip(&align_right)
        .map(|((h, w), right)| pad(h, *w, *right))
        .collect();
    writeln!(out, "{}", header.join("  ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("  "))?;

    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .zip(&align_right)
            .map(|((c, w), right)| pad(c, *w, *right))
            .collect();
        writeln!(out, "{}", line.join("  ").trim_end())?;
    }
    Ok(())
}

fn pad(s: &str, width: usize, right: bool) -> String {
    if right {
        format!("{s:>width$}")
    } else {
        format!("{s:<width$}")
    }
}

impl ReportPort for ConsoleReportAdapter {
    fn write(&self, report: &Report, out: &mut dyn Write) -> Result<(), PerfolioError> {
        writeln!(out, "=== {} ===", report.title)?;

        if let Some(summary) = &report.summary {
            writeln!(out, "{}: {}", summary.label, fmt_cell(&summary.value))?;
        }

        for table in &report.tables {
            writeln!(out)?;
            write_table(table, out)?;
        }

        if !report.warnings.is_empty() {
            writeln!(out)?;
            for warning in &report.warnings {
                writeln!(out, "warning: {warning}")?;
            }
        }
        writeln!(out)?;
        Ok(())
    }
}
