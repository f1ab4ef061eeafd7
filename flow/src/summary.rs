//! The per-corner timing summary table.

use std::fmt::Display;
use std::path::Path;

use itertools::Itertools;

use crate::error::Result;
use crate::metrics::{MetricValue, Metrics, corner_metric};

/// Label of the row holding the cross-corner aggregates.
pub const OVERALL: &str = "Overall";

#[derive(Copy, Clone)]
enum Format {
    Count,
    Slack,
}

const COLUMNS: [(&str, &str, Format); 8] = [
    ("Hold Worst Slack", "timing__hold__ws", Format::Slack),
    ("Hold Violations", "timing__hold_vio__count", Format::Count),
    ("Hold Reg to Reg Violations", "timing__hold_r2r_vio__count", Format::Count),
    ("Setup Worst Slack", "timing__setup__ws", Format::Slack),
    ("Setup Violations", "timing__setup_vio__count", Format::Count),
    ("Setup Reg to Reg Violations", "timing__setup_r2r_vio__count", Format::Count),
    ("Max Cap Violations", "design__max_cap_violation__count", Format::Count),
    ("Max Slew Violations", "design__max_slew_violation__count", Format::Count),
];

fn format_cell(value: Option<MetricValue>, format: Format) -> String {
    match (value, format) {
        (None, _) => "?".to_string(),
        (Some(MetricValue::Finite(d)), Format::Count) => d.trunc().normalize().to_string(),
        (Some(MetricValue::Finite(d)), Format::Slack) => format!("{:.4}", d.round_dp(4)),
        (Some(inf), _) => inf.to_string(),
    }
}

/// A table of timing results with one `Overall` row and one row per corner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimingSummary {
    rows: Vec<(String, Vec<String>)>,
}

impl TimingSummary {
    /// Builds the table from aggregated metrics.
    pub fn new<S: AsRef<str>>(metrics: &Metrics, corners: &[S]) -> Self {
        let row = |label: &str, name: &dyn Fn(&str) -> String| {
            let cells: Vec<String> = COLUMNS
                .iter()
                .map(|(_, base, format)| format_cell(metrics.get(&name(base)), *format))
                .collect();
            (label.to_string(), cells)
        };
        let mut rows = vec![row(OVERALL, &|base: &str| base.to_string())];
        for corner in corners {
            let corner = corner.as_ref();
            rows.push(row(corner, &|base: &str| corner_metric(base, corner)));
        }
        Self { rows }
    }

    /// The cells of the row labelled `label`.
    pub fn row(&self, label: &str) -> Option<&[String]> {
        self.rows
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, cells)| cells.as_slice())
    }

    /// Writes the table to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl Display for TimingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header = std::iter::once("Corner")
            .chain(COLUMNS.iter().map(|(title, _, _)| *title))
            .collect::<Vec<_>>();
        let mut widths = header.iter().map(|h| h.len()).collect::<Vec<_>>();
        for (label, cells) in &self.rows {
            widths[0] = widths[0].max(label.len());
            for (w, cell) in widths[1..].iter_mut().zip(cells) {
                *w = (*w).max(cell.len());
            }
        }
        writeln!(f, "{}", pad_row(header.iter().copied(), &widths))?;
        writeln!(f, "{}", widths.iter().map(|w| "-".repeat(*w)).join("-+-"))?;
        for (label, cells) in &self.rows {
            let row = std::iter::once(label.as_str()).chain(cells.iter().map(String::as_str));
            writeln!(f, "{}", pad_row(row, &widths))?;
        }
        Ok(())
    }
}

fn pad_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = *width))
        .join(" | ")
}
