//! Extraction of values from free-text tool reports.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::metrics::Metrics;

lazy_static! {
    static ref ANTENNA_NET: Regex = Regex::new(r"^Net:\s*(\w+)").unwrap();
    static ref WORST_VOLTAGE: Regex =
        Regex::new(r"Worstcase voltage\s*:\s*([\d\.\+\-e]+)\s*V").unwrap();
    static ref AVG_DROP: Regex = Regex::new(r"Average IR drop\s*:\s*([\d\.\+\-e]+)\s*V").unwrap();
    static ref WORST_DROP: Regex =
        Regex::new(r"Worstcase IR drop\s*:\s*([\d\.\+\-e]+)\s*V").unwrap();
}

/// Nets named by `Net: <name>` lines of an antenna report, in order.
pub fn antenna_nets(report: &str) -> Vec<String> {
    report
        .lines()
        .filter_map(|line| ANTENNA_NET.captures(line.trim()))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// IR drop figures of a power grid analysis report, in volts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IrDrop {
    /// The lowest voltage seen on the grid.
    pub worst_voltage: Decimal,
    /// The average drop.
    pub average_drop: Decimal,
    /// The largest drop.
    pub worst_drop: Decimal,
}

impl IrDrop {
    /// Parses the report text read from `path`.
    pub fn parse(report: &str, path: &Path) -> Result<Self> {
        let find = |re: &Regex, what: &str| -> Result<Decimal> {
            let caps = re
                .captures(report)
                .ok_or_else(|| Error::report(path, format!("no {what} line found")))?;
            config::types::parse_decimal(&caps[1])
                .ok_or_else(|| Error::report(path, format!("invalid {what} `{}`", &caps[1])))
        };
        Ok(Self {
            worst_voltage: find(&WORST_VOLTAGE, "worst-case voltage")?,
            average_drop: find(&AVG_DROP, "average IR drop")?,
            worst_drop: find(&WORST_DROP, "worst-case IR drop")?,
        })
    }

    /// Reads and parses the report at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// The figures as `ir__*` metrics.
    pub fn metrics(&self) -> Metrics {
        let mut metrics = Metrics::new();
        metrics.insert("ir__voltage__worst", self.worst_voltage);
        metrics.insert("ir__drop__avg", self.average_drop);
        metrics.insert("ir__drop__worst", self.worst_drop);
        metrics
    }
}
