//! CSV candlestick datasets.
//!
//! Columns: `start,end,open,close,high,low`. Bounds are parsed on the x-axis,
//! prices on the y-axis, each in the textual form of its [`ScalarKind`].

use anyhow::{Context, Result};
use candlecache_core::{Candlestick, ScalarKind};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Row {
    start: String,
    end: String,
    open: String,
    close: String,
    high: String,
    low: String,
}

impl Row {
    fn parse(&self, x_axis: ScalarKind, y_axis: ScalarKind) -> Result<Candlestick> {
        Ok(Candlestick::with_values(
            x_axis.parse(&self.start).context("start")?,
            x_axis.parse(&self.end).context("end")?,
            y_axis.parse(&self.open).context("open")?,
            y_axis.parse(&self.close).context("close")?,
            y_axis.parse(&self.high).context("high")?,
            y_axis.parse(&self.low).context("low")?,
        ))
    }
}

/// Read every candlestick in a CSV file.
pub fn load_csv(path: &Path, x_axis: ScalarKind, y_axis: ScalarKind) -> Result<Vec<Candlestick>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open dataset {}", path.display()))?;
    read_csv(file, x_axis, y_axis).with_context(|| format!("read dataset {}", path.display()))
}

/// Read candlesticks from any CSV source.
pub fn read_csv<R: std::io::Read>(
    reader: R,
    x_axis: ScalarKind,
    y_axis: ScalarKind,
) -> Result<Vec<Candlestick>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut sticks = Vec::new();
    for (i, row) in rdr.deserialize::<Row>().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = row.with_context(|| format!("line {line}"))?;
        let stick = row
            .parse(x_axis, y_axis)
            .with_context(|| format!("line {line}"))?;
        sticks.push(stick);
    }
    tracing::debug!(rows = sticks.len(), "dataset loaded");
    Ok(sticks)
}
