use crate::tasks::figures::Figure;
use anyhow::{Context, Result};
use csv::Writer;
use log::info;
use serde::Serialize;
use std::path::Path;

/// A single drawn value, as written to the per-figure CSV.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataRow {
    pub figure: String,
    pub panel: usize,
    pub category: String,
    pub series: String,
    pub value: f64,
}

impl DataRow {
    pub fn new(figure: &Figure, panel: usize, category: &str, series: &str, value: f64) -> DataRow {
        DataRow {
            figure: format!("{figure}"),
            panel,
            category: category.to_string(),
            series: series.to_string(),
            value,
        }
    }
}

pub fn write_rows(path: &Path, rows: &[DataRow]) -> Result<()> {
    let mut writer = Writer::from_path(path)
        .with_context(|| format!("error creating CSV file (path={})", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("wrote {} rows to: {}", rows.len(), path.display());
    Ok(())
}
