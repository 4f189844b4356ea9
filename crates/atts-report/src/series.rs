//! Two-column series files backing the plots.
//!
//! One `x y` row per point. Date x-values span two whitespace-separated
//! columns (`2010-06-17 14:00:00 812.5`), which is why date plots read
//! columns 1 and 3.

use atts_core::report::{AxisValue, DATE_FORMAT, DataPoint, ReportGraph};
use chrono::NaiveDateTime;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Series data of one graph on disk.
#[derive(Debug, Clone)]
pub struct SeriesFile {
    path: PathBuf,
}

impl SeriesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the graph's points. Persistent graphs append to what earlier
    /// runs saved; other graphs replace it.
    pub fn save(&self, graph: &ReportGraph) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(graph.spec.persistent)
            .truncate(!graph.spec.persistent)
            .open(&self.path)?;

        for point in &graph.points {
            writeln!(file, "{} {}", point.x, point.y)?;
        }
        Ok(())
    }

    /// Reads every row back. Malformed rows are skipped with a warning.
    pub fn load(&self) -> io::Result<Vec<DataPoint>> {
        let text = std::fs::read_to_string(&self.path)?;
        let mut points = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match parse_row(line) {
                Some(point) => points.push(point),
                None => warn!("Skipping malformed row in {}: {}", self.path.display(), line),
            }
        }
        Ok(points)
    }
}

fn parse_row(line: &str) -> Option<DataPoint> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [date, time, y] => {
            let ts = NaiveDateTime::parse_from_str(&format!("{date} {time}"), DATE_FORMAT).ok()?;
            Some(DataPoint {
                x: AxisValue::Timestamp(ts),
                y: y.parse().ok()?,
            })
        }
        [x, y] => Some(DataPoint {
            x: AxisValue::Number(x.parse().ok()?),
            y: y.parse().ok()?,
        }),
        _ => None,
    }
}
