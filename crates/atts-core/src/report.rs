//! Renderer-agnostic report model.
//!
//! Each test case owns one [`ReportModel`] and fills it while it runs:
//! narrative text, attachments fetched from hosts, and time series for
//! graphs. The model knows nothing about HTML or plotting; a
//! [`crate::ReportRenderer`] turns finished models into files.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Identifier of a graph, unique within one report.
pub type GraphId = u32;

/// Format used for date x-values, both rendered and persisted.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An x-axis value: a plain number or a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Number(f64),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Number(n) => write!(f, "{n}"),
            AxisValue::Timestamp(ts) => write!(f, "{}", ts.format(DATE_FORMAT)),
        }
    }
}

impl From<f64> for AxisValue {
    fn from(value: f64) -> Self {
        AxisValue::Number(value)
    }
}

impl From<u32> for AxisValue {
    fn from(value: u32) -> Self {
        AxisValue::Number(f64::from(value))
    }
}

impl From<NaiveDateTime> for AxisValue {
    fn from(value: NaiveDateTime) -> Self {
        AxisValue::Timestamp(value)
    }
}

/// A single `(x, y)` sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: AxisValue,
    pub y: f64,
}

/// Metadata of a graph, used to (re)define it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub id: GraphId,
    pub name: String,
    pub description: String,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    /// New points are appended to the series persisted by earlier runs.
    pub persistent: bool,
    /// X-values are timestamps rather than numbers.
    pub date_x_axis: bool,
}

impl GraphSpec {
    pub fn new(id: GraphId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            x_label: None,
            y_label: None,
            persistent: false,
            date_x_axis: false,
        }
    }

    pub fn labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn date_x_axis(mut self) -> Self {
        self.date_x_axis = true;
        self
    }
}

/// A named time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportGraph {
    pub spec: GraphSpec,
    /// Points in insertion order; never sorted or deduplicated.
    pub points: Vec<DataPoint>,
}

impl ReportGraph {
    pub fn id(&self) -> GraphId {
        self.spec.id
    }
}

/// A file copied from a host to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFile {
    /// Name of the host the file came from.
    pub host: String,
    /// Where the local copy lives.
    pub local_path: PathBuf,
    /// Display name, usually the remote path.
    pub name: String,
    pub description: String,
}

/// Narrative text, attachments and graphs of one test case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    name: String,
    description: String,
    narrative: Vec<String>,
    files: Vec<ReportFile>,
    graphs: Vec<ReportGraph>,
}

impl ReportModel {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Registers a graph.
    ///
    /// Re-registering an existing id replaces its metadata and keeps the
    /// points gathered so far.
    pub fn define_graph(&mut self, spec: GraphSpec) {
        match self.graphs.iter_mut().find(|g| g.spec.id == spec.id) {
            Some(graph) => graph.spec = spec,
            None => self.graphs.push(ReportGraph {
                spec,
                points: Vec::new(),
            }),
        }
    }

    /// Appends a point to graph `id`. Unknown ids are ignored.
    pub fn add_data_point(&mut self, id: GraphId, x: impl Into<AxisValue>, y: f64) {
        match self.graphs.iter_mut().find(|g| g.spec.id == id) {
            Some(graph) => graph.points.push(DataPoint { x: x.into(), y }),
            None => debug!("Ignoring data point for undefined graph {} in {}", id, self.name),
        }
    }

    /// Appends a line of narrative text.
    pub fn add_narrative_line(&mut self, text: impl Into<String>) {
        self.narrative.push(text.into());
    }

    /// Registers an attachment. The local copy is not checked.
    pub fn add_file(
        &mut self,
        host: impl Into<String>,
        local_path: impl Into<PathBuf>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.files.push(ReportFile {
            host: host.into(),
            local_path: local_path.into(),
            name: name.into(),
            description: description.into(),
        });
    }

    pub fn narrative(&self) -> &[String] {
        &self.narrative
    }

    /// Narrative lines joined, each terminated by a line break.
    pub fn narrative_text(&self) -> String {
        self.narrative.iter().fold(String::new(), |mut acc, line| {
            acc.push_str(line);
            acc.push('\n');
            acc
        })
    }

    pub fn files(&self) -> &[ReportFile] {
        &self.files
    }

    /// Graphs in definition order.
    pub fn graphs(&self) -> &[ReportGraph] {
        &self.graphs
    }

    pub fn graph(&self, id: GraphId) -> Option<&ReportGraph> {
        self.graphs.iter().find(|g| g.spec.id == id)
    }
}

/// Rounds to two decimal places, the precision used for reported rates.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
