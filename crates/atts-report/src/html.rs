//! Static HTML report.
//!
//! `index.html` holds a status table followed by one section per case:
//! status, description, graphs, narrative and links to attachment pages.
//! Every attachment gets its own page with the file content in a `<pre>`.

use crate::plot::PlotScript;
use crate::series::SeriesFile;
use atts_core::report::{ReportFile, ReportGraph};
use atts_core::{CaseOutcome, RenderError, ReportRenderer};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PAGE_HEAD: &str = "<html>
  <head>
    <link rel='stylesheet' media='screen,projection' type='text/css' href='style.css' />
    <title>ATTS Report</title>
  </head>
  <body>
    <p id='banner'><img src='logo.png' alt='Logo' id='logo' /><h1>ATTS Report</h1></p>
    <div id='content'>
";

const PAGE_TAIL: &str = "  </div></body>\n</html>\n";

/// Renders reports into a directory of static HTML pages.
#[derive(Debug, Clone)]
pub struct HtmlReport {
    report_dir: PathBuf,
    gnuplot: String,
}

impl HtmlReport {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            gnuplot: "gnuplot".to_string(),
        }
    }

    /// Sets the gnuplot binary.
    pub fn with_gnuplot(mut self, gnuplot: impl Into<String>) -> Self {
        self.gnuplot = gnuplot.into();
        self
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    fn write_summary(&self, page: &mut String, outcomes: &[CaseOutcome]) {
        page.push_str("<table>\n<tr>\n<th>Name</th><th>Status</th>\n</tr>\n");
        for outcome in outcomes {
            let name = escape_html(&outcome.name);
            let _ = writeln!(
                page,
                "<tr>\n<td><a href='#{name}'>{name}</a></td><td>{}</td>\n</tr>",
                status_span(outcome.passed)
            );
        }
        page.push_str("</table>\n");
    }

    fn write_case(&self, page: &mut String, outcome: &CaseOutcome, written: &mut Vec<PathBuf>) {
        let report = &outcome.report;
        let name = escape_html(report.name());
        let _ = writeln!(page, "<h2><a name='{name}'>{name}</a></h2>");
        let _ = writeln!(page, "<p>Status: {}</p>", status_span(outcome.passed));
        let _ = writeln!(
            page,
            "<p class='description'>{}</p>",
            escape_html(report.description())
        );
        for error in [&outcome.error, &outcome.cleanup_error].into_iter().flatten() {
            let _ = writeln!(page, "<p class='error'>{}</p>", escape_html(error));
        }

        for graph in report.graphs() {
            self.write_graph(page, report.name(), graph, written);
        }

        if !report.narrative().is_empty() {
            page.push_str("<h3>Output</h3>\n<pre>");
            page.push_str(&escape_html(&report.narrative_text()));
            page.push_str("</pre>\n");
        }

        page.push_str("<h3>Additional files</h3>\n<div><ul>");
        for file in report.files() {
            match self.write_attachment(report.name(), file) {
                Ok(path) => {
                    let _ = write!(
                        page,
                        "<li><a href='{}'>{}</a> ({})</li>",
                        escape_html(&file_name(&path)),
                        escape_html(&file.name),
                        escape_html(&file.host)
                    );
                    written.push(path);
                }
                Err(e) => {
                    warn!("Could not render attachment {}: {}", file.local_path.display(), e);
                    let _ = write!(
                        page,
                        "<li>{} ({}): unavailable</li>",
                        escape_html(&file.name),
                        escape_html(&file.host)
                    );
                }
            }
        }
        page.push_str("</ul></div>\n");
    }

    fn write_graph(
        &self,
        page: &mut String,
        case_name: &str,
        graph: &ReportGraph,
        written: &mut Vec<PathBuf>,
    ) {
        let _ = writeln!(
            page,
            "<h3>Graph: <span class='blue'>{}</span></h3>\n<p class='description'>{}</p>",
            escape_html(&graph.spec.name),
            escape_html(&graph.spec.description)
        );

        let prefix = self.report_dir.join(format!("{}-{}", case_name, graph.id()));
        let plot = PlotScript::new(&graph.spec, &prefix);
        if let Err(e) = SeriesFile::new(plot.data_path()).save(graph) {
            warn!("Could not save series {}: {}", plot.data_path().display(), e);
            return;
        }
        written.push(plot.data_path());

        match plot.render(&self.gnuplot) {
            Ok(Some(image)) => {
                let _ = writeln!(
                    page,
                    "<p><img src='{}' /></p>",
                    escape_html(&file_name(&image))
                );
                written.push(image);
            }
            Ok(None) => {}
            Err(e) => warn!("Could not plot {}: {}", graph.spec.name, e),
        }
    }

    fn write_attachment(&self, case_name: &str, file: &ReportFile) -> Result<PathBuf, RenderError> {
        let bytes = std::fs::read(&file.local_path)?;
        let content = String::from_utf8_lossy(&bytes);
        let out = self
            .report_dir
            .join(format!("{}.html", file_name(&file.local_path)));

        let mut page = String::from(PAGE_HEAD);
        let _ = writeln!(
            page,
            "<h2><a name='{0}'>{0}</a></h2>",
            escape_html(case_name)
        );
        let _ = writeln!(
            page,
            "<h3>Filename: {}, Host: {}</h3>",
            escape_html(&file.name),
            escape_html(&file.host)
        );
        page.push_str("<pre>");
        page.push_str(&escape_html(&content));
        page.push_str("</pre>\n");
        page.push_str(PAGE_TAIL);

        std::fs::write(&out, page)?;
        Ok(out)
    }
}

impl ReportRenderer for HtmlReport {
    fn render(&self, outcomes: &[CaseOutcome]) -> Result<Vec<PathBuf>, RenderError> {
        std::fs::create_dir_all(&self.report_dir)?;
        let mut written = Vec::new();

        let mut page = String::from(PAGE_HEAD);
        self.write_summary(&mut page, outcomes);
        for outcome in outcomes {
            self.write_case(&mut page, outcome, &mut written);
        }
        page.push_str(PAGE_TAIL);

        let index = self.report_dir.join("index.html");
        std::fs::write(&index, page)?;

        let json = self.report_dir.join("results.json");
        let body = serde_json::to_string_pretty(outcomes)
            .map_err(|e| RenderError::Io(std::io::Error::other(e)))?;
        std::fs::write(&json, body)?;

        info!("Report written to {}", index.display());
        written.insert(0, json);
        written.insert(0, index);
        Ok(written)
    }
}

fn status_span(passed: bool) -> &'static str {
    if passed {
        "<span class='green'>successful</span>"
    } else {
        "<span class='signalred'>failed</span>"
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Escapes text for use in HTML content and single-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
