//! # atts-report
//!
//! Renders finished test-case reports.
//!
//! - [`HtmlReport`]: static HTML pages with gnuplot graphs, the
//!   [`atts_core::ReportRenderer`] used by the `atts` binary
//! - [`SeriesFile`]: the `x y` data files behind each graph
//! - [`PlotScript`]: gnuplot script generation and invocation
//! - [`TerminalReporter`]: colored progress and summary output

pub mod html;
pub mod plot;
pub mod series;
pub mod terminal;

pub use html::{HtmlReport, escape_html};
pub use plot::PlotScript;
pub use series::SeriesFile;
pub use terminal::{TerminalReporter, Verbosity, create_progress_callback};
