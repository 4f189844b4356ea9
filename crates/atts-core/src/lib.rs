//! # atts-core
//!
//! Lifecycle engine of the automated DTN test harness.
//!
//! A run binds every [`TestCase`] to a [`HostSet`] drawn from the
//! [`HostInventory`], then lets the [`TestRunner`] drive it through
//! `prepare → run → cleanup`. Cases fill a [`ReportModel`] with narrative,
//! attached files and graph series; the runner hands the finished reports
//! to a [`ReportRenderer`].
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  TestRunner │────▶│  TestCase   │────▶│   HostSet   │──▶ RemoteHost
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌──────────────┐    ┌─────────────┐
//! │ReportRenderer│◀───│ ReportModel │
//! └──────────────┘    └─────────────┘
//! ```
//!
//! The [`logscan`] module reconciles daemon logs after the fact: pairing of
//! produced and transferred runs, warning/error tallies, throughput and
//! memory series.

pub mod checksum;
pub mod host;
pub mod logscan;
pub mod report;
pub mod runner;
pub mod testcase;
pub mod testing;

pub use checksum::file_digest;
pub use host::{DelayedExecution, HostError, HostInfo, HostInventory, HostSet, RemoteHost};
pub use logscan::{
    LogSummary, MessageTallies, PairingDiagnostic, PairingMachine, PairingSummary, ScanError,
    read_log, summarize, tally_messages,
};
pub use report::{AxisValue, DataPoint, GraphId, GraphSpec, ReportFile, ReportGraph, ReportModel, round2};
pub use runner::{
    CaseOutcome, Phase, ProgressCallback, ProgressEvent, RenderError, ReportRenderer, RunConfig,
    RunResults, RunnerError, TestRunner,
};
pub use testcase::{CaseContext, CaseError, TestCase};
