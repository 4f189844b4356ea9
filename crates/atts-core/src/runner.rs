//! Test runner enforcing the case lifecycle.
//!
//! The runner executes cases sequentially. For each case it calls
//! `prepare`, then `run` if `prepare` succeeded, then `cleanup`
//! unconditionally. Errors and panics from any phase are caught, logged and
//! recorded on the case's [`CaseOutcome`]; they never stop the remaining
//! cases. When every case is done the finished reports go to the renderer.
//!
//! # Example
//!
//! ```no_run
//! use atts_core::{RunConfig, TestCase, TestRunner};
//!
//! # async fn demo(cases: Vec<Box<dyn TestCase>>) {
//! let runner = TestRunner::new(cases);
//! let results = runner.run(&RunConfig::default()).await.unwrap();
//!
//! println!("Passed: {}", results.passed_count());
//! # }
//! ```

use crate::report::ReportModel;
use crate::testcase::{CaseError, TestCase};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors that can occur before any case runs.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// No cases matched the filter.
    #[error("no test cases matched filter: {0}")]
    NoMatchingCases(String),
}

/// Errors a renderer may report.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plot failed: {0}")]
    Plot(String),
}

/// Turns finished reports into browsable output.
pub trait ReportRenderer: Send + Sync {
    /// Renders all outcomes in execution order, returning the files written.
    fn render(&self, outcomes: &[CaseOutcome]) -> Result<Vec<PathBuf>, RenderError>;
}

/// Lifecycle phase of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prepare,
    Run,
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::Run => write!(f, "run"),
            Phase::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Configuration for a test run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Filter cases by pattern (matches name or description).
    pub filter: Option<String>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// What happened to one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub name: String,
    pub description: String,
    /// False if the case flagged itself failed or any phase raised.
    pub passed: bool,
    /// Failure raised by `prepare` or `run`, with its source chain.
    pub error: Option<String>,
    /// Failure raised by `cleanup`.
    pub cleanup_error: Option<String>,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub report: ReportModel,
}

/// Aggregated results from a test run.
#[derive(Debug, Clone, Default)]
pub struct RunResults {
    /// Outcomes in execution order.
    pub outcomes: Vec<CaseOutcome>,

    /// Total duration of the run.
    pub duration: Duration,

    /// Files written by the renderer.
    pub rendered: Vec<PathBuf>,

    /// Renderer failure, if any.
    pub render_error: Option<String>,
}

impl RunResults {
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failures(&self) -> Vec<&CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.passed).collect()
    }

    /// Reports in execution order.
    pub fn reports(&self) -> impl Iterator<Item = &ReportModel> {
        self.outcomes.iter().map(|o| &o.report)
    }
}

/// Progress callback for run updates.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RunStarted { total_cases: usize },
    PhaseStarted { case: String, phase: Phase },
    CaseCompleted { case: String, passed: bool, duration: Duration },
    RunCompleted { passed: usize, failed: usize },
}

/// Runs test cases through their lifecycle.
pub struct TestRunner {
    cases: Vec<Box<dyn TestCase>>,
    on_progress: Option<ProgressCallback>,
    renderer: Option<Box<dyn ReportRenderer>>,
}

impl TestRunner {
    pub fn new(cases: Vec<Box<dyn TestCase>>) -> Self {
        Self {
            cases,
            on_progress: None,
            renderer: None,
        }
    }

    /// Sets a callback for progress updates.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Sets the renderer that receives the finished reports.
    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Names of the cases matching `config`, in order.
    pub fn matching_cases(&self, config: &RunConfig) -> Vec<&str> {
        self.cases
            .iter()
            .filter(|c| matches_config(c.as_ref(), config))
            .map(|c| c.name())
            .collect()
    }

    /// Runs every case matching `config` once.
    pub async fn run(self, config: &RunConfig) -> Result<RunResults, RunnerError> {
        let start = Instant::now();
        let Self {
            cases,
            on_progress,
            renderer,
        } = self;
        let emit = |event: ProgressEvent| {
            if let Some(callback) = &on_progress {
                callback(event);
            }
        };

        let mut selected: Vec<_> = cases
            .into_iter()
            .filter(|c| matches_config(c.as_ref(), config))
            .collect();

        if selected.is_empty()
            && let Some(filter) = &config.filter
        {
            return Err(RunnerError::NoMatchingCases(filter.clone()));
        }

        emit(ProgressEvent::RunStarted {
            total_cases: selected.len(),
        });

        let mut outcomes = Vec::with_capacity(selected.len());
        for case in &mut selected {
            let outcome = run_case(case.as_mut(), &emit).await;
            emit(ProgressEvent::CaseCompleted {
                case: outcome.name.clone(),
                passed: outcome.passed,
                duration: outcome.duration,
            });
            outcomes.push(outcome);
        }

        let mut results = RunResults {
            outcomes,
            duration: start.elapsed(),
            ..RunResults::default()
        };

        emit(ProgressEvent::RunCompleted {
            passed: results.passed_count(),
            failed: results.failed_count(),
        });

        if let Some(renderer) = renderer {
            match renderer.render(&results.outcomes) {
                Ok(paths) => results.rendered = paths,
                Err(e) => {
                    warn!("Failed to render report: {}", e);
                    results.render_error = Some(e.to_string());
                }
            }
        }

        Ok(results)
    }
}

/// Runs one case through prepare → run → cleanup.
async fn run_case(case: &mut dyn TestCase, emit: &dyn Fn(ProgressEvent)) -> CaseOutcome {
    let start = Instant::now();
    let name = case.name().to_string();

    info!("testcase: {} ... [prepare]", name);
    emit(ProgressEvent::PhaseStarted {
        case: name.clone(),
        phase: Phase::Prepare,
    });
    let mut error = guarded(case.prepare()).await.err();

    if error.is_none() {
        info!("testcase: {} ... [run]", name);
        emit(ProgressEvent::PhaseStarted {
            case: name.clone(),
            phase: Phase::Run,
        });
        error = guarded(case.run()).await.err();
    }

    if let Some(e) = &error {
        error!("testcase: {} raised: {}", name, e);
        case.mark_failed();
    }

    info!("testcase: {} ... [cleanup]", name);
    emit(ProgressEvent::PhaseStarted {
        case: name.clone(),
        phase: Phase::Cleanup,
    });
    let cleanup_error = guarded(case.cleanup()).await.err();
    if let Some(e) = &cleanup_error {
        error!("testcase: {} cleanup raised: {}", name, e);
        case.mark_failed();
    }

    let passed = !case.failed();
    if passed {
        info!("testcase: {} => SUCCESSFUL", name);
    } else {
        info!("testcase: {} => FAILED", name);
    }

    CaseOutcome {
        description: case.description().to_string(),
        name,
        passed,
        error,
        cleanup_error,
        duration: start.elapsed(),
        report: case.report().clone(),
    }
}

/// Awaits a lifecycle phase, turning errors and panics into a message.
async fn guarded<F>(phase: F) -> Result<(), String>
where
    F: Future<Output = Result<(), CaseError>>,
{
    match AssertUnwindSafe(phase).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(error_chain(&e)),
        Err(payload) => Err(format!("panic: {}", panic_message(payload.as_ref()))),
    }
}

/// Formats an error with all of its sources.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn matches_config(case: &dyn TestCase, config: &RunConfig) -> bool {
    let Some(filter) = &config.filter else {
        return true;
    };
    let filter = filter.to_lowercase();
    case.name().to_lowercase().contains(&filter)
        || case.description().to_lowercase().contains(&filter)
}

/// Serde helper for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
