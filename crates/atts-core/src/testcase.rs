//! The test case contract.
//!
//! Each test case follows a prepare → run → cleanup lifecycle:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                           TestCase                                 │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  1. prepare() → opens host sessions, uploads scripts, saves config │
//! │  2. run()     → exercises the hosts, fills the report              │
//! │  3. cleanup() → restores config, collects logs, closes sessions    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`crate::TestRunner`] calls `cleanup` even when `prepare` or `run`
//! failed, so every `activate` done in `prepare` must be paired with a
//! `deactivate` in `cleanup`.

use crate::host::{HostError, HostSet};
use crate::logscan::ScanError;
use crate::report::ReportModel;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors a test case may return from its lifecycle methods.
#[derive(Debug, Error)]
pub enum CaseError {
    /// A remote host operation failed.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// A log could not be read.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// The case was bound to fewer hosts than it needs.
    #[error("{case} needs {needed} hosts, {available} available")]
    NotEnoughHosts {
        case: String,
        needed: usize,
        available: usize,
    },

    /// Local I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other unexpected fault.
    #[error("{0}")]
    Failed(String),
}

/// State shared by every test case: identity, bound hosts, report and
/// failure flag.
///
/// Concrete cases embed one and expose it through
/// [`TestCase::context`]/[`TestCase::context_mut`].
#[derive(Debug)]
pub struct CaseContext {
    report: ReportModel,
    hosts: HostSet,
    failed: bool,
    work_dir: PathBuf,
}

impl CaseContext {
    /// Creates a context with its report. `work_dir` receives files fetched
    /// from hosts.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        hosts: HostSet,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            report: ReportModel::new(name, description),
            hosts,
            failed: false,
            work_dir: work_dir.into(),
        }
    }

    /// Fails with [`CaseError::NotEnoughHosts`] unless at least `needed`
    /// hosts are bound.
    pub fn require_hosts(&self, needed: usize) -> Result<(), CaseError> {
        if self.hosts.len() < needed {
            return Err(CaseError::NotEnoughHosts {
                case: self.name().to_string(),
                needed,
                available: self.hosts.len(),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.report.name()
    }

    pub fn description(&self) -> &str {
        self.report.description()
    }

    pub fn hosts(&self) -> &HostSet {
        &self.hosts
    }

    pub fn report(&self) -> &ReportModel {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut ReportModel {
        &mut self.report
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Appends a line of narrative text to the report.
    pub fn print(&mut self, text: impl Into<String>) {
        self.report.add_narrative_line(text);
    }

    /// Marks the case as failed without raising an error.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Attaches `remote` from every bound host to the report.
    pub async fn report_file(&mut self, remote: &str, description: &str) -> Result<(), HostError> {
        self.hosts
            .report_file(&mut self.report, &self.work_dir, remote, description)
            .await
    }

    /// Collects the system log of every bound host into the report.
    pub async fn collect_syslog(&mut self) -> Result<(), HostError> {
        self.hosts
            .collect_syslog(&mut self.report, &self.work_dir)
            .await
    }

    /// Reads `remote` from bound host `index`.
    pub async fn file_content(&self, index: usize, remote: &str) -> Result<String, HostError> {
        let host = self.hosts.get(index).ok_or(HostError::NoSuchHost {
            index,
            available: self.hosts.len(),
        })?;
        HostSet::file_content(host.as_ref(), &self.work_dir, self.name(), remote).await
    }
}

/// A scenario exercised against a bound set of hosts.
#[async_trait]
pub trait TestCase: Send {
    fn context(&self) -> &CaseContext;

    fn context_mut(&mut self) -> &mut CaseContext;

    /// Brings hosts into the state `run` expects.
    async fn prepare(&mut self) -> Result<(), CaseError> {
        Ok(())
    }

    /// Executes the scenario.
    async fn run(&mut self) -> Result<(), CaseError>;

    /// Returns hosts to a known state. Always called once per run.
    async fn cleanup(&mut self) -> Result<(), CaseError> {
        Ok(())
    }

    /// Unique name within a run.
    fn name(&self) -> &str {
        self.context().name()
    }

    fn description(&self) -> &str {
        self.context().description()
    }

    fn report(&self) -> &ReportModel {
        self.context().report()
    }

    fn failed(&self) -> bool {
        self.context().is_failed()
    }

    fn mark_failed(&mut self) {
        self.context_mut().mark_failed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostInfo, RemoteHost};
    use crate::testing::MockHost;
    use std::sync::Arc;

    #[test]
    fn test_require_hosts() {
        let host: Arc<dyn RemoteHost> = Arc::new(MockHost::new(HostInfo::new("a", "10.0.0.1")));
        let ctx = CaseContext::new("ping01", "ping", HostSet::new([host]), "data/tmp");

        assert!(ctx.require_hosts(1).is_ok());
        let err = ctx.require_hosts(2).unwrap_err();
        assert_eq!(err.to_string(), "ping01 needs 2 hosts, 1 available");
    }

    #[test]
    fn test_mark_failed_and_print() {
        let mut ctx = CaseContext::new("case", "desc", HostSet::default(), "data/tmp");
        assert!(!ctx.is_failed());
        ctx.print("hello");
        ctx.mark_failed();
        assert!(ctx.is_failed());
        assert_eq!(ctx.report().narrative(), ["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_file_content_unbound_index_is_an_error() {
        let host: Arc<dyn RemoteHost> = Arc::new(MockHost::new(HostInfo::new("a", "10.0.0.1")));
        let ctx = CaseContext::new("case", "desc", HostSet::new([host]), "data/tmp");

        let err = ctx.file_content(3, "/tmp/x").await.unwrap_err();

        assert!(matches!(
            err,
            HostError::NoSuchHost {
                index: 3,
                available: 1
            }
        ));
        assert_eq!(err.to_string(), "no host at index 3 (1 bound)");
    }
}
