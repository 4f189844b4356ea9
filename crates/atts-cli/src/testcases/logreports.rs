//! Reports over an archive of recorded test runs.
//!
//! The archive holds one directory per run. Each run has a `MANIFEST`,
//! zero or more `config_*` files and `throughput_*.conf.log` logs. These
//! cases bind no host; they read the archive in `prepare` and turn it into
//! narrative and graphs in `run`.

use super::Testbed;
use async_trait::async_trait;
use atts_core::logscan::memory::scan_memory;
use atts_core::logscan::throughput::scan_throughput;
use atts_core::report::GraphSpec;
use atts_core::{CaseContext, CaseError, HostSet, TestCase, read_log, summarize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST: &str = "MANIFEST";

/// Metadata of one archived run.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub path: PathBuf,
    pub timestamp: Option<String>,
    /// Run name; the directory name when the manifest has none.
    pub name: String,
    pub sender_version: Option<String>,
    pub receiver_version: Option<String>,
}

impl Manifest {
    /// Reads `<dir>/MANIFEST`. Short manifests leave later fields unset.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(dir.join(MANIFEST))?;
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let line = |n: usize| lines.get(n).map(|l| l.to_string());

        let name = line(1)
            .filter(|n| !n.is_empty())
            .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();

        Ok(Self {
            path: dir.to_path_buf(),
            timestamp: line(0),
            name,
            sender_version: line(4),
            receiver_version: line(7),
        })
    }

    /// `config_*` files, sorted.
    pub fn configs(&self) -> io::Result<Vec<String>> {
        self.list(|f| f.starts_with("config_"))
    }

    /// `throughput_*.conf.log` files, sorted.
    pub fn throughput_logs(&self) -> io::Result<Vec<String>> {
        self.list(|f| f.starts_with("throughput_") && f.ends_with(".conf.log"))
    }

    fn list(&self, keep: impl Fn(&str) -> bool) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if keep(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Loads every run under `base`, sorted by directory name.
///
/// Entries without a readable manifest are skipped with a warning.
pub fn load_runs(base: &Path) -> io::Result<Vec<Manifest>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut runs = Vec::with_capacity(dirs.len());
    for dir in dirs {
        match Manifest::load(&dir) {
            Ok(manifest) => runs.push(manifest),
            Err(e) => warn!("Skipping {}: no readable {}: {}", dir.display(), MANIFEST, e),
        }
    }
    Ok(runs)
}

/// Shared state of the archive reports.
struct Archive {
    base: Option<PathBuf>,
    runs: Vec<Manifest>,
}

impl Archive {
    fn new(testbed: &Testbed) -> Self {
        Self {
            base: testbed.config.log_archive_dir.clone(),
            runs: Vec::new(),
        }
    }

    fn load(&mut self, case: &str) -> Result<(), CaseError> {
        let base = self
            .base
            .as_ref()
            .ok_or_else(|| CaseError::Failed(format!("{case}: log_archive_dir is not set")))?;
        self.runs = load_runs(base)?;
        debug!("{}: {} archived runs in {}", case, self.runs.len(), base.display());
        Ok(())
    }
}

fn archive_context(testbed: &Testbed, name: &str, description: &str) -> CaseContext {
    testbed.context(name, description, HostSet::default())
}

/// Pairing results, versions and message counts per run.
pub struct SummaryReport {
    ctx: CaseContext,
    archive: Archive,
}

impl SummaryReport {
    pub const NAME: &'static str = "SummaryReport";

    pub fn new(testbed: &Testbed) -> Self {
        Self {
            ctx: archive_context(
                testbed,
                Self::NAME,
                "Greps through the log file and search for errors.",
            ),
            archive: Archive::new(testbed),
        }
    }

    fn report_log(&mut self, run: &Manifest, log: &str) -> Result<(), CaseError> {
        let text = read_log(&run.path.join(log))?;
        let summary = summarize(&text);
        let pairing = &summary.pairing;

        for diagnostic in &pairing.diagnostics {
            self.ctx.print(diagnostic.to_string());
        }
        self.ctx.print(format!(
            "{} of {} runs successful in {}",
            pairing.successful_runs, pairing.total_runs, log
        ));
        if pairing.skipped_unparsable > 0 {
            self.ctx.print(format!(
                "{} unparsable records skipped in {}",
                pairing.skipped_unparsable, log
            ));
        }
        for (message, count) in &summary.tallies.warnings {
            self.ctx.print(format!("WARNING ({count}): {message}"));
        }
        for (message, count) in &summary.tallies.errors {
            self.ctx.print(format!("ERROR ({count}): {message}"));
        }
        Ok(())
    }
}

#[async_trait]
impl TestCase for SummaryReport {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn prepare(&mut self) -> Result<(), CaseError> {
        self.archive.load(Self::NAME)
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        for run in std::mem::take(&mut self.archive.runs) {
            self.ctx.print(run.name.clone());
            self.ctx.print(format!(
                "software version receiver: {}",
                run.receiver_version.as_deref().unwrap_or("unknown")
            ));
            self.ctx.print(format!(
                "software version sender: {}",
                run.sender_version.as_deref().unwrap_or("unknown")
            ));

            for config in run.configs()? {
                self.ctx.report_mut().add_file(
                    run.name.clone(),
                    run.path.join(&config),
                    config,
                    "configuration file",
                );
            }
            for log in run.throughput_logs()? {
                self.report_log(&run, &log)?;
            }
            self.ctx.print("");
        }
        Ok(())
    }
}

/// One throughput graph per bundle size change.
pub struct ThroughputReport {
    ctx: CaseContext,
    archive: Archive,
}

impl ThroughputReport {
    pub const NAME: &'static str = "ThroughputReport";

    pub fn new(testbed: &Testbed) -> Self {
        Self {
            ctx: archive_context(testbed, Self::NAME, "Report the duration of transmissions."),
            archive: Archive::new(testbed),
        }
    }
}

#[async_trait]
impl TestCase for ThroughputReport {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn prepare(&mut self) -> Result<(), CaseError> {
        self.archive.load(Self::NAME)
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        let mut next_graph = 0;
        for run in std::mem::take(&mut self.archive.runs) {
            self.ctx.print(run.name.clone());
            for log in run.throughput_logs()? {
                self.ctx.print(format!("scanning {log} ..."));
                let scan = scan_throughput(&read_log(&run.path.join(&log))?);
                if scan.skipped_unparsable > 0 {
                    self.ctx.print(format!(
                        "{} unparsable records skipped",
                        scan.skipped_unparsable
                    ));
                }

                let report = self.ctx.report_mut();
                for series in scan.series {
                    next_graph += 1;
                    report.define_graph(
                        GraphSpec::new(
                            next_graph,
                            format!("{}, {} bundles with {} bytes", run.name, series.bundles, series.size),
                            format!("Throughput of transmissions in {}. Logfile: {}", run.name, log),
                        )
                        .labels("run", "throughput (Mbit/s)"),
                    );
                    for (x, y) in series.points {
                        report.add_data_point(next_graph, x, y);
                    }
                }
            }
            self.ctx.print("");
        }
        Ok(())
    }
}

/// Sender and receiver memory graphs per log.
pub struct MemoryReport {
    ctx: CaseContext,
    archive: Archive,
}

impl MemoryReport {
    pub const NAME: &'static str = "MemoryReport";

    pub fn new(testbed: &Testbed) -> Self {
        Self {
            ctx: archive_context(
                testbed,
                Self::NAME,
                "Track the used memory of all testcases.",
            ),
            archive: Archive::new(testbed),
        }
    }
}

#[async_trait]
impl TestCase for MemoryReport {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn prepare(&mut self) -> Result<(), CaseError> {
        self.archive.load(Self::NAME)
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        let mut next_graph = 0;
        for run in std::mem::take(&mut self.archive.runs) {
            self.ctx.print(run.name.clone());
            for log in run.throughput_logs()? {
                self.ctx.print(format!("scanning {log} ..."));
                let scan = scan_memory(&read_log(&run.path.join(&log))?);

                let sender = next_graph + 1;
                let receiver = next_graph + 2;
                next_graph += 2;
                let report = self.ctx.report_mut();
                for (id, side, points) in [
                    (sender, "sender", scan.sender),
                    (receiver, "receiver", scan.receiver),
                ] {
                    report.define_graph(
                        GraphSpec::new(
                            id,
                            format!("Memory {} [{}]", side, run.name),
                            format!(
                                "Memory usage of the {} for the test run {}. Logfile: {}",
                                side, run.name, log
                            ),
                        )
                        .labels("run", "memory usage (MB)"),
                    );
                    for (x, y) in points {
                        report.add_data_point(id, x, y);
                    }
                }
            }
            self.ctx.print("");
        }
        Ok(())
    }
}
