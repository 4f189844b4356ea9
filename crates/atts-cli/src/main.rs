//! # atts
//!
//! Runs test cases against the DTN testbed and writes the HTML report.
//!
//! ## Usage
//!
//! ```bash
//! # Run the default cases
//! atts
//!
//! # Run selected cases with another configuration
//! atts --config lab.yml ping01 neighbor01
//!
//! # List the known cases
//! atts --list
//! ```

use anyhow::Context;
use atts_cli::{HarnessConfig, build, catalog, load_inventory, select, ssh_testbed};
use atts_core::{HostInventory, RunConfig, TestRunner};
use atts_report::{HtmlReport, TerminalReporter, Verbosity, create_progress_callback};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Automated test harness for DTN nodes.
///
/// Cases run one after another; each prepares its hosts, runs, and always
/// cleans up before the next one starts.
#[derive(Parser, Debug)]
#[command(name = "atts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Test cases to run (default: the standard set)
    pub cases: Vec<String>,

    /// Harness configuration file
    #[arg(short, long, default_value = "atts.yml")]
    pub config: PathBuf,

    /// Show detailed output during tests
    #[arg(short, long)]
    pub verbose: bool,

    /// Only show pass/fail summary
    #[arg(short, long)]
    pub quiet: bool,

    /// List available test cases without running them
    #[arg(long)]
    pub list: bool,

    /// Run only cases whose name or description contains this pattern
    #[arg(long)]
    pub filter: Option<String>,

    /// Write the HTML report here instead of the configured directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Skip the HTML report
    #[arg(long)]
    pub no_report: bool,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    println!(
        "\n{} {}",
        "ATTS".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("{}", "━".repeat(40).dimmed());

    if cli.list {
        list_cases();
        return;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{} failed to create Tokio runtime: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    match rt.block_on(run_tests(&cli)) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("\n{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn list_cases() {
    println!("{}\n", "Available test cases:".bold());
    let entries = catalog();
    for entry in &entries {
        let marker = if entry.default { "*" } else { " " };
        println!(
            "  {} {:<20} {}",
            marker,
            entry.name.cyan(),
            entry.description.dimmed()
        );
    }
    println!(
        "\n  {}",
        format!("Total: {} cases, * runs by default", entries.len()).dimmed()
    );
}

fn load_hosts(config: &HarnessConfig) -> anyhow::Result<HostInventory> {
    if !config.hosts_dir.exists() {
        warn!(
            "Host directory {} does not exist, running without hosts",
            config.hosts_dir.display()
        );
        return Ok(HostInventory::default());
    }
    Ok(load_inventory(&config.hosts_dir)?)
}

/// Runs the selected cases; `Ok(false)` when any of them failed.
async fn run_tests(cli: &Cli) -> anyhow::Result<bool> {
    let verbosity = cli.verbosity();
    let mut config = HarnessConfig::load(&cli.config)?;
    if let Some(dir) = &cli.report_dir {
        config.report_dir = dir.clone();
    }

    let entries = select(&cli.cases)?;
    let inventory = load_hosts(&config)?;
    info!(
        "{} of {} hosts enabled",
        inventory.enabled_count(),
        inventory.all().len()
    );
    std::fs::create_dir_all(&config.tmp_dir)
        .with_context(|| format!("failed to create {}", config.tmp_dir.display()))?;

    let report = HtmlReport::new(config.report_dir.clone()).with_gnuplot(config.gnuplot.clone());
    let testbed = ssh_testbed(config, &inventory);
    let cases = build(&entries, &testbed);
    if cases.is_empty() {
        anyhow::bail!("none of the selected test cases could be built");
    }

    let mut runner = TestRunner::new(cases).on_progress(create_progress_callback(verbosity));
    if !cli.no_report {
        runner = runner.with_renderer(Box::new(report));
    }

    let mut run_config = RunConfig::new();
    if let Some(filter) = &cli.filter {
        run_config = run_config.with_filter(filter);
    }
    let results = runner.run(&run_config).await?;

    if verbosity != Verbosity::Quiet {
        for path in &results.rendered {
            println!("{}", format!("Report written: {}", path.display()).dimmed());
        }
    }
    if let Some(e) = &results.render_error {
        eprintln!("{} Failed to write report: {}", "Warning:".yellow(), e);
    }

    let reporter = TerminalReporter::with_verbosity(verbosity);
    if verbosity != Verbosity::Quiet && !results.all_passed() {
        reporter.print_failures(&results);
    }
    reporter.print_summary(&results);

    Ok(results.all_passed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["atts"]).unwrap();
        assert!(cli.cases.is_empty());
        assert_eq!(cli.config, PathBuf::from("atts.yml"));
        assert!(!cli.no_report);
        assert_eq!(cli.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_cli_cases_and_flags() {
        let cli = Cli::try_parse_from([
            "atts",
            "--config",
            "lab.yml",
            "-v",
            "--report-dir",
            "out",
            "--no-report",
            "ping01",
            "vpn01",
        ])
        .unwrap();
        assert_eq!(cli.cases, vec!["ping01", "vpn01"]);
        assert_eq!(cli.config, PathBuf::from("lab.yml"));
        assert_eq!(cli.report_dir, Some(PathBuf::from("out")));
        assert!(cli.no_report);
        assert_eq!(cli.verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let cli = Cli::try_parse_from(["atts", "-q", "-v"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_missing_host_dir_gives_empty_inventory() {
        let config = HarnessConfig {
            hosts_dir: PathBuf::from("/nonexistent/atts/hosts"),
            ..HarnessConfig::default()
        };
        assert!(load_hosts(&config).unwrap().is_empty());
    }
}
