//! Colored terminal output for progress and results.

use atts_core::{ProgressCallback, ProgressEvent, RunResults};
use colored::Colorize;
use std::time::Duration;

/// Verbosity level for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Show only pass/fail summary.
    Quiet,
    /// Normal output with progress.
    #[default]
    Normal,
    /// Phase-by-phase output.
    Verbose,
}

/// Terminal reporter for test runs.
#[derive(Debug, Default)]
pub struct TerminalReporter {
    verbosity: Verbosity,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Handles a progress event, printing appropriate output.
    pub fn handle_progress(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { total_cases } => {
                if self.verbosity != Verbosity::Quiet {
                    println!(
                        "\n{}\n",
                        format!(
                            "Running {} test case{}...",
                            total_cases,
                            if total_cases == 1 { "" } else { "s" }
                        )
                        .bold()
                    );
                }
            }
            ProgressEvent::PhaseStarted { case, phase } => {
                if self.verbosity == Verbosity::Verbose {
                    println!("  {} {}", case.dimmed(), format!("[{phase}]").dimmed());
                }
            }
            ProgressEvent::CaseCompleted {
                case,
                passed,
                duration,
            } => {
                if self.verbosity != Verbosity::Quiet {
                    println!("  {}", case_line(&case, passed, duration));
                }
            }
            ProgressEvent::RunCompleted { passed, failed } => {
                if self.verbosity == Verbosity::Quiet {
                    let total = passed + failed;
                    if failed == 0 {
                        println!("{}", format!("{passed}/{total} passed").green());
                    } else {
                        println!("{}", format!("{failed}/{total} failed").red());
                    }
                }
            }
        }
    }

    /// Prints a full summary of the run.
    pub fn print_summary(&self, results: &RunResults) {
        println!("\n{}", "-".repeat(40).dimmed());

        let passed = results.passed_count();
        let failed = results.failed_count();
        let total = results.total_count();

        let (verdict, color) = if failed == 0 {
            ("PASSED", colored::Color::Green)
        } else if passed > 0 {
            ("MIXED", colored::Color::Yellow)
        } else {
            ("FAILED", colored::Color::Red)
        };
        println!(
            "{}",
            format!("{verdict}: {passed} of {total} test cases")
                .color(color)
                .bold()
        );

        if let Some(path) = results.rendered.first() {
            println!("   Report: {}", path.display());
        }
        if let Some(e) = &results.render_error {
            println!("   {}", format!("Report rendering failed: {e}").red());
        }
        println!(
            "\n   {}",
            format!("Completed in {:.1}s", results.duration.as_secs_f64()).dimmed()
        );
    }

    /// Prints the failures with their recorded errors.
    pub fn print_failures(&self, results: &RunResults) {
        let failures = results.failures();
        if failures.is_empty() {
            return;
        }

        println!("\n{}\n", "Failed test cases:".red().bold());
        for outcome in failures {
            println!("  {} {}", "x".red(), outcome.name.red().bold());
            println!("     {}", outcome.description.dimmed());
            if let Some(e) = &outcome.error {
                println!("     error: {e}");
            }
            if let Some(e) = &outcome.cleanup_error {
                println!("     cleanup: {e}");
            }
            if self.verbosity == Verbosity::Verbose {
                for line in outcome.report.narrative() {
                    println!("     | {line}");
                }
            }
        }
    }
}

fn case_line(case: &str, passed: bool, duration: Duration) -> String {
    let status = if passed {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    format!(
        "{} {} {}",
        status,
        case,
        format!("({:.1}s)", duration.as_secs_f64()).dimmed()
    )
}

/// Creates a progress callback for use with the test runner.
pub fn create_progress_callback(verbosity: Verbosity) -> ProgressCallback {
    let reporter = TerminalReporter::with_verbosity(verbosity);
    Box::new(move |event| reporter.handle_progress(event))
}
