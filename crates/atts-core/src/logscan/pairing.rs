//! Produced/transferred pairing.
//!
//! A sender logs `produced N bundles ...` when it starts a transmission run;
//! the monitor later logs `... | N (M) bundles ...` when the run is
//! transferred. A run is successful when the transferred count equals the
//! produced count.
//!
//! ```text
//!            produced                      transferred
//!   Idle ─────────────▶ AwaitingTransfer ──────────────▶ Idle
//!                        │        ▲
//!                        └────────┘ produced (previous run superseded)
//! ```
//!
//! A run still awaiting its transfer at end of input stays unresolved: it
//! counts toward `total_runs` but never toward `successful_runs`.

use super::{Grammar, LineClass, LogEvent, ProducedRecord, classify};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Something noteworthy found while pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PairingDiagnostic {
    /// A new run was produced before the previous one was transferred.
    Superseded { bundles: u64, bytes: u64 },
    /// The transferred count differs from the produced count.
    Shortfall {
        transferred: u64,
        produced: u64,
        bytes: u64,
    },
}

impl fmt::Display for PairingDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingDiagnostic::Superseded { bundles, bytes } => {
                write!(f, "run {bundles} bundles with {bytes} bytes failed")
            }
            PairingDiagnostic::Shortfall {
                transferred,
                produced,
                bytes,
            } => write!(
                f,
                "only {transferred} of {produced} bundles with {bytes} bytes have been transferred"
            ),
        }
    }
}

/// Result of pairing one log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PairingSummary {
    pub successful_runs: usize,
    pub total_runs: usize,
    pub diagnostics: Vec<PairingDiagnostic>,
    /// Lines that matched a pairing grammar but had unparsable counts.
    pub skipped_unparsable: usize,
    /// Whether the last produced run never saw a transfer.
    pub unresolved_at_end: bool,
}

impl PairingSummary {
    /// Number of runs superseded by a newer produced record.
    pub fn superseded_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, PairingDiagnostic::Superseded { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum PairingState {
    #[default]
    Idle,
    AwaitingTransfer(ProducedRecord),
}

/// Line-by-line pairing state machine.
#[derive(Debug, Default)]
pub struct PairingMachine {
    state: PairingState,
    summary: PairingSummary,
}

impl PairingMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs a whole log.
    pub fn scan(text: &str) -> PairingSummary {
        let mut machine = Self::new();
        for line in text.lines() {
            machine.feed(line);
        }
        machine.finish()
    }

    /// Processes one line.
    pub fn feed(&mut self, line: &str) {
        match classify(line) {
            LineClass::Event(LogEvent::Transferred(record)) => {
                if let PairingState::AwaitingTransfer(pending) = self.state {
                    self.state = PairingState::Idle;
                    if record.bundles == pending.bundles {
                        self.summary.successful_runs += 1;
                    } else {
                        self.summary.diagnostics.push(PairingDiagnostic::Shortfall {
                            transferred: record.bundles,
                            produced: pending.bundles,
                            bytes: pending.bytes,
                        });
                    }
                }
            }
            LineClass::Event(LogEvent::Produced(record)) => {
                if let PairingState::AwaitingTransfer(previous) = self.state {
                    self.summary.diagnostics.push(PairingDiagnostic::Superseded {
                        bundles: previous.bundles,
                        bytes: previous.bytes,
                    });
                }
                self.state = PairingState::AwaitingTransfer(record);
                self.summary.total_runs += 1;
            }
            LineClass::Unparsable(grammar @ (Grammar::Produced | Grammar::Transferred)) => {
                warn!("Skipping {:?} line with unparsable numbers: {}", grammar, line);
                self.summary.skipped_unparsable += 1;
            }
            _ => {}
        }
    }

    /// Ends the scan. A pending run is left unresolved.
    pub fn finish(mut self) -> PairingSummary {
        self.summary.unresolved_at_end = matches!(self.state, PairingState::AwaitingTransfer(_));
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P10: &str = "produced 10 bundles of 1000 bytes in 2.5s (0 lost)";
    const P20: &str = "produced 20 bundles of 1000 bytes in 4.0s (0 lost)";
    const P30: &str = "produced 30 bundles of 500 bytes in 3.1s (0 lost)";
    const T10: &str = "1287411456.12 14:17:36 | 10 (10) bundles of 1000 bytes in 2.6s";
    const T25: &str = "1287411460.50 14:17:40 | 25 (25) bundles of 500 bytes in 3.3s";

    fn log(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn test_superseded_run_is_reported_once() {
        let summary = PairingMachine::scan(&log(&[P10, T10, P20, "noise", P30, T25]));

        assert_eq!(summary.total_runs, 3);
        assert_eq!(summary.successful_runs, 1);
        assert_eq!(summary.superseded_count(), 1);
        assert_eq!(
            summary.diagnostics[0],
            PairingDiagnostic::Superseded {
                bundles: 20,
                bytes: 1000
            }
        );
        assert_eq!(
            summary.diagnostics[1].to_string(),
            "only 25 of 30 bundles with 500 bytes have been transferred"
        );
        assert!(!summary.unresolved_at_end);
    }

    #[test]
    fn test_trailing_produced_record_stays_unresolved() {
        let summary = PairingMachine::scan(&log(&[P10, T10, P20]));

        assert_eq!(summary.total_runs, 2);
        assert_eq!(summary.successful_runs, 1);
        assert!(summary.diagnostics.is_empty());
        assert!(summary.unresolved_at_end);
    }

    #[test]
    fn test_transfer_without_pending_run_is_ignored() {
        let summary = PairingMachine::scan(&log(&[T10, T10]));
        assert_eq!(summary.total_runs, 0);
        assert_eq!(summary.successful_runs, 0);
        assert!(summary.diagnostics.is_empty());
    }

    #[test]
    fn test_second_transfer_for_same_run_is_ignored() {
        let summary = PairingMachine::scan(&log(&[P10, T10, T10]));
        assert_eq!(summary.total_runs, 1);
        assert_eq!(summary.successful_runs, 1);
    }

    #[test]
    fn test_unreadable_durations_still_pair() {
        let summary = PairingMachine::scan(&log(&[
            "produced 5 bundles of 100 bytes in - s (0 lost)",
            "1.0 10:00:00 | 5 (5) bundles of 100 bytes in 1.2.3s",
        ]));

        assert_eq!(summary.total_runs, 1);
        assert_eq!(summary.successful_runs, 1);
        assert_eq!(summary.skipped_unparsable, 0);
        assert!(!summary.unresolved_at_end);
    }

    #[test]
    fn test_unparsable_counts_are_counted_and_skipped() {
        let summary = PairingMachine::scan(&log(&[
            P10,
            "1.0 10:00:00 | 10 (10) bundles of 99999999999999999999999 bytes in 1.2s",
            T10,
            "produced 99999999999999999999999 bundles of 99 bytes in 1.0s (0 lost)",
        ]));

        assert_eq!(summary.skipped_unparsable, 2);
        assert_eq!(summary.total_runs, 1);
        assert_eq!(summary.successful_runs, 1);
    }

    #[test]
    fn test_superseded_display() {
        let d = PairingDiagnostic::Superseded {
            bundles: 20,
            bytes: 1000,
        };
        assert_eq!(d.to_string(), "run 20 bundles with 1000 bytes failed");
    }
}
