//! Line-oriented scanners for transmission logs.
//!
//! The log grammars are a wire format: third-party senders and monitors
//! print them, so they are matched exactly. Each grammar is a named pattern
//! in [`Grammar`]; documented example lines live in the tests below.
//!
//! Three independent scans run over the same text:
//!
//! - [`pairing`]: pairs "produced" with later "transferred" records and
//!   counts successful runs.
//! - [`tally_messages`]: counts `WARNING:` and `ERROR:` messages.
//! - [`throughput`] and [`memory`]: extract graph series.
//!
//! A line matching a grammar whose numeric fields do not parse is skipped
//! and counted, never reported as an error.

pub mod memory;
pub mod pairing;
pub mod throughput;

pub use memory::{MemoryScan, scan_memory};
pub use pairing::{PairingDiagnostic, PairingMachine, PairingSummary};
pub use throughput::{ThroughputScan, ThroughputSeries, scan_throughput};

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors while reading a log.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The fixed line grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Grammar {
    /// `produced 10 bundles of 1000 bytes in 2.5s (0 lost)`
    Produced,
    /// `1287411456.12 14:17:36 | 10 (10) bundles of 1000 bytes in 2.6s`
    Transferred,
    /// `1287411456.12 14:17:36 | 1287411456.10 WARNING: <message>`
    Warning,
    /// `1287411456.12 14:17:36 | 1287411456.10 ERROR: <message>`
    Error,
}

static PRODUCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^produced ([0-9]+) bundles of ([0-9]+) bytes in ([\-0-9.]+) ?s \([0-9]+ lost\)")
        .expect("produced grammar is valid")
});

static TRANSFERRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9.]+ [0-9:]+ \| ([0-9]+) \(([0-9]+)\) bundles of ([0-9]+) bytes in ([\-0-9.]+) ?s",
    )
    .expect("transferred grammar is valid")
});

static WARNING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9.]+ [0-9:]+ \| [0-9.]+ WARNING: (.+)").expect("warning grammar is valid")
});

static ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9.]+ [0-9:]+ \| [0-9.]+ ERROR: (.+)").expect("error grammar is valid")
});

/// Sender-side record: a batch of bundles was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProducedRecord {
    pub bundles: u64,
    pub bytes: u64,
    /// `None` when the printed duration is not a number.
    pub duration_secs: Option<f64>,
}

/// Receiver-side record: a batch of bundles was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferredRecord {
    pub bundles: u64,
    /// The parenthesised count printed next to `bundles` by the monitor.
    pub reported: u64,
    pub bytes: u64,
    pub duration_secs: Option<f64>,
}

/// A classified log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LogEvent {
    Produced(ProducedRecord),
    Transferred(TransferredRecord),
    Warning(String),
    Error(String),
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    Event(LogEvent),
    /// The line matched `Grammar` but a count field did not parse.
    Unparsable(Grammar),
    Unrecognized,
}

/// Matches a line against the pairing and message grammars.
///
/// Only the counts decide whether a record is usable; an unreadable
/// duration is kept as `None`.
pub fn classify(line: &str) -> LineClass {
    if let Some(caps) = PRODUCED.captures(line) {
        return match (caps[1].parse(), caps[2].parse()) {
            (Ok(bundles), Ok(bytes)) => LineClass::Event(LogEvent::Produced(ProducedRecord {
                bundles,
                bytes,
                duration_secs: caps[3].parse().ok(),
            })),
            _ => LineClass::Unparsable(Grammar::Produced),
        };
    }

    if let Some(caps) = TRANSFERRED.captures(line) {
        return match (caps[1].parse(), caps[2].parse(), caps[3].parse()) {
            (Ok(bundles), Ok(reported), Ok(bytes)) => {
                LineClass::Event(LogEvent::Transferred(TransferredRecord {
                    bundles,
                    reported,
                    bytes,
                    duration_secs: caps[4].parse().ok(),
                }))
            }
            _ => LineClass::Unparsable(Grammar::Transferred),
        };
    }

    if let Some(caps) = WARNING.captures(line) {
        return LineClass::Event(LogEvent::Warning(caps[1].to_string()));
    }

    if let Some(caps) = ERROR.captures(line) {
        return LineClass::Event(LogEvent::Error(caps[1].to_string()));
    }

    LineClass::Unrecognized
}

/// Occurrence counts of warning and error messages.
///
/// Each distinct message appears once; iteration order is deterministic
/// (sorted by message).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageTallies {
    pub warnings: BTreeMap<String, usize>,
    pub errors: BTreeMap<String, usize>,
}

/// Counts `WARNING:` and `ERROR:` messages by exact text.
pub fn tally_messages(text: &str) -> MessageTallies {
    let mut tallies = MessageTallies::default();
    for line in text.lines() {
        match classify(line) {
            LineClass::Event(LogEvent::Warning(msg)) => {
                *tallies.warnings.entry(msg).or_default() += 1;
            }
            LineClass::Event(LogEvent::Error(msg)) => {
                *tallies.errors.entry(msg).or_default() += 1;
            }
            _ => {}
        }
    }
    tallies
}

/// Pairing result plus message tallies of one log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogSummary {
    pub pairing: PairingSummary,
    pub tallies: MessageTallies,
}

/// Runs the pairing and tally scans over a log.
pub fn summarize(text: &str) -> LogSummary {
    LogSummary {
        pairing: PairingMachine::scan(text),
        tallies: tally_messages(text),
    }
}

/// Reads a log file lossily (logs may contain stray bytes).
pub fn read_log(path: &Path) -> Result<String, ScanError> {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|source| ScanError::Read {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_produced_example_line() {
        let class = classify("produced 10 bundles of 1000 bytes in 2.5s (0 lost)");
        assert_eq!(
            class,
            LineClass::Event(LogEvent::Produced(ProducedRecord {
                bundles: 10,
                bytes: 1000,
                duration_secs: Some(2.5),
            }))
        );
    }

    #[test]
    fn test_classify_produced_with_space_before_unit() {
        let class = classify("produced 5 bundles of 64 bytes in 0.75 s (2 lost)");
        assert!(matches!(
            class,
            LineClass::Event(LogEvent::Produced(ProducedRecord { bundles: 5, .. }))
        ));
    }

    #[test]
    fn test_classify_transferred_example_line() {
        let class = classify("1287411456.12 14:17:36 | 10 (9) bundles of 1000 bytes in 2.6s");
        assert_eq!(
            class,
            LineClass::Event(LogEvent::Transferred(TransferredRecord {
                bundles: 10,
                reported: 9,
                bytes: 1000,
                duration_secs: Some(2.6),
            }))
        );
    }

    #[test]
    fn test_classify_warning_and_error_example_lines() {
        assert_eq!(
            classify("1287411456.12 14:17:36 | 1287411456.10 WARNING: queue full"),
            LineClass::Event(LogEvent::Warning("queue full".to_string()))
        );
        assert_eq!(
            classify("1287411456.12 14:17:36 | 1287411456.10 ERROR: connection lost"),
            LineClass::Event(LogEvent::Error("connection lost".to_string()))
        );
    }

    #[test]
    fn test_classify_keeps_record_with_unreadable_duration() {
        assert_eq!(
            classify("produced 10 bundles of 1000 bytes in 1.2.3s (0 lost)"),
            LineClass::Event(LogEvent::Produced(ProducedRecord {
                bundles: 10,
                bytes: 1000,
                duration_secs: None,
            }))
        );
        assert_eq!(
            classify("1.0 10:00:00 | 10 (10) bundles of 1000 bytes in --s"),
            LineClass::Event(LogEvent::Transferred(TransferredRecord {
                bundles: 10,
                reported: 10,
                bytes: 1000,
                duration_secs: None,
            }))
        );
    }

    #[test]
    fn test_classify_count_overflow_is_unparsable() {
        let class =
            classify("produced 99999999999999999999999 bundles of 1000 bytes in 2.5s (0 lost)");
        assert_eq!(class, LineClass::Unparsable(Grammar::Produced));

        let class =
            classify("1.0 10:00:00 | 10 (10) bundles of 99999999999999999999999 bytes in 2.6s");
        assert_eq!(class, LineClass::Unparsable(Grammar::Transferred));
    }

    #[test]
    fn test_classify_is_anchored_at_line_start() {
        assert_eq!(
            classify("SENDER: produced 10 bundles of 1000 bytes in 2.5s (0 lost)"),
            LineClass::Unrecognized
        );
        assert_eq!(classify(""), LineClass::Unrecognized);
    }

    #[test]
    fn test_tally_counts_each_message_exactly() {
        let log = "\
1.0 10:00:00 | 1.0 WARNING: queue full
1.0 10:00:01 | 1.0 WARNING: queue full
some noise
1.0 10:00:02 | 1.0 ERROR: connection lost
1.0 10:00:03 | 1.0 WARNING: slow peer
1.0 10:00:04 | 1.0 WARNING: queue full
";
        let tallies = tally_messages(log);
        assert_eq!(tallies.warnings.get("queue full"), Some(&3));
        assert_eq!(tallies.warnings.get("slow peer"), Some(&1));
        assert_eq!(tallies.warnings.len(), 2);
        assert_eq!(tallies.errors.get("connection lost"), Some(&1));
        assert_eq!(tallies.errors.len(), 1);
        assert!(!tallies.warnings.contains_key("connection lost"));
    }

    #[test]
    fn test_tally_empty_log() {
        let tallies = tally_messages("");
        assert!(tallies.warnings.is_empty());
        assert!(tallies.errors.is_empty());
    }
}
