//! Throughput extraction.
//!
//! A marker line containing `: Transferred ` arms the scanner; the next line
//! containing ` bundles of ` is the detail record, split on whitespace:
//!
//! ```text
//! 1287411456.12 14:17:36 | 10 (10) bundles of 1000 bytes in 2.6s
//! [0]           [1]      [2] [3] [4] [5] [6] [7] [8] [9] [10]
//! ```
//!
//! Throughput is `bundles * size * 8 / 1_000_000 / duration` Mbit/s. A new
//! series starts whenever the bundle size differs from the previous record;
//! within a series the x-value is the run index starting at 1.

use serde::Serialize;
use tracing::warn;

const MARKER: &str = ": Transferred ";
const DETAIL: &str = " bundles of ";

/// Consecutive records sharing one bundle size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSeries {
    /// Bundle count of the first record in the series.
    pub bundles: u64,
    /// Bundle size in bytes.
    pub size: u64,
    /// `(run index, Mbit/s)`.
    pub points: Vec<(u32, f64)>,
}

/// Result of a throughput scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThroughputScan {
    pub series: Vec<ThroughputSeries>,
    /// Detail lines whose fields were missing or unparsable.
    pub skipped_unparsable: usize,
}

/// Extracts throughput series from a log.
pub fn scan_throughput(text: &str) -> ThroughputScan {
    let mut scan = ThroughputScan::default();
    let mut armed = false;
    let mut previous_size = 0;

    for line in text.lines() {
        if line.contains(MARKER) {
            armed = true;
            continue;
        }
        if !armed || !line.contains(DETAIL) {
            continue;
        }

        let Some((bundles, size, duration)) = parse_detail(line) else {
            warn!("Skipping unparsable throughput record: {}", line);
            scan.skipped_unparsable += 1;
            continue;
        };

        if size != previous_size || scan.series.is_empty() {
            previous_size = size;
            scan.series.push(ThroughputSeries {
                bundles,
                size,
                points: Vec::new(),
            });
        }

        let throughput = megabits_per_second(bundles, size, duration);
        if let Some(series) = scan.series.last_mut() {
            let run = series.points.len() as u32 + 1;
            series.points.push((run, throughput));
        }
        armed = false;
    }

    scan
}

/// `bundles * size` bytes in `duration` seconds, in Mbit/s.
pub fn megabits_per_second(bundles: u64, size: u64, duration: f64) -> f64 {
    (bundles as f64 * size as f64 * 8.0 / 1_000_000.0) / duration
}

fn parse_detail(line: &str) -> Option<(u64, u64, f64)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let bundles = fields.get(3)?.parse().ok()?;
    let size = fields.get(7)?.parse().ok()?;
    let duration: f64 = fields.get(10)?.trim_end_matches('s').parse().ok()?;
    (duration.is_finite() && duration > 0.0).then_some((bundles, size, duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bundles: u64, size: u64, secs: f64) -> String {
        format!(
            "1287411456.12 14:17:36 | SENDER: Transferred run\n\
             1287411456.12 14:17:36 | {bundles} ({bundles}) bundles of {size} bytes in {secs}s\n"
        )
    }

    #[test]
    fn test_series_grouped_by_size() {
        let log = [
            record(10, 1000, 1.0),
            record(10, 1000, 2.0),
            record(10, 1000, 4.0),
            record(5, 4000, 1.0),
            record(5, 4000, 2.0),
        ]
        .concat();

        let scan = scan_throughput(&log);

        assert_eq!(scan.series.len(), 2);
        let xs: Vec<_> = scan.series[0].points.iter().map(|(x, _)| *x).collect();
        assert_eq!(xs, vec![1, 2, 3]);
        let xs: Vec<_> = scan.series[1].points.iter().map(|(x, _)| *x).collect();
        assert_eq!(xs, vec![1, 2]);
        assert_eq!(scan.series[1].size, 4000);
        assert!((scan.series[0].points[0].1 - 0.08).abs() < 1e-9);
        assert!((scan.series[1].points[1].1 - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_returning_to_previous_size_starts_new_series() {
        let log = [
            record(1, 100, 1.0),
            record(1, 200, 1.0),
            record(1, 100, 1.0),
        ]
        .concat();
        assert_eq!(scan_throughput(&log).series.len(), 3);
    }

    #[test]
    fn test_detail_line_without_marker_is_ignored() {
        let log = "1.0 10:00:00 | 10 (10) bundles of 1000 bytes in 2s\n";
        assert!(scan_throughput(log).series.is_empty());
    }

    #[test]
    fn test_malformed_record_is_skipped_and_scan_continues() {
        let log = format!(
            "x: Transferred \n\
             1.0 10:00:00 | ten (10) bundles of 1000 bytes in 2s\n\
             1.0 10:00:01 | 10 (10) bundles of 1000 bytes in 2s\n{}",
            record(10, 1000, 0.0)
        );

        let scan = scan_throughput(&log);

        assert_eq!(scan.skipped_unparsable, 2);
        assert_eq!(scan.series.len(), 1);
        assert_eq!(scan.series[0].points.len(), 1);
    }

    #[test]
    fn test_megabits_per_second() {
        assert!((megabits_per_second(100, 10_000, 2.0) - 4.0).abs() < 1e-9);
    }
}
