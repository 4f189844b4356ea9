//! Memory usage extraction from `free` snapshots embedded in a log.
//!
//! A line containing `Recording free memory` opens a snapshot block; if it
//! also contains `SENDER: ` the block belongs to the sender and starts a new
//! run, otherwise to the receiver. The block is the `free` table that
//! follows, prefixed by the log timestamp columns:
//!
//! ```text
//! 1.0 10:00:00 | Mem:   126000   84000   42000   0   1200   30000
//! 1.0 10:00:00 | Swap:       0       0       0
//! ```
//!
//! The `Mem:` row's sixth field (used kB) becomes a point `(run, MB)`; the
//! block closes after the `Mem:` and `Swap:` rows.

use serde::Serialize;

const SNAPSHOT_MARKER: &str = "Recording free memory";
const SENDER_TAG: &str = "SENDER: ";

/// Memory series of sender and receiver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryScan {
    /// `(run, MB)` samples taken on the sender.
    pub sender: Vec<(u32, f64)>,
    /// `(run, MB)` samples taken on the receiver.
    pub receiver: Vec<(u32, f64)>,
    /// Rows inside a block that were too short or unparsable.
    pub skipped_unparsable: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Sender,
    Receiver,
}

/// Extracts memory series from a log.
pub fn scan_memory(text: &str) -> MemoryScan {
    let mut scan = MemoryScan::default();
    // Rows seen in the open block, `None` outside a block.
    let mut block_rows: Option<u8> = None;
    let mut side = Side::Receiver;
    let mut run = 0u32;

    for line in text.lines() {
        if line.contains(SNAPSHOT_MARKER) {
            block_rows = Some(0);
            if line.contains(SENDER_TAG) {
                side = Side::Sender;
                run += 1;
            } else {
                side = Side::Receiver;
            }
            continue;
        }

        let Some(rows) = block_rows.as_mut() else {
            continue;
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.get(3).copied() {
            Some("Mem:") => {
                *rows += 1;
                match fields.get(5).and_then(|v| v.parse::<f64>().ok()) {
                    Some(kb) => {
                        let point = (run, kb / 1000.0);
                        match side {
                            Side::Sender => scan.sender.push(point),
                            Side::Receiver => scan.receiver.push(point),
                        }
                    }
                    None => scan.skipped_unparsable += 1,
                }
            }
            Some("Swap:") => *rows += 1,
            Some(_) => {}
            None => scan.skipped_unparsable += 1,
        }

        if *rows == 2 {
            block_rows = None;
        }
    }

    scan
}
