//! Payload digests for comparing sent and received files.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Hashes `path` line by line and returns the lowercase hex SHA-256.
///
/// Lines starting with `exclude_prefix` are skipped; `include_suffix` is fed
/// to the hasher after the last line. Line endings are part of the digest.
pub fn file_digest(path: &Path, exclude_prefix: Option<&str>, include_suffix: &str) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if let Some(prefix) = exclude_prefix
            && !prefix.is_empty()
            && line.starts_with(prefix.as_bytes())
        {
            continue;
        }
        hasher.update(&line);
    }
    hasher.update(include_suffix.as_bytes());

    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}
