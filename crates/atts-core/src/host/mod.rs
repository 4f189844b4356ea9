//! Remote host capability consumed by test cases.
//!
//! A [`RemoteHost`] is a named, addressable node of the testbed. The harness
//! never talks to a transport directly; it only needs to open and close a
//! session, move files in both directions and execute shell commands.
//! `atts-ssh` provides the production implementation, [`crate::testing::MockHost`]
//! a scripted one for tests.

mod delayed;
mod inventory;
mod set;

pub use delayed::DelayedExecution;
pub use inventory::HostInventory;
pub use set::{HostSet, SYSLOG_REMOTE, WAIT_SCRIPT_REMOTE, local_copy_path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a remote host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The session could not be opened.
    #[error("connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    /// A file copy in either direction failed.
    #[error("transfer {from} -> {to} failed: {reason}")]
    Transfer {
        from: String,
        to: String,
        reason: String,
    },

    /// A command exited non-zero or the transport was lost while it ran.
    #[error("command `{command}` on {host} failed (status {status:?}): {stderr}")]
    Command {
        host: String,
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// An operation was attempted before `connect`.
    #[error("host {0} is not active")]
    NotActive(String),

    /// A case addressed a host index it did not bind.
    #[error("no host at index {index} ({available} bound)")]
    NoSuchHost { index: usize, available: usize },

    /// A background command did not finish within the join timeout.
    #[error("command `{command}` on {host} did not finish within {timeout:?}")]
    Timeout {
        host: String,
        command: String,
        timeout: Duration,
    },

    /// Local I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static description of a testbed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Node name, also used as the DTN endpoint name (`dtn://<name>/...`).
    pub name: String,

    /// Network address used to reach the node.
    pub address: String,

    /// Disabled hosts are never bound to a test case.
    #[serde(default)]
    pub disabled: bool,
}

impl HostInfo {
    /// Creates an enabled host description.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            disabled: false,
        }
    }

    /// Marks the host as disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Remote execution and transfer capability of a testbed node.
///
/// All methods take `&self`: a host may run several commands at once
/// (receiver in the background, sender in the foreground) and each
/// invocation captures its own output.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Static description of this host.
    fn info(&self) -> &HostInfo;

    /// Node name.
    fn name(&self) -> &str {
        &self.info().name
    }

    /// Network address.
    fn address(&self) -> &str {
        &self.info().address
    }

    /// Opens the session. Called from a test case's `prepare`.
    async fn connect(&self) -> Result<(), HostError>;

    /// Closes the session. Called from a test case's `cleanup`.
    async fn disconnect(&self) -> Result<(), HostError>;

    /// Copies a local file to the host.
    async fn put_file(&self, local: &Path, remote: &str) -> Result<(), HostError>;

    /// Copies a file from the host to local storage.
    async fn get_file(&self, remote: &str, local: &Path) -> Result<(), HostError>;

    /// Executes a shell command and returns its standard output.
    async fn execute(&self, command: &str) -> Result<String, HostError>;

    /// Removes a file on the host.
    async fn remove_file(&self, path: &str) -> Result<(), HostError> {
        self.execute(&format!("/bin/rm {path}")).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_info_display() {
        let info = HostInfo::new("node1", "10.0.0.1");
        assert_eq!(info.to_string(), "node1 (10.0.0.1)");
        assert!(!info.disabled);
        assert!(info.disabled().disabled);
    }

    #[test]
    fn test_host_info_deserialize_defaults_disabled() {
        let info: HostInfo =
            serde_json::from_str(r#"{"name":"node2","address":"10.0.0.2"}"#).unwrap();
        assert_eq!(info.name, "node2");
        assert!(!info.disabled);
    }
}
