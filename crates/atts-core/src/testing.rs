//! Scripted in-memory host for tests.
//!
//! `MockHost` records every call made against it and answers from a small
//! script: canned outputs and failures keyed by command prefix, plus an
//! in-memory remote filesystem that `put_file`/`get_file` operate on.

use crate::host::{HostError, HostInfo, RemoteHost};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// A call observed by a [`MockHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Connect,
    Disconnect,
    Put { local: PathBuf, remote: String },
    Get { remote: String, local: PathBuf },
    Execute(String),
}

#[derive(Debug, Default)]
struct Script {
    responses: Vec<(String, String)>,
    failures: Vec<String>,
    delays: Vec<(String, Duration)>,
    produces: Vec<(String, String, Vec<u8>)>,
    fail_connect: bool,
    fail_disconnect: bool,
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    calls: Vec<HostCall>,
    files: HashMap<String, Vec<u8>>,
}

/// In-memory [`RemoteHost`] driven by a script.
#[derive(Debug)]
pub struct MockHost {
    info: HostInfo,
    script: Mutex<Script>,
    state: Mutex<State>,
}

impl MockHost {
    pub fn new(info: HostInfo) -> Self {
        Self {
            info,
            script: Mutex::new(Script::default()),
            state: Mutex::new(State::default()),
        }
    }

    /// Commands starting with `prefix` return `output`.
    pub fn respond(&self, prefix: &str, output: &str) {
        self.script()
            .responses
            .push((prefix.to_string(), output.to_string()));
    }

    /// Commands starting with `prefix` fail with exit status 1.
    pub fn fail_command(&self, prefix: &str) {
        self.script().failures.push(prefix.to_string());
    }

    /// Commands starting with `prefix` take `delay` to complete.
    pub fn delay_command(&self, prefix: &str, delay: Duration) {
        self.script().delays.push((prefix.to_string(), delay));
    }

    /// Commands starting with `prefix` create `remote` with `contents`.
    pub fn produce_file(&self, prefix: &str, remote: &str, contents: impl Into<Vec<u8>>) {
        self.script()
            .produces
            .push((prefix.to_string(), remote.to_string(), contents.into()));
    }

    pub fn fail_connect(&self) {
        self.script().fail_connect = true;
    }

    pub fn fail_disconnect(&self) {
        self.script().fail_disconnect = true;
    }

    /// Places a file on the simulated remote filesystem.
    pub fn add_remote_file(&self, remote: &str, contents: impl Into<Vec<u8>>) {
        self.state()
            .files
            .insert(remote.to_string(), contents.into());
    }

    pub fn remote_file(&self, remote: &str) -> Option<Vec<u8>> {
        self.state().files.get(remote).cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Every call in the order it was made.
    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    /// Executed commands in order.
    pub fn executed(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Execute(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: HostCall) {
        self.state().calls.push(call);
    }
}

#[async_trait]
impl RemoteHost for MockHost {
    fn info(&self) -> &HostInfo {
        &self.info
    }

    async fn connect(&self) -> Result<(), HostError> {
        self.record(HostCall::Connect);
        if self.script().fail_connect {
            return Err(HostError::Connection {
                host: self.info.name.clone(),
                reason: "scripted connect failure".to_string(),
            });
        }
        self.state().connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), HostError> {
        self.record(HostCall::Disconnect);
        self.state().connected = false;
        if self.script().fail_disconnect {
            return Err(HostError::Connection {
                host: self.info.name.clone(),
                reason: "scripted disconnect failure".to_string(),
            });
        }
        Ok(())
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<(), HostError> {
        self.record(HostCall::Put {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        let contents = tokio::fs::read(local)
            .await
            .map_err(|e| HostError::Transfer {
                from: local.display().to_string(),
                to: format!("{}:{}", self.info.name, remote),
                reason: e.to_string(),
            })?;
        self.state().files.insert(remote.to_string(), contents);
        Ok(())
    }

    async fn get_file(&self, remote: &str, local: &Path) -> Result<(), HostError> {
        self.record(HostCall::Get {
            remote: remote.to_string(),
            local: local.to_path_buf(),
        });
        let contents = self
            .state()
            .files
            .get(remote)
            .cloned()
            .ok_or_else(|| HostError::Transfer {
                from: format!("{}:{}", self.info.name, remote),
                to: local.display().to_string(),
                reason: "no such file".to_string(),
            })?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, contents).await?;
        Ok(())
    }

    async fn execute(&self, command: &str) -> Result<String, HostError> {
        self.record(HostCall::Execute(command.to_string()));

        let delay = self
            .script()
            .delays
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.script();
        if script
            .failures
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
        {
            return Err(HostError::Command {
                host: self.info.name.clone(),
                command: command.to_string(),
                status: Some(1),
                stderr: "scripted failure".to_string(),
            });
        }

        let produced: Vec<_> = script
            .produces
            .iter()
            .filter(|(prefix, _, _)| command.starts_with(prefix.as_str()))
            .map(|(_, remote, contents)| (remote.clone(), contents.clone()))
            .collect();
        let output = script
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        drop(script);

        let mut state = self.state();
        state.files.extend(produced);
        if let Some(path) = command.strip_prefix("/bin/rm ") {
            state.files.remove(path.trim());
        }
        Ok(output)
    }
}
