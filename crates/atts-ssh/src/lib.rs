//! # atts-ssh
//!
//! [`RemoteHost`] implemented on top of the system `ssh` and `scp` binaries.
//!
//! `connect` starts a multiplexing master (`ControlMaster`) in the
//! background; every later command and copy reuses its socket, so a test
//! case pays for authentication once per host. `disconnect` asks the master
//! to exit. All invocations run in batch mode with the configured key file,
//! so a missing or rejected key fails fast instead of prompting.

use async_trait::async_trait;
use atts_core::host::{HostError, HostInfo, RemoteHost};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Settings shared by every [`SshHost`] of a run.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote login user.
    pub user: String,
    /// Private key passed with `-i`.
    pub key_file: Option<PathBuf>,
    /// Directory holding the control sockets.
    pub control_dir: PathBuf,
    pub ssh_program: String,
    pub scp_program: String,
    pub connect_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            key_file: None,
            control_dir: std::env::temp_dir(),
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// A testbed node reached over SSH.
#[derive(Debug)]
pub struct SshHost {
    info: HostInfo,
    config: Arc<SshConfig>,
    active: AtomicBool,
}

impl SshHost {
    pub fn new(info: HostInfo, config: Arc<SshConfig>) -> Self {
        Self {
            info,
            config,
            active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// `user@address`.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.config.user, self.info.address)
    }

    pub fn control_path(&self) -> PathBuf {
        self.config
            .control_dir
            .join(format!("atts-{}.ctl", self.info.name))
    }

    /// Arguments starting the background master connection.
    pub fn connect_args(&self) -> Vec<String> {
        let mut args = self.common_options();
        args.extend(
            ["-o", "ControlMaster=yes", "-o", "ControlPersist=yes", "-f", "-N"]
                .map(String::from),
        );
        args.push(self.destination());
        args
    }

    /// Arguments asking the master connection to exit.
    pub fn exit_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            format!("ControlPath={}", self.control_path().display()),
            "-O".to_string(),
            "exit".to_string(),
            self.destination(),
        ]
    }

    pub fn command_args(&self, command: &str) -> Vec<String> {
        let mut args = self.common_options();
        args.push(self.destination());
        args.push(command.to_string());
        args
    }

    pub fn put_args(&self, local: &Path, remote: &str) -> Vec<String> {
        let mut args = self.common_options();
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.destination(), remote));
        args
    }

    pub fn get_args(&self, remote: &str, local: &Path) -> Vec<String> {
        let mut args = self.common_options();
        args.push(format!("{}:{}", self.destination(), remote));
        args.push(local.display().to_string());
        args
    }

    fn common_options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout.as_secs()),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path().display()),
        ];
        if let Some(key) = &self.config.key_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }

    fn ensure_active(&self) -> Result<(), HostError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(HostError::NotActive(self.info.name.clone()))
        }
    }

    async fn invoke(&self, program: &str, args: &[String]) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }
}

/// Stderr of a finished process, trimmed.
fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Runs a command that backgrounds itself after startup (`ssh -f`).
///
/// The forked master may keep the inherited stderr open for its whole
/// lifetime, so only the exit status is awaited and stderr is read after a
/// failure, when nothing was left running.
async fn start_detached(host: &str, program: &str, args: &[String]) -> Result<(), HostError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    let stderr = child.stderr.take();
    let status = child.wait().await?;
    if status.success() {
        return Ok(());
    }

    let mut raw = Vec::new();
    if let Some(mut pipe) = stderr {
        pipe.read_to_end(&mut raw).await?;
    }
    Err(HostError::Connection {
        host: host.to_string(),
        reason: String::from_utf8_lossy(&raw).trim().to_string(),
    })
}

/// Maps a finished remote command to its stdout or a [`HostError::Command`].
fn command_result(host: &str, command: &str, output: &Output) -> Result<String, HostError> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(HostError::Command {
            host: host.to_string(),
            command: command.to_string(),
            status: output.status.code(),
            stderr: stderr_of(output),
        })
    }
}

#[async_trait]
impl RemoteHost for SshHost {
    fn info(&self) -> &HostInfo {
        &self.info
    }

    async fn connect(&self) -> Result<(), HostError> {
        if self.is_active() {
            return Ok(());
        }
        debug!("Opening ssh master to {}", self.info);
        start_detached(
            &self.info.name,
            &self.config.ssh_program,
            &self.connect_args(),
        )
        .await?;
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), HostError> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("Closing ssh master to {}", self.info);
        let output = self
            .invoke(&self.config.ssh_program, &self.exit_args())
            .await?;
        if !output.status.success() {
            warn!("ssh master to {} did not exit cleanly: {}", self.info, stderr_of(&output));
            return Err(HostError::Connection {
                host: self.info.name.clone(),
                reason: stderr_of(&output),
            });
        }
        Ok(())
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<(), HostError> {
        self.ensure_active()?;
        debug!("Copying {} to {}:{}", local.display(), self.info.name, remote);
        let output = self
            .invoke(&self.config.scp_program, &self.put_args(local, remote))
            .await?;
        if !output.status.success() {
            return Err(HostError::Transfer {
                from: local.display().to_string(),
                to: format!("{}:{}", self.info.name, remote),
                reason: stderr_of(&output),
            });
        }
        Ok(())
    }

    async fn get_file(&self, remote: &str, local: &Path) -> Result<(), HostError> {
        self.ensure_active()?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("Copying {}:{} to {}", self.info.name, remote, local.display());
        let output = self
            .invoke(&self.config.scp_program, &self.get_args(remote, local))
            .await?;
        if !output.status.success() {
            return Err(HostError::Transfer {
                from: format!("{}:{}", self.info.name, remote),
                to: local.display().to_string(),
                reason: stderr_of(&output),
            });
        }
        Ok(())
    }

    async fn execute(&self, command: &str) -> Result<String, HostError> {
        self.ensure_active()?;
        debug!("{}: {}", self.info.name, command);
        let output = self
            .invoke(&self.config.ssh_program, &self.command_args(command))
            .await?;
        command_result(&self.info.name, command, &output)
    }
}
