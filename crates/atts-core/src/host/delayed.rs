//! Background command execution.
//!
//! Used to overlap two commands on different hosts, typically a receiver that
//! blocks until a bundle arrives and the sender that produces it:
//!
//! ```no_run
//! # use atts_core::host::{DelayedExecution, RemoteHost, HostError};
//! # use std::sync::Arc;
//! # async fn demo(sender: Arc<dyn RemoteHost>, receiver: Arc<dyn RemoteHost>) -> Result<(), HostError> {
//! let recv = DelayedExecution::start(receiver, "/usr/bin/dtnrecv --name ts").await;
//! let start = std::time::Instant::now();
//! sender.execute("/usr/bin/dtnsend dtn://node2/ts /tmp/payload").await?;
//! recv.join().await?;
//! let elapsed = start.elapsed();
//! # let _ = elapsed;
//! # Ok(())
//! # }
//! ```

use super::{HostError, RemoteHost};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// A command running on a host in a spawned task.
///
/// The task touches nothing but its own result; [`DelayedExecution::join`]
/// hands back the captured output or the command error.
pub struct DelayedExecution {
    host: String,
    command: String,
    handle: JoinHandle<Result<String, HostError>>,
}

impl DelayedExecution {
    /// Starts `command` on `host` in the background.
    ///
    /// Returns once the spawned task has begun issuing the command, so
    /// anything the caller does afterwards happens after the start.
    pub async fn start(host: Arc<dyn RemoteHost>, command: impl Into<String>) -> Self {
        let command = command.into();
        let name = host.name().to_string();
        debug!("Starting background command on {}: {}", name, command);

        let (started_tx, started_rx) = oneshot::channel();
        let task_command = command.clone();
        let handle = tokio::spawn(async move {
            let _ = started_tx.send(());
            host.execute(&task_command).await
        });
        // The sender is dropped only if the task never ran, in which case
        // join() reports the failure.
        let _ = started_rx.await;

        Self {
            host: name,
            command,
            handle,
        }
    }

    /// Waits for the command to finish.
    pub async fn join(self) -> Result<String, HostError> {
        let Self {
            host,
            command,
            handle,
        } = self;
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(HostError::Command {
                host,
                command,
                status: None,
                stderr: format!("background task aborted: {e}"),
            }),
        }
    }

    /// Waits for the command to finish, giving up after `timeout`.
    ///
    /// On timeout the task is aborted and [`HostError::Timeout`] is returned;
    /// the remote process itself is not killed.
    pub async fn join_timeout(self, timeout: Duration) -> Result<String, HostError> {
        let Self {
            host,
            command,
            mut handle,
        } = self;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(HostError::Command {
                host,
                command,
                status: None,
                stderr: format!("background task aborted: {e}"),
            }),
            Err(_) => {
                handle.abort();
                Err(HostError::Timeout {
                    host,
                    command,
                    timeout,
                })
            }
        }
    }
}
