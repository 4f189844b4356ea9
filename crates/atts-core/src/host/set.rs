//! Helpers operating on every host bound to a test case.

use super::{HostError, RemoteHost};
use crate::report::ReportModel;
use std::fmt;
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Remote location of the script that blocks until the DTN daemon is up.
pub const WAIT_SCRIPT_REMOTE: &str = "/tmp/waitfor-dtndaemon.sh";

/// Remote file the system log is gathered into.
pub const SYSLOG_REMOTE: &str = "/tmp/logread.log";

/// Ordered set of hosts bound to a test case.
///
/// Disabled hosts are dropped on construction. The set is immutable once
/// built; test cases index into it (`hosts[0]` is the sender, `hosts[1]` the
/// receiver by convention).
#[derive(Clone, Default)]
pub struct HostSet {
    hosts: Vec<Arc<dyn RemoteHost>>,
}

impl HostSet {
    /// Creates a host set, skipping disabled hosts.
    pub fn new(hosts: impl IntoIterator<Item = Arc<dyn RemoteHost>>) -> Self {
        let hosts = hosts
            .into_iter()
            .filter(|h| {
                if h.info().disabled {
                    warn!("Skipping disabled host {}", h.info());
                    false
                } else {
                    true
                }
            })
            .collect();
        Self { hosts }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn RemoteHost>> {
        self.hosts.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RemoteHost>> {
        self.hosts.iter()
    }

    /// Opens a session on every host, stopping at the first failure.
    ///
    /// Hosts connected before the failure stay connected; the case's cleanup
    /// is expected to call [`HostSet::deactivate_all`] regardless.
    pub async fn activate_all(&self) -> Result<(), HostError> {
        for host in &self.hosts {
            debug!("Activating host {}", host.info());
            host.connect().await?;
        }
        Ok(())
    }

    /// Closes the session on every host.
    ///
    /// Every host is attempted even if an earlier one fails; the first error
    /// is returned.
    pub async fn deactivate_all(&self) -> Result<(), HostError> {
        let mut first_error = None;
        for host in &self.hosts {
            debug!("Deactivating host {}", host.info());
            if let Err(e) = host.disconnect().await {
                warn!("Failed to deactivate {}: {}", host.info(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Copies a local file to the same remote path on every host.
    pub async fn put_all(&self, local: &Path, remote: &str) -> Result<(), HostError> {
        for host in &self.hosts {
            host.put_file(local, remote).await?;
        }
        Ok(())
    }

    /// Removes a remote file on every host. Failures are logged and ignored.
    pub async fn remove_all(&self, remote: &str) {
        for host in &self.hosts {
            if let Err(e) = host.remove_file(remote).await {
                warn!("Could not remove {} on {}: {}", remote, host.name(), e);
            }
        }
    }

    /// Executes a command on every host in order, returning each output.
    pub async fn execute_all(&self, command: &str) -> Result<Vec<String>, HostError> {
        let mut outputs = Vec::with_capacity(self.hosts.len());
        for host in &self.hosts {
            outputs.push(host.execute(command).await?);
        }
        Ok(outputs)
    }

    /// Saves the current UCI configuration of `package` on every host.
    pub async fn save_uci(&self, package: &str) -> Result<(), HostError> {
        self.execute_all(&format!(
            "/sbin/uci export {package} > {}",
            saved_uci_path(package)
        ))
        .await
        .map(|_| ())
    }

    /// Restores the UCI configuration saved by [`HostSet::save_uci`] and
    /// removes the saved copy.
    pub async fn restore_uci(&self, package: &str) -> Result<(), HostError> {
        let saved = saved_uci_path(package);
        self.execute_all(&format!("/bin/cat {saved} | /sbin/uci import {package}"))
            .await?;
        self.remove_all(&saved).await;
        Ok(())
    }

    /// Imports a UCI configuration file already present on every host.
    pub async fn import_uci(&self, package: &str, remote_file: &str) -> Result<(), HostError> {
        self.execute_all(&format!("/bin/cat {remote_file} | /sbin/uci import {package}"))
            .await
            .map(|_| ())
    }

    /// Restarts the DTN daemon and waits until it is up on every host.
    ///
    /// Requires the wait script at [`WAIT_SCRIPT_REMOTE`].
    pub async fn restart_daemon(&self) -> Result<(), HostError> {
        self.execute_all("/etc/init.d/ibrdtn restart").await?;
        self.execute_all(&format!("/bin/sh {WAIT_SCRIPT_REMOTE}"))
            .await
            .map(|_| ())
    }

    /// Gathers the system log of every host and attaches it to the report.
    pub async fn collect_syslog(
        &self,
        report: &mut ReportModel,
        local_dir: &Path,
    ) -> Result<(), HostError> {
        self.execute_all(&format!("/sbin/logread >> {SYSLOG_REMOTE}"))
            .await?;
        let attached = self
            .report_file(report, local_dir, SYSLOG_REMOTE, "System Log")
            .await;
        self.remove_all(SYSLOG_REMOTE).await;
        attached
    }

    /// Fetches `remote` from every host and attaches each copy to the report.
    pub async fn report_file(
        &self,
        report: &mut ReportModel,
        local_dir: &Path,
        remote: &str,
        description: &str,
    ) -> Result<(), HostError> {
        for host in &self.hosts {
            let local = local_copy_path(local_dir, report.name(), host.name(), remote);
            host.get_file(remote, &local).await?;
            report.add_file(host.name(), local, remote, description);
        }
        Ok(())
    }

    /// Fetches `remote` from one host and returns its content.
    pub async fn file_content(
        host: &dyn RemoteHost,
        local_dir: &Path,
        case_name: &str,
        remote: &str,
    ) -> Result<String, HostError> {
        let local = local_copy_path(local_dir, case_name, host.name(), remote);
        host.get_file(remote, &local).await?;
        Ok(tokio::fs::read_to_string(&local).await?)
    }
}

impl Index<usize> for HostSet {
    type Output = Arc<dyn RemoteHost>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.hosts[index]
    }
}

impl fmt::Debug for HostSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hosts.iter().map(|h| h.name()))
            .finish()
    }
}

fn saved_uci_path(package: &str) -> String {
    format!("/tmp/saved-{package}.config")
}

/// Local path a remote file is copied to: `<dir>/<case>.<host>.<remote path with / as .>`.
pub fn local_copy_path(local_dir: &Path, case_name: &str, host_name: &str, remote: &str) -> PathBuf {
    local_dir.join(format!(
        "{}.{}.{}",
        case_name,
        host_name,
        remote.replace('/', ".")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostInfo;
    use crate::testing::{HostCall, MockHost};
    use tempfile::TempDir;

    fn two_hosts() -> (Arc<MockHost>, Arc<MockHost>, HostSet) {
        let a = Arc::new(MockHost::new(HostInfo::new("a", "10.0.0.1")));
        let b = Arc::new(MockHost::new(HostInfo::new("b", "10.0.0.2")));
        let set = HostSet::new([
            a.clone() as Arc<dyn RemoteHost>,
            b.clone() as Arc<dyn RemoteHost>,
        ]);
        (a, b, set)
    }

    #[test]
    fn test_new_skips_disabled_hosts() {
        let a: Arc<dyn RemoteHost> = Arc::new(MockHost::new(HostInfo::new("a", "10.0.0.1")));
        let b: Arc<dyn RemoteHost> =
            Arc::new(MockHost::new(HostInfo::new("b", "10.0.0.2").disabled()));
        let set = HostSet::new([a, b]);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].name(), "a");
    }

    #[test]
    fn test_local_copy_path() {
        let path = local_copy_path(Path::new("data/tmp"), "ping01", "node1", "/tmp/echo.log");
        assert_eq!(path, Path::new("data/tmp/ping01.node1..tmp.echo.log"));
    }

    #[tokio::test]
    async fn test_deactivate_all_attempts_every_host() {
        let (a, b, set) = two_hosts();
        a.fail_disconnect();

        let result = set.deactivate_all().await;

        assert!(result.is_err());
        assert_eq!(b.calls(), vec![HostCall::Disconnect]);
    }

    #[tokio::test]
    async fn test_save_and_restore_uci() {
        let (a, _b, set) = two_hosts();
        set.save_uci("ibrdtn").await.unwrap();
        set.restore_uci("ibrdtn").await.unwrap();

        let commands = a.executed();
        assert_eq!(
            commands,
            vec![
                "/sbin/uci export ibrdtn > /tmp/saved-ibrdtn.config".to_string(),
                "/bin/cat /tmp/saved-ibrdtn.config | /sbin/uci import ibrdtn".to_string(),
                "/bin/rm /tmp/saved-ibrdtn.config".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_all_ignores_failures() {
        let (a, b, set) = two_hosts();
        a.fail_command("/bin/rm /tmp/x");

        set.remove_all("/tmp/x").await;

        assert_eq!(b.executed(), vec!["/bin/rm /tmp/x".to_string()]);
    }

    #[tokio::test]
    async fn test_collect_syslog_attaches_one_file_per_host() {
        let dir = TempDir::new().unwrap();
        let (a, b, set) = two_hosts();
        a.add_remote_file(SYSLOG_REMOTE, "log a");
        b.add_remote_file(SYSLOG_REMOTE, "log b");
        let mut report = ReportModel::new("case", "desc");

        set.collect_syslog(&mut report, dir.path()).await.unwrap();

        assert_eq!(report.files().len(), 2);
        assert_eq!(report.files()[0].host, "a");
        assert_eq!(report.files()[1].description, "System Log");
        let content = std::fs::read_to_string(&report.files()[1].local_path).unwrap();
        assert_eq!(content, "log b");
        assert!(a.executed().contains(&"/bin/rm /tmp/logread.log".to_string()));
    }

    #[tokio::test]
    async fn test_file_content_reads_fetched_copy() {
        let dir = TempDir::new().unwrap();
        let (a, _b, _set) = two_hosts();
        a.add_remote_file("/tmp/echo-output.log", "10 packets");

        let content = HostSet::file_content(a.as_ref(), dir.path(), "ping01", "/tmp/echo-output.log")
            .await
            .unwrap();

        assert_eq!(content, "10 packets");
    }
}
