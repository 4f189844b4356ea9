//! Concrete test cases.
//!
//! Each case owns a [`CaseContext`] bound to the hosts it needs and is
//! built from a [`Testbed`]. Cases that reconfigure the DTN daemon share the
//! [`DaemonFixture`], which installs a UCI configuration in `prepare` and
//! puts everything back in `cleanup`.

pub mod fake;
pub mod filetransfer;
pub mod logreports;
pub mod ping;
pub mod update;

use crate::config::HarnessConfig;
use atts_core::host::WAIT_SCRIPT_REMOTE;
use atts_core::{CaseContext, CaseError, HostSet, RemoteHost};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// UCI package of the DTN daemon.
pub const UCI_PACKAGE: &str = "ibrdtn";

/// Remote location of the UCI configuration installed for a test.
pub const TEST_CONFIG_REMOTE: &str = "/tmp/test-ibrdtn.config";

/// Everything a case is built from: settings and the enabled hosts.
#[derive(Clone)]
pub struct Testbed {
    pub config: Arc<HarnessConfig>,
    /// Enabled hosts in inventory order.
    pub hosts: Vec<Arc<dyn RemoteHost>>,
}

impl Testbed {
    pub fn new(config: HarnessConfig, hosts: Vec<Arc<dyn RemoteHost>>) -> Self {
        Self {
            config: Arc::new(config),
            hosts,
        }
    }

    /// The first `count` hosts, or [`CaseError::NotEnoughHosts`].
    pub fn pick(&self, case: &str, count: usize) -> Result<HostSet, CaseError> {
        if self.hosts.len() < count {
            return Err(CaseError::NotEnoughHosts {
                case: case.to_string(),
                needed: count,
                available: self.hosts.len(),
            });
        }
        Ok(HostSet::new(self.hosts.iter().take(count).cloned()))
    }

    pub fn all(&self) -> HostSet {
        HostSet::new(self.hosts.iter().cloned())
    }

    /// Creates a context for `name` bound to `hosts`.
    pub fn context(&self, name: &str, description: &str, hosts: HostSet) -> CaseContext {
        CaseContext::new(name, description, hosts, self.config.tmp_dir.clone())
    }
}

/// Runs cleanup steps to the end and keeps the first failure.
#[derive(Debug, Default)]
pub struct CleanupSteps {
    first: Option<CaseError>,
}

impl CleanupSteps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one step.
    pub fn step<E: Into<CaseError>>(&mut self, what: &str, result: Result<(), E>) {
        if let Err(e) = result {
            let e = e.into();
            warn!("Cleanup step '{}' failed: {}", what, e);
            self.first.get_or_insert(e);
        }
    }

    pub fn finish(self) -> Result<(), CaseError> {
        self.first.map_or(Ok(()), Err)
    }
}

/// Daemon reconfiguration shared by the ping and transfer cases.
#[derive(Debug, Clone)]
pub struct DaemonFixture {
    /// Local UCI file installed on every host.
    pub uci_config: PathBuf,
    /// Local wait script uploaded to [`WAIT_SCRIPT_REMOTE`].
    pub wait_script: PathBuf,
}

impl DaemonFixture {
    pub fn new(config: &HarnessConfig, uci_file: &str) -> Self {
        Self {
            uci_config: config.uci_config(uci_file),
            wait_script: config.script("waitfor-dtndaemon.sh"),
        }
    }

    /// Opens the sessions, saves the current configuration, installs the
    /// test configuration and restarts the daemons.
    pub async fn prepare(&self, ctx: &CaseContext) -> Result<(), CaseError> {
        let hosts = ctx.hosts();
        hosts.activate_all().await?;
        hosts.put_all(&self.wait_script, WAIT_SCRIPT_REMOTE).await?;
        hosts.save_uci(UCI_PACKAGE).await?;
        hosts.put_all(&self.uci_config, TEST_CONFIG_REMOTE).await?;
        hosts.import_uci(UCI_PACKAGE, TEST_CONFIG_REMOTE).await?;
        hosts.restart_daemon().await?;
        Ok(())
    }

    /// Restores the saved configuration, restarts the daemons, collects the
    /// system logs and closes the sessions. Every step is attempted.
    pub async fn cleanup(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        let mut steps = CleanupSteps::new();
        let hosts = ctx.hosts().clone();
        hosts.remove_all(TEST_CONFIG_REMOTE).await;
        hosts.remove_all(WAIT_SCRIPT_REMOTE).await;
        steps.step("restore uci", hosts.restore_uci(UCI_PACKAGE).await);
        steps.step("restart daemon", hosts.restart_daemon().await);
        steps.step("collect syslog", ctx.collect_syslog().await);
        steps.step("deactivate", hosts.deactivate_all().await);
        steps.finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use atts_core::HostInfo;
    use atts_core::testing::MockHost;
    use std::path::Path;

    /// Two mock hosts and a configuration pointing into `dir`, with the
    /// data files the daemon fixture uploads.
    pub fn testbed(dir: &Path) -> (Vec<Arc<MockHost>>, Testbed) {
        let config = HarnessConfig {
            tmp_dir: dir.join("tmp"),
            scripts_dir: dir.join("scripts"),
            config_dir: dir.join("config"),
            mocks_dir: dir.join("mocks"),
            settle_delay_secs: 0,
            drain_delay_secs: 0,
            ..HarnessConfig::default()
        };
        for sub in ["tmp", "scripts", "config", "mocks"] {
            std::fs::create_dir_all(dir.join(sub)).unwrap();
        }
        std::fs::write(config.script("waitfor-dtndaemon.sh"), "#!/bin/sh\n").unwrap();
        std::fs::write(config.script("update-ibrdtn.sh"), "#!/bin/sh\n").unwrap();
        for uci in [
            "ibrdtn-config.uci",
            "ibrdtn-config-wired.uci",
            "ibrdtn-config-dynamic.uci",
            "ibrdtn-config-vpn.uci",
        ] {
            std::fs::write(config.uci_config(uci), "config daemon\n").unwrap();
        }

        let mocks: Vec<_> = [("node1", "10.0.0.1"), ("node2", "10.0.0.2")]
            .into_iter()
            .map(|(name, ip)| {
                let host = Arc::new(MockHost::new(HostInfo::new(name, ip)));
                host.produce_file("/sbin/logread", "/tmp/logread.log", format!("{name} syslog\n"));
                host
            })
            .collect();
        let hosts = mocks
            .iter()
            .map(|m| m.clone() as Arc<dyn RemoteHost>)
            .collect();
        (mocks, Testbed::new(config, hosts))
    }
}
