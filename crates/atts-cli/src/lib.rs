//! # atts-cli
//!
//! Command-line front end of the test harness: configuration loading, the
//! catalog of concrete test cases and the wiring of SSH hosts into them.
//!
//! The `atts` binary reads `atts.yml` and the host inventory, builds the
//! selected cases against the enabled hosts, runs them in order and writes
//! the HTML report.

pub mod catalog;
pub mod config;
pub mod testcases;

pub use catalog::{CatalogEntry, CatalogError, build, catalog, find, select};
pub use config::{ConfigError, HarnessConfig, load_inventory, parse_host};
pub use testcases::Testbed;

use atts_core::{HostInventory, RemoteHost};
use atts_ssh::{SshConfig, SshHost};
use std::sync::Arc;
use std::time::Duration;

/// SSH settings derived from the harness configuration.
pub fn ssh_config(config: &HarnessConfig) -> SshConfig {
    SshConfig {
        user: config.remote_user.clone(),
        key_file: Some(config.key_file.clone()),
        control_dir: config.tmp_dir.clone(),
        connect_timeout: Duration::from_secs(10),
        ..SshConfig::default()
    }
}

/// A testbed with one [`SshHost`] per enabled inventory entry.
pub fn ssh_testbed(config: HarnessConfig, inventory: &HostInventory) -> Testbed {
    let ssh = Arc::new(ssh_config(&config));
    let hosts = inventory
        .enabled()
        .map(|info| Arc::new(SshHost::new(info.clone(), ssh.clone())) as Arc<dyn RemoteHost>)
        .collect();
    Testbed::new(config, hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atts_core::HostInfo;
    use std::path::PathBuf;

    #[test]
    fn test_ssh_testbed_uses_enabled_hosts() {
        let config = HarnessConfig {
            remote_user: "admin".to_string(),
            ..HarnessConfig::default()
        };
        let inventory = HostInventory::new(vec![
            HostInfo::new("node1", "10.0.0.1"),
            HostInfo::new("node2", "10.0.0.2").disabled(),
            HostInfo::new("node3", "10.0.0.3"),
        ]);

        let bed = ssh_testbed(config, &inventory);

        let names: Vec<_> = bed.hosts.iter().map(|h| h.name().to_string()).collect();
        assert_eq!(names, vec!["node1", "node3"]);
    }

    #[test]
    fn test_ssh_config_from_harness() {
        let ssh = ssh_config(&HarnessConfig::default());
        assert_eq!(ssh.user, "root");
        assert_eq!(ssh.key_file, Some(PathBuf::from("data/keys/id_dsa")));
        assert_eq!(ssh.control_dir, PathBuf::from("data/tmp"));
    }
}
