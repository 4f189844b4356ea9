//! Explicit host inventory.
//!
//! The inventory is built once at startup and passed to whoever needs it.
//! Loading it from disk is the CLI's job; this type only holds the result.

use super::HostInfo;

/// Ordered collection of known testbed hosts.
#[derive(Debug, Clone, Default)]
pub struct HostInventory {
    hosts: Vec<HostInfo>,
}

impl HostInventory {
    /// Creates an inventory from host descriptions, keeping their order.
    pub fn new(hosts: Vec<HostInfo>) -> Self {
        Self { hosts }
    }

    /// All hosts, disabled ones included.
    pub fn all(&self) -> &[HostInfo] {
        &self.hosts
    }

    /// Hosts that may be bound to test cases.
    pub fn enabled(&self) -> impl Iterator<Item = &HostInfo> {
        self.hosts.iter().filter(|h| !h.disabled)
    }

    /// Number of enabled hosts.
    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    /// Looks up a host by name.
    pub fn get(&self, name: &str) -> Option<&HostInfo> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
