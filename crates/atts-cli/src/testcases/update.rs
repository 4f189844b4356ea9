//! Testbed maintenance: software update and reachability check.

use super::Testbed;
use async_trait::async_trait;
use atts_core::{CaseContext, CaseError, HostError, RemoteHost, TestCase};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, warn};

const UPDATE_SCRIPT_REMOTE: &str = "/tmp/update-ibrdtn.sh";

static PING_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+) packets transmitted, ([0-9]+) received").expect("valid regex")
});

/// Runs the update script on every enabled host.
pub struct UpdateSoftware {
    ctx: CaseContext,
    script: PathBuf,
}

impl UpdateSoftware {
    pub const NAME: &'static str = "UpdateSoftware";

    pub fn new(testbed: &Testbed) -> Self {
        Self {
            ctx: testbed.context(Self::NAME, "Update the software on the nodes.", testbed.all()),
            script: testbed.config.script("update-ibrdtn.sh"),
        }
    }

    async fn update(&self, host: &dyn RemoteHost) -> Result<(), HostError> {
        host.connect().await?;
        let steps = async {
            host.put_file(&self.script, UPDATE_SCRIPT_REMOTE).await?;
            host.execute(&format!("/bin/sh {UPDATE_SCRIPT_REMOTE}")).await?;
            host.remove_file(UPDATE_SCRIPT_REMOTE).await
        }
        .await;
        let closed = host.disconnect().await;
        steps.and(closed)
    }
}

#[async_trait]
impl TestCase for UpdateSoftware {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        let hosts = self.ctx.hosts().clone();
        for host in hosts.iter() {
            self.update(host.as_ref()).await?;
            self.ctx.print(format!("host {} updated", host.address()));
        }
        Ok(())
    }
}

/// Pings every enabled host from the local machine.
pub struct ConnectionTest {
    ctx: CaseContext,
    ping_program: String,
}

impl ConnectionTest {
    pub const NAME: &'static str = "ConnectionTest";

    pub fn new(testbed: &Testbed) -> Self {
        Self {
            ctx: testbed.context(Self::NAME, "A simple connection test.", testbed.all()),
            ping_program: "ping".to_string(),
        }
    }

    /// Uses another ping binary.
    pub fn with_ping_program(mut self, program: impl Into<String>) -> Self {
        self.ping_program = program.into();
        self
    }

    /// Whether four pings to `address` all came back.
    async fn ping(&self, address: &str) -> Result<bool, CaseError> {
        debug!("{} -c 4 {}", self.ping_program, address);
        let output = Command::new(&self.ping_program)
            .args(["-c", "4", address])
            .output()
            .await?;
        Ok(all_received(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses ping's summary line; `false` if absent or packets were lost.
pub fn all_received(ping_output: &str) -> bool {
    PING_SUMMARY.captures(ping_output).is_some_and(|caps| {
        let transmitted = &caps[1];
        let received = &caps[2];
        transmitted == received
    })
}

#[async_trait]
impl TestCase for ConnectionTest {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        let addresses: Vec<String> = self
            .ctx
            .hosts()
            .iter()
            .map(|h| h.address().to_string())
            .collect();
        for address in addresses {
            if self.ping(&address).await? {
                self.ctx.print(format!("pinging host {address} successful"));
            } else {
                warn!("Host {} did not answer every ping", address);
                self.ctx.print(format!("pinging host {address} failed"));
                self.ctx.mark_failed();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::fixtures::testbed;
    use atts_core::testing::HostCall;
    use tempfile::TempDir;

    #[test]
    fn test_all_received() {
        assert!(all_received(
            "4 packets transmitted, 4 received, 0% packet loss, time 3004ms"
        ));
        assert!(!all_received(
            "4 packets transmitted, 3 received, 25% packet loss, time 3004ms"
        ));
        assert!(!all_received("ping: unknown host"));
    }

    #[tokio::test]
    async fn test_update_visits_every_host_and_closes_sessions() {
        let tmp = TempDir::new().unwrap();
        let (mocks, bed) = testbed(tmp.path());
        let mut case = UpdateSoftware::new(&bed);

        case.run().await.unwrap();

        for mock in &mocks {
            let calls = mock.calls();
            assert_eq!(calls.first(), Some(&HostCall::Connect));
            assert_eq!(calls.last(), Some(&HostCall::Disconnect));
            assert!(mock.executed().contains(&"/bin/sh /tmp/update-ibrdtn.sh".to_string()));
            assert!(mock.remote_file(UPDATE_SCRIPT_REMOTE).is_none());
        }
        assert_eq!(
            case.report().narrative(),
            ["host 10.0.0.1 updated".to_string(), "host 10.0.0.2 updated".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_failure_still_disconnects() {
        let tmp = TempDir::new().unwrap();
        let (mocks, bed) = testbed(tmp.path());
        mocks[0].fail_command("/bin/sh /tmp/update-ibrdtn.sh");
        let mut case = UpdateSoftware::new(&bed);

        assert!(case.run().await.is_err());
        assert!(!mocks[0].is_connected());
        assert!(mocks[1].calls().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unparsable_ping_output_flags_failure() {
        let tmp = TempDir::new().unwrap();
        let (_, bed) = testbed(tmp.path());
        let mut case = ConnectionTest::new(&bed).with_ping_program("echo");

        case.run().await.unwrap();

        assert!(case.failed());
        assert_eq!(case.report().narrative()[0], "pinging host 10.0.0.1 failed");
    }
}
