//! `ping01`: a DTN echo between two nodes.

use super::{DaemonFixture, Testbed};
use async_trait::async_trait;
use atts_core::{CaseContext, CaseError, TestCase};
use tracing::warn;

const ECHO_OUTPUT_REMOTE: &str = "/tmp/echo-output.log";

pub struct SimplePing {
    ctx: CaseContext,
    fixture: DaemonFixture,
}

impl SimplePing {
    pub const NAME: &'static str = "ping01";

    pub fn new(testbed: &Testbed) -> Result<Self, CaseError> {
        let hosts = testbed.pick(Self::NAME, 2)?;
        Ok(Self {
            ctx: testbed.context(
                Self::NAME,
                "A simple dtn ping between two nodes with wireless network.",
                hosts,
            ),
            fixture: DaemonFixture::new(&testbed.config, "ibrdtn-config.uci"),
        })
    }
}

#[async_trait]
impl TestCase for SimplePing {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn prepare(&mut self) -> Result<(), CaseError> {
        self.fixture.prepare(&self.ctx).await
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        let hosts = self.ctx.hosts();
        let command = format!(
            "/usr/bin/dtnping --count 10 --lifetime 60 dtn://{}/echo > {} 2>&1",
            hosts[1].name(),
            ECHO_OUTPUT_REMOTE
        );
        hosts[0].execute(&command).await?;

        let output = self.ctx.file_content(0, ECHO_OUTPUT_REMOTE).await?;
        self.ctx.print(output.trim_end());
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), CaseError> {
        if let Err(e) = self.ctx.hosts()[0].remove_file(ECHO_OUTPUT_REMOTE).await {
            warn!("Could not remove {}: {}", ECHO_OUTPUT_REMOTE, e);
        }
        self.fixture.cleanup(&mut self.ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::fixtures::testbed;
    use atts_core::{RunConfig, TestRunner};
    use tempfile::TempDir;

    const ECHO: &str = "ECHO dtn://node2/echo\n10 bundles sent, 10 received\n";

    #[tokio::test]
    async fn test_ping_report_contains_echo_output() {
        let tmp = TempDir::new().unwrap();
        let (mocks, bed) = testbed(tmp.path());
        mocks[0].produce_file("/usr/bin/dtnping", ECHO_OUTPUT_REMOTE, ECHO);
        let case = SimplePing::new(&bed).unwrap();

        let results = TestRunner::new(vec![Box::new(case)])
            .run(&RunConfig::default())
            .await
            .unwrap();

        let outcome = &results.outcomes[0];
        assert!(outcome.passed, "{:?}", outcome.error);
        assert_eq!(outcome.report.narrative()[0], ECHO.trim_end());
        assert!(mocks[0].executed().contains(
            &"/usr/bin/dtnping --count 10 --lifetime 60 dtn://node2/echo > /tmp/echo-output.log 2>&1"
                .to_string()
        ));
        assert!(mocks[0].remote_file(ECHO_OUTPUT_REMOTE).is_none());
        assert!(!mocks[0].is_connected());
        assert!(!mocks[1].is_connected());
    }

    #[tokio::test]
    async fn test_ping_failure_restores_configuration() {
        let tmp = TempDir::new().unwrap();
        let (mocks, bed) = testbed(tmp.path());
        mocks[0].fail_command("/usr/bin/dtnping");
        let case = SimplePing::new(&bed).unwrap();

        let results = TestRunner::new(vec![Box::new(case)])
            .run(&RunConfig::default())
            .await
            .unwrap();

        assert!(!results.outcomes[0].passed);
        for mock in &mocks {
            assert!(
                mock.executed()
                    .contains(&"/bin/cat /tmp/saved-ibrdtn.config | /sbin/uci import ibrdtn".to_string())
            );
            assert!(!mock.is_connected());
        }
    }

    #[test]
    fn test_needs_two_hosts() {
        let tmp = TempDir::new().unwrap();
        let (_, mut bed) = testbed(tmp.path());
        bed.hosts.truncate(1);
        assert!(matches!(
            SimplePing::new(&bed),
            Err(CaseError::NotEnoughHosts { needed: 2, .. })
        ));
    }
}
