//! Smoke cases for the report pipeline. They touch no host.

use super::Testbed;
use async_trait::async_trait;
use atts_core::report::GraphSpec;
use atts_core::{CaseContext, CaseError, HostSet, TestCase};

/// Always flags itself failed.
pub struct FakeTestFailed {
    ctx: CaseContext,
}

impl FakeTestFailed {
    pub const NAME: &'static str = "FakeTestFailed";

    pub fn new(testbed: &Testbed) -> Self {
        Self {
            ctx: testbed.context(
                Self::NAME,
                "This is just a fake test to prove the report modules.",
                HostSet::default(),
            ),
        }
    }
}

#[async_trait]
impl TestCase for FakeTestFailed {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        self.ctx.mark_failed();
        Ok(())
    }
}

/// Fills a regular and a persistent graph and some narrative.
pub struct FakeTestSuccessful {
    ctx: CaseContext,
}

impl FakeTestSuccessful {
    pub const NAME: &'static str = "FakeTestSuccessful";

    pub fn new(testbed: &Testbed) -> Self {
        let mut ctx = testbed.context(
            Self::NAME,
            "This is just a fake test to prove the report modules.",
            HostSet::default(),
        );
        ctx.report_mut().define_graph(
            GraphSpec::new(1, "Throughput", "Throughput of the file transfers")
                .labels("X Axis", "Y Axis"),
        );
        ctx.report_mut().define_graph(
            GraphSpec::new(2, "Persistent Throughput", "Throughput of the file transfers")
                .persistent(),
        );
        Self { ctx }
    }
}

#[async_trait]
impl TestCase for FakeTestSuccessful {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        let report = self.ctx.report_mut();
        report.add_data_point(1, 1u32, 2.0);
        report.add_narrative_line("Some output");
        for (x, y) in [(2u32, 3.0), (3, 4.0), (4, 1.0)] {
            report.add_data_point(1, x, y);
        }
        report.add_narrative_line("Hello World, second line");
        report.add_narrative_line("Hello World");
        for (x, y) in [(2u32, 3.0), (3, 4.0), (4, 1.0)] {
            report.add_data_point(2, x, y);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::fixtures::testbed;
    use atts_core::{RunConfig, TestRunner};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fake_cases_through_runner() {
        let tmp = TempDir::new().unwrap();
        let (_, bed) = testbed(tmp.path());
        let cases: Vec<Box<dyn TestCase>> = vec![
            Box::new(FakeTestFailed::new(&bed)),
            Box::new(FakeTestSuccessful::new(&bed)),
        ];

        let results = TestRunner::new(cases).run(&RunConfig::default()).await.unwrap();

        assert!(!results.outcomes[0].passed);
        assert!(results.outcomes[0].error.is_none());
        assert!(results.outcomes[1].passed);
        let report = &results.outcomes[1].report;
        assert_eq!(report.graph(1).unwrap().points.len(), 4);
        assert_eq!(report.graph(2).unwrap().points.len(), 3);
        assert!(report.graph(2).unwrap().spec.persistent);
        assert_eq!(report.narrative().len(), 3);
    }
}
