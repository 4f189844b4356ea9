//! Payload transfers between two nodes.
//!
//! Host 1 starts `dtnrecv` in the background, host 0 sends the payload with
//! `dtnsend`. When the receiver returns, the received copy is fetched and
//! its digest compared with the original. Graph 1 plots the rate of each
//! payload of this run; graph 2 accumulates the mean rate of every run.

use super::{DaemonFixture, Testbed};
use async_trait::async_trait;
use atts_core::report::GraphSpec;
use atts_core::{CaseContext, CaseError, DelayedExecution, TestCase, file_digest, round2};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const THROUGHPUT_GRAPH: u32 = 1;
const SUMMARY_GRAPH: u32 = 2;

/// Payloads sent by every variant, largest first.
const PAYLOADS: [&str; 5] = [
    "random-4M.bin",
    "random-2M.bin",
    "random-1M.bin",
    "random-512k.bin",
    "random-1k.bin",
];

/// Network setups the transfer runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferVariant {
    /// Wireless neighbors.
    Neighbor,
    /// Wired neighbors.
    Wired,
    /// Epidemic routing.
    Epidemic,
    /// Neighbors over a VPN.
    Vpn,
}

impl TransferVariant {
    pub const ALL: [TransferVariant; 4] = [
        TransferVariant::Neighbor,
        TransferVariant::Wired,
        TransferVariant::Epidemic,
        TransferVariant::Vpn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TransferVariant::Neighbor => "neighbor01",
            TransferVariant::Wired => "neighbor02",
            TransferVariant::Epidemic => "epidemic01",
            TransferVariant::Vpn => "vpn01",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TransferVariant::Neighbor => {
                "A simple file transfer between two nodes with wireless network."
            }
            TransferVariant::Wired => "Neighbor delivery with wired network.",
            TransferVariant::Epidemic => "Epidemic routing with two nodes.",
            TransferVariant::Vpn => "Neighbor delivery with VPN network.",
        }
    }

    fn uci_file(self) -> &'static str {
        match self {
            TransferVariant::Neighbor => "ibrdtn-config.uci",
            TransferVariant::Wired => "ibrdtn-config-wired.uci",
            TransferVariant::Epidemic => "ibrdtn-config-dynamic.uci",
            TransferVariant::Vpn => "ibrdtn-config-vpn.uci",
        }
    }
}

pub struct FileTransfer {
    ctx: CaseContext,
    fixture: DaemonFixture,
    payloads: Vec<PathBuf>,
    settle_delay: Duration,
    drain_delay: Duration,
}

impl FileTransfer {
    pub fn new(testbed: &Testbed, variant: TransferVariant) -> Result<Self, CaseError> {
        let payloads = PAYLOADS.iter().map(|p| testbed.config.mock(p)).collect();
        Self::with_payloads(testbed, variant, payloads)
    }

    /// Builds the case with an explicit payload list.
    pub fn with_payloads(
        testbed: &Testbed,
        variant: TransferVariant,
        payloads: Vec<PathBuf>,
    ) -> Result<Self, CaseError> {
        let hosts = testbed.pick(variant.name(), 2)?;
        let mut ctx = testbed.context(variant.name(), variant.description(), hosts);
        ctx.report_mut().define_graph(
            GraphSpec::new(THROUGHPUT_GRAPH, "Throughput", "Throughput of the file transfers")
                .labels("file size (kbyte)", "kbyte per second"),
        );
        ctx.report_mut().define_graph(
            GraphSpec::new(
                SUMMARY_GRAPH,
                "Throughput Summarized",
                "Throughput of the file transfers with all previous results.",
            )
            .labels("Date/Time", "kbyte per second")
            .persistent()
            .date_x_axis(),
        );

        Ok(Self {
            ctx,
            fixture: DaemonFixture::new(&testbed.config, variant.uci_file()),
            payloads,
            settle_delay: testbed.config.settle_delay(),
            drain_delay: testbed.config.drain_delay(),
        })
    }

    /// Sends one payload; returns the rate in kB/s if the digests match.
    async fn transfer(&mut self, payload: &Path) -> Result<Option<f64>, CaseError> {
        let base = file_name(payload);
        let remote = format!("/tmp/{base}");
        self.ctx.print(format!("sending file {base}"));

        let sender = self.ctx.hosts()[0].clone();
        let receiver_host = self.ctx.hosts()[1].clone();
        let receiver = DelayedExecution::start(
            receiver_host.clone(),
            format!("/usr/bin/dtnrecv --timeout 300 --file {remote} --name ts"),
        )
        .await;
        let start = Instant::now();
        sender
            .execute(&format!(
                "/usr/bin/dtnsend --lifetime 300 dtn://{}/ts {remote}",
                receiver_host.name()
            ))
            .await?;
        receiver.join().await?;
        let elapsed = start.elapsed().as_secs_f64();

        let received = self.ctx.work_dir().join(&base);
        receiver_host.get_file(&remote, &received).await?;

        let sent_digest = file_digest(payload, None, "")?;
        let received_digest = file_digest(&received, None, "")?;
        self.ctx.print(format!("sent file hash: {sent_digest}"));
        self.ctx.print(format!("recv file hash: {received_digest}"));

        let size_kb = round2(std::fs::metadata(payload)?.len() as f64 / 1000.0);
        let rate = if sent_digest == received_digest && elapsed > 0.0 {
            let rate = round2(size_kb / elapsed);
            self.ctx.print(format!("Time elapsed: {elapsed} seconds"));
            self.ctx.print(format!("Transfer rate: {} kbytes per second", size_kb / elapsed));
            self.ctx.report_mut().add_data_point(THROUGHPUT_GRAPH, size_kb, rate);
            Some(rate)
        } else {
            self.ctx.print("transfer failed!");
            self.ctx.report_mut().add_data_point(THROUGHPUT_GRAPH, size_kb, 0.0);
            self.ctx.mark_failed();
            None
        };

        if let Err(e) = std::fs::remove_file(&received) {
            warn!("Could not remove {}: {}", received.display(), e);
        }
        Ok(rate)
    }
}

#[async_trait]
impl TestCase for FileTransfer {
    fn context(&self) -> &CaseContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut CaseContext {
        &mut self.ctx
    }

    async fn prepare(&mut self) -> Result<(), CaseError> {
        self.fixture.prepare(&self.ctx).await?;
        let sender = self.ctx.hosts()[0].clone();
        for payload in &self.payloads {
            sender
                .put_file(payload, &format!("/tmp/{}", file_name(payload)))
                .await?;
        }
        Ok(())
    }

    async fn run(&mut self) -> Result<(), CaseError> {
        let mut rates = Vec::with_capacity(self.payloads.len());
        for payload in self.payloads.clone() {
            if let Some(rate) = self.transfer(&payload).await? {
                rates.push(rate);
            }
            tokio::time::sleep(self.settle_delay).await;
        }

        if rates.is_empty() {
            warn!("{}: no successful transfer, summary point skipped", self.ctx.name());
        } else {
            let mean = round2(rates.iter().sum::<f64>() / rates.len() as f64);
            info!("{}: mean throughput {} kB/s", self.ctx.name(), mean);
            self.ctx
                .report_mut()
                .add_data_point(SUMMARY_GRAPH, Local::now().naive_local(), mean);
        }

        tokio::time::sleep(self.drain_delay).await;
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), CaseError> {
        let hosts = self.ctx.hosts().clone();
        for payload in &self.payloads {
            hosts
                .remove_all(&format!("/tmp/{}", file_name(payload)))
                .await;
        }
        self.fixture.cleanup(&mut self.ctx).await
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::fixtures::testbed;
    use atts_core::AxisValue;
    use tempfile::TempDir;

    fn payload(dir: &Path, name: &str, bytes: usize) -> PathBuf {
        let path = dir.join("mocks").join(name);
        std::fs::write(&path, vec![b'x'; bytes]).unwrap();
        path
    }

    fn elapsed_from(narrative: &[String]) -> f64 {
        narrative
            .iter()
            .find_map(|l| l.strip_prefix("Time elapsed: "))
            .and_then(|l| l.strip_suffix(" seconds"))
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_matching_digest_records_rate() {
        let tmp = TempDir::new().unwrap();
        let (mocks, bed) = testbed(tmp.path());
        let file = payload(tmp.path(), "X.bin", 1500);
        mocks[1].delay_command("/usr/bin/dtnrecv", Duration::from_millis(50));
        mocks[1].produce_file("/usr/bin/dtnrecv", "/tmp/X.bin", vec![b'x'; 1500]);
        let mut case =
            FileTransfer::with_payloads(&bed, TransferVariant::Neighbor, vec![file]).unwrap();

        case.prepare().await.unwrap();
        case.run().await.unwrap();
        case.cleanup().await.unwrap();

        assert!(!case.failed());
        let graph = case.report().graph(THROUGHPUT_GRAPH).unwrap();
        assert_eq!(graph.points.len(), 1);
        assert_eq!(graph.points[0].x, AxisValue::Number(1.5));
        let elapsed = elapsed_from(case.report().narrative());
        assert!(elapsed > 0.0);
        assert_eq!(graph.points[0].y, round2(1.5 / elapsed));

        let summary = case.report().graph(SUMMARY_GRAPH).unwrap();
        assert_eq!(summary.points.len(), 1);
        assert!(matches!(summary.points[0].x, AxisValue::Timestamp(_)));
        assert_eq!(summary.points[0].y, graph.points[0].y);

        assert!(mocks[0].executed().contains(
            &"/usr/bin/dtnsend --lifetime 300 dtn://node2/ts /tmp/X.bin".to_string()
        ));
        assert!(mocks[0].remote_file("/tmp/X.bin").is_none());
        assert!(!tmp.path().join("tmp").join("X.bin").exists());
    }

    #[tokio::test]
    async fn test_digest_mismatch_records_zero_and_fails() {
        let tmp = TempDir::new().unwrap();
        let (mocks, bed) = testbed(tmp.path());
        let file = payload(tmp.path(), "X.bin", 1500);
        mocks[1].produce_file("/usr/bin/dtnrecv", "/tmp/X.bin", vec![b'y'; 1500]);
        let mut case =
            FileTransfer::with_payloads(&bed, TransferVariant::Wired, vec![file]).unwrap();

        case.prepare().await.unwrap();
        case.run().await.unwrap();

        assert!(case.failed());
        let graph = case.report().graph(THROUGHPUT_GRAPH).unwrap();
        assert_eq!(graph.points.len(), 1);
        assert_eq!(graph.points[0].x, AxisValue::Number(1.5));
        assert_eq!(graph.points[0].y, 0.0);
        assert!(case.report().graph(SUMMARY_GRAPH).unwrap().points.is_empty());
        assert!(case.report().narrative().contains(&"transfer failed!".to_string()));
    }

    #[tokio::test]
    async fn test_receiver_error_propagates() {
        let tmp = TempDir::new().unwrap();
        let (mocks, bed) = testbed(tmp.path());
        let file = payload(tmp.path(), "X.bin", 10);
        mocks[1].fail_command("/usr/bin/dtnrecv");
        let mut case =
            FileTransfer::with_payloads(&bed, TransferVariant::Vpn, vec![file]).unwrap();

        case.prepare().await.unwrap();
        assert!(matches!(case.run().await, Err(CaseError::Host(_))));
    }

    #[test]
    fn test_variant_names() {
        let names: Vec<_> = TransferVariant::ALL.iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["neighbor01", "neighbor02", "epidemic01", "vpn01"]);
    }
}
