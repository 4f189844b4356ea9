//! End-to-end runs of catalog cases against mock hosts.

use atts_cli::{HarnessConfig, Testbed, build, select};
use atts_core::testing::MockHost;
use atts_core::{HostInfo, RemoteHost, RunConfig, TestRunner};
use atts_report::HtmlReport;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn testbed(dir: &Path, hosts: usize) -> (Vec<Arc<MockHost>>, Testbed) {
    let config = HarnessConfig {
        tmp_dir: dir.join("tmp"),
        report_dir: dir.join("htdocs"),
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
    std::fs::write(config.uci_config("ibrdtn-config.uci"), "config daemon\n").unwrap();

    let mocks: Vec<_> = (1..=hosts)
        .map(|i| {
            let host = Arc::new(MockHost::new(HostInfo::new(
                format!("node{i}"),
                format!("10.0.0.{i}"),
            )));
            host.produce_file("/sbin/logread", "/tmp/logread.log", "syslog\n");
            host
        })
        .collect();
    let hosts = mocks
        .iter()
        .map(|m| m.clone() as Arc<dyn RemoteHost>)
        .collect();
    (mocks, Testbed::new(config, hosts))
}

#[tokio::test]
async fn test_selected_cases_run_in_order_and_render() {
    let tmp = TempDir::new().unwrap();
    let (mocks, bed) = testbed(tmp.path(), 2);
    mocks[0].produce_file(
        "/usr/bin/dtnping",
        "/tmp/echo-output.log",
        "10 bundles sent, 10 received\n",
    );
    let entries = select(&[
        "FakeTestFailed".to_string(),
        "ping01".to_string(),
        "FakeTestSuccessful".to_string(),
    ])
    .unwrap();

    let results = TestRunner::new(build(&entries, &bed))
        .with_renderer(Box::new(
            HtmlReport::new(&bed.config.report_dir).with_gnuplot("atts-missing-gnuplot"),
        ))
        .run(&RunConfig::new())
        .await
        .unwrap();

    let names: Vec<_> = results.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["FakeTestFailed", "ping01", "FakeTestSuccessful"]);
    assert_eq!(results.passed_count(), 2);
    assert!(!results.all_passed());
    assert!(results.render_error.is_none());

    let index = std::fs::read_to_string(bed.config.report_dir.join("index.html")).unwrap();
    assert!(index.contains("ping01"));
    assert!(index.contains("10 bundles sent, 10 received"));
    for mock in &mocks {
        assert!(!mock.is_connected());
    }
}

#[tokio::test]
async fn test_two_host_cases_skipped_with_one_host() {
    let tmp = TempDir::new().unwrap();
    let (_, bed) = testbed(tmp.path(), 1);
    let entries = select(&["ping01".to_string(), "FakeTestSuccessful".to_string()]).unwrap();

    let cases = build(&entries, &bed);

    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].name(), "FakeTestSuccessful");
}

#[test]
fn test_unknown_case_is_an_error() {
    assert!(select(&["neighbor99".to_string()]).is_err());
}
