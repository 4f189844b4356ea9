//! Rendering a run into a report directory.

use atts_core::report::GraphSpec;
use atts_core::{CaseOutcome, ReportModel, ReportRenderer};
use atts_report::{HtmlReport, SeriesFile};
use std::time::Duration;
use tempfile::TempDir;

fn outcome(report: ReportModel, passed: bool) -> CaseOutcome {
    CaseOutcome {
        name: report.name().to_string(),
        description: report.description().to_string(),
        passed,
        error: None,
        cleanup_error: None,
        duration: Duration::from_secs(1),
        report,
    }
}

fn transfer_report(attachment: &std::path::Path) -> ReportModel {
    let mut report = ReportModel::new("neighbor01", "File transfer <wireless>");
    report.define_graph(
        GraphSpec::new(1, "Throughput", "Throughput of the file transfers")
            .labels("file size (kbyte)", "kbyte per second"),
    );
    report.define_graph(
        GraphSpec::new(2, "Throughput Summarized", "All previous results")
            .persistent()
            .date_x_axis(),
    );
    report.add_data_point(1, 4194.3, 812.5);
    report.add_narrative_line("sending file random-4M.bin");
    report.add_narrative_line("hash a < b");
    report.add_file("node1", attachment, "/tmp/logread.log", "System Log");
    report
}

#[test]
fn renders_index_attachments_and_series() {
    let tmp = TempDir::new().unwrap();
    let attachment = tmp.path().join("neighbor01.node1..tmp.logread.log");
    std::fs::write(&attachment, "dtnd[42]: <started>\n").unwrap();
    let out = tmp.path().join("htdocs");

    let renderer = HtmlReport::new(&out).with_gnuplot("atts-missing-gnuplot");
    let outcomes = vec![
        outcome(transfer_report(&attachment), false),
        outcome(ReportModel::new("ping01", "ping"), true),
    ];
    let written = renderer.render(&outcomes).unwrap();

    assert_eq!(written[0], out.join("index.html"));
    let index = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains("<a href='#neighbor01'>neighbor01</a>"));
    assert!(index.contains("File transfer &lt;wireless&gt;"));
    assert!(index.contains("hash a &lt; b\n"));
    assert!(index.contains("<span class='signalred'>failed</span>"));
    assert!(index.contains("<span class='green'>successful</span>"));
    assert!(index.contains("neighbor01.node1..tmp.logread.log.html"));
    assert!(index.find("neighbor01").unwrap() < index.find("ping01").unwrap());

    let page = std::fs::read_to_string(out.join("neighbor01.node1..tmp.logread.log.html")).unwrap();
    assert!(page.contains("dtnd[42]: &lt;started&gt;"));
    assert!(page.contains("Filename: /tmp/logread.log, Host: node1"));

    let series = SeriesFile::new(out.join("neighbor01-1.dat")).load().unwrap();
    assert_eq!(series.len(), 1);
    assert!(out.join("neighbor01-1.plot").exists());
    assert!(out.join("results.json").exists());
}

#[test]
fn persistent_series_accumulate_across_renders() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("htdocs");
    let renderer = HtmlReport::new(&out).with_gnuplot("atts-missing-gnuplot");

    for run in 0..2 {
        let mut report = ReportModel::new("neighbor01", "transfer");
        report.define_graph(GraphSpec::new(1, "Throughput", "t"));
        report.define_graph(GraphSpec::new(2, "Summarized", "s").persistent());
        report.add_data_point(1, 1.0, f64::from(run));
        report.add_data_point(1, 2.0, f64::from(run));
        report.add_data_point(2, f64::from(run), 100.0);
        renderer.render(&[outcome(report, true)]).unwrap();
    }

    assert_eq!(SeriesFile::new(out.join("neighbor01-1.dat")).load().unwrap().len(), 2);
    assert_eq!(SeriesFile::new(out.join("neighbor01-2.dat")).load().unwrap().len(), 2);
}

#[test]
fn missing_attachment_does_not_abort_rendering() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("htdocs");
    let mut report = ReportModel::new("ping01", "ping");
    report.add_file("node1", tmp.path().join("gone.log"), "/tmp/gone.log", "gone");

    HtmlReport::new(&out).render(&[outcome(report, true)]).unwrap();

    let index = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains("/tmp/gone.log (node1): unavailable"));
}
