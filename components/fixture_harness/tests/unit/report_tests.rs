//! Unit tests for run reports

use fixture_harness::{
    AssertionMismatch, CrashReason, ErrorCause, ExecutionResult, FailureReason, LoadError, Report,
    ReportBuilder, ReportEntry, ReportFormat,
};
use std::path::PathBuf;

fn mixed_report() -> Report {
    let mut report = Report::new();
    report.add_result("a.js", ExecutionResult::Passed);
    report.add_result(
        "b.js",
        ExecutionResult::Failed(FailureReason::AssertionMismatch {
            mismatch: AssertionMismatch {
                assertion: "assertEquals".to_string(),
                expected: "5".to_string(),
                actual: "6".to_string(),
                description: None,
            },
            total: 1,
        }),
    );
    report.add_result(
        "c.js",
        ExecutionResult::Errored(ErrorCause::Load {
            error: LoadError::MissingDependency {
                requested: "testsrc/nope.js".to_string(),
                resolved: PathBuf::from("/src/testsrc/nope.js"),
                from: PathBuf::from("/src/c.js"),
            },
        }),
    );
    report.add_result(
        "d.js",
        ExecutionResult::Crashed(CrashReason::Timeout { limit_ms: 100 }),
    );
    report.add_result(
        "e.js",
        ExecutionResult::Skipped("requires engine capability: debug-properties".to_string()),
    );
    report
}

#[test]
fn test_report_counts() {
    let report = mixed_report();
    assert_eq!(report.total, 5);
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errored, 1);
    assert_eq!(report.crashed, 1);
    assert_eq!(report.timeout, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.problems().count(), 3);
    assert!(!report.is_success());
}

#[test]
fn test_pass_rates() {
    let mut report = Report::new();
    assert_eq!(report.pass_rate(), 0.0);
    assert_eq!(report.effective_pass_rate(), 0.0);

    report.add_result("a.js", ExecutionResult::Passed);
    report.add_result("b.js", ExecutionResult::Skipped("skip list: b.js".to_string()));
    assert_eq!(report.pass_rate(), 50.0);
    assert_eq!(report.effective_pass_rate(), 100.0);
}

#[test]
fn test_skips_do_not_break_success() {
    let mut report = Report::new();
    report.add_result("a.js", ExecutionResult::Passed);
    report.add_result("b.js", ExecutionResult::Skipped("skip list: b.js".to_string()));
    assert!(report.is_success());
    assert!(Report::new().is_success());
}

#[test]
fn test_to_lines() {
    let lines = mixed_report().to_lines();
    let lines: Vec<&str> = lines.lines().collect();
    assert_eq!(
        lines,
        vec![
            "PASS a.js",
            "FAIL b.js: assertEquals: expected 5 but got 6",
            "ERROR c.js: missing dependency 'testsrc/nope.js' (resolved to /src/testsrc/nope.js) loaded from /src/c.js",
            "TIMEOUT d.js: timeout after 100 ms",
            "SKIP e.js: requires engine capability: debug-properties",
        ]
    );
}

#[test]
fn test_summary() {
    let summary = mixed_report().summary();
    assert!(summary.starts_with("Fixture Results:"));
    assert!(summary.contains("Total: 5"));
    assert!(summary.contains("Passed: 1 (20.0%)"));
    assert!(summary.contains("Crashed: 1 (1 timeout)"));
    assert!(summary.contains("Skipped: 1"));
    assert!(summary.contains("Effective Pass Rate: 25.0%"));
}

#[test]
fn test_detailed_summary_lists_problems_with_status() {
    let mut report = Report::new();
    report.add_entry(ReportEntry {
        path: "regress-353078.js".to_string(),
        result: ExecutionResult::Failed(FailureReason::SentinelMismatch {
            actual: "undefined".to_string(),
        }),
        duration_ms: 3,
        status: vec!["BUGNUMBER: 353078".to_string()],
    });
    report.add_result("ok.js", ExecutionResult::Passed);

    let text = report.detailed_summary();
    assert!(text.contains("Problems:"));
    assert!(text.contains("  - regress-353078.js [FAIL]"));
    assert!(text.contains("    status: BUGNUMBER: 353078"));
    assert!(!text.contains("ok.js"));

    let mut clean = Report::new();
    clean.add_result("ok.js", ExecutionResult::Passed);
    assert!(!clean.detailed_summary().contains("Problems:"));
}

#[test]
fn test_json_round_trip() {
    let report = mixed_report();
    let json = report.to_json().unwrap();
    assert!(json.contains("\"outcome\": \"crashed\""));
    assert!(json.contains("\"kind\": \"missing_dependency\""));

    let parsed = Report::from_json(&json).unwrap();
    assert_eq!(parsed.total, report.total);
    assert_eq!(parsed.entries, report.entries);
}

#[test]
fn test_render_formats() {
    let report = mixed_report();
    assert_eq!(report.render(ReportFormat::Lines).unwrap(), report.to_lines());
    assert_eq!(
        report.render(ReportFormat::Text).unwrap(),
        report.detailed_summary()
    );
    assert!(report
        .render(ReportFormat::Json)
        .unwrap()
        .trim_start()
        .starts_with('{'));
}

#[test]
fn test_report_format_from_str() {
    assert_eq!("text".parse::<ReportFormat>(), Ok(ReportFormat::Text));
    assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
    assert_eq!("lines".parse::<ReportFormat>(), Ok(ReportFormat::Lines));
    assert!("xml".parse::<ReportFormat>().is_err());
}

#[test]
fn test_top_problems() {
    let report = mixed_report();
    let top: Vec<&str> = report
        .top_problems(2)
        .into_iter()
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(top, vec!["b.js", "c.js"]);
}

#[test]
fn test_report_builder() {
    let mut first = Report::new();
    first.add_result("a.js", ExecutionResult::Passed);
    let mut second = Report::new();
    second.add_result("b.js", ExecutionResult::Passed);
    second.add_result(
        "c.js",
        ExecutionResult::Crashed(CrashReason::Abnormal {
            message: "engine exited with exit status: 3 without reporting an outcome".to_string(),
        }),
    );

    let mut builder = ReportBuilder::new();
    builder.add_report(first).add_report(second);
    assert_eq!(builder.count(), 2);

    let combined = builder.build();
    assert_eq!(combined.total, 3);
    assert_eq!(combined.passed, 2);
    assert_eq!(combined.crashed, 1);
    assert_eq!(combined.timeout, 0);
    let paths: Vec<&str> = combined.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["a.js", "b.js", "c.js"]);
}
