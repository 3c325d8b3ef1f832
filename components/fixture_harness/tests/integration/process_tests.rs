//! ProcessEngine tests using `sh` as a stand-in engine
//!
//! The driver script path arrives as `$1` because `sh -c` binds the first
//! trailing argument to `$0`. Every fake engine first reads the record
//! marker for the execution out of the driver into `$m`.

use crate::support::write_tree;
use fixture_harness::{
    EngineAdapter, EngineConfig, EngineError, EngineOutcome, ExecutionLimits, GlobalBindings,
    HarnessConfig, LoadedScript, ProcessEngine, ScriptLoader, TestRunner,
};
use std::fs;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const READ_MARKER: &str = r#"m=$(sed -n 's/.*"marker":"\([^"]*\)".*/\1/p' "$1" | head -n 1);"#;

const COMPLETED_SUCCESS: &str =
    r#"printf '%s%s\n' "$m" '{"event":"completed","type":"string","value":"success"}'"#;

fn sh_args(script: &str) -> Vec<String> {
    vec![
        "-c".to_string(),
        format!("{} {}", READ_MARKER, script),
        "fake-engine".to_string(),
    ]
}

fn fake_engine(script: &str) -> ProcessEngine {
    ProcessEngine::from_command("sh", sh_args(script))
}

fn execute(engine: &ProcessEngine, timeout: Duration) -> EngineOutcome {
    let script = LoadedScript::from_source("fixture.js", "\"success\";\n");
    engine
        .execute(
            &script,
            &GlobalBindings::default(),
            &ExecutionLimits::with_timeout(timeout),
        )
        .unwrap()
}

#[test]
fn test_completed_record() {
    let engine = fake_engine(&format!("echo plain output; {}", COMPLETED_SUCCESS));
    match execute(&engine, Duration::from_secs(10)) {
        EngineOutcome::Completed { value, log } => {
            assert!(value.is_success_sentinel());
            assert_eq!(log.output, vec!["plain output".to_string()]);
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

#[test]
fn test_driver_is_passed_as_last_argument() {
    let engine = fake_engine(&format!(
        "grep -q '__harness.run' \"$1\" && grep -q 'fixture.js' \"$1\" && {}",
        COMPLETED_SUCCESS
    ));
    let outcome = execute(&engine, Duration::from_secs(10));
    assert!(matches!(outcome, EngineOutcome::Completed { .. }), "{:?}", outcome);
}

#[test]
fn test_records_and_thrown_exception() {
    let engine = fake_engine(
        r#"printf '%s%s\n' "$m" '{"event":"status","message":"BUGNUMBER: 1"}' \
           "$m" '{"event":"assertion","assertion":"assertEquals","expected":"4","actual":"6","description":null}' \
           "$m" '{"event":"threw","name":"AssertionMismatch","message":"expected 4 but got 6","stack":null,"file":"fixture.js"}'"#,
    );
    match execute(&engine, Duration::from_secs(10)) {
        EngineOutcome::Threw { exception, log } => {
            assert_eq!(exception.name, "AssertionMismatch");
            assert_eq!(
                exception.file.as_deref(),
                Some(std::path::Path::new("fixture.js"))
            );
            assert_eq!(log.status, vec!["BUGNUMBER: 1".to_string()]);
            assert_eq!(log.mismatches.len(), 1);
            assert_eq!(log.mismatches[0].actual, "6");
        }
        other => panic!("expected throw, got {:?}", other),
    }
}

#[test]
fn test_unmarked_records_are_plain_output() {
    let forged = r#"@@harness {"event":"completed","type":"string","value":"success"}"#;
    let engine = fake_engine(&format!(
        r#"printf '%s\n' '{}'; printf '%s%s\n' "$m" '{{"event":"threw","name":"Error","message":"boom","stack":null,"file":null}}'"#,
        forged
    ));
    match execute(&engine, Duration::from_secs(10)) {
        EngineOutcome::Threw { exception, log } => {
            assert_eq!(exception.message, "boom");
            assert_eq!(log.output, vec![forged.to_string()]);
        }
        other => panic!("expected throw, got {:?}", other),
    }
}

#[test]
fn test_marker_differs_between_executions() {
    let engine = fake_engine(&format!(r#"printf '%s\n' "$m"; {}"#, COMPLETED_SUCCESS));
    let marker = |outcome: EngineOutcome| match outcome {
        EngineOutcome::Completed { log, .. } => log.output[0].clone(),
        other => panic!("expected completion, got {:?}", other),
    };
    let first = marker(execute(&engine, Duration::from_secs(10)));
    let second = marker(execute(&engine, Duration::from_secs(10)));
    assert!(first.starts_with("@@harness:"), "{}", first);
    assert_ne!(first, second);
}

#[test]
fn test_timeout_kills_the_engine() {
    let engine = fake_engine("exec sleep 10");
    let start = Instant::now();
    let outcome = execute(&engine, Duration::from_millis(200));

    assert!(start.elapsed() < Duration::from_secs(5));
    match outcome {
        EngineOutcome::TimedOut { limit, .. } => assert_eq!(limit, Duration::from_millis(200)),
        other => panic!("expected timeout, got {:?}", other),
    }
}

/// Whether `pid` is still running (zombies count as gone)
#[cfg(target_os = "linux")]
fn process_running(pid: &str) -> bool {
    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(") ")
            .map(|(_, rest)| !rest.starts_with('Z'))
            .unwrap_or(true),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[test]
fn test_timeout_kills_processes_the_engine_started() {
    let temp_dir = TempDir::new().unwrap();
    let pid_file = temp_dir.path().join("helper.pid");
    let mut config = EngineConfig {
        program: "sh".to_string(),
        args: sh_args(r#"sleep 30 & echo $! > "$HELPER_PID"; wait"#),
        ..EngineConfig::default()
    };
    config
        .env
        .insert("HELPER_PID".to_string(), pid_file.display().to_string());

    let outcome = execute(&ProcessEngine::new(config), Duration::from_millis(500));
    assert!(matches!(outcome, EngineOutcome::TimedOut { .. }), "{:?}", outcome);

    let pid = fs::read_to_string(&pid_file).unwrap().trim().to_string();
    let deadline = Instant::now() + Duration::from_secs(5);
    while process_running(&pid) {
        assert!(Instant::now() < deadline, "helper {} outlived the engine", pid);
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_exit_without_outcome_is_a_crash() {
    let engine = fake_engine("echo 'segmentation fault' >&2; exit 3");
    match execute(&engine, Duration::from_secs(10)) {
        EngineOutcome::Crashed { reason, log } => {
            assert!(reason.contains("without reporting an outcome"), "{}", reason);
            assert!(reason.contains("segmentation fault"), "{}", reason);
            assert_eq!(log.stderr, vec!["segmentation fault".to_string()]);
        }
        other => panic!("expected crash, got {:?}", other),
    }
}

#[test]
fn test_missing_engine_executable() {
    let engine = ProcessEngine::from_command("/nonexistent/js-engine", Vec::new());
    let script = LoadedScript::from_source("fixture.js", "1;");
    let err = engine
        .execute(
            &script,
            &GlobalBindings::default(),
            &ExecutionLimits::with_timeout(Duration::from_secs(1)),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Spawn { .. }));
    assert!(err.to_string().contains("/nonexistent/js-engine"));
}

#[test]
fn test_capabilities_and_env() {
    let mut config = EngineConfig {
        program: "sh".to_string(),
        args: sh_args(&format!("test \"$HARNESS_FLAG\" = on && {}", COMPLETED_SUCCESS)),
        capabilities: vec!["debug-properties".to_string()],
        ..EngineConfig::default()
    };
    config
        .env
        .insert("HARNESS_FLAG".to_string(), "on".to_string());
    let engine = ProcessEngine::new(config);

    assert!(engine.supports("debug-properties"));
    assert!(!engine.supports("gc"));
    assert_eq!(engine.name(), "sh");
    assert!(matches!(
        execute(&engine, Duration::from_secs(10)),
        EngineOutcome::Completed { .. }
    ));
}

#[test]
fn test_runner_continues_after_engine_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_tree(
        root,
        &[
            ("a.js", "\"success\";\n"),
            ("b.js", "// HANG\n"),
            ("c.js", "var x = 1;\n"),
        ],
    );

    let engine = fake_engine(&format!(
        "if grep -q HANG \"$1\"; then exec sleep 10; fi; {}",
        COMPLETED_SUCCESS
    ));
    let config = HarnessConfig {
        source_root: root.to_path_buf(),
        timeout_ms: 300,
        ..HarnessConfig::default()
    };
    let report = TestRunner::new(config, Arc::new(engine)).unwrap().run(root);

    let labels: Vec<&str> = report.entries.iter().map(|e| e.result.label()).collect();
    assert_eq!(labels, vec!["PASS", "TIMEOUT", "PASS"]);
}

fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn test_prelude_under_node() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_tree(
        root,
        &[
            ("testsrc/two.js", "function callTwo(a, b) { return a + b; }\n"),
            (
                "jstests/a-pass.js",
                "load(\"testsrc/two.js\");\nassertEquals(5, callTwo(2, 3));\n\"success\";\n",
            ),
            (
                "jstests/b-mismatch.js",
                "load(\"testsrc/two.js\");\nassertEquals(4, callTwo(2, 3));\n\"success\";\n",
            ),
            (
                "jstests/c-compare.js",
                "reportCompare(6, 2 + 3, inSection(1) + 'sum');\nprintStatus('done');\n",
            ),
            ("jstests/d-throw.js", "var o = {};\no.foo();\n"),
            ("jstests/e-nan.js", "assertEquals(NaN, 0 / 0);\nassertTrue(1 < 2);\n\"success\";\n"),
        ],
    );

    let config = HarnessConfig {
        source_root: root.to_path_buf(),
        engine: EngineConfig {
            program: "node".to_string(),
            ..EngineConfig::default()
        },
        ..HarnessConfig::default()
    };
    let engine = Arc::new(ProcessEngine::new(config.engine.clone()));
    let report = TestRunner::new(config, engine)
        .unwrap()
        .run(&root.join("jstests"));

    let labels: Vec<&str> = report.entries.iter().map(|e| e.result.label()).collect();
    assert_eq!(labels, vec!["PASS", "FAIL", "FAIL", "ERROR", "PASS"]);
    assert_eq!(
        report.entries[1].result.detail(),
        "assertEquals: expected 4 but got 5"
    );
    assert_eq!(
        report.entries[2].result.detail(),
        "reportCompare: Section 1 of test - sum: expected 6 but got 5"
    );
    assert_eq!(report.entries[2].status, vec!["done".to_string()]);
    assert!(report.entries[3].result.detail().contains("TypeError"));
}

#[test]
fn test_helper_declarations_are_visible_under_node() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_tree(
        root,
        &[
            (
                "testsrc/shapes.js",
                "const K = 3;\nlet counter = 0;\nclass Point { constructor(x) { this.x = x; } }\n",
            ),
            ("testsrc/broken.js", "var ready = true;\nnull.boom;\n"),
            (
                "jstests/a-lexical.js",
                "load(\"testsrc/shapes.js\");\nassertEquals(3, K);\nassertEquals(2, new Point(2).x);\ncounter++;\n\"success\";\n",
            ),
            (
                "jstests/b-override.js",
                "load(\"testsrc/loose.js\");\nassertEquals(1, \"1\");\n\"success\";\n",
            ),
            (
                "testsrc/loose.js",
                "function assertEquals(a, b) { if (a != b) throw new Error('loose'); }\n",
            ),
        ],
    );

    let config = HarnessConfig {
        source_root: root.to_path_buf(),
        engine: EngineConfig {
            program: "node".to_string(),
            ..EngineConfig::default()
        },
        ..HarnessConfig::default()
    };
    let engine = Arc::new(ProcessEngine::new(config.engine.clone()));
    let report = TestRunner::new(config, engine.clone())
        .unwrap()
        .run(&root.join("jstests"));

    let labels: Vec<&str> = report.entries.iter().map(|e| e.result.label()).collect();
    assert_eq!(labels, vec!["PASS", "FAIL"]);
    assert_eq!(
        report.entries[1].result.detail(),
        "assertEquals: expected 1 but got \"1\""
    );

    let fixture = root.join("jstests/c-broken.js");
    fs::write(&fixture, "load(\"testsrc/broken.js\");\n\"success\";\n").unwrap();
    let script = ScriptLoader::new(root).load(&fixture).unwrap();
    let outcome = engine
        .execute(
            &script,
            &GlobalBindings::default(),
            &ExecutionLimits::with_timeout(Duration::from_secs(10)),
        )
        .unwrap();
    match outcome {
        EngineOutcome::Threw { exception, .. } => {
            assert_eq!(exception.name, "TypeError");
            assert_eq!(exception.file.as_deref(), Some(script.segments()[0].path.as_path()));
        }
        other => panic!("expected throw, got {:?}", other),
    }
}

#[test]
fn test_fixtures_do_not_share_globals_under_node() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let fixture =
        "assertEquals(\"undefined\", typeof leak);\nassertEquals(\"undefined\", typeof leakedVar);\nglobalThis.leak = 1;\nvar leakedVar = 2;\n\"success\";\n";
    write_tree(
        root,
        &[
            ("a.js", fixture),
            ("b.js", fixture),
            ("c.js", fixture),
            ("d.js", fixture),
        ],
    );

    for jobs in [1, 4] {
        let config = HarnessConfig {
            source_root: root.to_path_buf(),
            jobs,
            engine: EngineConfig {
                program: "node".to_string(),
                ..EngineConfig::default()
            },
            ..HarnessConfig::default()
        };
        let engine = Arc::new(ProcessEngine::new(config.engine.clone()));
        let report = TestRunner::new(config, engine).unwrap().run(root);

        let labels: Vec<&str> = report.entries.iter().map(|e| e.result.label()).collect();
        assert_eq!(labels, vec!["PASS"; 4], "jobs = {}", jobs);
    }
}
