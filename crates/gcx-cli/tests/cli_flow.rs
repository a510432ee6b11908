//! End-to-end tests for the `gcx` binary.
//!
//! Each test runs with `HOME` pointed at a temp directory so no user config
//! leaks in.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const UNIFIED_LOG: &str = "\
[2024-03-10T10:00:00.010+0000][0.010s][info][gc] Using G1
[2024-03-10T10:00:00.100+0000][0.100s][info][gc,start] GC(0) Pause Young (Normal) (G1 Evacuation Pause)
[2024-03-10T10:00:00.107+0000][0.107s][info][gc] GC(0) Pause Young (Normal) (G1 Evacuation Pause) 24M->4M(256M) 6.512ms
[2024-03-10T10:00:01.000+0000][1.000s][info][gc,start] GC(1) Pause Full (System.gc())
[2024-03-10T10:00:01.020+0000][1.020s][info][gc] GC(1) Pause Full (System.gc()) 30M->5M(256M) 19.876ms
not a gc line
";

const LEGACY_LOG: &str = "\
2.345: [GC (Allocation Failure) [PSYoungGen: 1024K->512K(2048K)] 1024K->600K(4096K), 0.0012345 secs]
3.000: [GC (Allocation Failure) [PSYoungGen: 1536K->512K(2048K)] 1536K->700K(4096K), 0.0020000 secs]
";

fn gcx(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gcx"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "gcx should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_summary_json_across_files() {
    let temp = TempDir::new().unwrap();
    let unified = temp.path().join("unified.log");
    let legacy = temp.path().join("legacy.log");
    std::fs::write(&unified, UNIFIED_LOG).unwrap();
    std::fs::write(&legacy, LEGACY_LOG).unwrap();

    let output = gcx(temp.path())
        .args(["summary", "--json"])
        .arg(&unified)
        .arg(&legacy)
        .output()
        .unwrap();
    assert_success(&output);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["diagnostics"]["lines"], 8);
    assert_eq!(report["diagnostics"]["unknown"], 1);
    assert_eq!(report["diagnostics"]["intervals"], 4);
    assert_eq!(report["files"].as_array().unwrap().len(), 2);

    let records = report["summary"]["records"].as_array().unwrap();
    let by_key = |key: &str| {
        records
            .iter()
            .find(|r| r["key"] == key)
            .unwrap_or_else(|| panic!("missing {key} in {records:?}"))
    };
    assert_eq!(by_key("Allocation Failure")["count"], 2);
    assert_eq!(by_key("G1 Evacuation Pause")["total_ms"], 6.512);
    assert_eq!(by_key("System.gc()")["max_ms"], 19.876);
}

#[test]
fn test_summary_text_group_by_kind() {
    let temp = TempDir::new().unwrap();
    let unified = temp.path().join("unified.log");
    std::fs::write(&unified, UNIFIED_LOG).unwrap();

    let output = gcx(temp.path())
        .args(["summary", "--group-by", "kind"])
        .arg(&unified)
        .output()
        .unwrap();
    assert_success(&output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("GC PAUSES BY KIND"));
    assert!(stdout.contains("young_pause"));
    assert!(stdout.contains("full_pause"));
    assert!(stdout.contains("Pauses: 2 (26.388 ms)"));
}

#[test]
fn test_config_file_sets_grouping() {
    let temp = TempDir::new().unwrap();
    let unified = temp.path().join("unified.log");
    std::fs::write(&unified, UNIFIED_LOG).unwrap();
    let config = temp.path().join("gcx.toml");
    std::fs::write(&config, "group_by = \"kind\"\n").unwrap();

    let output = gcx(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["summary", "--json"])
        .arg(&unified)
        .output()
        .unwrap();
    assert_success(&output);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["group_by"], "kind");
}

#[test]
fn test_custom_rule_catalogue() {
    let temp = TempDir::new().unwrap();
    let rules = temp.path().join("rules.toml");
    std::fs::write(
        &rules,
        r#"
[[rules]]
kind = "safepoint"
pattern = '^Stopped for (?P<pause_ms>\d+)ms$'
endstamp = true
"#,
    )
    .unwrap();
    let log = temp.path().join("gc.log");
    std::fs::write(&log, "[1.000s][info][gc] Stopped for 5ms\n[1.100s][info][gc] Using G1\n")
        .unwrap();

    let output = gcx(temp.path())
        .arg("--rules")
        .arg(&rules)
        .args(["summary", "--json"])
        .arg(&log)
        .output()
        .unwrap();
    assert_success(&output);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["diagnostics"]["unknown"], 1);
    assert_eq!(report["summary"]["records"][0]["key"], "(none)");
    assert_eq!(report["summary"]["records"][0]["total_ms"], 5.0);
}

#[test]
fn test_invalid_rule_catalogue_is_fatal() {
    let temp = TempDir::new().unwrap();
    let rules = temp.path().join("rules.toml");
    std::fs::write(
        &rules,
        "[[rules]]\nkind = \"safepoint\"\npattern = \"a\"\n\n[[rules]]\nkind = \"header\"\npattern = \"a\"\n",
    )
    .unwrap();

    let output = gcx(temp.path())
        .arg("--rules")
        .arg(&rules)
        .arg("rules")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load rule catalogue"), "{stderr}");
}

#[test]
fn test_events_unknown_lines() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("gc.log");
    std::fs::write(&log, UNIFIED_LOG).unwrap();

    let output = gcx(temp.path())
        .args(["events", "--unknown"])
        .arg(&log)
        .output()
        .unwrap();
    assert_success(&output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![serde_json::json!({"line": 6, "text": "not a gc line"})]
    );
}

#[test]
fn test_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    let output = gcx(temp.path())
        .arg("summary")
        .arg(temp.path().join("missing.log"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.log"));
}
