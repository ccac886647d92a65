use assert_cmd::Command;
use predicates::prelude::*;

const NOW: &str = "2024-01-01T00:00:00Z";

fn daily_record(count: i64) -> String {
    format!(
        r#"{{
            "id": "evt-1",
            "owner": "alice",
            "published": true,
            "title": "Standup",
            "start_date": "2024-01-01T09:00:00Z",
            "end_date": "2024-01-01T10:00:00Z",
            "attributes": {{"location": {{"type": "string", "value": "<b>Room 4</b>"}}}},
            "recurrence": {{"enabled": true, "cadence": "daily", "interval": 1, "repeat_count": {count}}}
        }}"#
    )
}

fn recur() -> Command {
    Command::cargo_bin("recur").unwrap()
}

#[test]
fn test_validate_accepts_valid_rule() {
    recur()
        .args(["--now", NOW, "validate", "-"])
        .write_stdin(daily_record(3))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""valid":true"#));
}

#[test]
fn test_validate_rejects_out_of_range_count() {
    recur()
        .args(["--now", NOW, "validate", "-"])
        .write_stdin(daily_record(500))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid repeat count"));
}

#[test]
fn test_permissive_flag_clamps() {
    recur()
        .args(["--now", NOW, "--permissive", "validate", "-"])
        .write_stdin(daily_record(500))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""repeat_count":100"#));
}

#[test]
fn test_expand_prints_intervals() {
    let output = recur()
        .args(["--now", NOW, "expand", "-"])
        .write_stdin(daily_record(3))
        .output()
        .unwrap();
    assert!(output.status.success());

    let intervals: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let intervals = intervals.as_array().unwrap();
    assert_eq!(intervals.len(), 3);
    assert_eq!(intervals[0]["start"], "2024-01-02T09:00:00Z");
    assert_eq!(intervals[2]["end"], "2024-01-04T10:00:00Z");
}

#[test]
fn test_sync_projects_attributes_with_schema() {
    let dir = std::env::temp_dir().join(format!("recur-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let schema = dir.join("schema.json");
    std::fs::write(
        &schema,
        r#"{"record_type": "event", "fields": {"location": "string"}}"#,
    )
    .unwrap();

    let output = recur()
        .args(["--now", NOW, "sync", "-", "--schema"])
        .arg(&schema)
        .write_stdin(daily_record(2))
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["report"]["generated"], 2);
    let occurrences = body["occurrences"].as_array().unwrap();
    assert_eq!(occurrences[0]["title"], "Standup (January 2, 2024)");
    assert_eq!(occurrences[0]["parent_event_id"], "evt-1");
    assert_eq!(occurrences[0]["attributes"]["location"]["value"], "Room 4");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_input_file_fails() {
    recur()
        .args(["expand", "/definitely/not/here.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading"));
}
