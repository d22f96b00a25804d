//! Integration tests for event handling and pre-staging.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tempfile::TempDir;
use watchfilesd::daemon::Daemon;
use watchfilesd::sink::{Facility, MemorySink};
use watchfilesd::staging::{PoolConfig, PreStager, StagingPool, TIMESTAMP_FORMAT};
use watchfilesd::watcher::{
    parse_line, EventHandler, MessageStyle, NotifierCommand, RawEvent, RestartPolicy,
};
use watchfilesd::Config;

fn handler(sink: &MemorySink) -> EventHandler {
    let pool = StagingPool::new(PreStager::default(), PoolConfig::default()).unwrap();
    EventHandler::new(
        Arc::new(sink.clone()),
        Facility::default(),
        MessageStyle::Legacy,
        pool,
    )
}

/// Builds `incoming/a.txt` ("hello", no trailing newline) and `incoming/sub/b.txt` (empty) under `root`.
fn incoming_tree(root: &Path) {
    let incoming = root.join("incoming");
    fs::create_dir_all(incoming.join("sub")).unwrap();
    fs::write(incoming.join("a.txt"), "hello").unwrap();
    fs::write(incoming.join("sub").join("b.txt"), "").unwrap();
}

fn assert_status_lines(path: &Path, expected: usize) {
    let content = fs::read_to_string(path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), expected, "{}", path.display());

    for line in lines {
        let ts = line.strip_suffix(": Pre-staged").expect("status suffix");
        assert!(
            NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok(),
            "bad timestamp in {line:?}"
        );
    }
}

/// A directory moved into the tree is logged and every file beneath it is pre-staged.
#[test]
fn test_moved_in_directory_scenario() {
    let tmp = TempDir::new().unwrap();
    let data = format!("{}/", tmp.path().display());
    incoming_tree(tmp.path());

    let sink = MemorySink::new();
    let handler = handler(&sink);

    let raw = parse_line(&format!("{data} MOVED_TO incoming")).unwrap();
    handler.handle(&raw);
    handler.shutdown();

    assert_eq!(sink.messages(), vec![format!("incoming was moved to {data}")]);

    let incoming = tmp.path().join("incoming");
    assert_eq!(
        fs::read_to_string(incoming.join("a.txt")).unwrap(),
        "hello\nPRE-STAGED\n"
    );
    assert_eq!(
        fs::read_to_string(incoming.join("sub").join("b.txt")).unwrap(),
        "PRE-STAGED\n"
    );
    assert_status_lines(&incoming.join(".a.txtstatus"), 1);
    assert_status_lines(&incoming.join("sub").join(".b.txtstatus"), 1);
}

/// Original bytes survive as a prefix; an unterminated last line is closed first.
#[test]
fn test_existing_content_is_prefix() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("batch");
    fs::create_dir(&dir).unwrap();
    let original = b"line one\nline two\n\x00\xffbinary tail".to_vec();
    fs::write(dir.join("data.bin"), &original).unwrap();

    let report = PreStager::default().pre_stage(tmp.path(), "batch");
    assert_eq!(report.staged, 1);

    let staged = fs::read(dir.join("data.bin")).unwrap();
    assert!(staged.starts_with(&original));
    assert_eq!(&staged[original.len()..], b"\nPRE-STAGED\n");
}

/// Two passes over the same tree append two markers and two status lines.
#[test]
fn test_pre_stage_twice_is_not_idempotent() {
    let tmp = TempDir::new().unwrap();
    incoming_tree(tmp.path());

    let stager = PreStager::default();
    stager.pre_stage(tmp.path(), "incoming");
    stager.pre_stage(tmp.path(), "incoming");

    let incoming = tmp.path().join("incoming");
    assert_eq!(
        fs::read_to_string(incoming.join("a.txt")).unwrap(),
        "hello\nPRE-STAGED\nPRE-STAGED\n"
    );
    assert_eq!(
        fs::read_to_string(incoming.join("sub").join("b.txt")).unwrap(),
        "PRE-STAGED\nPRE-STAGED\n"
    );
    assert_status_lines(&incoming.join(".a.txtstatus"), 2);
    assert_status_lines(&incoming.join("sub").join(".b.txtstatus"), 2);
}

/// A plain file moved in is logged but not pre-staged.
#[test]
fn test_moved_in_file_has_no_side_effect() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("report.csv"), "a,b\n").unwrap();

    let sink = MemorySink::new();
    let handler = handler(&sink);
    handler.handle(&RawEvent::new(tmp.path(), "MOVED_TO", "report.csv"));
    let summary = handler.shutdown();

    assert_eq!(sink.messages().len(), 1);
    assert_eq!(summary.staging.files_staged, 0);
    assert_eq!(
        fs::read_to_string(tmp.path().join("report.csv")).unwrap(),
        "a,b\n"
    );
    assert!(!tmp.path().join(".report.csvstatus").exists());
}

/// Unrecognized kinds produce no record and touch nothing.
#[test]
fn test_attrib_event_ignored() {
    let tmp = TempDir::new().unwrap();
    incoming_tree(tmp.path());

    let sink = MemorySink::new();
    let handler = handler(&sink);
    let raw = parse_line(&format!("{}/ ATTRIB incoming", tmp.path().display())).unwrap();
    assert!(handler.handle(&raw).is_none());
    handler.shutdown();

    assert!(sink.records().is_empty());
    assert_eq!(
        fs::read_to_string(tmp.path().join("incoming").join("a.txt")).unwrap(),
        "hello"
    );
    assert!(!tmp.path().join("incoming").join(".a.txtstatus").exists());
}

/// The full daemon loop driven by a scripted notifier.
#[tokio::test]
async fn test_daemon_with_scripted_notifier() {
    let tmp = TempDir::new().unwrap();
    incoming_tree(tmp.path());
    let data = format!("{}/", tmp.path().display());

    let script = format!(
        "printf '%s\\n' '{data} CREATE,ISDIR incoming' '{data} ATTRIB incoming' \
         '{data} MOVED_TO,ISDIR incoming' '{data} MODIFY a.txt' '{data} DELETE gone.txt'"
    );

    let config = Config {
        watch_root: tmp.path().to_path_buf(),
        restart: RestartPolicy::disabled(),
        ..Config::default()
    };
    let sink = MemorySink::new();
    let daemon = Daemon::new(config, Arc::new(sink.clone()))
        .with_notifier(NotifierCommand::custom("sh", ["-c", script.as_str()]));

    let summary = daemon.run_until(std::future::pending()).await.unwrap();

    assert_eq!(
        sink.messages(),
        vec![
            format!("The file {data}incoming was created"),
            format!("incoming was moved to {data}"),
            format!("The file {data}a.txt was modified"),
            format!("gone.txt was removed from {data}"),
        ]
    );
    assert_eq!(summary.events.events_received, 5);
    assert_eq!(summary.events.events_ignored, 1);
    assert_eq!(summary.staging.files_staged, 2);

    let incoming = tmp.path().join("incoming");
    assert_eq!(
        fs::read_to_string(incoming.join("a.txt")).unwrap(),
        "hello\nPRE-STAGED\n"
    );
    assert_status_lines(&incoming.join(".a.txtstatus"), 1);
}

/// Records carry the configured identity.
#[test]
fn test_records_tagged_with_facility() {
    let sink = MemorySink::new();
    let pool = StagingPool::new(PreStager::default(), PoolConfig::default()).unwrap();
    let handler = EventHandler::new(
        Arc::new(sink.clone()),
        Facility::new("stager", "local3").unwrap(),
        MessageStyle::Joined,
        pool,
    );

    handler.handle(&RawEvent::new("/srv/in", "CREATE", "x.dat"));
    handler.shutdown();

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tag, "stager");
    assert_eq!(records[0].facility, "local3");
    assert_eq!(records[0].message, "The file /srv/in/x.dat was created");
}
