//! Live watching through the binary

#![cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]

use crate::fslog;
use anyhow::Result;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Create `name` under `dir` once the watcher has had time to start
fn create_later(dir: &Path, name: &str) -> thread::JoinHandle<()> {
    let path = dir.join(name);
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(1000));
        std::fs::write(path, b"hello").unwrap();
    })
}

#[test]
fn test_kqueue_reports_created_entry() -> Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    let writer = create_later(&root, "a.txt");

    let result = fslog!(&root, "kqueue", ".", "--events", "created", "--limit", "1", "--json")
        .timeout(Duration::from_secs(15))
        .assert_success()?;
    writer.join().unwrap();

    let events = result.json_lines();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["path"], root.join("a.txt").to_string_lossy().as_ref());
    assert!(events[0]["flags"].as_str().unwrap().contains("CREATED"));
    Ok(())
}

#[test]
fn test_kqueue_human_output() -> Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    let writer = create_later(&root, "b.txt");

    let result = fslog!(&root, "kqueue", ".", "--events", "created", "--limit", "1")
        .timeout(Duration::from_secs(15))
        .assert_success()?;
    writer.join().unwrap();

    assert!(result.contains_stdout("b.txt created"));
    Ok(())
}

#[test]
#[cfg(target_os = "macos")]
fn test_fsevents_reports_ids() -> Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    let writer = create_later(&root, "c.txt");

    let result = fslog!(
        &root, "fsevents", ".", "--events", "created", "--latency-ms", "50", "--limit", "1", "--json"
    )
    .timeout(Duration::from_secs(15))
    .assert_success()?;
    writer.join().unwrap();

    let events = result.json_lines();
    assert_eq!(events.len(), 1);
    assert!(events[0]["id"].as_u64().is_some());
    assert!(events[0]["path"].as_str().unwrap().ends_with("c.txt"));
    Ok(())
}

#[test]
#[cfg(target_os = "macos")]
fn test_event_id_prints_number() -> Result<()> {
    let dir = TempDir::new()?;
    let result = fslog!(dir.path(), "event-id").assert_success()?;
    assert!(result.stdout.trim().parse::<u64>()? > 0);
    Ok(())
}
