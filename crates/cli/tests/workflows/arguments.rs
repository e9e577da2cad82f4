//! Commands that fail or finish without a live watcher

use crate::fslog;
use anyhow::Result;
use tempfile::TempDir;

#[test]
fn test_flags_lists_vocabulary() -> Result<()> {
    let dir = TempDir::new()?;
    let result = fslog!(dir.path(), "flags").assert_success()?;

    assert!(result.contains_stdout("Stream-level"));
    assert!(result.contains_stdout("must-scan-subdirs"));
    assert!(result.contains_stdout("kernel-dropped"));
    assert!(result.contains_stdout("created"));
    assert!(result.contains_stdout("is-symlink"));
    Ok(())
}

#[test]
fn test_flags_json_is_complete() -> Result<()> {
    let dir = TempDir::new()?;
    let result = fslog!(dir.path(), "flags", "--json").assert_success()?;

    let entries: Vec<serde_json::Value> = serde_json::from_str(&result.stdout)?;
    assert_eq!(entries.len(), 26);
    assert_eq!(entries[0]["name"], "must-scan-subdirs");
    assert_eq!(entries[0]["stream_level"], true);
    assert!(entries
        .iter()
        .any(|e| e["name"] == "created" && e["stream_level"] == false));
    Ok(())
}

#[test]
fn test_unknown_event_name_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let result = fslog!(dir.path(), "kqueue", ".", "--events", "created,exploded").assert_failure()?;
    assert!(result.contains_stderr("unknown event flag `exploded`"));
    Ok(())
}

#[test]
fn test_bad_since_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let result = fslog!(dir.path(), "fsevents", ".", "--since", "yesterday").assert_failure()?;
    assert!(result.contains_stderr("--since"));
    Ok(())
}

#[test]
fn test_missing_path_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let result = fslog!(dir.path(), "kqueue", "does-not-exist").assert_failure()?;
    assert!(result.contains_stderr("Cannot watch"));
    Ok(())
}

#[test]
fn test_paths_are_required() -> Result<()> {
    let dir = TempDir::new()?;
    fslog!(dir.path(), "kqueue").assert_failure()?;
    fslog!(dir.path(), "fsevents").assert_failure()?;
    Ok(())
}

#[test]
fn test_zero_limit_and_timeout_are_rejected() -> Result<()> {
    let dir = TempDir::new()?;

    let result = fslog!(dir.path(), "kqueue", ".", "--limit", "0").assert_failure()?;
    assert!(result.contains_stderr("--limit"));

    let result = fslog!(dir.path(), "kqueue", ".", "--timeout-ms", "0").assert_failure()?;
    assert!(result.contains_stderr("--timeout-ms"));
    Ok(())
}

#[test]
fn test_zero_poll_timeout_in_config_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("fslog.toml"), "[kqueue]\npoll_timeout_ms = 0\n")?;
    let result = fslog!(dir.path(), "--config", "fslog.toml", "kqueue", ".").assert_failure()?;
    assert!(result.contains_stderr("poll_timeout_ms"));
    Ok(())
}

#[test]
fn test_missing_config_file_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let result = fslog!(dir.path(), "--config", "missing.toml", "flags").assert_failure()?;
    assert!(result.contains_stderr("missing.toml"));
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected_before_open() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("fslog.toml"), "[kqueue]\nmax_events = 0\n")?;
    let result = fslog!(dir.path(), "--config", "fslog.toml", "kqueue", ".").assert_failure()?;
    assert!(result.contains_stderr("max_events"));
    Ok(())
}

#[test]
fn test_log_file_receives_logs() -> Result<()> {
    let dir = TempDir::new()?;
    let log = dir.path().join("fslog.log");
    let log_arg = log.to_string_lossy().to_string();

    // Fails on every platform: the path does not exist
    fslog!(dir.path(), "--log-file", log_arg.as_str(), "kqueue", "nowhere").assert_failure()?;
    assert!(log.exists());
    Ok(())
}

#[test]
#[cfg(target_os = "linux")]
fn test_backends_unavailable_on_linux() -> Result<()> {
    let dir = TempDir::new()?;

    let result = fslog!(dir.path(), "kqueue", ".").assert_failure()?;
    assert!(result.contains_stderr("kqueue backend is not available"));

    let result = fslog!(dir.path(), "fsevents", ".").assert_failure()?;
    assert!(result.contains_stderr("fsevents backend is not available"));

    let result = fslog!(dir.path(), "watch", ".").assert_failure()?;
    assert!(result.contains_stderr("no file watching backend is available"));

    let result = fslog!(dir.path(), "event-id").assert_failure()?;
    assert!(result.contains_stderr("only available"));
    Ok(())
}
