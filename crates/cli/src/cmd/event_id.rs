//! Print the current FSEvents id

use anyhow::Result;

#[cfg(target_os = "macos")]
pub fn run() -> Result<()> {
    let id = fslog_watcher::platform::fsevent::current_system_event_id();
    println!("{}", id);
    Ok(())
}

#[cfg(not(target_os = "macos"))]
pub fn run() -> Result<()> {
    anyhow::bail!("event ids are only available with the fsevents backend on macOS")
}
