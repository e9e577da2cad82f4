//! Command-line values that need more than clap's parsers

use anyhow::{bail, Context, Result};
use fslog_core::{EventFlags, EventId, SinceWhen};
use fslog_watcher::WatchConfig;
use std::path::Path;

/// `now` or a decimal event id
pub fn parse_since(text: &str) -> Result<SinceWhen> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("now") {
        return Ok(SinceWhen::Now);
    }
    let raw: u64 = text
        .parse()
        .with_context(|| format!("--since expects `now` or an event id, got `{}`", text))?;
    Ok(SinceWhen::Event(EventId::from_raw(raw)))
}

/// Event names separated by `,` or `|`; `all` for every per-entry kind
pub fn parse_events(text: &str) -> Result<EventFlags> {
    let flags = EventFlags::from_names(text)?;
    if flags.is_empty() {
        bail!("--events must name at least one event kind");
    }
    Ok(flags)
}

/// Config file if given, defaults otherwise
pub fn load_config(path: Option<&Path>) -> Result<WatchConfig> {
    match path {
        Some(path) => WatchConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(WatchConfig::default()),
    }
}
