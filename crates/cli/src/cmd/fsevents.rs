//! Watch roots with FSEvents

use super::OutputArgs;
use anyhow::{Context, Result};
use clap::Args;
use fslog_cli::{options, paths, session};
use fslog_core::SinceWhen;
use fslog_watcher::platform;
use fslog_watcher::{Backend, WatchConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct FseventsArgs {
    /// Directories to watch, recursively
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// `now`, or an event id to replay history from
    #[arg(long, value_name = "now|ID")]
    pub since: Option<String>,

    /// Coalescing window before delivery
    #[arg(long, value_name = "MS")]
    pub latency_ms: Option<u64>,

    /// Report per directory instead of per file
    #[arg(long)]
    pub dir_events: bool,

    /// Deliver the first event after a quiet period immediately
    #[arg(long)]
    pub no_defer: bool,

    /// Report changes to the path leading up to each root
    #[arg(long)]
    pub watch_root: bool,

    /// Skip changes made by this process
    #[arg(long)]
    pub ignore_self: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub async fn run(args: FseventsArgs, mut config: WatchConfig) -> Result<()> {
    args.output.apply(&mut config)?;
    if let Some(since) = &args.since {
        config.fsevents.since = match options::parse_since(since)? {
            SinceWhen::Now => None,
            SinceWhen::Event(id) => Some(id.as_raw()),
        };
    }
    if let Some(latency_ms) = args.latency_ms {
        config.fsevents.latency_ms = latency_ms;
    }
    if args.dir_events {
        config.fsevents.file_events = false;
    }
    config.fsevents.no_defer |= args.no_defer;
    config.fsevents.watch_root |= args.watch_root;
    config.fsevents.ignore_self |= args.ignore_self;

    let roots = paths::expand_targets(&args.roots, false)?;
    info!(
        "opening fsevents stream over {} root(s) since {:?}",
        roots.len(),
        config.fsevents.since_when()
    );

    let mut watcher = platform::open_watcher(Backend::HistoryStream, &roots, &config)
        .context("Failed to open fsevents watcher")?;
    session::drain(watcher.as_mut(), args.output.printer()).await?;
    Ok(())
}
