//! Watch paths with kqueue

use super::OutputArgs;
use anyhow::{Context, Result};
use clap::Args;
use fslog_cli::{paths, session};
use fslog_watcher::platform;
use fslog_watcher::{Backend, WatchConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct KqueueArgs {
    /// Files or directories to watch
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Also watch every directory below each path
    #[arg(short, long)]
    pub recursive: bool,

    /// Wake the dispatch loop at least this often
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Kernel records read per wake-up
    #[arg(long, value_name = "N")]
    pub max_events: Option<usize>,

    /// Do not report created/removed directory entries
    #[arg(long)]
    pub no_entries: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub async fn run(args: KqueueArgs, mut config: WatchConfig) -> Result<()> {
    args.output.apply(&mut config)?;
    if let Some(timeout_ms) = args.timeout_ms {
        config.kqueue.poll_timeout_ms = Some(timeout_ms);
    }
    if let Some(max_events) = args.max_events {
        config.kqueue.max_events = max_events;
    }
    if args.no_entries {
        config.kqueue.track_directory_entries = false;
    }

    let targets = paths::expand_targets(&args.paths, args.recursive)?;
    info!("opening kqueue over {} target(s)", targets.len());

    let mut watcher = platform::open_watcher(Backend::KernelQueue, &targets, &config)
        .context("Failed to open kqueue watcher")?;
    session::drain(watcher.as_mut(), args.output.printer()).await?;
    Ok(())
}
