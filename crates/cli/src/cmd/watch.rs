//! Watch with the platform's preferred backend

use super::OutputArgs;
use anyhow::{Context, Result};
use clap::Args;
use fslog_cli::{paths, session};
use fslog_watcher::platform;
use fslog_watcher::WatchConfig;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Files or directories to watch
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub async fn run(args: WatchArgs, mut config: WatchConfig) -> Result<()> {
    args.output.apply(&mut config)?;
    let targets = paths::expand_targets(&args.paths, false)?;

    let mut watcher =
        platform::open_recommended(&targets, &config).context("Failed to open watcher")?;
    session::drain(watcher.as_mut(), args.output.printer()).await?;
    Ok(())
}
