//! Subcommands

pub mod event_id;
pub mod flags;
pub mod fsevents;
pub mod kqueue;
pub mod watch;

use anyhow::Result;
use clap::Args;
use fslog_cli::options;
use fslog_cli::output::{OutputFormat, Printer};
use fslog_watcher::WatchConfig;
use std::io::IsTerminal;

/// Options shared by every watching subcommand
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Event kinds to report, comma separated (`all` for every kind)
    #[arg(long, value_name = "LIST")]
    pub events: Option<String>,

    /// Print one JSON object per event
    #[arg(long)]
    pub json: bool,

    /// Exit after this many events
    #[arg(long, value_name = "N", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub limit: Option<usize>,
}

impl OutputArgs {
    /// Fold `--events` into the config
    pub fn apply(&self, config: &mut WatchConfig) -> Result<()> {
        if let Some(list) = &self.events {
            config.interest = options::parse_events(list)?;
        }
        Ok(())
    }

    pub fn printer(&self) -> Printer {
        let (format, color) = if self.json {
            (OutputFormat::Json, false)
        } else {
            (OutputFormat::Human, std::io::stdout().is_terminal())
        };
        Printer::new(format, color).with_limit(self.limit)
    }
}
