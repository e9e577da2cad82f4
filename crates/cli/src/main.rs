//! fslog - print file system events as the kernel reports them

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// fslog - watch paths through kqueue or FSEvents
#[derive(Parser)]
#[command(name = "fslog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch paths with kqueue vnode filters
    Kqueue(cmd::kqueue::KqueueArgs),
    /// Watch roots with an FSEvents stream (macOS)
    Fsevents(cmd::fsevents::FseventsArgs),
    /// Watch paths with the platform's preferred backend
    Watch(cmd::watch::WatchArgs),
    /// List event flags and what they mean
    Flags {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the current system-wide FSEvents id (macOS)
    EventId,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = fslog_cli::logging::init(cli.log_file.as_deref())?;
    let config = fslog_cli::options::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Kqueue(args) => cmd::kqueue::run(args, config).await,
        Commands::Fsevents(args) => cmd::fsevents::run(args, config).await,
        Commands::Watch(args) => cmd::watch::run(args, config).await,
        Commands::Flags { json } => cmd::flags::run(json),
        Commands::EventId => cmd::event_id::run(),
    }
}
