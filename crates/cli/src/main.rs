//! Local history CLI - lh command

use anyhow::Result;
use clap::{Parser, Subcommand};
use lh_cli::cmd;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// lh - Local history of a project's files
#[derive(Parser)]
#[command(name = "lh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start keeping history in the current directory
    Init,
    /// Record the working tree as one change set
    Snapshot {
        /// Name of the change set
        #[arg(short, long, default_value = "Snapshot")]
        message: String,
    },
    /// Show change sets, newest first
    Log {
        /// Number of change sets to show (default: 20)
        #[arg(long)]
        limit: Option<usize>,
        /// Show the recent named changes with the entries they touched
        #[arg(long)]
        recent: bool,
    },
    /// Show the revisions of a file or directory
    History {
        /// Path in the working tree
        path: PathBuf,
    },
    /// Print a file as it was at a label or revision
    Show {
        /// Path in the working tree
        path: PathBuf,
        /// Label name
        #[arg(long, conflicts_with = "at")]
        label: Option<String>,
        /// Change set id, as listed by `lh history`
        #[arg(long)]
        at: Option<i64>,
        /// Show a diff against the file as last recorded
        #[arg(short = 'p', long)]
        diff: bool,
        /// Number of context lines (default: 3)
        #[arg(short = 'U', long, default_value = "3")]
        context: usize,
    },
    /// Put a label on the current state
    Label {
        /// Label name
        name: String,
        /// Limit the label to this file or directory and what lies under it
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Drop old change sets and the contents only they used
    Purge {
        /// Keep change sets younger than this many days (default: from config)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Show history status
    Status,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("LH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => cmd::init::run(),
        Commands::Snapshot { message } => cmd::snapshot::run(&message),
        Commands::Log { limit, recent } => cmd::log::run(limit, recent),
        Commands::History { path } => cmd::history::run(&path),
        Commands::Show { path, label, at, diff, context } => {
            cmd::show::run(&path, label.as_deref(), at, diff, context)
        }
        Commands::Label { name, path } => cmd::label::run(&name, path.as_deref()),
        Commands::Purge { days } => cmd::purge::run(days),
        Commands::Status => cmd::status::run(),
    }
}
