use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lyra_sdk::FileId;

#[derive(Parser)]
#[command(name = "lyra", about = "Lyra Vault: versioned document storage", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file. Overrides --root.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding blobs, records and catalog.
    #[arg(long, global = true, default_value = ".lyra")]
    pub root: PathBuf,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a file with a name and optional MIME type
    Track(TrackArgs),
    /// Forget a file; its versions go at the next sweep
    Untrack(FileArgs),
    /// Store a new version of a file from disk
    Put(PutArgs),
    /// Show version history
    Log(LogArgs),
    /// Find versions whose content matches a pattern
    Search(SearchArgs),
    /// Print a version's content
    Cat(CatArgs),
    /// Compare two versions
    Diff(DiffArgs),
    /// Restore an earlier version
    Rollback(RollbackArgs),
    /// Delete one version
    Rm(RmArgs),
    /// Apply the retention policy
    Cleanup(CleanupArgs),
    /// Delete versions whose content repeats in a newer version
    Optimize(FileArgs),
    /// Remove orphaned versions and blobs
    Sweep,
    /// Check content hashes of every version
    Verify(FileArgs),
    /// Three-way merge of two versions against a base
    Merge(MergeArgs),
    /// Show version statistics
    Stats(FileArgs),
    /// Run scheduled cleanup until interrupted
    ServeCleanup,
}

#[derive(Args)]
pub struct FileArgs {
    pub file: FileId,
}

#[derive(Args)]
pub struct TrackArgs {
    pub file: FileId,
    pub name: String,
    #[arg(long)]
    pub mime: Option<String>,
}

#[derive(Args)]
pub struct PutArgs {
    pub file: FileId,
    pub path: PathBuf,
    #[arg(short, long)]
    pub message: Option<String>,
    #[arg(long, default_value = "lyra")]
    pub author: String,
}

#[derive(Args)]
pub struct LogArgs {
    pub file: FileId,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// Show each version's change against its predecessor.
    #[arg(long)]
    pub changes: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    pub file: FileId,
    pub pattern: String,
    /// Treat the pattern as a regular expression.
    #[arg(short = 'E', long)]
    pub regex: bool,
}

#[derive(Args)]
pub struct CatArgs {
    pub file: FileId,
    /// Version number; latest if omitted.
    pub version: Option<u64>,
}

#[derive(Args)]
pub struct DiffArgs {
    pub file: FileId,
    pub from: u64,
    pub to: u64,
}

#[derive(Args)]
pub struct RollbackArgs {
    pub file: FileId,
    pub version: u64,
    /// Repoint the current version instead of appending a new one.
    #[arg(long)]
    pub in_place: bool,
    #[arg(long, default_value = "lyra")]
    pub author: String,
}

#[derive(Args)]
pub struct RmArgs {
    pub file: FileId,
    pub version: u64,
}

#[derive(Args)]
pub struct CleanupArgs {
    /// Only this file; every file if omitted.
    pub file: Option<FileId>,
}

#[derive(Args)]
pub struct MergeArgs {
    pub file: FileId,
    pub base: u64,
    pub ours: u64,
    pub theirs: u64,
    /// Store a clean result as a new version.
    #[arg(long)]
    pub commit: bool,
    #[arg(long, default_value = "lyra")]
    pub author: String,
}
