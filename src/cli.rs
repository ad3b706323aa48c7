use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sizelog")]
#[command(about = "Track database size over time and warn before the disk fills up")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot store (overrides store.path from the config)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Show debug logging
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Measure a database, record a snapshot and send alerts
    Monitor(MonitorArgs),

    /// Measure a database and print the result without recording it
    Inspect(InspectArgs),

    /// List recorded snapshots
    History(HistoryArgs),

    /// Display the most recent snapshot or a specific one
    Report(ReportArgs),

    /// Show per-table sizes of a snapshot, or one table over time
    Tables(TablesArgs),

    /// Delete snapshots older than the retention window
    Prune(PruneArgs),
}

/// Where a measurement comes from. Exactly one is required.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Read a JSON measurement from a file, or '-' for stdin
    #[arg(long)]
    pub input: Option<String>,

    /// Measure a SQLite database file directly
    #[arg(long)]
    pub sqlite: Option<PathBuf>,
}

#[derive(Parser)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct HistoryArgs {
    /// Only snapshots of this database
    #[arg(long)]
    pub database: Option<String>,

    /// Earliest date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    /// Latest date (YYYY-MM-DD or RFC 3339), inclusive
    #[arg(long)]
    pub until: Option<String>,

    /// Maximum number of snapshots
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ReportArgs {
    /// Show a specific snapshot by ID
    #[arg(long)]
    pub id: Option<String>,

    /// Latest snapshot of this database
    #[arg(long, conflicts_with = "id")]
    pub database: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct TablesArgs {
    /// Snapshot ID (defaults to the latest)
    #[arg(long)]
    pub id: Option<String>,

    /// Sort by growth instead of size
    #[arg(long, default_value_t = false)]
    pub fastest: bool,

    /// History of one table across snapshots
    #[arg(long, conflicts_with_all = ["id", "fastest"])]
    pub table: Option<String>,

    /// Database the table belongs to (defaults to the latest snapshot's)
    #[arg(long, requires = "table")]
    pub database: Option<String>,

    /// Maximum number of rows
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct PruneArgs {
    /// Retention in days (defaults to monitoring.retention_days)
    #[arg(long)]
    pub days: Option<u32>,

    /// Show what would be deleted
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Skip confirmation and execute deletion
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

impl PruneArgs {
    /// returns true if nothing should be deleted
    pub fn is_dry_run(&self) -> bool {
        self.dry_run || !self.yes
    }
}
