use std::path::PathBuf;

use clap::{
    Args, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use sporlstats::{analysis::ExportFormat, cli, config, error, types::TimeRange};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth,

    /// Show the track playing right now
    Current,

    /// List recently played tracks
    Recent(RecentOptions),

    /// Show your top tracks or artists
    Top(TopOptions),

    /// Record recently played tracks in the local history
    Sync,

    /// Keep recording plays until interrupted
    Monitor(MonitorOptions),

    /// Analyze how your listening evolves over time
    Analyze(AnalyzeOptions),

    /// List recorded plays
    History(HistoryOptions),

    /// Delete old plays from the local history
    Prune(PruneOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Args, Debug, Clone)]
pub struct RecentOptions {
    /// Number of tracks to show (1-50)
    #[clap(long, default_value_t = 20)]
    pub limit: u32,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopKind {
    /// Top tracks
    Tracks,
    /// Top artists
    Artists,
}

#[derive(Args, Debug, Clone)]
pub struct TopOptions {
    #[command(subcommand)]
    pub kind: TopKind,

    /// Time range of the ranking
    #[clap(long, value_enum, default_value = "medium", global = true)]
    pub range: TimeRange,

    /// Number of items to show (1-50)
    #[clap(long, default_value_t = 20, global = true)]
    pub limit: u32,
}

#[derive(Args, Debug, Clone)]
pub struct MonitorOptions {
    /// Poll interval in seconds (defaults to MONITOR_INTERVAL_SECS)
    #[clap(long)]
    pub interval: Option<u64>,

    /// Stop after this many minutes
    #[clap(long)]
    pub duration: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeOptions {
    /// Number of windows to compare (defaults to REPORT_SNAPSHOTS)
    #[clap(long)]
    pub windows: Option<usize>,

    /// Length of a window in days (defaults to ANALYSIS_WINDOW_DAYS)
    #[clap(long)]
    pub days: Option<u32>,

    /// Recompute snapshots instead of using cached ones
    #[clap(long)]
    pub refresh: bool,

    /// Export the report
    #[clap(long)]
    pub export: bool,

    /// Export format
    #[clap(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    /// Export file (defaults to exports/analysis_<timestamp>.<format> in the data directory)
    #[clap(long, requires = "export")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryOptions {
    /// Show plays of the last N days
    #[clap(long, default_value_t = 7)]
    pub days: u32,

    /// Maximum number of plays to show
    #[clap(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Args, Debug, Clone)]
pub struct PruneOptions {
    /// Delete plays before this date (YYYY-MM-DD)
    #[clap(long, conflicts_with = "older_than_days")]
    pub before: Option<String>,

    /// Delete plays older than N days
    #[clap(long)]
    pub older_than_days: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Auth => cli::auth().await,
        Command::Current => cli::current().await,
        Command::Recent(opt) => cli::recent(opt.limit).await,
        Command::Top(opt) => match opt.kind {
            TopKind::Tracks => cli::top_tracks(opt.range, opt.limit).await,
            TopKind::Artists => cli::top_artists(opt.range, opt.limit).await,
        },
        Command::Sync => cli::sync().await,
        Command::Monitor(opt) => cli::monitor(opt.interval, opt.duration).await,
        Command::Analyze(opt) => {
            cli::analyze(cli::AnalyzeOptions {
                windows: opt.windows,
                days: opt.days,
                refresh: opt.refresh,
                export: opt.export,
                format: opt.format,
                output: opt.output,
            })
            .await
        }
        Command::History(opt) => cli::history(opt.days, opt.limit).await,
        Command::Prune(opt) => cli::prune(opt.before, opt.older_than_days).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
