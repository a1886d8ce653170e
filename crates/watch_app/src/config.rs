use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use engine_logging::LogDestination;
use log::LevelFilter;
use watch_engine::{CheckerConfig, FetchSettings};

const DEFAULT_UPDATES_URL: &str = "https://hijala.com/manga/?order=update";
const DEFAULT_LATEST_URL: &str = "https://hijala.com/manga/?status=&type=&order=latest";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "chapter-watch",
    about = "Poll a catalog site for new titles and new episodes"
)]
pub struct Cli {
    /// Listing ordered by most recent update.
    #[arg(long, env = "CHAPTER_WATCH_UPDATES_URL", default_value = DEFAULT_UPDATES_URL)]
    pub updates_url: String,

    /// Listing ordered by most recently added title.
    #[arg(long, env = "CHAPTER_WATCH_LATEST_URL", default_value = DEFAULT_LATEST_URL)]
    pub latest_url: String,

    /// Seconds to sleep between cycles
    #[arg(long, env = "CHAPTER_WATCH_INTERVAL", default_value_t = 60)]
    pub interval_secs: u64,

    #[arg(long, env = "CHAPTER_WATCH_CATALOG", default_value = "data/catalog.json")]
    pub catalog_path: PathBuf,

    #[arg(long, env = "CHAPTER_WATCH_SEEN", default_value = "data/seen.json")]
    pub seen_path: PathBuf,

    #[arg(
        long,
        env = "CHAPTER_WATCH_NOTIFICATION_LOG",
        default_value = "data/notification_log.json"
    )]
    pub notification_log_path: PathBuf,

    #[arg(
        long,
        env = "CHAPTER_WATCH_SUBSCRIPTIONS",
        default_value = "data/subscriptions.json"
    )]
    pub subscriptions_path: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, env = "CHAPTER_WATCH_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "CHAPTER_WATCH_LOG", value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Used when `--log` is `file` or `both`
    #[arg(long, env = "CHAPTER_WATCH_LOG_FILE", default_value = "chapter-watch.log")]
    pub log_file: PathBuf,

    #[arg(long, env = "CHAPTER_WATCH_VERBOSE", default_value_t = false)]
    pub verbose: bool,

    /// Seed the catalog and seen pointer before watching, without notifying.
    #[arg(long, default_value_t = false)]
    pub backfill: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll until interrupted (default)
    Watch,
    /// Run a single cycle and exit
    Once,
    /// Follow a title
    Subscribe { subscriber: u64, title: String },
    /// Stop following a title
    Unsubscribe { subscriber: u64, title: String },
    /// List the titles a subscriber follows
    Titles { subscriber: u64 },
    /// Show notifications flagged for retry
    Retries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Watch)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.log_file.clone()),
            LogTarget::Both => LogDestination::Both(self.log_file.clone()),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig::new(&self.updates_url, &self.latest_url)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..FetchSettings::default()
        }
    }

    /// Directories that must exist before any store is written.
    pub fn state_dirs(&self) -> Vec<&Path> {
        let mut dirs: Vec<&Path> = [
            &self.catalog_path,
            &self.seen_path,
            &self.notification_log_path,
            &self.subscriptions_path,
        ]
        .into_iter()
        .filter_map(|path| path.parent())
        .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}
