//! CLI argument surface and command execution.
//!
//! The wrapper turns flags plus `COSTSYNC_TOKEN` into a validated
//! [`SyncOptions`] bundle and runs one sync. Records land in a JSONL file
//! through [`JsonlSink`], the reference sink implementation; real
//! deployments substitute their own [`Sink`].

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::config::{Granularity, GroupBy, Metric, SyncOptions};
use crate::core::models::{CostRecord, Sink};
use crate::error::{Result, SyncError};

/// Environment variable holding the vendor API bearer token.
pub const TOKEN_ENV: &str = "COSTSYNC_TOKEN";

/// costsync - cost API to FOCUS 1.2 ingestion adapter.
#[derive(Parser, Debug)]
#[command(name = "costsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSON logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one sync against the vendor cost API
    Sync(SyncArgs),
}

/// Arguments for `sync`.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Workspace-scoped token (exactly one of this and --cost-report-token)
    #[arg(long, value_name = "TOKEN")]
    pub workspace_token: Option<String>,

    /// Curated cost report token
    #[arg(long, value_name = "TOKEN")]
    pub cost_report_token: Option<String>,

    /// Backfill start date (YYYY-MM-DD, UTC)
    #[arg(long, value_name = "DATE")]
    pub start_date: String,

    /// Backfill end date; omit for incremental mode
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<String>,

    /// Bucket granularity
    #[arg(long, default_value = "day", value_name = "day|month")]
    pub granularity: String,

    /// Grouping dimensions, comma-separated
    #[arg(long, value_delimiter = ',', value_name = "DIMS")]
    pub group_bys: Vec<String>,

    /// Metrics to request, comma-separated
    #[arg(long, value_delimiter = ',', value_name = "METRICS")]
    pub metrics: Vec<String>,

    /// Also pull a forecast snapshot for the range
    #[arg(long)]
    pub include_forecast: bool,

    /// Allow-list prefix for normalized tag keys (repeatable)
    #[arg(long = "tag-prefix-filter", value_name = "PREFIX")]
    pub tag_prefix_filters: Vec<String>,

    /// Rows per page
    #[arg(long, default_value_t = crate::config::DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub request_timeout_seconds: u64,

    /// Retry budget on top of the initial attempt
    #[arg(long, default_value_t = crate::config::DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Output file for records (JSON lines)
    #[arg(long, default_value = "costsync.jsonl", value_name = "PATH")]
    pub out: PathBuf,
}

/// Execute the `sync` command.
///
/// # Errors
///
/// Returns config validation failures and anything [`crate::core::sync`]
/// surfaces.
pub async fn execute_sync(args: &SyncArgs) -> Result<()> {
    let options = build_options(args)?;
    let sink = JsonlSink::new(&args.out);
    crate::core::sync(&options, &sink).await
}

/// Assemble and validate the option bundle from flags and environment.
fn build_options(args: &SyncArgs) -> Result<SyncOptions> {
    let token = std::env::var(TOKEN_ENV).unwrap_or_default();

    let mut options = SyncOptions::new(token, parse_date("start_date", &args.start_date)?);
    options.workspace_token = args.workspace_token.clone().unwrap_or_default();
    options.cost_report_token = args.cost_report_token.clone().unwrap_or_default();
    options.end_date = match &args.end_date {
        Some(date) => Some(parse_date("end_date", date)?),
        None => None,
    };
    options.granularity = Granularity::from_config(&args.granularity)?;
    options.group_bys = args
        .group_bys
        .iter()
        .map(|gb| GroupBy::from_config(gb))
        .collect::<Result<_>>()?;
    options.metrics = args
        .metrics
        .iter()
        .map(|m| Metric::from_config(m))
        .collect::<Result<_>>()?;
    options.include_forecast = args.include_forecast;
    options.tag_prefix_filters = args.tag_prefix_filters.clone();
    options.page_size = args.page_size;
    options.timeout = std::time::Duration::from_secs(args.request_timeout_seconds);
    options.max_retries = args.max_retries;

    options.validate()?;
    Ok(options)
}

/// Parse an ISO date into a UTC midnight instant.
fn parse_date(key: &str, value: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| SyncError::ConfigInvalid {
            key: key.to_string(),
            message: format!("expected YYYY-MM-DD, got: {value}"),
        })
        .map(|date| {
            DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap_or_default(), Utc)
        })
}

// =============================================================================
// Reference Sink
// =============================================================================

/// Reference sink: records appended as JSON lines, bookmarks in a sidecar
/// JSON file next to the output.
///
/// Appends are not deduplicated; downstream loaders use `line_item_id` to
/// collapse re-ingested windows.
pub struct JsonlSink {
    records_path: PathBuf,
    bookmarks_path: PathBuf,
}

impl JsonlSink {
    /// Create a sink writing to `records_path`, with bookmarks stored at
    /// `<records_path>.bookmarks.json`.
    #[must_use]
    pub fn new(records_path: &Path) -> Self {
        let mut bookmarks = records_path.as_os_str().to_owned();
        bookmarks.push(".bookmarks.json");
        Self {
            records_path: records_path.to_path_buf(),
            bookmarks_path: PathBuf::from(bookmarks),
        }
    }

    fn read_bookmarks(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.bookmarks_path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.bookmarks_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write atomically via temp file + rename so an interrupted run never
    /// leaves a truncated bookmark file.
    fn write_bookmarks(&self, bookmarks: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let parent = self
            .bookmarks_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let temp_path = parent.join(format!(".bookmarks.tmp.{}", std::process::id()));
        {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(serde_json::to_string_pretty(bookmarks)?.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.bookmarks_path)?;
        Ok(())
    }
}

#[async_trait]
impl Sink for JsonlSink {
    async fn write(&self, records: &[CostRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.records_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)?;

        for record in records {
            serde_json::to_writer(&mut file, record)?;
            file.write_all(b"\n")?;
        }
        file.sync_all()?;
        Ok(())
    }

    async fn get_bookmark(&self, key: &str) -> anyhow::Result<String> {
        Ok(self.read_bookmarks()?.get(key).cloned().unwrap_or_default())
    }

    async fn set_bookmark(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut bookmarks = self.read_bookmarks()?;
        bookmarks.insert(key.to_string(), value.to_string());
        self.write_bookmarks(&bookmarks)
    }
}
