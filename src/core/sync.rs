//! Sync orchestration: mode selection, chunking, bookmarks, and the
//! pager-to-sink pipeline.
//!
//! One sync invocation runs sequentially: one pager, one page in flight,
//! one sink write per range. Rate-limit friendliness and simple bookmark
//! semantics; callers wanting parallelism run separate invocations with
//! distinct fingerprints.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::client::models::{CostRow, Query};
use crate::client::{Config, HttpClient, Pager};
use crate::config::SyncOptions;
use crate::core::diagnostics::DiagnosticsSummary;
use crate::core::idempotency::{bookmark_key, query_fingerprint};
use crate::core::mapper::map_row;
use crate::core::models::{CostRecord, MetricType, Sink};
use crate::error::{Result, SyncError};
use crate::util::time::{day_floor, month_floor, next_month_start, rfc3339, utc_date};

/// Backfills longer than this are chunked month-by-month.
const CHUNK_THRESHOLD_DAYS: i64 = 30;

/// Run one sync against the default vendor endpoint.
///
/// Validates the options, builds a client, and drives a [`Syncer`]. This is
/// the single entry point the CLI wrapper calls; a non-`Ok` return is fatal
/// for the invocation.
///
/// # Errors
///
/// Returns the first error from config validation, any ranged fetch, or a
/// sink write. Bookmark-set and forecast failures are logged, not returned.
pub async fn sync(cfg: &SyncOptions, sink: &dyn Sink) -> Result<()> {
    cfg.validate()?;

    let client = HttpClient::new(Config {
        base_url: crate::client::DEFAULT_BASE_URL.to_string(),
        token: cfg.token.clone(),
        timeout: cfg.timeout,
        max_retries: cfg.max_retries,
    })?;

    Syncer::new(client).sync(cfg, sink).await
}

/// Drives cost (and optionally forecast) data from the vendor API into a
/// sink for one invocation.
pub struct Syncer {
    client: HttpClient,
    summary: DiagnosticsSummary,
}

impl Syncer {
    /// Create a syncer around an already-configured client.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            summary: DiagnosticsSummary::default(),
        }
    }

    /// Aggregated diagnostics from the last sync.
    #[must_use]
    pub const fn summary(&self) -> &DiagnosticsSummary {
        &self.summary
    }

    /// Execute one sync: incremental when no end date is configured,
    /// backfill otherwise. Always emits an end-of-sync summary log.
    ///
    /// # Errors
    ///
    /// See [`sync`].
    pub async fn sync(&mut self, cfg: &SyncOptions, sink: &dyn Sink) -> Result<()> {
        self.summary = DiagnosticsSummary::default();

        tracing::info!(operation = "sync", "starting cost sync");

        let result = match cfg.end_date {
            None => self.sync_incremental(cfg, sink).await,
            Some(end) => self.sync_backfill(cfg, sink, end).await,
        };

        self.log_summary(result.as_ref().err());
        result
    }

    /// Incremental mode: D−3 through D−1, day-aligned. Cost postings
    /// finalize several days late; this window absorbs late-arriving data
    /// without reprocessing whole months.
    async fn sync_incremental(&mut self, cfg: &SyncOptions, sink: &dyn Sink) -> Result<()> {
        let now = Utc::now();
        let start = day_floor(now - ChronoDuration::days(3));
        let end = day_floor(now - ChronoDuration::days(1));

        tracing::info!(
            operation = "incremental_sync",
            start_date = %utc_date(start),
            end_date = %utc_date(end),
            "performing incremental sync"
        );

        self.sync_single_range(cfg, sink, start, end, false).await
    }

    /// Backfill mode: the configured range, chunked by calendar month when
    /// it spans more than thirty days.
    async fn sync_backfill(
        &mut self,
        cfg: &SyncOptions,
        sink: &dyn Sink,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let start = cfg.start_date;

        tracing::info!(
            operation = "backfill_sync",
            start_date = %utc_date(start),
            end_date = %utc_date(end),
            "performing backfill sync"
        );

        if end - start > ChronoDuration::days(CHUNK_THRESHOLD_DAYS) {
            self.sync_chunked(cfg, sink, start, end).await
        } else {
            self.sync_single_range(cfg, sink, start, end, true).await
        }
    }

    /// Walk a long backfill month-by-month, aborting on the first chunk
    /// error so no bookmark or partial-range state is left behind.
    async fn sync_chunked(
        &mut self,
        cfg: &SyncOptions,
        sink: &dyn Sink,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let mut current = month_floor(start);

        while current < end {
            let chunk_end = next_month_start(current).min(end);

            if let Err(err) = self
                .sync_single_range(cfg, sink, current, chunk_end, true)
                .await
            {
                tracing::error!(
                    operation = "backfill_sync",
                    chunk_start = %utc_date(current),
                    chunk_end = %utc_date(chunk_end),
                    "backfill chunk failed"
                );
                return Err(err);
            }

            current = chunk_end;
        }

        Ok(())
    }

    /// Sync one date range: fetch every page, map, write once, advance the
    /// bookmark, then the best-effort forecast branch.
    async fn sync_single_range(
        &mut self,
        cfg: &SyncOptions,
        sink: &dyn Sink,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        is_backfill: bool,
    ) -> Result<()> {
        let mut query = Query {
            workspace_token: cfg.workspace_token.clone(),
            cost_report_token: cfg.cost_report_token.clone(),
            start_at: start,
            end_at: end,
            granularity: cfg.granularity,
            group_bys: cfg.group_bys.clone(),
            metrics: cfg.metrics.clone(),
            page_size: cfg.page_size,
            cursor: String::new(),
        };

        // The fingerprint covers the configured range, not the
        // bookmark-adjusted one, so re-runs land on the same key.
        let fingerprint = query_fingerprint(&query);
        let key = bookmark_key(&fingerprint);

        // Backfills ignore bookmarks: operators chose the range explicitly.
        if !is_backfill {
            self.apply_bookmark(&mut query, sink, &key).await;
        }

        let (records, pages) = self.fetch_and_collect(cfg, &query, &fingerprint).await?;

        tracing::info!(
            operation = "fetch_cost_data",
            pages,
            records = records.len(),
            fingerprint = %fingerprint,
            "fetched cost data"
        );

        sink.write(&records)
            .await
            .map_err(|cause| SyncError::Sink { op: "write", cause })?;

        if !is_backfill {
            // A lost bookmark only costs a re-fetch of an already-idempotent
            // window, so failure here is a warning, not a sync failure.
            let value = rfc3339(end);
            if let Err(err) = sink.set_bookmark(&key, &value).await {
                tracing::warn!(
                    operation = "update_bookmark",
                    error = %err,
                    "failed to update bookmark"
                );
            }
        }

        self.forecast_branch(cfg, sink, start, end, &fingerprint).await;

        Ok(())
    }

    /// Overwrite the query start with a previously persisted bookmark, when
    /// one exists and parses. Unreadable bookmarks are ignored.
    async fn apply_bookmark(&self, query: &mut Query, sink: &dyn Sink, key: &str) {
        match sink.get_bookmark(key).await {
            Ok(value) if !value.is_empty() => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(&value) {
                    query.start_at = parsed.with_timezone(&Utc);
                    tracing::info!(
                        operation = "resume_bookmark",
                        bookmark = %value,
                        "resuming from bookmark"
                    );
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(operation = "resume_bookmark", error = %err, "bookmark read failed");
            }
        }
    }

    /// Drive the pager to exhaustion, mapping rows in arrival order.
    async fn fetch_and_collect(
        &mut self,
        cfg: &SyncOptions,
        query: &Query,
        fingerprint: &str,
    ) -> Result<(Vec<CostRecord>, u32)> {
        let mut pager = Pager::new(&self.client, query.clone());
        let mut records = Vec::new();
        let mut pages = 0u32;

        while pager.has_more() || pages == 0 {
            let page = pager.next_page().await?;

            for row in &page.data {
                let record = map_row(
                    row,
                    query,
                    fingerprint,
                    MetricType::Cost,
                    &cfg.tag_prefix_filters,
                );
                self.summary.add_record(record.diagnostics.as_ref());
                records.push(record);
            }

            pages += 1;
            if !page.has_more {
                break;
            }
        }

        Ok((records, pages))
    }

    /// Forecasts are best-effort: a failure is logged and swallowed so it
    /// never fails an otherwise successful cost sync.
    async fn forecast_branch(
        &mut self,
        cfg: &SyncOptions,
        sink: &dyn Sink,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        fingerprint: &str,
    ) {
        if !cfg.include_forecast || cfg.cost_report_token.is_empty() {
            return;
        }

        if let Err(err) = self.sync_forecast(cfg, sink, start, end, fingerprint).await {
            tracing::warn!(operation = "forecast_sync", error = %err, "forecast sync failed");
        }
    }

    async fn sync_forecast(
        &mut self,
        cfg: &SyncOptions,
        sink: &dyn Sink,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        fingerprint: &str,
    ) -> Result<()> {
        let forecast = self
            .client
            .forecast(&cfg.cost_report_token, start, end, cfg.granularity)
            .await?;

        let forecast_query = Query {
            workspace_token: String::new(),
            cost_report_token: cfg.cost_report_token.clone(),
            start_at: start,
            end_at: end,
            granularity: cfg.granularity,
            group_bys: Vec::new(),
            metrics: Vec::new(),
            page_size: 0,
            cursor: String::new(),
        };

        let mut records = Vec::with_capacity(forecast.data.len());
        for row in &forecast.data {
            let cost_row = CostRow {
                bucket_start: row.bucket_start,
                bucket_end: row.bucket_end,
                cost: row.cost,
                currency: row.currency.clone(),
                ..CostRow::default()
            };
            let record = map_row(
                &cost_row,
                &forecast_query,
                fingerprint,
                MetricType::Forecast,
                &cfg.tag_prefix_filters,
            );
            self.summary.add_record(record.diagnostics.as_ref());
            records.push(record);
        }

        tracing::info!(
            operation = "fetch_forecast_data",
            records = records.len(),
            fingerprint = %fingerprint,
            "fetched forecast data"
        );

        sink.write(&records)
            .await
            .map_err(|cause| SyncError::Sink { op: "write", cause })
    }

    /// End-of-sync summary, error- or success-tinted. Always emitted.
    fn log_summary(&self, error: Option<&SyncError>) {
        let summary = &self.summary;

        if let Some(err) = error {
            tracing::error!(
                operation = "sync_summary",
                error = %err,
                total_records = summary.total_records,
                records_with_issues = summary.records_with_issues,
                "sync failed"
            );
            self.log_issue_details();
            return;
        }

        if summary.has_issues() {
            tracing::warn!(
                operation = "sync_summary",
                total_records = summary.total_records,
                records_with_issues = summary.records_with_issues,
                "sync completed with data quality issues"
            );
            self.log_issue_details();
        } else {
            tracing::info!(
                operation = "sync_summary",
                total_records = summary.total_records,
                "sync completed with no data quality issues"
            );
        }
    }

    fn log_issue_details(&self) {
        if !self.summary.missing_fields.is_empty() {
            tracing::warn!(
                operation = "diagnostic_summary",
                missing_fields = ?self.summary.missing_fields,
                "missing fields summary"
            );
        }
        if !self.summary.warnings.is_empty() {
            tracing::warn!(
                operation = "diagnostic_summary",
                warnings = ?self.summary.warnings,
                "warnings summary"
            );
        }
    }
}
