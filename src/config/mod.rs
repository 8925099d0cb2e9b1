//! Validated option bundle for a sync invocation.
//!
//! How the options arrived here (YAML file, flags, environment) is the CLI
//! wrapper's problem; the core only ever sees a [`SyncOptions`] that has
//! passed [`SyncOptions::validate`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Default page size for cost queries.
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

/// Maximum page size accepted by the cost endpoint.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default retry budget on top of the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

// =============================================================================
// Query Enums
// =============================================================================

/// Bucket granularity for cost and forecast queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    /// Wire name used in query parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
        }
    }

    /// Parse from a config value.
    pub fn from_config(value: &str) -> Result<Self> {
        match value {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            other => Err(SyncError::ConfigInvalid {
                key: "granularity".to_string(),
                message: format!("must be 'day' or 'month', got: {other}"),
            }),
        }
    }
}

/// Grouping dimensions recognized by the cost endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Provider,
    Service,
    Account,
    Project,
    Region,
    ResourceId,
    Tags,
}

impl GroupBy {
    /// All dimensions in wire order.
    pub const ALL: &'static [Self] = &[
        Self::Provider,
        Self::Service,
        Self::Account,
        Self::Project,
        Self::Region,
        Self::ResourceId,
        Self::Tags,
    ];

    /// Wire name used in `group_bys[]` query parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Service => "service",
            Self::Account => "account",
            Self::Project => "project",
            Self::Region => "region",
            Self::ResourceId => "resource_id",
            Self::Tags => "tags",
        }
    }

    /// Parse from a config value.
    pub fn from_config(value: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|gb| gb.as_str() == value)
            .copied()
            .ok_or_else(|| SyncError::ConfigInvalid {
                key: "group_bys".to_string(),
                message: format!(
                    "invalid value: {value} (valid: provider, service, account, project, region, resource_id, tags)"
                ),
            })
    }
}

/// Metrics recognized by the cost endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cost,
    Usage,
    EffectiveUnitPrice,
    AmortizedCost,
    Taxes,
    Credits,
    Refunds,
}

impl Metric {
    /// All metrics in wire order.
    pub const ALL: &'static [Self] = &[
        Self::Cost,
        Self::Usage,
        Self::EffectiveUnitPrice,
        Self::AmortizedCost,
        Self::Taxes,
        Self::Credits,
        Self::Refunds,
    ];

    /// Wire name used in `metrics[]` query parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Usage => "usage",
            Self::EffectiveUnitPrice => "effective_unit_price",
            Self::AmortizedCost => "amortized_cost",
            Self::Taxes => "taxes",
            Self::Credits => "credits",
            Self::Refunds => "refunds",
        }
    }

    /// Parse from a config value.
    pub fn from_config(value: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|m| m.as_str() == value)
            .copied()
            .ok_or_else(|| SyncError::ConfigInvalid {
                key: "metrics".to_string(),
                message: format!(
                    "invalid value: {value} (valid: cost, usage, effective_unit_price, amortized_cost, taxes, credits, refunds)"
                ),
            })
    }
}

// =============================================================================
// Sync Options
// =============================================================================

/// The validated option bundle for one sync invocation.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Bearer token for the vendor API. Never logged.
    pub token: String,

    /// Workspace-scoped token. Exactly one of this and `cost_report_token`.
    pub workspace_token: String,

    /// Curated report token. Exactly one of this and `workspace_token`.
    pub cost_report_token: String,

    /// Backfill start bound (UTC, day-aligned).
    pub start_date: DateTime<Utc>,

    /// Backfill end bound. `None` selects incremental mode.
    pub end_date: Option<DateTime<Utc>>,

    /// Bucket granularity.
    pub granularity: Granularity,

    /// Grouping dimensions to request.
    pub group_bys: Vec<GroupBy>,

    /// Metrics to request.
    pub metrics: Vec<Metric>,

    /// Enable the forecast branch after each cost range.
    pub include_forecast: bool,

    /// Allow-list prefixes applied to normalized tag keys. Empty keeps all
    /// keys that survive the deny list.
    pub tag_prefix_filters: Vec<String>,

    /// Rows per page, in [1, 10000].
    pub page_size: u32,

    /// Per-request deadline.
    pub timeout: Duration,

    /// Retry budget on top of the initial attempt.
    pub max_retries: u32,
}

impl SyncOptions {
    /// Create options with defaults for everything except the credentials
    /// and scope, which have no sensible defaults.
    #[must_use]
    pub fn new(token: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            workspace_token: String::new(),
            cost_report_token: String::new(),
            start_date,
            end_date: None,
            granularity: Granularity::Day,
            group_bys: Vec::new(),
            metrics: Vec::new(),
            include_forecast: false,
            tag_prefix_filters: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Validate the bundle. Runs before any request is made.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(invalid("token", "is required (set COSTSYNC_TOKEN)"));
        }

        match (
            self.workspace_token.is_empty(),
            self.cost_report_token.is_empty(),
        ) {
            (true, true) => {
                return Err(invalid(
                    "workspace_token",
                    "exactly one of workspace_token or cost_report_token must be set; neither is",
                ));
            }
            (false, false) => {
                return Err(invalid(
                    "workspace_token",
                    "exactly one of workspace_token or cost_report_token must be set; both are",
                ));
            }
            _ => {}
        }

        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(invalid("end_date", "must not be before start_date"));
            }
        }

        if self.page_size < 1 {
            return Err(invalid("page_size", "must be at least 1"));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(invalid("page_size", "cannot exceed 10000"));
        }

        if self.timeout < Duration::from_secs(1) {
            return Err(invalid(
                "request_timeout_seconds",
                "must be at least 1 second",
            ));
        }

        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> SyncError {
    SyncError::ConfigInvalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}
