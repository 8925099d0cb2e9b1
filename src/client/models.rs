//! Wire types for the vendor cost and forecast endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Granularity, GroupBy, Metric};

/// Parameters for one `/costs` request.
///
/// The pager stamps `cursor` before each dispatch; everything else is fixed
/// for the lifetime of a ranged sync.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub workspace_token: String,
    pub cost_report_token: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub granularity: Granularity,
    pub group_bys: Vec<GroupBy>,
    pub metrics: Vec<Metric>,
    pub page_size: u32,
    /// Opaque pagination cursor; empty on the first page.
    pub cursor: String,
}

/// A single cost observation for one bucket.
///
/// Numeric fields default to 0.0 when absent on the wire; the mapper lifts
/// meaningfully non-zero values into the record's optional fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostRow {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub usage_quantity: f64,
    #[serde(default)]
    pub usage_unit: String,
    #[serde(default)]
    pub effective_unit_price: f64,
    #[serde(default)]
    pub list_cost: f64,
    #[serde(default)]
    pub amortized_cost: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub credit: f64,
    #[serde(default)]
    pub refund: f64,
    #[serde(default)]
    pub currency: String,
    /// Half-open bucket interval `[bucket_start, bucket_end)`.
    pub bucket_start: DateTime<Utc>,
    pub bucket_end: DateTime<Utc>,
}

/// One page of cost data.
///
/// An empty `next_cursor` is the authoritative terminal signal; `has_more`
/// is advisory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub data: Vec<CostRow>,
    #[serde(default)]
    pub next_cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

/// A single forecast observation.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ForecastRow {
    pub bucket_start: DateTime<Utc>,
    pub bucket_end: DateTime<Utc>,
    pub cost: f64,
    #[serde(default)]
    pub currency: String,
}

/// Response from the forecast endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastPage {
    #[serde(default)]
    pub data: Vec<ForecastRow>,
}
