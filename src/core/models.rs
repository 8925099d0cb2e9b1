//! Canonical cost records and the persistence port.
//!
//! [`CostRecord`] follows the FOCUS 1.2 field set. Every nullable numeric
//! field is an `Option<f64>`: `None` means the vendor did not report the
//! metric, and is never conflated with a reported zero.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::diagnostics::Diagnostics;

// =============================================================================
// Metric Type
// =============================================================================

/// Which logical stream a record belongs to.
///
/// Forecast records never collide with cost records for the same bucket:
/// the sink treats the two streams as distinct write paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Cost,
    Forecast,
}

impl MetricType {
    /// Stream name as stored on records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Forecast => "forecast",
        }
    }
}

// =============================================================================
// Cost Record
// =============================================================================

/// A normalized cost record (FOCUS 1.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostRecord {
    /// Bucket start instant.
    pub timestamp: DateTime<Utc>,

    // Core dimensions.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub provider: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub account_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub project: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub resource_id: String,

    /// Normalized, filtered labels. `None` when the vendor sent no tags.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub labels: Option<BTreeMap<String, String>>,

    // Usage metrics.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage_amount: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub usage_unit: String,

    // Cost metrics.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub list_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub net_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub amortized_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tax_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub credit_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub refund_amount: Option<f64>,

    // Metadata.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub currency: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub source_report_token: String,
    /// Fingerprint of the originating query, for traceability.
    pub query_fingerprint: String,
    /// Deterministic 128-bit idempotency key, 32 lowercase hex chars.
    pub line_item_id: String,
    pub metric_type: MetricType,

    /// Data quality findings. `None` means the record is clean, so
    /// consumers can test "has issues" with a single null check.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diagnostics: Option<Diagnostics>,
}

// =============================================================================
// Sink Port
// =============================================================================

/// Downstream persistence for cost records and sync bookmarks.
///
/// Implementations are expected to be idempotent on repeated writes of
/// records with identical `line_item_id`s. Errors are the implementor's
/// own; the orchestrator wraps them without interpreting sub-kinds.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write a batch of records.
    async fn write(&self, records: &[CostRecord]) -> anyhow::Result<()>;

    /// Read the bookmark stored under `key`, empty string when absent.
    async fn get_bookmark(&self, key: &str) -> anyhow::Result<String>;

    /// Store `value` under `key`, replacing any previous bookmark.
    async fn set_bookmark(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
