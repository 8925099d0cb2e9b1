//! Vendor row to canonical record transformation.
//!
//! Pure and deterministic: no I/O, no clock, no shared state. The same row,
//! query, and fingerprint always produce the same record, identifier
//! included.

use crate::client::models::{CostRow, Query};
use crate::core::diagnostics::Diagnostics;
use crate::core::idempotency::line_item_id;
use crate::core::models::{CostRecord, MetricType};
use crate::core::normalize::normalize_tags;
use crate::util::time::rfc3339;

/// Map one vendor row into a canonical record.
///
/// Numeric metrics are lifted to present only when meaningfully non-zero;
/// a reported zero maps to absent, the same as a field the vendor omitted.
#[must_use]
pub fn map_row(
    row: &CostRow,
    query: &Query,
    fingerprint: &str,
    metric_type: MetricType,
    tag_prefix_filters: &[String],
) -> CostRecord {
    let mut record = CostRecord {
        timestamp: row.bucket_start,
        provider: row.provider.clone(),
        service: row.service.clone(),
        account_id: row.account.clone(),
        project: row.project.clone(),
        region: row.region.clone(),
        resource_id: row.resource_id.clone(),
        labels: normalize_tags(&row.tags, tag_prefix_filters),
        usage_amount: lift(row.usage_quantity),
        usage_unit: row.usage_unit.clone(),
        list_cost: lift(row.list_cost),
        net_cost: lift(row.cost),
        amortized_cost: lift(row.amortized_cost),
        tax_cost: lift(row.tax),
        credit_amount: lift(row.credit),
        refund_amount: lift(row.refund),
        currency: row.currency.clone(),
        source_report_token: query.cost_report_token.clone(),
        query_fingerprint: fingerprint.to_string(),
        line_item_id: line_item_id(&query.cost_report_token, row, &query.metrics),
        metric_type,
        diagnostics: None,
    };

    record.diagnostics = diagnose(&record, row).into_option();
    record
}

/// Zero is treated as absent for all optional numeric fields.
fn lift(value: f64) -> Option<f64> {
    if value == 0.0 { None } else { Some(value) }
}

/// Reason attached to empty required string fields.
const REASON_EMPTY: &str = "required field is empty";

/// Reason attached to a net cost the vendor omitted or reported as zero.
const REASON_NIL_OR_ZERO: &str = "required field is nil or zero";

/// Run the data quality checks against a mapped record, keeping the raw
/// vendor values behind each finding as source info.
fn diagnose(record: &CostRecord, row: &CostRow) -> Diagnostics {
    let mut diag = Diagnostics::default();

    if record.provider.is_empty() {
        diag.add_missing_field("provider", REASON_EMPTY);
    }
    if record.service.is_empty() {
        diag.add_missing_field("service", REASON_EMPTY);
    }
    if record.account_id.is_empty() {
        diag.add_missing_field("account", REASON_EMPTY);
    }
    if record.region.is_empty() {
        diag.add_missing_field("region", REASON_EMPTY);
    }
    if record.currency.is_empty() {
        diag.add_missing_field("currency", REASON_EMPTY);
    }
    if record.net_cost.is_none() {
        diag.add_missing_field("net_cost", REASON_NIL_OR_ZERO);
        diag.set_source_info("cost", row.cost);
    }

    if record.usage_amount.is_some() != !record.usage_unit.is_empty() {
        diag.add_warning("usage_amount_unit_mismatch");
        diag.set_source_info("usage_quantity", row.usage_quantity);
        diag.set_source_info("usage_unit", row.usage_unit.as_str());
    }

    if let Some(net) = record.net_cost {
        if net < 0.0 {
            diag.add_warning("negative_net_cost");
            diag.set_source_info("cost", row.cost);
        }
        if let Some(list) = record.list_cost {
            if list < net {
                diag.add_warning("list_cost_below_net_cost");
                diag.set_source_info("cost", row.cost);
                diag.set_source_info("list_cost", row.list_cost);
            }
        }
    }

    if record.resource_id.is_empty() && !record.service.is_empty() {
        diag.add_warning("missing_resource_id");
    }

    if diag.has_issues() {
        diag.set_source_info("bucket_start", rfc3339(row.bucket_start));
        diag.set_source_info("bucket_end", rfc3339(row.bucket_end));
    }

    diag
}
