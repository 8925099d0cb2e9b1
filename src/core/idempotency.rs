//! Deterministic identity for records and queries.
//!
//! The line item identifier is the system's idempotency contract: identical
//! inputs must produce byte-identical identifiers across runs and hosts, so
//! every input is rendered through a fixed, order-independent serialization
//! before hashing. Map iteration order never reaches the hash (tags are
//! serialized in key order; metric names are sorted).

use sha2::{Digest, Sha256};

use crate::client::models::{CostRow, Query};
use crate::config::Metric;
use crate::util::time::{rfc3339, utc_date};

/// Prefix for bookmark keys derived from a query fingerprint.
pub const BOOKMARK_PREFIX: &str = "costsync";

/// Compute the idempotency key for one vendor row.
///
/// SHA-256 over the pipe-joined concatenation of: report token, bucket
/// start as UTC calendar date, the six dimension values, tags as sorted
/// `k=v` pairs joined by `;`, sorted requested metric names joined by `,`,
/// the eight numeric metric values formatted with 16 significant digits,
/// usage unit, and currency. The first 128 bits of the digest are emitted
/// as 32 lowercase hex characters.
#[must_use]
pub fn line_item_id(report_token: &str, row: &CostRow, metrics: &[Metric]) -> String {
    let tags = row
        .tags
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";");

    let mut metric_names: Vec<&str> = metrics.iter().map(|m| m.as_str()).collect();
    metric_names.sort_unstable();

    let mut parts: Vec<String> = vec![
        report_token.to_string(),
        utc_date(row.bucket_start),
        row.provider.clone(),
        row.service.clone(),
        row.account.clone(),
        row.project.clone(),
        row.region.clone(),
        row.resource_id.clone(),
        tags,
        metric_names.join(","),
    ];

    for value in [
        row.cost,
        row.usage_quantity,
        row.effective_unit_price,
        row.list_cost,
        row.amortized_cost,
        row.tax,
        row.credit,
        row.refund,
    ] {
        parts.push(format_metric(value));
    }
    parts.push(row.usage_unit.clone());
    parts.push(row.currency.clone());

    truncated_hex(&parts.join("|"))
}

/// Compute the stable fingerprint of a query: tokens, range bounds,
/// granularity, sorted group-bys, sorted metrics. Used as the bookmark key
/// and stamped into every record for traceability.
#[must_use]
pub fn query_fingerprint(query: &Query) -> String {
    let mut group_bys: Vec<&str> = query.group_bys.iter().map(|gb| gb.as_str()).collect();
    group_bys.sort_unstable();

    let mut metrics: Vec<&str> = query.metrics.iter().map(|m| m.as_str()).collect();
    metrics.sort_unstable();

    let parts = [
        query.workspace_token.as_str(),
        query.cost_report_token.as_str(),
        &rfc3339(query.start_at),
        &rfc3339(query.end_at),
        query.granularity.as_str(),
        &group_bys.join(","),
        &metrics.join(","),
    ];

    truncated_hex(&parts.join("|"))
}

/// Bookmark key for a fingerprint.
#[must_use]
pub fn bookmark_key(fingerprint: &str) -> String {
    format!("{BOOKMARK_PREFIX}_{fingerprint}")
}

/// First 16 bytes of the SHA-256 digest as lowercase hex.
fn truncated_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Render a metric value with 16 significant digits.
///
/// Trailing zeros are trimmed and values outside `1e-4 <= |v| < 1e16`
/// switch to exponent notation, so every value has exactly one rendering
/// and intra-day retries hash identically.
fn format_metric(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return if value.is_nan() {
            "NaN".to_string()
        } else if value > 0.0 {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        };
    }

    // 16 significant digits in normalized scientific form, e.g.
    // "5.025000000000000e1".
    let sci = format!("{value:.15e}");
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return sci;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let digits = digits.trim_end_matches('0');
    let rendered = if (-4..16).contains(&exponent) {
        render_decimal(digits, exponent)
    } else {
        render_scientific(digits, exponent)
    };

    format!("{sign}{rendered}")
}

/// Positional rendering: `digits` is the significand with an implied
/// decimal point after the first digit, scaled by `10^exponent`.
fn render_decimal(digits: &str, exponent: i32) -> String {
    let n = digits.len() as i32;
    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        format!("0.{zeros}{digits}")
    } else if exponent >= n - 1 {
        let zeros = "0".repeat((exponent - n + 1) as usize);
        format!("{digits}{zeros}")
    } else {
        let split = (exponent + 1) as usize;
        format!("{}.{}", &digits[..split], &digits[split..])
    }
}

/// Exponent rendering with a signed, zero-padded two-digit exponent,
/// e.g. `1.5e+20`, `1e-07`.
fn render_scientific(digits: &str, exponent: i32) -> String {
    let mantissa = if digits.len() > 1 {
        format!("{}.{}", &digits[..1], &digits[1..])
    } else {
        digits.to_string()
    };
    format!("{mantissa}e{exponent:+03}")
}
