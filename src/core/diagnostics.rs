//! Per-record data quality diagnostics and the per-sync summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Data quality findings for one record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Diagnostics {
    /// Fields that were expected but empty or absent in the source row,
    /// keyed by canonical field name, with the reason they were flagged.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub missing_fields: BTreeMap<String, String>,

    /// Non-fatal oddities in the source data.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,

    /// Provenance details from the source row behind the findings.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub source_info: BTreeMap<String, serde_json::Value>,
}

impl Diagnostics {
    /// Record a missing required field and why it was flagged.
    pub fn add_missing_field(&mut self, field: &str, reason: &str) {
        self.missing_fields
            .insert(field.to_string(), reason.to_string());
    }

    /// Record a quality warning.
    pub fn add_warning(&mut self, warning: &str) {
        self.warnings.push(warning.to_string());
    }

    /// Attach a source-row provenance value.
    pub fn set_source_info(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.source_info.insert(key.to_string(), value.into());
    }

    /// True if anything was flagged. Source info alone is provenance, not
    /// an issue.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        !self.missing_fields.is_empty() || !self.warnings.is_empty()
    }

    /// `Some(self)` when issues were found, `None` for a clean record.
    #[must_use]
    pub fn into_option(self) -> Option<Self> {
        if self.has_issues() { Some(self) } else { None }
    }
}

/// Aggregated diagnostics across one sync invocation. Transient; reset at
/// the start of each sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticsSummary {
    /// Records mapped, clean or not.
    pub total_records: u64,

    /// Records that carried a diagnostics object.
    pub records_with_issues: u64,

    /// Count of records missing each field.
    pub missing_fields: BTreeMap<String, u64>,

    /// Count of records carrying each warning.
    pub warnings: BTreeMap<String, u64>,

    /// Source info merged across records, last writer wins.
    pub source_info: BTreeMap<String, serde_json::Value>,
}

impl DiagnosticsSummary {
    /// Fold one record's diagnostics into the summary.
    pub fn add_record(&mut self, diagnostics: Option<&Diagnostics>) {
        self.total_records += 1;

        let Some(diag) = diagnostics else { return };

        for (key, value) in &diag.source_info {
            self.source_info.insert(key.clone(), value.clone());
        }

        if !diag.has_issues() {
            return;
        }

        self.records_with_issues += 1;
        for field in diag.missing_fields.keys() {
            *self.missing_fields.entry(field.clone()).or_default() += 1;
        }
        for warning in &diag.warnings {
            *self.warnings.entry(warning.clone()).or_default() += 1;
        }
    }

    /// True if any record carried diagnostics.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.records_with_issues > 0
    }
}
