//! Shared test plumbing: an in-memory recording sink and response builders
//! for the mock cost API.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use costsync::core::models::{CostRecord, Sink};

/// In-memory sink that records every write and bookmark operation, with
/// switchable failure injection.
#[derive(Default)]
pub struct MemorySink {
    pub writes: Mutex<Vec<Vec<CostRecord>>>,
    pub bookmarks: Mutex<BTreeMap<String, String>>,
    pub fail_writes: Mutex<bool>,
    pub fail_set_bookmark: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records across all writes, in write order.
    pub fn all_records(&self) -> Vec<CostRecord> {
        self.writes.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn bookmark(&self, key: &str) -> Option<String> {
        self.bookmarks.lock().unwrap().get(key).cloned()
    }

    pub fn seed_bookmark(&self, key: &str, value: &str) {
        self.bookmarks
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn set_fail_set_bookmark(&self, fail: bool) {
        *self.fail_set_bookmark.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, records: &[CostRecord]) -> anyhow::Result<()> {
        if *self.fail_writes.lock().unwrap() {
            anyhow::bail!("injected write failure");
        }
        self.writes.lock().unwrap().push(records.to_vec());
        Ok(())
    }

    async fn get_bookmark(&self, key: &str) -> anyhow::Result<String> {
        Ok(self
            .bookmarks
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_bookmark(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if *self.fail_set_bookmark.lock().unwrap() {
            anyhow::bail!("injected bookmark failure");
        }
        self.bookmarks
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A fully-populated wire row for the mock `/costs` endpoint.
pub fn cost_row(service: &str, cost: f64, bucket_start: &str, bucket_end: &str) -> Value {
    json!({
        "provider": "aws",
        "service": service,
        "account": "123",
        "region": "us-east-1",
        "cost": cost,
        "currency": "USD",
        "bucket_start": bucket_start,
        "bucket_end": bucket_end,
    })
}

/// A `/costs` page body.
pub fn page(rows: Vec<Value>, next_cursor: &str, has_more: bool) -> Value {
    json!({
        "data": rows,
        "next_cursor": next_cursor,
        "has_more": has_more,
    })
}

/// An empty terminal `/costs` page.
pub fn empty_page() -> Value {
    page(Vec::new(), "", false)
}
