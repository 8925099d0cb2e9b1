//! Cursor-driven pagination over the cost endpoint.

use crate::client::http::HttpClient;
use crate::client::models::{CostRow, Page, Query};
use crate::error::{Result, SyncError};

/// Drives the cost endpoint to exhaustion via opaque cursors.
///
/// The first fetch is always permitted (the cursor starts empty); once any
/// fetched page comes back with an empty `next_cursor`, the pager is
/// terminal.
#[derive(Debug)]
pub struct Pager<'a> {
    client: &'a HttpClient,
    query: Query,
    has_started: bool,
}

impl<'a> Pager<'a> {
    /// Create a pager for the given query. The query's cursor should be
    /// empty; it is owned by the pager from here on.
    #[must_use]
    pub fn new(client: &'a HttpClient, query: Query) -> Self {
        Self {
            client,
            query,
            has_started: false,
        }
    }

    /// Fetch the next page.
    ///
    /// Each call snapshots the query (a value, no shared mutation across
    /// calls), dispatches through the retrying client, and stores the
    /// response's `next_cursor` for the following call.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Api`] when called after exhaustion, or whatever
    /// the client surfaces.
    pub async fn next_page(&mut self) -> Result<Page> {
        if self.has_started && self.query.cursor.is_empty() {
            return Err(SyncError::Api {
                status: 0,
                body: "no more pages available".to_string(),
            });
        }

        let current = self.query.clone();
        let page = self.client.costs(&current).await?;

        self.has_started = true;
        self.query.cursor = page.next_cursor.clone();

        tracing::debug!(
            rows = page.data.len(),
            has_more = page.has_more,
            terminal = page.next_cursor.is_empty(),
            "fetched costs page"
        );

        Ok(page)
    }

    /// True while more pages remain. False before the first fetch; use the
    /// `has_more() || page_count == 0` idiom to drive the loop.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_started && !self.query.cursor.is_empty()
    }

    /// Drain every remaining page into a flat row list.
    ///
    /// Memory-intensive for large result sets; the orchestrator streams
    /// page-by-page instead.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error.
    pub async fn all_pages(&mut self) -> Result<Vec<CostRow>> {
        let mut rows = Vec::new();

        while self.has_more() || !self.has_started {
            let page = self.next_page().await?;
            rows.extend(page.data);
            if !page.has_more {
                break;
            }
        }

        tracing::info!(total_rows = rows.len(), "fetched all cost pages");
        Ok(rows)
    }
}
