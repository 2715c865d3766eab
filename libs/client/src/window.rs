//! Time-windowed run listing over the upstream's page-based API.
//!
//! The upstream can only paginate by page number; it cannot filter runs by
//! time. When a caller asks for a window, the aggregator walks upstream
//! pages of [`MAX_FETCH_LIMIT`] records, filters by normalized start
//! timestamp, and re-paginates the matches under the caller's cursor.
//!
//! Fetching stops early only when upstream ordering makes it sound: runs
//! sorted by `start` descending with a lower bound set. Any other ordering
//! walks pages until the upstream runs out.

use crate::api::{HorreumClient, ListQuery, RunSummary, SortDirection, TestSummary};
use crate::cursor::PageCursor;
use crate::error::ClientError;
use crate::timeparse::TimeRange;
use crate::transport::HttpSend;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Upstream chunk size for window scans.
pub const MAX_FETCH_LIMIT: u64 = 500;

/// One caller-facing page of a (possibly filtered) listing.
#[derive(Debug, Clone, Serialize)]
pub struct WindowedPage<T> {
    pub records: Vec<T>,
    /// Records matching the query across all pages, not just this one.
    pub total_count: u64,
    pub has_more: bool,
    /// Token for the next page; present exactly when `has_more`.
    pub next_page_token: Option<String>,
}

impl<S: HttpSend> HorreumClient<S> {
    /// List runs of a test restricted to a time window.
    ///
    /// Runs whose start timestamp cannot be normalized are dropped from
    /// window results; they cannot be placed inside or outside the window.
    pub async fn list_runs_in_range(
        &self,
        test_id: i64,
        range: &TimeRange,
        cursor: &PageCursor,
        sort: &str,
        direction: SortDirection,
        cancel: &CancellationToken,
    ) -> Result<WindowedPage<RunSummary>, ClientError> {
        let mut matched: Vec<RunSummary> = Vec::new();
        let mut fetch_page: u64 = 1;

        loop {
            let query = ListQuery {
                limit: MAX_FETCH_LIMIT,
                page: fetch_page,
                sort: sort.to_string(),
                direction,
            };
            let page = self.list_runs(test_id, &query, cancel).await?;
            let fetched = page.runs.len() as u64;

            let mut oldest_in_chunk: Option<i64> = None;
            for run in page.runs {
                match run.start_millis() {
                    Some(start) => {
                        oldest_in_chunk =
                            Some(oldest_in_chunk.map_or(start, |oldest| oldest.min(start)));
                        if range.contains(start) {
                            matched.push(run);
                        }
                    }
                    None => {
                        tracing::debug!(run_id = run.id, "dropping run with unusable start");
                    }
                }
            }

            if fetched < MAX_FETCH_LIMIT {
                break;
            }
            // With newest-first ordering on start, a chunk that has already
            // dipped below the lower bound means every later chunk is older.
            if sort == "start" && direction == SortDirection::Descending {
                if let (Some(from), Some(oldest)) = (range.from_ms, oldest_in_chunk) {
                    if oldest < from {
                        break;
                    }
                }
            }
            fetch_page += 1;
        }

        Ok(paginate(matched, cursor))
    }

    /// List runs without a time window, mapping the cursor straight onto
    /// upstream pagination. One upstream call per caller page.
    pub async fn list_runs_page(
        &self,
        test_id: i64,
        cursor: &PageCursor,
        sort: &str,
        direction: SortDirection,
        cancel: &CancellationToken,
    ) -> Result<WindowedPage<RunSummary>, ClientError> {
        let query = ListQuery {
            limit: cursor.limit,
            page: cursor.page,
            sort: sort.to_string(),
            direction,
        };
        let page = self.list_runs(test_id, &query, cancel).await?;
        Ok(native_page(page.runs, page.total, cursor))
    }

    /// List test definitions, mapping the cursor onto upstream pagination.
    pub async fn list_tests_page(
        &self,
        cursor: &PageCursor,
        folder: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<WindowedPage<TestSummary>, ClientError> {
        let page = self
            .list_tests(cursor.limit, cursor.page, folder, cancel)
            .await?;
        Ok(native_page(page.tests, page.count, cursor))
    }
}

/// Slice accumulated matches under the caller's cursor.
fn paginate<T>(matched: Vec<T>, cursor: &PageCursor) -> WindowedPage<T> {
    let total_count = matched.len() as u64;
    let offset = cursor.offset().min(matched.len());
    let end = offset
        .saturating_add(cursor.limit as usize)
        .min(matched.len());
    let has_more = end < matched.len();

    let records = matched.into_iter().skip(offset).take(end - offset).collect();
    WindowedPage {
        records,
        total_count,
        has_more,
        next_page_token: has_more.then(|| cursor.next().encode()),
    }
}

/// Wrap one upstream page using the upstream's own total.
fn native_page<T>(records: Vec<T>, total: u64, cursor: &PageCursor) -> WindowedPage<T> {
    let has_more = cursor.page.saturating_mul(cursor.limit) < total;
    WindowedPage {
        records,
        total_count: total,
        has_more,
        next_page_token: has_more.then(|| cursor.next().encode()),
    }
}
