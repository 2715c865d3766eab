//! Rate-limited client for a performance-data repository's REST API.
//!
//! The crate is the lower half of the MCP server: it owns upstream access
//! (shared rate window, retries with jittered backoff, per-attempt timeout,
//! cancellation), pagination tokens, heterogeneous time parsing, and the
//! windowed aggregation that re-paginates time-filtered run listings.
//!
//! The protocol layer above it maps [`ClientError`] onto tool errors; see
//! [`ClientError::code`] for the stable mapping.

pub mod api;
pub mod config;
pub mod cursor;
pub mod error;
pub mod timeparse;
pub mod transport;
pub mod window;

#[cfg(test)]
pub(crate) mod testutil;

pub use api::{
    HorreumClient, ListQuery, RunDetail, RunPage, RunSummary, SortDirection, TestPage, TestSummary,
};
pub use config::RetryPolicy;
pub use cursor::PageCursor;
pub use error::{AbortReason, ClientError};
pub use timeparse::{parse_instant, resolve_range, TimeRange, DEFAULT_LOOKBACK};
pub use transport::{HttpSend, RateLimitedTransport};
pub use window::{WindowedPage, MAX_FETCH_LIMIT};
