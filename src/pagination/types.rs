//! Pagination types and traits

use crate::http::Query;
use serde_json::Value;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available with these parameters
    Continue {
        /// Query parameters to add/replace
        query_params: Query,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with query parameters
    pub fn with_params(query_params: Query) -> Self {
        Self::Continue { query_params }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Stop conditions for offset pagination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopCondition {
    /// Stop when a page is empty
    EmptyPage,

    /// Stop when `count + offset >= total_count` in `extra.pagination`
    #[default]
    TotalCount,
}

/// Pagination metadata of a dbt Cloud list response
///
/// ```json
/// {"extra": {"filters": {"limit": 100, "offset": 0},
///            "pagination": {"count": 100, "total_count": 250}}}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    /// Records in this page
    pub count: u64,
    /// Records across all pages
    pub total_count: u64,
    /// Offset the server applied, when echoed back
    pub offset: Option<u64>,
}

impl PageMeta {
    /// Read `extra.pagination` and `extra.filters.offset`
    pub fn from_body(body: &Value) -> Option<Self> {
        let extra = body.get("extra")?;
        let pagination = extra.get("pagination")?;
        Some(Self {
            count: pagination.get("count")?.as_u64()?,
            total_count: pagination.get("total_count")?.as_u64()?,
            offset: extra
                .get("filters")
                .and_then(|f| f.get("offset"))
                .and_then(Value::as_u64),
        })
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Offset of the next request
    pub offset: u64,
    /// Pages processed so far
    pub pages: u32,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record a processed page
    pub fn add_page(&mut self, records: u64) {
        self.pages += 1;
        self.total_fetched += records;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Query parameters for the request at the current state
    fn initial_params(&self, state: &PaginationState) -> Query;

    /// Process a response and determine if there's a next page
    fn process_response(
        &self,
        body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage;
}
