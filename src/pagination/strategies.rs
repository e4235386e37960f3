//! Pagination strategy implementations

use super::types::{NextPage, PageMeta, PaginationState, Paginator, StopCondition};
use crate::catalog::PaginationStrategy;
use crate::http::Query;
use serde_json::Value;
use tracing::debug;

/// Paginator for a resource's strategy
pub fn paginator_for(strategy: PaginationStrategy, page_size: u32) -> Box<dyn Paginator> {
    match strategy {
        PaginationStrategy::Offset => Box::new(OffsetPaginator::new(page_size)),
        PaginationStrategy::SinglePage => Box::new(SinglePagePaginator::new(page_size)),
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination
///
/// Sends `limit` on every request and `offset` once it is non-zero. With the
/// default [`StopCondition::TotalCount`] the next offset is taken from the
/// response metadata; responses without metadata fall back to the empty-page
/// rule.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Query parameter name for limit
    pub limit_param: String,
    /// Number of records per page
    pub limit_value: u32,
    /// Stop condition
    pub stop_condition: StopCondition,
}

impl OffsetPaginator {
    /// Create a metadata-aware offset paginator
    pub fn new(limit_value: u32) -> Self {
        Self {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            limit_value,
            stop_condition: StopCondition::TotalCount,
        }
    }

    /// Set the stop condition
    #[must_use]
    pub fn with_stop_condition(mut self, stop_condition: StopCondition) -> Self {
        self.stop_condition = stop_condition;
        self
    }

    fn params(&self, offset: u64) -> Query {
        let mut params = Query::new();
        params.insert(self.limit_param.clone(), self.limit_value.to_string());
        if offset > 0 {
            params.insert(self.offset_param.clone(), offset.to_string());
        }
        params
    }

    /// Next offset from the empty-page rule, or `None` when done
    fn next_by_records(state: &PaginationState, records_count: u64) -> Option<u64> {
        (records_count > 0).then(|| state.offset + records_count)
    }

    /// Next offset from response metadata, or `None` when done
    fn next_by_meta(state: &PaginationState, meta: PageMeta) -> Option<u64> {
        let offset = meta.offset.unwrap_or(state.offset);
        if meta.count == 0 || meta.count + offset >= meta.total_count {
            return None;
        }
        Some(offset + meta.count)
    }
}

impl Paginator for OffsetPaginator {
    fn initial_params(&self, state: &PaginationState) -> Query {
        self.params(state.offset)
    }

    fn process_response(
        &self,
        body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        let records_count = records_count as u64;
        state.add_page(records_count);

        let next = match self.stop_condition {
            StopCondition::EmptyPage => Self::next_by_records(state, records_count),
            StopCondition::TotalCount => match PageMeta::from_body(body) {
                Some(meta) => Self::next_by_meta(state, meta),
                None => {
                    debug!("Response has no pagination metadata, using page size");
                    Self::next_by_records(state, records_count)
                }
            },
        };

        match next {
            // a server echoing a smaller offset would loop forever
            Some(offset) if offset > state.offset => {
                state.offset = offset;
                NextPage::with_params(self.params(offset))
            }
            _ => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

// ============================================================================
// Single Page
// ============================================================================

/// One request; only `limit` is sent
#[derive(Debug, Clone, Copy)]
pub struct SinglePagePaginator {
    /// Number of records requested
    pub limit_value: u32,
}

impl SinglePagePaginator {
    /// Create a single-page paginator
    pub fn new(limit_value: u32) -> Self {
        Self { limit_value }
    }
}

impl Paginator for SinglePagePaginator {
    fn initial_params(&self, _state: &PaginationState) -> Query {
        let mut params = Query::new();
        params.insert("limit".to_string(), self.limit_value.to_string());
        params
    }

    fn process_response(
        &self,
        _body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.add_page(records_count as u64);
        state.mark_done();
        NextPage::Done
    }
}
