//! Pagination module
//!
//! Supports: Offset (with or without `extra.pagination` metadata), Single Page
//!
//! # Overview
//!
//! A paginator turns the response of one list request into either the query
//! parameters of the next request or a terminal [`NextPage::Done`]. Paginators
//! never add ordering or filter parameters; those belong to the sync engine.

mod strategies;
mod types;

pub use strategies::{paginator_for, OffsetPaginator, SinglePagePaginator};
pub use types::{NextPage, PageMeta, PaginationState, Paginator, StopCondition};
