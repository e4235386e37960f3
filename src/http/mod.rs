//! HTTP client module
//!
//! Provides the GET-only JSON client used by the sync engine and the remote
//! schema source.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx, timeouts and connection errors are retried with backoff
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Default Headers**: Token authorization and `Accept: application/json`

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, Query};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
