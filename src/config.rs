//! Connector configuration
//!
//! The configuration is a flat JSON object. It is loaded from a file or an
//! inline JSON string, then validated before any request is made.

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::types::OptionStringExt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// Production endpoint of the dbt Cloud administrative API
pub const DEFAULT_BASE_URL: &str = "https://cloud.getdbt.com/api/v2";

/// Default value of the `limit` URL parameter
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

// ============================================================================
// Tap Config
// ============================================================================

/// Validated connector configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// API token sent as `Authorization: Token <api_key>`
    #[serde(default)]
    pub api_key: String,

    /// Account identifiers to sync
    #[serde(default, deserialize_with = "deserialize_account_ids")]
    pub account_ids: Vec<String>,

    /// Base URL including the default API version segment
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Page size used in the `limit` URL parameter
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// User-Agent to make requests with
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Maximum retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Client-side request rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_retries() -> u32 {
    3
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

/// Accept account ids as strings or bare JSON numbers
fn deserialize_account_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AccountId {
        Text(String),
        Number(u64),
    }

    let ids = Option::<Vec<AccountId>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(ids
        .into_iter()
        .map(|id| match id {
            AccountId::Text(s) => s.trim().to_string(),
            AccountId::Number(n) => n.to_string(),
        })
        .collect())
}

impl TapConfig {
    /// Create a config with the required fields and defaults for the rest
    pub fn new(api_key: impl Into<String>, account_ids: Vec<String>) -> Self {
        Self {
            api_key: api_key.into(),
            account_ids,
            base_url: default_base_url(),
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: None,
            max_retries: default_max_retries(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Parse and validate a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::missing_field("api_key"));
        }
        if self.account_ids.is_empty() {
            return Err(Error::missing_field("account_ids"));
        }
        if let Some(blank) = self.account_ids.iter().position(String::is_empty) {
            return Err(Error::invalid_value(
                "account_ids",
                format!("entry {blank} is empty"),
            ));
        }
        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be positive"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        Ok(())
    }

    /// Base URL for a specific API version
    ///
    /// The last path segment of `base_url` is the default version and gets
    /// replaced, so `https://cloud.getdbt.com/api/v2` becomes `.../api/v3`.
    pub fn base_url_for(&self, api_version: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let root = base.rsplit_once('/').map_or(base, |(root, _)| root);
        format!("{root}/{api_version}")
    }

    /// User agent sent with every request
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .none_if_empty()
            .unwrap_or_else(|| format!("{}/{}", crate::NAME, crate::VERSION))
    }

    /// HTTP client settings derived from this config
    pub fn http_client_config(&self) -> HttpClientConfig {
        let rps = self.requests_per_second.max(1);
        HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .rate_limit(RateLimiterConfig::new(rps, rps))
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Accept", "application/json")
            .user_agent(self.user_agent())
            .build()
    }

    /// JSON schema describing the accepted configuration
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["api_key", "account_ids"],
            "properties": {
                "api_key": {
                    "type": "string",
                    "description": "API key for the dbt Cloud API",
                    "secret": true
                },
                "account_ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "dbt Cloud account IDs"
                },
                "base_url": {
                    "type": "string",
                    "default": DEFAULT_BASE_URL,
                    "description": "Base URL for the dbt Cloud API"
                },
                "page_size": {
                    "type": "integer",
                    "default": DEFAULT_PAGE_SIZE,
                    "description": "Page size to use in limit= url parameter"
                },
                "user_agent": {
                    "type": "string",
                    "description": "User-Agent to make requests with"
                },
                "max_retries": {"type": "integer", "default": default_max_retries()},
                "requests_per_second": {"type": "integer", "default": default_requests_per_second()},
                "timeout_secs": {"type": "integer", "default": default_timeout_secs()}
            }
        })
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("api_key", &"<redacted>")
            .field("account_ids", &self.account_ids)
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = TapConfig::from_json(r#"{"api_key": "abc123", "account_ids": ["1000"]}"#)
            .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 5000);
        assert_eq!(config.account_ids, vec!["1000".to_string()]);
        assert!(config.user_agent().starts_with("dbt-cloud-source/"));
    }

    #[test]
    fn test_numeric_account_ids() {
        let config =
            TapConfig::from_json(r#"{"api_key": "k", "account_ids": [1000, "2000"]}"#).unwrap();
        assert_eq!(config.account_ids, vec!["1000", "2000"]);
    }

    #[test_case(r#"{"account_ids": ["1"]}"#, "api_key" ; "missing api key")]
    #[test_case(r#"{"api_key": "", "account_ids": ["1"]}"#, "api_key" ; "blank api key")]
    #[test_case(r#"{"api_key": "k"}"#, "account_ids" ; "missing accounts")]
    #[test_case(r#"{"api_key": "k", "account_ids": []}"#, "account_ids" ; "empty accounts")]
    fn test_missing_required(json: &str, field: &str) {
        let err = TapConfig::from_json(json).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains(field), "{err}");
    }

    #[test]
    fn test_invalid_page_size() {
        let err = TapConfig::from_json(r#"{"api_key": "k", "account_ids": ["1"], "page_size": 0}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = TapConfig::from_json(
            r#"{"api_key": "k", "account_ids": ["1"], "base_url": "not a url"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "base_url"));
    }

    #[test_case("https://cloud.getdbt.com/api/v2", "v3", "https://cloud.getdbt.com/api/v3")]
    #[test_case("https://cloud.getdbt.com/api/v2/", "v2", "https://cloud.getdbt.com/api/v2")]
    #[test_case("https://emea.dbt.com/api/v2", "v3", "https://emea.dbt.com/api/v3")]
    fn test_base_url_for(base: &str, version: &str, expected: &str) {
        let config = TapConfig::new("k", vec!["1".into()]).with_base_url(base);
        assert_eq!(config.base_url_for(version), expected);
    }

    #[test]
    fn test_http_client_config_headers() {
        let config = TapConfig::new("secret", vec!["1".into()]);
        let http = config.http_client_config();
        assert_eq!(
            http.default_headers.get("Authorization"),
            Some(&"Token secret".to_string())
        );
        assert_eq!(
            http.default_headers.get("Accept"),
            Some(&"application/json".to_string())
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = TapConfig::new("super-secret", vec!["1".into()]);
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key": "k", "account_ids": ["42"], "page_size": 10}"#)
            .unwrap();
        let config = TapConfig::from_file(&path).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.account_ids, vec!["42"]);
    }
}
