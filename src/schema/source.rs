//! OpenAPI document sources
//!
//! Documents are YAML files named `openapi_<version>.yaml`. Only their
//! `components.schemas` section is kept.

use crate::error::{Error, Result};
use crate::http::{HttpClient, Query};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

const BUNDLED_V2: &str = include_str!("../../schemas/openapi_v2.yaml");
const BUNDLED_V3: &str = include_str!("../../schemas/openapi_v3.yaml");

/// Where OpenAPI documents are loaded from
#[derive(Debug)]
pub enum SchemaSource {
    /// Documents compiled into the binary
    Bundled,
    /// A directory containing `openapi_<version>.yaml` files
    Directory(PathBuf),
    /// A URL template where `{version}` is replaced by the API version
    Remote {
        /// URL template
        url_template: String,
        /// Client used to fetch the document
        client: HttpClient,
    },
}

impl SchemaSource {
    /// Human-readable location, for error messages
    fn location(&self, api_version: &str) -> String {
        match self {
            SchemaSource::Bundled => format!("bundled openapi_{api_version}.yaml"),
            SchemaSource::Directory(dir) => dir
                .join(format!("openapi_{api_version}.yaml"))
                .display()
                .to_string(),
            SchemaSource::Remote { url_template, .. } => {
                url_template.replace("{version}", api_version)
            }
        }
    }

    /// Load the `components.schemas` mapping for an API version
    pub async fn load(&self, api_version: &str) -> Result<Value> {
        let location = self.location(api_version);
        debug!(%location, "Loading OpenAPI document");

        let text = match self {
            SchemaSource::Bundled => match api_version {
                "v2" => BUNDLED_V2.to_string(),
                "v3" => BUNDLED_V3.to_string(),
                other => {
                    return Err(Error::Other(format!(
                        "no bundled OpenAPI document for API version '{other}'"
                    )))
                }
            },
            SchemaSource::Directory(_) => tokio::fs::read_to_string(&location)
                .await
                .map_err(|e| Error::Other(format!("failed to read {location}: {e}")))?,
            SchemaSource::Remote { client, .. } => client
                .get_text(&location, &Query::new())
                .await
                .map_err(|e| Error::Other(format!("failed to fetch {location}: {e}")))?,
        };

        parse_components(&text)
            .map_err(|message| Error::Other(format!("malformed document {location}: {message}")))
    }
}

/// Extract `components.schemas` from an OpenAPI YAML (or JSON) document
pub fn parse_components(text: &str) -> std::result::Result<Value, String> {
    let document: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    let schemas = document
        .get("components")
        .and_then(|c| c.get("schemas"))
        .ok_or_else(|| "missing components.schemas".to_string())?;
    if !schemas.is_mapping() {
        return Err("components.schemas is not a mapping".to_string());
    }
    serde_json::to_value(schemas).map_err(|e| e.to_string())
}
