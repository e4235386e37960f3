//! CLI runner - executes commands

use crate::catalog::{Catalog, ResourceDescriptor};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::{SyncConfig, SyncEngine};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, HttpClientConfig};
use crate::output::JsonLinesWriter;
use crate::schema::{ResolvedSchema, SchemaCache, SchemaSource};
use crate::state::StateManager;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Discover => self.discover().await,
            Commands::Read {
                streams,
                state,
                state_json,
                fail_fast,
            } => {
                self.read(
                    streams.as_deref(),
                    state.as_deref(),
                    state_json.as_deref(),
                    *fail_fast,
                )
                .await
            }
            Commands::Streams => self.streams(),
            Commands::Spec => self.spec(),
        }
    }

    /// Load and validate configuration
    fn load_config(&self) -> Result<TapConfig> {
        // Inline config takes precedence
        if let Some(json_str) = &self.cli.config_json {
            TapConfig::from_json(json_str)
        } else if let Some(path) = &self.cli.config {
            TapConfig::from_file(path)
        } else {
            Err(Error::config(
                "No configuration given (use --config or --config-json)",
            ))
        }
    }

    /// Load state; with both flags the inline state is used and the file is written
    fn load_state(path: Option<&Path>, inline: Option<&str>) -> Result<StateManager> {
        match (inline, path) {
            (Some(json), Some(path)) => Ok(StateManager::from_json(json)?.with_path(path)),
            (Some(json), None) => StateManager::from_json(json),
            (None, Some(path)) => StateManager::from_file(path),
            (None, None) => Ok(StateManager::in_memory()),
        }
    }

    /// Schema source from `--schema-dir` or `--schema-url`, else the bundled documents
    fn schema_cache(&self) -> Result<SchemaCache> {
        if let Some(dir) = &self.cli.schema_dir {
            return Ok(SchemaCache::new(SchemaSource::Directory(dir.clone())));
        }
        match &self.cli.schema_url {
            Some(template) => {
                if !template.contains("{version}") {
                    return Err(Error::invalid_value(
                        "schema_url",
                        "must contain a {version} placeholder",
                    ));
                }
                let client = HttpClient::with_config(HttpClientConfig::default())?;
                Ok(SchemaCache::new(SchemaSource::Remote {
                    url_template: template.clone(),
                    client,
                }))
            }
            None => Ok(SchemaCache::bundled()),
        }
    }

    /// Emit the catalog with resolved schemas
    async fn discover(&self) -> Result<()> {
        let schemas = self.schema_cache()?;
        let mut streams = Vec::new();
        for resource in Catalog::dbt_cloud().iter() {
            let schema = schemas.resolve(resource).await?;
            streams.push(catalog_entry(resource, &schema));
        }

        self.output_message(&json!({ "streams": streams }));
        Ok(())
    }

    /// Read the selected streams
    async fn read(
        &self,
        streams: Option<&str>,
        state_path: Option<&Path>,
        state_json: Option<&str>,
        fail_fast: bool,
    ) -> Result<()> {
        let tap = self.load_config()?;
        let selection = parse_streams(streams);
        let selected = Catalog::dbt_cloud().select(selection.as_deref())?;
        let state = Self::load_state(state_path, state_json)?;

        info!(
            streams = ?selected.iter().map(|r| r.name).collect::<Vec<_>>(),
            accounts = tap.account_ids.len(),
            "Starting sync"
        );

        let client = Arc::new(HttpClient::with_config(tap.http_client_config())?);
        let sync_config = SyncConfig::new()
            .with_page_size(tap.page_size)
            .with_fail_fast(fail_fast);
        let schemas = Arc::new(self.schema_cache()?);
        let mut engine = SyncEngine::new(client, schemas, state.clone(), tap)
            .with_config(sync_config);
        let mut sink = JsonLinesWriter::stdout();

        let result = tokio::select! {
            result = engine.run(&selected, &mut sink) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, keeping state of completed partitions only");
                Err(Error::Other("interrupted".to_string()))
            }
        };

        // only completed partitions were committed, so this is safe after an abort
        state.save().await.context("Failed to save state")?;
        if let Some(path) = state.path() {
            info!(path = %path.display(), "State saved");
        }

        let stats = result?;
        info!(
            records = stats.records_synced,
            pages = stats.pages_fetched,
            streams = stats.streams_synced,
            partitions = stats.partitions_synced,
            duration_ms = stats.duration_ms,
            "Sync succeeded"
        );
        Ok(())
    }

    /// List stream names
    fn streams(&self) -> Result<()> {
        let streams: Vec<Value> = Catalog::dbt_cloud()
            .iter()
            .map(|r| {
                json!({
                    "name": r.name,
                    "selected_by_default": r.selected_by_default,
                    "replication_method": r.replication.method().to_string(),
                    "parent": r.parent,
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "streams": streams
        }));
        Ok(())
    }

    /// Show spec
    fn spec(&self) -> Result<()> {
        self.output_message(&json!({
            "type": "SPEC",
            "spec": {
                "documentationUrl": "https://docs.getdbt.com/dbt-cloud/api-v2",
                "connectionSpecification": TapConfig::json_schema()
            }
        }));
        Ok(())
    }

    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Split a comma-separated stream list; blank means the defaults
fn parse_streams(streams: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = streams?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();
    (!names.is_empty()).then_some(names)
}

/// Catalog entry of one stream
fn catalog_entry(resource: &ResourceDescriptor, schema: &ResolvedSchema) -> Value {
    let replication_key = resource.replication.key();
    let mut metadata = json!({
        "inclusion": "available",
        "selected-by-default": resource.selected_by_default,
        "table-key-properties": schema.key_properties,
        "forced-replication-method": resource.replication.method().to_string(),
    });
    if let Some(key) = replication_key {
        metadata["valid-replication-keys"] = json!([key]);
    }
    if let Some(parent) = resource.parent {
        metadata["parent-tap-stream-id"] = json!(parent);
    }

    json!({
        "tap_stream_id": resource.name,
        "stream": resource.name,
        "key_properties": schema.key_properties,
        "replication_method": resource.replication.method().to_string(),
        "replication_key": replication_key,
        "schema": schema.schema,
        "metadata": [{"breadcrumb": [], "metadata": metadata}]
    })
}
