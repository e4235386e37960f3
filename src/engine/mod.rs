//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `PartitionSync` - lazy record cursor over one (resource, partition)
//! - `SyncEngine` - runs selected resources, their partitions and children,
//!   emits messages and commits watermarks
//! - `SyncConfig` / `SyncStats` - knobs and counters
//! - Timestamp helpers for replication keys

mod partition_sync;
mod types;
mod watermark;

pub use partition_sync::PartitionSync;
pub use types::{Message, SyncConfig, SyncPhase, SyncStats};
pub use watermark::{format_upstream, parse_timestamp, range_filter, Watermark, RANGE_MAX};

use crate::catalog::{Catalog, ResourceDescriptor};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::MessageSink;
use crate::partition::{child_partition, enumerate, Partition};
use crate::schema::SchemaCache;
use crate::state::StateManager;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// One top-level resource to run, with the children synced alongside it
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Top-level resource
    pub resource: &'static ResourceDescriptor,
    /// Whether its own records are emitted
    ///
    /// False when the resource is only synced to drive selected children.
    pub emit: bool,
    /// Selected children
    pub children: Vec<&'static ResourceDescriptor>,
}

/// Order selected resources into top-level runs
///
/// A selected child pulls in its parent, which then runs silently.
pub fn plan(catalog: &Catalog, selected: &[&'static ResourceDescriptor]) -> Vec<SyncPlan> {
    let is_selected = |name: &str| selected.iter().any(|r| r.name == name);

    catalog
        .iter()
        .filter(|r| !r.is_child())
        .filter_map(|resource| {
            let children: Vec<_> = catalog
                .children_of(resource.name)
                .into_iter()
                .filter(|c| is_selected(c.name))
                .collect();
            let emit = is_selected(resource.name);
            (emit || !children.is_empty()).then_some(SyncPlan {
                resource,
                emit,
                children,
            })
        })
        .collect()
}

/// Sync engine for orchestrating data extraction
#[derive(Debug)]
pub struct SyncEngine {
    client: Arc<HttpClient>,
    schemas: Arc<SchemaCache>,
    state: StateManager,
    catalog: Catalog,
    tap: TapConfig,
    config: SyncConfig,
    stats: SyncStats,
    failures: Vec<Error>,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        client: Arc<HttpClient>,
        schemas: Arc<SchemaCache>,
        state: StateManager,
        tap: TapConfig,
    ) -> Self {
        let config = SyncConfig::new().with_page_size(tap.page_size);
        Self {
            client,
            schemas,
            state,
            catalog: Catalog::dbt_cloud(),
            tap,
            config,
            stats: SyncStats::default(),
            failures: Vec::new(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Partition failures recorded so far
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    /// Sync the selected resources and emit the final state
    ///
    /// Failed partitions do not stop their siblings unless `fail_fast` is
    /// set; the run then ends with [`Error::SyncIncomplete`]. Configuration
    /// problems (such as no account ids) abort before any request.
    pub async fn run(
        &mut self,
        selected: &[&'static ResourceDescriptor],
        sink: &mut dyn MessageSink,
    ) -> Result<SyncStats> {
        let start = Instant::now();
        let steps = plan(&self.catalog, selected);
        for step in &steps {
            enumerate(step.resource, &self.tap.account_ids)?;
        }

        for step in steps {
            if let Err(e) = self
                .sync_tree(step.resource, step.emit, &step.children, sink)
                .await
            {
                // a bad config fails every stream the same way
                if self.config.fail_fast || e.is_config() {
                    return Err(e);
                }
                error!("{e}");
                self.stats.errors += 1;
                self.failures.push(e);
            }
        }

        sink.send(&Message::state(self.state.to_value().await?))
            .await?;
        sink.flush().await?;

        self.stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            records = self.stats.records_synced,
            pages = self.stats.pages_fetched,
            partitions = self.stats.partitions_synced,
            errors = self.stats.errors,
            duration_ms = self.stats.duration_ms,
            "Sync finished"
        );

        if self.failures.is_empty() {
            Ok(self.stats.clone())
        } else {
            Err(Error::SyncIncomplete {
                failed: self.failures.len(),
                total: self.stats.partitions_total(),
            })
        }
    }

    /// Sync one top-level resource without children
    ///
    /// Emits its schema, records and stream-end state; failed partitions are
    /// recorded as in [`SyncEngine::run`], which also emits the final state.
    pub async fn sync_resource(
        &mut self,
        resource: &'static ResourceDescriptor,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        if resource.is_child() {
            return Err(Error::config(format!(
                "stream '{}' can only be synced through its parent",
                resource.name
            )));
        }
        self.sync_tree(resource, true, &[], sink).await
    }

    async fn sync_tree(
        &mut self,
        resource: &'static ResourceDescriptor,
        emit: bool,
        children: &[&'static ResourceDescriptor],
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let partitions = enumerate(resource, &self.tap.account_ids)?;

        if emit {
            self.emit_schema(resource, sink).await?;
        }
        let mut active = Vec::with_capacity(children.len());
        for child in children {
            match self.emit_schema(child, sink).await {
                Ok(()) => active.push(*child),
                Err(e) => self.record_failure(e)?,
            }
        }
        if !emit && active.is_empty() {
            return Ok(());
        }

        for partition in partitions {
            match self
                .sync_partition(resource, &partition, emit, &active, sink)
                .await
            {
                Ok(()) => self.stats.partitions_synced += 1,
                // child failures arrive already attributed to the child partition
                Err(e @ Error::Sync { .. }) => self.record_failure(e)?,
                Err(e) => self.record_failure(e.in_partition(resource.name, &partition.id))?,
            }
        }

        if emit {
            self.stats.streams_synced += 1;
            sink.send(&Message::state(self.state.to_value().await?))
                .await?;
        }
        Ok(())
    }

    async fn emit_schema(
        &self,
        resource: &'static ResourceDescriptor,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let schema = self.schemas.resolve(resource).await?;
        sink.send(&Message::Schema {
            stream: resource.name.to_string(),
            schema: schema.schema.clone(),
            key_properties: schema.key_properties.clone(),
            bookmark_properties: resource
                .replication
                .key()
                .map(|k| vec![k.to_string()])
                .unwrap_or_default(),
        })
        .await
    }

    /// Sync one partition of a resource, with each record's children right after it
    async fn sync_partition(
        &mut self,
        resource: &'static ResourceDescriptor,
        partition: &Partition,
        emit: bool,
        children: &[&'static ResourceDescriptor],
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let state_key = partition.state_key(resource.state_partition_keys);
        let start = self.stored_watermark(resource, state_key.as_deref()).await?;

        let client = Arc::clone(&self.client);
        let mut sync = PartitionSync::new(
            &client,
            resource,
            partition.clone(),
            self.tap.base_url_for(resource.api_version),
            self.config.page_size,
        )
        .with_watermark(start);

        let result = async {
            while let Some(record) = sync.next_record().await? {
                let child_partitions: Vec<Partition> = match resource.child_context {
                    Some(rule) if !children.is_empty() => {
                        vec![child_partition(partition, &record, rule)]
                    }
                    _ => Vec::new(),
                };

                if emit {
                    sink.send(&Message::record(resource.name, record)).await?;
                    self.stats.records_synced += 1;
                }
                for child_context in child_partitions {
                    for child in children {
                        self.sync_child(child, child_context.clone(), sink).await?;
                    }
                }
            }
            Ok::<_, Error>(())
        }
        .await;

        self.stats.pages_fetched += sync.pages() as usize;
        result?;

        if emit && resource.replication.key().is_some() {
            let watermark = sync.watermark().map(|w| w.raw().to_string());
            self.state
                .commit(resource.name, state_key.as_deref(), watermark)
                .await?;
        }
        Ok(())
    }

    /// Sync a child partition; failures are recorded, not propagated
    async fn sync_child(
        &mut self,
        child: &'static ResourceDescriptor,
        partition: Partition,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        match self.drain_child(child, &partition, sink).await {
            Ok(()) => {
                self.stats.partitions_synced += 1;
                Ok(())
            }
            Err(e) => self.record_failure(e.in_partition(child.name, &partition.id)),
        }
    }

    async fn drain_child(
        &mut self,
        child: &'static ResourceDescriptor,
        partition: &Partition,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let state_key = partition.state_key(child.state_partition_keys);
        let start = self.stored_watermark(child, state_key.as_deref()).await?;

        let client = Arc::clone(&self.client);
        let mut sync = PartitionSync::new(
            &client,
            child,
            partition.clone(),
            self.tap.base_url_for(child.api_version),
            self.config.page_size,
        )
        .with_watermark(start);

        let result = async {
            while let Some(record) = sync.next_record().await? {
                sink.send(&Message::record(child.name, record)).await?;
                self.stats.records_synced += 1;
            }
            Ok::<_, Error>(())
        }
        .await;

        self.stats.pages_fetched += sync.pages() as usize;
        result?;

        if child.replication.key().is_some() {
            let watermark = sync.watermark().map(|w| w.raw().to_string());
            self.state
                .commit(child.name, state_key.as_deref(), watermark)
                .await?;
        }
        Ok(())
    }

    async fn stored_watermark(
        &self,
        resource: &ResourceDescriptor,
        state_key: Option<&str>,
    ) -> Result<Option<Watermark>> {
        if resource.replication.key().is_none() {
            return Ok(None);
        }
        match self.state.watermark(resource.name, state_key).await {
            Some(raw) => Watermark::parse(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Count a failure; propagate it only in fail-fast mode
    fn record_failure(&mut self, e: Error) -> Result<()> {
        if self.config.fail_fast {
            return Err(e);
        }
        warn!("{e}");
        self.stats.errors += 1;
        self.failures.push(e);
        Ok(())
    }
}
