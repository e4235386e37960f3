//! Lazy record cursor over one partition of one resource

use super::types::SyncPhase;
use super::watermark::{range_filter, Watermark};
use crate::catalog::{PostProcess, RecordShape, ResourceDescriptor, SoftError};
use crate::error::{Error, Result};
use crate::http::{HttpClient, Query};
use crate::pagination::{paginator_for, PaginationState, Paginator};
use crate::partition::Partition;
use crate::types::Record;
use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Pull-based sync of one (resource, partition)
///
/// Pages are requested only once the previous page has been consumed, so
/// dropping the cursor early never fetches more than needed.
#[derive(Debug)]
pub struct PartitionSync<'a> {
    client: &'a HttpClient,
    resource: &'static ResourceDescriptor,
    partition: Partition,
    base_url: String,
    url: String,
    paginator: Box<dyn Paginator>,
    pagination: PaginationState,
    filters: Query,
    start: Option<Watermark>,
    high_water: Option<Watermark>,
    buffer: VecDeque<Record>,
    phase: SyncPhase,
}

impl<'a> PartitionSync<'a> {
    /// Create a cursor; nothing is requested until the first `next_record`
    pub fn new(
        client: &'a HttpClient,
        resource: &'static ResourceDescriptor,
        partition: Partition,
        base_url: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            resource,
            partition,
            base_url: base_url.into(),
            url: String::new(),
            paginator: paginator_for(resource.pagination, page_size),
            pagination: PaginationState::new(),
            filters: Query::new(),
            start: None,
            high_water: None,
            buffer: VecDeque::new(),
            phase: SyncPhase::Pending,
        }
    }

    /// Resume from a stored watermark
    ///
    /// Ignored for full-table resources.
    #[must_use]
    pub fn with_watermark(mut self, watermark: Option<Watermark>) -> Self {
        if self.resource.replication.key().is_some() {
            self.high_water.clone_from(&watermark);
            self.start = watermark;
        }
        self
    }

    /// Resource being synced
    pub fn resource(&self) -> &'static ResourceDescriptor {
        self.resource
    }

    /// Partition being synced
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Pages fetched so far
    pub fn pages(&self) -> u32 {
        self.pagination.pages
    }

    /// Highest replication-key value seen, never below the starting watermark
    pub fn watermark(&self) -> Option<&Watermark> {
        self.high_water.as_ref()
    }

    /// Next record, or `None` once the partition is finished
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        match self.advance().await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.phase = SyncPhase::Failed;
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Expose the cursor as a stream that ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Record>> + 'a {
        futures::stream::unfold(self, |mut sync| async move {
            match sync.next_record().await {
                Ok(Some(record)) => Some((Ok(record), sync)),
                Ok(None) => None,
                Err(e) => Some((Err(e), sync)),
            }
        })
    }

    async fn advance(&mut self) -> Result<Option<Record>> {
        loop {
            match self.phase {
                SyncPhase::Pending => self.begin()?,
                SyncPhase::Fetching => self.fetch_page().await?,
                SyncPhase::Paginating | SyncPhase::Exhausted => {
                    let Some(raw) = self.buffer.pop_front() else {
                        self.phase = if self.phase == SyncPhase::Paginating {
                            SyncPhase::Fetching
                        } else {
                            SyncPhase::Done
                        };
                        continue;
                    };

                    let Some(record) = self.post_process(raw) else {
                        continue;
                    };
                    if self.below_cutoff(&record)? {
                        self.buffer.clear();
                        self.phase = SyncPhase::CutoffReached;
                        continue;
                    }
                    self.observe(&record)?;
                    return Ok(Some(record));
                }
                SyncPhase::CutoffReached | SyncPhase::Done | SyncPhase::Failed => return Ok(None),
            }
        }
    }

    /// Leave `Pending`: check the gate, render the URL and the watermark filters
    fn begin(&mut self) -> Result<()> {
        if let Some(gate) = self.resource.child_gate {
            if !self.partition.gate_open(gate) {
                debug!(
                    stream = self.resource.name,
                    partition = %self.partition,
                    gate,
                    "Gate closed, skipping partition"
                );
                self.phase = SyncPhase::Done;
                return Ok(());
            }
        }

        let path = self.partition.render_path(self.resource.path)?;
        self.url = format!("{}{path}", self.base_url.trim_end_matches('/'));

        if let (Some(key), Some(start)) = (self.resource.replication.key(), &self.start) {
            self.filters.insert("order_by".to_string(), format!("-{key}"));
            if let Some(param) = self.resource.range_filter {
                self.filters
                    .insert(param.to_string(), range_filter(start.at()));
            }
            info!(
                stream = self.resource.name,
                partition = %self.partition,
                watermark = %start,
                "Resuming incremental sync"
            );
        } else {
            info!(
                stream = self.resource.name,
                partition = %self.partition,
                "Starting full sync"
            );
        }

        self.phase = SyncPhase::Fetching;
        Ok(())
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let mut query = self.filters.clone();
        query.extend(self.paginator.initial_params(&self.pagination));

        let mut body = match self.client.get_json(&self.url, &query).await {
            Ok(body) => body,
            Err(err) => {
                if let Some(soft) = self.soft_error(&err) {
                    warn!(
                        stream = self.resource.name,
                        partition = %self.partition,
                        status = soft.status,
                        "{}",
                        soft.reason
                    );
                    self.phase = SyncPhase::Exhausted;
                    return Ok(());
                }
                return Err(err);
            }
        };

        let items = match body.get_mut("data").map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(Error::decode(format!(
                    "'data' in {} response is not a list: {other}",
                    self.resource.name
                )))
            }
        };

        let next = self
            .paginator
            .process_response(&body, items.len(), &mut self.pagination);
        debug!(
            stream = self.resource.name,
            partition = %self.partition,
            page = self.pagination.pages,
            records = items.len(),
            "Fetched page"
        );

        for item in items {
            let record = self.shape(item)?;
            self.buffer.push_back(record);
        }
        self.phase = if next.is_done() {
            SyncPhase::Exhausted
        } else {
            SyncPhase::Paginating
        };
        Ok(())
    }

    /// Turn one item under `data` into a record
    fn shape(&self, item: Value) -> Result<Record> {
        match (self.resource.record_shape, item) {
            (RecordShape::Object, Value::Object(record)) => Ok(record),
            (RecordShape::Object, other) => Err(Error::decode(format!(
                "expected {} records to be objects, got {other}",
                self.resource.name
            ))),
            (RecordShape::Scalar { field }, item) => {
                let mut record = Record::new();
                record.insert(field.to_string(), item);
                Ok(record)
            }
        }
    }

    fn post_process(&self, mut record: Record) -> Option<Record> {
        match self.resource.post_process {
            PostProcess::None => Some(record),
            PostProcess::InjectContext(keys) => {
                for key in keys {
                    if let Some(value) = self.partition.get(key) {
                        record.insert((*key).to_string(), value.clone());
                    }
                }
                Some(record)
            }
            PostProcess::DropMissing(field) => match record.get(field) {
                None | Some(Value::Null) => None,
                Some(_) => Some(record),
            },
        }
    }

    /// Replication-key value of a record; `None` when absent or null
    fn key_of(&self, record: &Record) -> Result<Option<Watermark>> {
        let Some(key) = self.resource.replication.key() else {
            return Ok(None);
        };
        match record.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => Watermark::parse(raw.as_str()).map(Some),
            Some(other) => Err(Error::InvalidTimestamp {
                value: other.to_string(),
                message: format!("replication key '{key}' is not a string"),
            }),
        }
    }

    fn below_cutoff(&self, record: &Record) -> Result<bool> {
        let Some(start) = &self.start else {
            return Ok(false);
        };
        let Some(value) = self.key_of(record)? else {
            return Ok(false);
        };
        if value < *start {
            info!(
                stream = self.resource.name,
                partition = %self.partition,
                "Breaking after hitting a record with replication key {value} < {start}"
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn observe(&mut self, record: &Record) -> Result<()> {
        if let Some(value) = self.key_of(record)? {
            if self.high_water.as_ref().map_or(true, |current| value > *current) {
                self.high_water = Some(value);
            }
        }
        Ok(())
    }

    /// Allow-listed error response meaning "no records"
    fn soft_error(&self, err: &Error) -> Option<&'static SoftError> {
        let Error::HttpStatus { status, body } = err else {
            return None;
        };
        let body: Value = serde_json::from_str(body).ok()?;
        let reason = body.pointer("/data/reason").and_then(Value::as_str);
        self.resource.soft_error(*status, reason)
    }
}
