use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::data::{BatchDefinition, BatchIdentifiers};
use crate::errors::ConnectorError;
use crate::partition::{AssetPartitioner, Partition};
use crate::source::{KeyLister, ListingQuery};
use crate::types::{AssetName, ConnectorName, DataReference, DatasourceName};

/// Names stamped onto every batch definition built by a cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheIdentity {
    /// Datasource stamped on definitions.
    pub datasource_name: DatasourceName,
    /// Connector stamped on definitions.
    pub connector_name: ConnectorName,
}

/// One matched reference and the batch it resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedBatch {
    /// Listed key.
    pub reference: DataReference,
    /// Batch the key resolved to.
    pub definition: BatchDefinition,
}

/// Immutable result of one refresh.
///
/// Readers hold an `Arc` to a snapshot; a later refresh publishes a new one
/// and never mutates this.
#[derive(Debug)]
pub struct CacheSnapshot {
    generation: u64,
    refreshed_at: DateTime<Utc>,
    assets: IndexMap<AssetName, Vec<CachedBatch>>,
    unmatched: Vec<DataReference>,
    by_reference: HashMap<DataReference, (usize, usize)>,
    by_definition: HashMap<BatchDefinition, DataReference>,
}

impl CacheSnapshot {
    /// Build a snapshot from a partition. The generation is assigned on publish.
    pub fn from_partition(identity: &CacheIdentity, partition: Partition) -> Self {
        let Partition { matched, unmatched } = partition;
        let mut assets = IndexMap::with_capacity(matched.len());
        let mut by_reference = HashMap::new();
        let mut by_definition = HashMap::new();
        for (asset_idx, (asset_name, entries)) in matched.into_iter().enumerate() {
            let mut batches = Vec::with_capacity(entries.len());
            for (batch_idx, (reference, identifiers)) in entries.into_iter().enumerate() {
                let definition = BatchDefinition::new(
                    identity.datasource_name.clone(),
                    identity.connector_name.clone(),
                    asset_name.clone(),
                    identifiers,
                );
                by_reference.insert(reference.clone(), (asset_idx, batch_idx));
                by_definition
                    .entry(definition.clone())
                    .or_insert_with(|| reference.clone());
                batches.push(CachedBatch {
                    reference,
                    definition,
                });
            }
            assets.insert(asset_name, batches);
        }
        Self {
            generation: 0,
            refreshed_at: Utc::now(),
            assets,
            unmatched,
            by_reference,
            by_definition,
        }
    }

    /// Publication sequence number, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the snapshot was built.
    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Asset names in declaration order.
    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    /// Cached batches of `asset` in listing order.
    pub fn batches(&self, asset: &str) -> Option<&[CachedBatch]> {
        self.assets.get(asset).map(Vec::as_slice)
    }

    /// Matched references of `asset`; `None` for unknown assets.
    pub fn matched_count(&self, asset: &str) -> Option<usize> {
        self.assets.get(asset).map(Vec::len)
    }

    /// Matched references across all assets.
    pub fn total_matched(&self) -> usize {
        self.assets.values().map(Vec::len).sum()
    }

    /// References that matched no asset.
    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    /// Unmatched references in listing order.
    pub fn unmatched_references(&self) -> &[DataReference] {
        &self.unmatched
    }

    /// Every listed reference, matched or not.
    pub fn data_reference_count(&self) -> usize {
        self.total_matched() + self.unmatched.len()
    }

    /// Batches of `asset` whose identifiers satisfy `filter`, in listing order.
    ///
    /// Returns `None` when `asset` is not part of this snapshot.
    pub fn lookup(
        &self,
        asset: &str,
        filter: Option<&BatchIdentifiers>,
    ) -> Option<Vec<BatchDefinition>> {
        let batches = self.assets.get(asset)?;
        Some(
            batches
                .iter()
                .filter(|batch| {
                    filter.is_none_or(|filter| batch.definition.batch_identifiers.satisfies(filter))
                })
                .map(|batch| batch.definition.clone())
                .collect(),
        )
    }

    /// Reference a batch definition was resolved from.
    pub fn reference_for(&self, definition: &BatchDefinition) -> Option<&str> {
        self.by_definition.get(definition).map(String::as_str)
    }

    /// Batch definition a reference resolved to; `None` for unmatched or unknown references.
    pub fn batch_definition_for(&self, reference: &str) -> Option<&BatchDefinition> {
        let (asset_idx, batch_idx) = *self.by_reference.get(reference)?;
        self.assets
            .get_index(asset_idx)
            .and_then(|(_, batches)| batches.get(batch_idx))
            .map(|batch| &batch.definition)
    }
}

/// Swap cell holding the current snapshot.
///
/// Reads are a single atomic load. Publication is serialized so concurrent
/// refreshes land one after another; the last to finish is authoritative.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    current: ArcSwapOption<CacheSnapshot>,
    generation: Mutex<u64>,
}

impl ReferenceCache {
    /// Empty cache with no published snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; `None` until the first successful refresh.
    pub fn load(&self) -> Option<Arc<CacheSnapshot>> {
        self.current.load_full()
    }

    /// True once a snapshot has been published.
    pub fn is_populated(&self) -> bool {
        self.current.load().is_some()
    }

    /// List once, partition, and publish a complete new snapshot.
    ///
    /// Any failure (lister error, cancellation, timeout, ambiguous match)
    /// leaves the previous snapshot in place.
    pub fn refresh(
        &self,
        lister: &dyn KeyLister,
        query: &ListingQuery,
        partitioner: &AssetPartitioner,
        identity: &CacheIdentity,
    ) -> Result<Arc<CacheSnapshot>, ConnectorError> {
        let started = Instant::now();
        debug!(
            connector = %identity.connector_name,
            lister = %lister.id(),
            container = %query.container,
            prefix = %query.prefix,
            "refresh started"
        );
        let keys = lister
            .list(query)
            .and_then(|keys| match query.interruption(started) {
                Some(err) => Err(err),
                None => Ok(keys),
            })
            .inspect_err(|err| {
                warn!(
                    connector = %identity.connector_name,
                    lister = %lister.id(),
                    error = %err,
                    "refresh aborted; keeping previous snapshot"
                );
            })?;
        let listed = keys.len();
        let partition = partitioner.partition(keys).inspect_err(|err| {
            warn!(
                connector = %identity.connector_name,
                error = %err,
                "partitioning failed; keeping previous snapshot"
            );
        })?;
        let snapshot = CacheSnapshot::from_partition(identity, partition);
        if snapshot.unmatched_count() > 0 {
            debug!(
                connector = %identity.connector_name,
                unmatched = snapshot.unmatched_count(),
                "references matched no data asset"
            );
        }
        let published = self.publish(snapshot)?;
        info!(
            connector = %identity.connector_name,
            generation = published.generation(),
            listed,
            matched = published.total_matched(),
            unmatched = published.unmatched_count(),
            elapsed_ms = started.elapsed().as_millis(),
            "refresh published"
        );
        Ok(published)
    }

    /// Assign the next generation and swap `snapshot` in.
    pub fn publish(&self, mut snapshot: CacheSnapshot) -> Result<Arc<CacheSnapshot>, ConnectorError> {
        let mut generation = self.generation.lock().map_err(|_| {
            ConnectorError::Internal("reference cache publish lock poisoned".into())
        })?;
        *generation = generation.saturating_add(1);
        snapshot.generation = *generation;
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        Ok(snapshot)
    }
}
