//! Configured-asset data connector.
//!
//! Lifecycle: `from_config` validates patterns, assets, and the sorter chain
//! and fails without producing an instance on any configuration error. The
//! first read (or an explicit `refresh`) lists references and publishes a
//! snapshot; later refreshes replace it wholesale. Reads never observe a
//! partially built snapshot.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheIdentity, CacheSnapshot, ReferenceCache};
use crate::config::{ConnectorConfig, ListingConfig};
use crate::constants::report::CONNECTOR_KIND;
use crate::data::{
    BatchDefinition, BatchIdentifiers, BatchLocation, BatchRequest, DataConnectorQuery,
};
use crate::errors::ConnectorError;
use crate::partition::{AssetPartitioner, DataAsset};
use crate::report::SelfCheckReport;
use crate::sorter::SorterChain;
use crate::source::{KeyLister, ListingQuery, RefreshOptions};
use crate::types::{ConnectorName, DataReference, DatasourceName};

/// Resolves listed references into batches of declared assets and answers batch queries.
pub struct DataConnector {
    identity: CacheIdentity,
    listing: ListingConfig,
    partitioner: AssetPartitioner,
    sorters: SorterChain,
    max_examples: usize,
    lister: Box<dyn KeyLister>,
    cache: ReferenceCache,
}

impl DataConnector {
    /// Validate `config` and build a connector that lists through `lister`.
    ///
    /// Nothing is listed here; configuration errors surface before any refresh.
    pub fn from_config(
        config: ConnectorConfig,
        lister: impl KeyLister + 'static,
    ) -> Result<Self, ConnectorError> {
        Self::from_boxed(config, Box::new(lister))
    }

    /// Same as `from_config` for an already boxed lister.
    pub fn from_boxed(
        config: ConnectorConfig,
        lister: Box<dyn KeyLister>,
    ) -> Result<Self, ConnectorError> {
        let ConnectorConfig {
            name,
            datasource_name,
            listing,
            default_regex,
            assets,
            sorters,
            max_examples,
        } = config;
        if name.trim().is_empty() {
            return Err(ConnectorError::Configuration(
                "connector name must be non-empty".to_string(),
            ));
        }
        if datasource_name.trim().is_empty() {
            return Err(ConnectorError::Configuration(format!(
                "connector '{name}' requires a datasource name"
            )));
        }
        let assets = assets
            .iter()
            .map(|(asset_name, asset)| DataAsset::from_config(asset_name.clone(), &default_regex, asset))
            .collect::<Result<Vec<_>, _>>()?;
        let partitioner = AssetPartitioner::new(assets, listing.delimiter.clone())?;
        let sorters = SorterChain::from_configs(&sorters)?;
        for asset in partitioner.assets() {
            sorters.validate_for(asset.name(), asset.matcher().group_names())?;
        }
        debug!(
            connector = %name,
            datasource = %datasource_name,
            lister = %lister.id(),
            assets = partitioner.assets().len(),
            sorters = sorters.sorters().len(),
            "data connector constructed"
        );
        Ok(Self {
            identity: CacheIdentity {
                datasource_name,
                connector_name: name,
            },
            listing,
            partitioner,
            sorters,
            max_examples,
            lister,
            cache: ReferenceCache::new(),
        })
    }

    /// Connector instance name.
    pub fn name(&self) -> &ConnectorName {
        &self.identity.connector_name
    }

    /// Owning datasource name.
    pub fn datasource_name(&self) -> &DatasourceName {
        &self.identity.datasource_name
    }

    /// Declared asset names in declaration order.
    pub fn data_asset_names(&self) -> Vec<&str> {
        self.partitioner.assets().iter().map(DataAsset::name).collect()
    }

    /// Validated sorter chain applied to query results.
    pub fn sorter_chain(&self) -> &SorterChain {
        &self.sorters
    }

    /// List and publish a new snapshot.
    pub fn refresh(&self) -> Result<Arc<CacheSnapshot>, ConnectorError> {
        self.refresh_with(&RefreshOptions::default())
    }

    /// Refresh with a caller timeout and/or cancellation flag.
    ///
    /// On failure the previous snapshot stays authoritative.
    pub fn refresh_with(
        &self,
        options: &RefreshOptions,
    ) -> Result<Arc<CacheSnapshot>, ConnectorError> {
        let query = ListingQuery::new(&self.listing, options);
        self.cache
            .refresh(self.lister.as_ref(), &query, &self.partitioner, &self.identity)
    }

    /// True once a snapshot has been published.
    pub fn is_refreshed(&self) -> bool {
        self.cache.is_populated()
    }

    /// Current snapshot without refreshing.
    pub fn snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.cache.load()
    }

    fn ensure_snapshot(&self) -> Result<Arc<CacheSnapshot>, ConnectorError> {
        match self.cache.load() {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh(),
        }
    }

    /// Listed references in the current snapshot; zero before the first refresh.
    pub fn data_reference_count(&self) -> usize {
        self.cache
            .load()
            .map_or(0, |snapshot| snapshot.data_reference_count())
    }

    /// Matched references of `asset` in the current snapshot.
    pub fn matched_count(&self, asset: &str) -> Result<usize, ConnectorError> {
        self.require_asset(asset)?;
        Ok(self
            .cache
            .load()
            .and_then(|snapshot| snapshot.matched_count(asset))
            .unwrap_or(0))
    }

    /// References that matched no asset in the current snapshot.
    pub fn unmatched_count(&self) -> usize {
        self.cache
            .load()
            .map_or(0, |snapshot| snapshot.unmatched_count())
    }

    /// Unmatched references in listing order.
    pub fn unmatched_references(&self) -> Vec<DataReference> {
        self.cache
            .load()
            .map(|snapshot| snapshot.unmatched_references().to_vec())
            .unwrap_or_default()
    }

    /// Unsorted batches of `asset` satisfying `filter`, in listing order.
    ///
    /// A filter key the asset does not capture matches nothing.
    pub fn lookup(
        &self,
        asset: &str,
        filter: Option<&BatchIdentifiers>,
    ) -> Result<Vec<BatchDefinition>, ConnectorError> {
        self.require_asset(asset)?;
        let snapshot = self.ensure_snapshot()?;
        Ok(snapshot.lookup(asset, filter).unwrap_or_default())
    }

    /// Resolve an optional asset name to exactly one declared asset.
    ///
    /// An omitted name resolves only when a single asset is declared.
    pub fn resolve_asset_name<'a>(&'a self, asset: Option<&'a str>) -> Result<&'a str, ConnectorError> {
        match asset {
            Some(name) => self.require_asset(name).map(DataAsset::name),
            None => match self.partitioner.assets() {
                [only] => Ok(only.name()),
                assets => Err(ConnectorError::Query(format!(
                    "data_asset_name is required: connector '{}' declares {} assets",
                    self.name(),
                    assets.len()
                ))),
            },
        }
    }

    /// Sorted batches of `asset` (or the only asset) satisfying `filter`.
    pub fn batch_definitions_for(
        &self,
        asset: Option<&str>,
        filter: Option<&BatchIdentifiers>,
    ) -> Result<Vec<BatchDefinition>, ConnectorError> {
        let asset = self.resolve_asset_name(asset)?;
        let definitions = self.lookup(asset, filter)?;
        self.sorters.sort(definitions)
    }

    /// Answer a batch request: filter, sort, then index or limit.
    ///
    /// The request must name the connector's datasource, the connector, and
    /// one declared asset.
    pub fn get_batch_definitions(
        &self,
        request: &BatchRequest,
    ) -> Result<Vec<BatchDefinition>, ConnectorError> {
        if request.datasource_name != self.identity.datasource_name {
            return Err(ConnectorError::Query(format!(
                "datasource_name '{}' does not match connector datasource '{}'",
                request.datasource_name, self.identity.datasource_name
            )));
        }
        if request.data_connector_name != self.identity.connector_name {
            return Err(ConnectorError::Query(format!(
                "data_connector_name '{}' does not match connector '{}'",
                request.data_connector_name, self.identity.connector_name
            )));
        }
        let asset = request.data_asset_name.as_deref().ok_or_else(|| {
            ConnectorError::Query("batch request must specify a data_asset_name".to_string())
        })?;
        let query = request.data_connector_query.clone().unwrap_or_default();
        let definitions =
            self.batch_definitions_for(Some(asset), query.batch_filter_parameters.as_ref())?;
        select(definitions, &query)
    }

    /// Reference a batch definition was resolved from.
    pub fn reference_for(
        &self,
        definition: &BatchDefinition,
    ) -> Result<Option<DataReference>, ConnectorError> {
        let snapshot = self.ensure_snapshot()?;
        Ok(snapshot.reference_for(definition).map(str::to_string))
    }

    /// Batch a reference resolved to; `None` when it matched no asset.
    pub fn batch_definition_for(
        &self,
        reference: &str,
    ) -> Result<Option<BatchDefinition>, ConnectorError> {
        let snapshot = self.ensure_snapshot()?;
        Ok(snapshot.batch_definition_for(reference).cloned())
    }

    /// Storage location of a resolved batch.
    pub fn batch_location(
        &self,
        definition: &BatchDefinition,
    ) -> Result<BatchLocation, ConnectorError> {
        let reference = self.reference_for(definition)?.ok_or_else(|| {
            ConnectorError::Query(format!(
                "no cached reference for batch {} of data asset '{}'",
                definition.batch_identifiers, definition.data_asset_name
            ))
        })?;
        Ok(BatchLocation::new(self.listing.container.clone(), reference))
    }

    /// Diagnostic summary; refreshes first if nothing has been listed yet.
    pub fn self_check(&self) -> Result<SelfCheckReport, ConnectorError> {
        let snapshot = self.ensure_snapshot()?;
        Ok(SelfCheckReport::from_snapshot(
            CONNECTOR_KIND,
            &snapshot,
            self.max_examples,
        ))
    }

    fn require_asset(&self, asset: &str) -> Result<&DataAsset, ConnectorError> {
        self.partitioner.asset(asset).ok_or_else(|| {
            ConnectorError::Query(format!(
                "data asset '{asset}' is not declared on connector '{}'",
                self.name()
            ))
        })
    }
}

impl fmt::Debug for DataConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConnector")
            .field("name", self.name())
            .field("datasource_name", self.datasource_name())
            .field("lister", &self.lister.id())
            .field("assets", &self.data_asset_names())
            .field("generation", &self.snapshot().map(|s| s.generation()))
            .finish()
    }
}

/// Apply `index` or `limit` to an already sorted result.
fn select(
    mut definitions: Vec<BatchDefinition>,
    query: &DataConnectorQuery,
) -> Result<Vec<BatchDefinition>, ConnectorError> {
    match (query.index, query.limit) {
        (Some(_), Some(_)) => Err(ConnectorError::Query(
            "index and limit cannot both be set".to_string(),
        )),
        (Some(index), None) => {
            let len = definitions.len() as i64;
            let position = if index < 0 { len + index } else { index };
            if position < 0 || position >= len {
                return Err(ConnectorError::Query(format!(
                    "index {index} is out of range for {len} batch definition(s)"
                )));
            }
            Ok(vec![definitions.swap_remove(position as usize)])
        }
        (None, Some(limit)) => {
            definitions.truncate(limit);
            Ok(definitions)
        }
        (None, None) => Ok(definitions),
    }
}
