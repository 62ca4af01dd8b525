#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Immutable reference snapshots and the swap cell that publishes them.
pub mod cache;
/// Connector, asset, listing, and sorter configuration types.
pub mod config;
/// Centralized constants used across sorters, listing, and reports.
pub mod constants;
/// The configured-asset connector facade.
pub mod connector;
/// Batch identifiers, definitions, requests, and locations.
pub mod data;
/// Per-asset eligibility and the reference partitioner.
pub mod partition;
/// Regex matching of references into named groups.
pub mod pattern;
/// Self-check diagnostic report.
pub mod report;
/// Typed comparators and the sorter chain.
pub mod sorter;
/// Reference lister interface and the in-memory lister.
pub mod source;
/// Listers backed by concrete transports (filesystem today; blob stores later).
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use cache::{CacheSnapshot, ReferenceCache};
pub use config::{
    AssetConfig, ConnectorConfig, ListingConfig, RegexConfig, SortOrder, SorterConfig,
};
pub use connector::DataConnector;
pub use data::{
    BatchDefinition, BatchIdentifiers, BatchLocation, BatchRequest, DataConnectorQuery,
};
pub use errors::ConnectorError;
pub use partition::{AssetPartitioner, DataAsset, Partition};
pub use pattern::PatternMatcher;
pub use report::{AssetReport, SelfCheckReport};
pub use sorter::{SorterChain, SorterKind, SorterSpec};
pub use source::{CancelFlag, InMemoryKeyLister, KeyLister, ListingQuery, RefreshOptions};
pub use transport::FileKeyLister;
pub use types::{
    AssetName, ConnectorName, ContainerName, DataReference, DatasourceName, GroupName, GroupValue,
};
