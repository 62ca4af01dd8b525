use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub use crate::types::{
    AssetName, ConnectorName, ContainerName, DataReference, DatasourceName, GroupName, GroupValue,
};

/// Ordered mapping from group name to captured value.
///
/// Insertion order follows the pattern's group order and is preserved for
/// display; equality and hashing ignore order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchIdentifiers(IndexMap<GroupName, GroupValue>);

impl BatchIdentifiers {
    /// Create an empty identifier map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(
        &mut self,
        name: impl Into<GroupName>,
        value: impl Into<GroupValue>,
    ) -> Option<GroupValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Value captured for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// True when `name` is present.
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Group names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no group is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every `(name, value)` in `filter` is present here with an equal value.
    pub fn satisfies(&self, filter: &BatchIdentifiers) -> bool {
        filter
            .iter()
            .all(|(name, value)| self.get(name) == Some(value))
    }
}

impl Hash for BatchIdentifiers {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut pairs: Vec<(&str, &str)> = self.iter().collect();
        pairs.sort_unstable();
        pairs.hash(state);
    }
}

impl<K, V> FromIterator<(K, V)> for BatchIdentifiers
where
    K: Into<GroupName>,
    V: Into<GroupValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for BatchIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

/// One matched reference resolved into a batch.
///
/// Two definitions are equal iff all four fields are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchDefinition {
    /// Owning datasource.
    pub datasource_name: DatasourceName,
    /// Connector that resolved the batch.
    pub data_connector_name: ConnectorName,
    /// Asset the batch belongs to.
    pub data_asset_name: AssetName,
    /// Captured group values.
    pub batch_identifiers: BatchIdentifiers,
}

impl BatchDefinition {
    /// Assemble a definition from its parts.
    pub fn new(
        datasource_name: impl Into<DatasourceName>,
        data_connector_name: impl Into<ConnectorName>,
        data_asset_name: impl Into<AssetName>,
        batch_identifiers: BatchIdentifiers,
    ) -> Self {
        Self {
            datasource_name: datasource_name.into(),
            data_connector_name: data_connector_name.into(),
            data_asset_name: data_asset_name.into(),
            batch_identifiers,
        }
    }
}

/// Optional refinements applied to a batch request.
///
/// Filtering happens before sorting; `index` and `limit` apply to the sorted
/// result and are mutually exclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConnectorQuery {
    /// Exact-match filter on batch identifiers.
    pub batch_filter_parameters: Option<BatchIdentifiers>,
    /// Single position in the sorted result; negative values count from the end.
    pub index: Option<i64>,
    /// Keep at most this many batches from the sorted result.
    pub limit: Option<usize>,
}

impl DataConnectorQuery {
    /// Query filtering on the given identifiers.
    pub fn filtered(filter: BatchIdentifiers) -> Self {
        Self {
            batch_filter_parameters: Some(filter),
            ..Self::default()
        }
    }
}

/// Request for the batch definitions of one asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Must equal the connector's datasource.
    pub datasource_name: DatasourceName,
    /// Must equal the connector's name.
    pub data_connector_name: ConnectorName,
    /// Asset to query; required.
    #[serde(default)]
    pub data_asset_name: Option<AssetName>,
    /// Optional filter, index, and limit.
    #[serde(default)]
    pub data_connector_query: Option<DataConnectorQuery>,
}

impl BatchRequest {
    /// Request every batch of `data_asset_name`.
    pub fn new(
        datasource_name: impl Into<DatasourceName>,
        data_connector_name: impl Into<ConnectorName>,
        data_asset_name: impl Into<AssetName>,
    ) -> Self {
        Self {
            datasource_name: datasource_name.into(),
            data_connector_name: data_connector_name.into(),
            data_asset_name: Some(data_asset_name.into()),
            data_connector_query: None,
        }
    }

    /// Attach a query.
    pub fn with_query(mut self, query: DataConnectorQuery) -> Self {
        self.data_connector_query = Some(query);
        self
    }
}

/// Where a resolved batch lives, for a downstream reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLocation {
    /// Container the reference was listed from.
    pub container: ContainerName,
    /// Listed key.
    pub reference: DataReference,
    /// `container/reference`, or the bare reference when no container is set.
    pub path: String,
}

impl BatchLocation {
    /// Locate `reference` inside `container`.
    pub fn new(container: impl Into<ContainerName>, reference: impl Into<DataReference>) -> Self {
        let container = container.into();
        let reference = reference.into();
        let path = if container.is_empty() {
            reference.clone()
        } else {
            format!("{}/{}", container.trim_end_matches('/'), reference)
        };
        Self {
            container,
            reference,
            path,
        }
    }
}
