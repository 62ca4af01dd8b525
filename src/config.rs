use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::listing::DEFAULT_DELIMITER;
use crate::constants::report::DEFAULT_MAX_EXAMPLES;
use crate::constants::sorters::{ORDER_ASC, ORDER_DESC};
use crate::errors::ConnectorError;
use crate::types::{AssetName, ConnectorName, ContainerName, DatasourceName, GroupName};

/// Regex plus the ordered names bound to its capturing groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexConfig {
    /// Pattern source applied to each full reference.
    pub pattern: String,
    /// One name per capturing group, in group order.
    pub group_names: Vec<GroupName>,
}

/// Per-asset overrides. Missing fields fall back to the connector default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Pattern overriding `default_regex.pattern`.
    pub pattern: Option<String>,
    /// Group names overriding `default_regex.group_names`.
    pub group_names: Option<Vec<GroupName>>,
    /// Only references starting with this prefix are eligible for the asset.
    pub prefix: Option<String>,
    /// When `Some(false)`, references nested below `prefix` are ineligible.
    pub recursive: Option<bool>,
}

/// Query sent to the reference lister on every refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Container (bucket) to list.
    pub container: ContainerName,
    /// Key prefix passed to the lister.
    pub prefix: String,
    /// Whether the lister should descend below `prefix`.
    pub recursive: bool,
    /// Path delimiter used for non-recursive eligibility checks.
    pub delimiter: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            container: String::new(),
            prefix: String::new(),
            recursive: true,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

/// Sort direction for one sorter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortOrder {
    /// Smallest value first.
    #[default]
    Ascending,
    /// Largest value first.
    Descending,
}

impl TryFrom<String> for SortOrder {
    type Error = ConnectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            ORDER_ASC => Ok(SortOrder::Ascending),
            ORDER_DESC => Ok(SortOrder::Descending),
            other => Err(ConnectorError::Configuration(format!(
                "unknown sort order '{other}' (expected '{ORDER_ASC}' or '{ORDER_DESC}')"
            ))),
        }
    }
}

impl From<SortOrder> for String {
    fn from(value: SortOrder) -> Self {
        match value {
            SortOrder::Ascending => ORDER_ASC.to_string(),
            SortOrder::Descending => ORDER_DESC.to_string(),
        }
    }
}

/// One entry of the sorter chain, as written in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Group name the sorter reads.
    pub name: GroupName,
    /// Registry name of the comparator (`numeric`, `DateTimeSorter`, ...).
    #[serde(alias = "class_name")]
    pub kind: String,
    /// Direction applied to this sorter only.
    #[serde(default)]
    pub orderby: SortOrder,
    /// `chrono` format string for datetime sorters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_format: Option<String>,
    /// Ordered value list for custom-list sorters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_list: Option<Vec<String>>,
}

impl SorterConfig {
    /// Build a sorter entry with no kind-specific options.
    pub fn new(name: impl Into<GroupName>, kind: impl Into<String>, orderby: SortOrder) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            orderby,
            datetime_format: None,
            reference_list: None,
        }
    }

    /// Attach a datetime format string.
    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = Some(format.into());
        self
    }

    /// Attach a custom-list ordering.
    pub fn with_reference_list<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reference_list = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Top-level connector configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector instance name.
    pub name: ConnectorName,
    /// Owning datasource name.
    pub datasource_name: DatasourceName,
    /// Listing query issued on refresh.
    #[serde(default)]
    pub listing: ListingConfig,
    /// Pattern used by assets that declare no override.
    pub default_regex: RegexConfig,
    /// Declared assets in declaration order.
    ///
    /// A `null` body is accepted and means "no overrides".
    #[serde(default, deserialize_with = "deserialize_assets")]
    pub assets: IndexMap<AssetName, AssetConfig>,
    /// Sorter chain in priority order; empty keeps listing order.
    #[serde(default)]
    pub sorters: Vec<SorterConfig>,
    /// Number of example asset names and references in self-check reports.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

fn default_max_examples() -> usize {
    DEFAULT_MAX_EXAMPLES
}

fn deserialize_assets<'de, D>(deserializer: D) -> Result<IndexMap<AssetName, AssetConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: IndexMap<AssetName, Option<AssetConfig>> = IndexMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, config)| (name, config.unwrap_or_default()))
        .collect())
}

impl ConnectorConfig {
    /// Build a configuration with a default regex and no assets or sorters.
    pub fn new(
        name: impl Into<ConnectorName>,
        datasource_name: impl Into<DatasourceName>,
        default_regex: RegexConfig,
    ) -> Self {
        Self {
            name: name.into(),
            datasource_name: datasource_name.into(),
            listing: ListingConfig::default(),
            default_regex,
            assets: IndexMap::new(),
            sorters: Vec::new(),
            max_examples: DEFAULT_MAX_EXAMPLES,
        }
    }

    /// Parse a configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConnectorError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Declare an asset (replacing any previous declaration with the same name).
    pub fn with_asset(mut self, name: impl Into<AssetName>, asset: AssetConfig) -> Self {
        self.assets.insert(name.into(), asset);
        self
    }

    /// Append a sorter to the chain.
    pub fn with_sorter(mut self, sorter: SorterConfig) -> Self {
        self.sorters.push(sorter);
        self
    }

    /// Replace the listing query.
    pub fn with_listing(mut self, listing: ListingConfig) -> Self {
        self.listing = listing;
        self
    }
}

impl RegexConfig {
    /// Build a regex config from a pattern and its group names.
    pub fn new<I, S>(pattern: impl Into<String>, group_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<GroupName>,
    {
        Self {
            pattern: pattern.into(),
            group_names: group_names.into_iter().map(Into::into).collect(),
        }
    }
}
