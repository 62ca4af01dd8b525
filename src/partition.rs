//! Asset declarations and partitioning of listed references across assets.
//!
//! Each asset resolves an effective pattern from the connector default and
//! its own optional override. A reference is assigned to the single asset
//! whose filters and pattern accept it; references accepted by no asset are
//! collected as unmatched, and a reference accepted by several assets is a
//! configuration error.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use crate::config::{AssetConfig, RegexConfig};
use crate::data::BatchIdentifiers;
use crate::errors::ConnectorError;
use crate::pattern::PatternMatcher;
use crate::types::{AssetName, DataReference};

/// Resolve the regex an asset uses: override fields win, the default fills the rest.
pub fn effective_regex(default: &RegexConfig, asset: &AssetConfig) -> RegexConfig {
    RegexConfig {
        pattern: asset
            .pattern
            .clone()
            .unwrap_or_else(|| default.pattern.clone()),
        group_names: asset
            .group_names
            .clone()
            .unwrap_or_else(|| default.group_names.clone()),
    }
}

/// A named asset with its compiled effective pattern and reference filters.
#[derive(Clone, Debug)]
pub struct DataAsset {
    name: AssetName,
    matcher: PatternMatcher,
    prefix: Option<String>,
    recursive: Option<bool>,
}

impl DataAsset {
    /// Compile an asset from the connector default and its override record.
    pub fn from_config(
        name: impl Into<AssetName>,
        default: &RegexConfig,
        config: &AssetConfig,
    ) -> Result<Self, ConnectorError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConnectorError::Configuration(
                "data asset names must be non-empty".to_string(),
            ));
        }
        let regex = effective_regex(default, config);
        let matcher = PatternMatcher::from_config(&regex).map_err(|err| match err {
            ConnectorError::Configuration(msg) => {
                ConnectorError::Configuration(format!("data asset '{name}': {msg}"))
            }
            other => other,
        })?;
        Ok(Self {
            name,
            matcher,
            prefix: config.prefix.clone().filter(|prefix| !prefix.is_empty()),
            recursive: config.recursive,
        })
    }

    /// Declared asset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled effective pattern.
    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Eligibility prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Apply the prefix/recursive filter.
    pub fn is_eligible(&self, reference: &str, delimiter: &str) -> bool {
        let remainder = match self.prefix.as_deref() {
            Some(prefix) => match reference.strip_prefix(prefix) {
                Some(rest) => rest,
                None => return false,
            },
            None => reference,
        };
        if self.recursive == Some(false) && !delimiter.is_empty() {
            return !remainder.contains(delimiter);
        }
        true
    }

    /// Filter then match; `None` when the asset does not accept `reference`.
    pub fn resolve(&self, reference: &str, delimiter: &str) -> Option<BatchIdentifiers> {
        if !self.is_eligible(reference, delimiter) {
            return None;
        }
        self.matcher.match_reference(reference)
    }

    fn same_rules_as(&self, other: &DataAsset) -> bool {
        self.matcher.same_as(&other.matcher)
            && self.prefix == other.prefix
            && self.recursive == other.recursive
    }
}

/// Result of partitioning one listing.
#[derive(Clone, Debug, Default)]
pub struct Partition {
    /// Matched references per asset in listing order; every declared asset has an entry.
    pub matched: IndexMap<AssetName, Vec<(DataReference, BatchIdentifiers)>>,
    /// References accepted by no asset, in listing order.
    pub unmatched: Vec<DataReference>,
}

impl Partition {
    /// Total references placed in either side of the partition.
    pub fn reference_count(&self) -> usize {
        self.matched.values().map(Vec::len).sum::<usize>() + self.unmatched.len()
    }
}

/// Assigns references to declared assets.
#[derive(Clone, Debug)]
pub struct AssetPartitioner {
    assets: Vec<DataAsset>,
    delimiter: String,
}

impl AssetPartitioner {
    /// Validate and hold the declared assets.
    ///
    /// Fails when no asset is declared, a name repeats, or two assets share
    /// identical filters and patterns (every reference one accepts would be
    /// accepted by the other).
    pub fn new(assets: Vec<DataAsset>, delimiter: impl Into<String>) -> Result<Self, ConnectorError> {
        if assets.is_empty() {
            return Err(ConnectorError::Configuration(
                "at least one data asset must be declared".to_string(),
            ));
        }
        for (idx, asset) in assets.iter().enumerate() {
            for earlier in &assets[..idx] {
                if earlier.name == asset.name {
                    return Err(ConnectorError::Configuration(format!(
                        "data asset '{}' is declared more than once",
                        asset.name
                    )));
                }
                if earlier.same_rules_as(asset) {
                    return Err(ConnectorError::Configuration(format!(
                        "data assets '{}' and '{}' use identical patterns and filters; every matching reference would be ambiguous",
                        earlier.name, asset.name
                    )));
                }
            }
        }
        Ok(Self {
            assets,
            delimiter: delimiter.into(),
        })
    }

    /// Assets in declaration order.
    pub fn assets(&self) -> &[DataAsset] {
        &self.assets
    }

    /// Look up an asset by name.
    pub fn asset(&self, name: &str) -> Option<&DataAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    /// Partition `references` across assets, preserving listing order.
    ///
    /// Repeated references are placed once, at their first position.
    pub fn partition<I, S>(&self, references: I) -> Result<Partition, ConnectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<DataReference>,
    {
        let mut partition = Partition {
            matched: self
                .assets
                .iter()
                .map(|asset| (asset.name.clone(), Vec::new()))
                .collect(),
            unmatched: Vec::new(),
        };
        let mut seen = HashSet::new();
        for reference in references {
            let reference: DataReference = reference.into();
            if !seen.insert(reference.clone()) {
                debug!(reference = %reference, "skipping repeated reference in listing");
                continue;
            }
            let mut hits: Vec<(&DataAsset, BatchIdentifiers)> = self
                .assets
                .iter()
                .filter_map(|asset| {
                    asset
                        .resolve(&reference, &self.delimiter)
                        .map(|ids| (asset, ids))
                })
                .collect();
            if hits.len() > 1 {
                let assets = hits.iter().map(|(asset, _)| asset.name.clone()).collect();
                return Err(ConnectorError::AmbiguousAssetMatch { reference, assets });
            }
            match hits.pop() {
                Some((asset, identifiers)) => {
                    if let Some(bucket) = partition.matched.get_mut(&asset.name) {
                        bucket.push((reference, identifiers));
                    }
                }
                None => partition.unmatched.push(reference),
            }
        }
        Ok(partition)
    }
}
