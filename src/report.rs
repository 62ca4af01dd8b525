use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cache::CacheSnapshot;
use crate::errors::ConnectorError;
use crate::types::{AssetName, DataReference};

/// Per-asset section of a self-check report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReport {
    /// First matched references in listing order.
    pub example_data_references: Vec<DataReference>,
    /// Number of batches resolved for the asset.
    pub batch_definition_count: usize,
}

/// Diagnostic snapshot of a connector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfCheckReport {
    /// Connector kind label.
    pub class_name: String,
    /// Number of declared assets.
    pub data_asset_count: usize,
    /// First asset names in declaration order.
    pub example_data_asset_names: Vec<AssetName>,
    /// Every declared asset, in declaration order.
    pub data_assets: IndexMap<AssetName, AssetReport>,
    /// First unmatched references in listing order.
    pub example_unmatched_data_references: Vec<DataReference>,
    /// Total unmatched references.
    pub unmatched_data_reference_count: usize,
}

impl SelfCheckReport {
    /// Summarize `snapshot`, keeping at most `max_examples` of each example list.
    pub fn from_snapshot(
        class_name: impl Into<String>,
        snapshot: &CacheSnapshot,
        max_examples: usize,
    ) -> Self {
        let data_assets: IndexMap<AssetName, AssetReport> = snapshot
            .asset_names()
            .map(|name| {
                let batches = snapshot.batches(name).unwrap_or_default();
                let report = AssetReport {
                    example_data_references: batches
                        .iter()
                        .take(max_examples)
                        .map(|batch| batch.reference.clone())
                        .collect(),
                    batch_definition_count: batches.len(),
                };
                (name.to_string(), report)
            })
            .collect();
        Self {
            class_name: class_name.into(),
            data_asset_count: data_assets.len(),
            example_data_asset_names: data_assets.keys().take(max_examples).cloned().collect(),
            data_assets,
            example_unmatched_data_references: snapshot
                .unmatched_references()
                .iter()
                .take(max_examples)
                .cloned()
                .collect(),
            unmatched_data_reference_count: snapshot.unmatched_count(),
        }
    }

    /// Pretty JSON rendering with the report's wire key names.
    pub fn to_json_pretty(&self) -> Result<String, ConnectorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheIdentity;
    use crate::config::{AssetConfig, RegexConfig};
    use crate::partition::{AssetPartitioner, DataAsset};

    fn snapshot(keys: &[&str]) -> CacheSnapshot {
        let regex = RegexConfig::new(r"^(\w+)-(\d+)\.csv$", ["asset", "index"]);
        let partitioner = AssetPartitioner::new(
            vec![
                DataAsset::from_config(
                    "alpha",
                    &regex,
                    &AssetConfig {
                        prefix: Some("alpha".into()),
                        ..AssetConfig::default()
                    },
                )
                .unwrap(),
                DataAsset::from_config(
                    "beta",
                    &regex,
                    &AssetConfig {
                        prefix: Some("beta".into()),
                        ..AssetConfig::default()
                    },
                )
                .unwrap(),
            ],
            "/",
        )
        .unwrap();
        let identity = CacheIdentity {
            datasource_name: "ds".into(),
            connector_name: "dc".into(),
        };
        CacheSnapshot::from_partition(&identity, partitioner.partition(keys.to_vec()).unwrap())
    }

    #[test]
    fn examples_are_capped_and_counts_are_exact() {
        let snapshot = snapshot(&[
            "alpha-1.csv",
            "alpha-2.csv",
            "alpha-3.csv",
            "alpha-4.csv",
            "x.txt",
            "y.txt",
        ]);
        let report = SelfCheckReport::from_snapshot("Kind", &snapshot, 2);
        assert_eq!(report.data_asset_count, 2);
        assert_eq!(report.example_data_asset_names, vec!["alpha", "beta"]);
        assert_eq!(report.data_assets["alpha"].batch_definition_count, 4);
        assert_eq!(
            report.data_assets["alpha"].example_data_references,
            vec!["alpha-1.csv", "alpha-2.csv"]
        );
        assert_eq!(report.data_assets["beta"], AssetReport::default());
        assert_eq!(report.example_unmatched_data_references, vec!["x.txt", "y.txt"]);
        assert_eq!(report.unmatched_data_reference_count, 2);
    }

    #[test]
    fn json_uses_report_key_names() {
        let report = SelfCheckReport::from_snapshot("Kind", &snapshot(&["beta-1.csv"]), 3);
        let value: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["class_name"], "Kind");
        assert_eq!(value["data_assets"]["beta"]["batch_definition_count"], 1);
        assert_eq!(value["unmatched_data_reference_count"], 0);
    }
}
