use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::types::{AssetName, ContainerName, DataReference, GroupName, GroupValue};

/// Error type for connector configuration, listing, query, and sort failures.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("reference '{reference}' matches more than one data asset: {assets:?}")]
    AmbiguousAssetMatch {
        reference: DataReference,
        assets: Vec<AssetName>,
    },
    #[error("invalid batch request: {0}")]
    Query(String),
    #[error("cannot sort on group '{group}' with value '{value}': {reason}")]
    Comparison {
        group: GroupName,
        value: GroupValue,
        reason: String,
    },
    #[error("reference lister for container '{container}' is unavailable: {reason}")]
    ListerUnavailable {
        container: ContainerName,
        reason: String,
    },
    #[error("refresh cancelled before the listing completed")]
    Cancelled,
    #[error("reference listing timed out after {0:?}")]
    TimedOut(Duration),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ConnectorError {
    /// True for errors raised while validating connector configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ConnectorError::Configuration(_) | ConnectorError::AmbiguousAssetMatch { .. }
        )
    }
}
