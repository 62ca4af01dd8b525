//! Reference lister interface and the in-memory lister.
//!
//! Ownership model:
//! - `KeyLister` is the connector-facing interface that returns raw keys.
//! - `ListingQuery` carries the connector's listing scope plus the caller's
//!   timeout and cancellation flag, passed through unchanged.
//! - Retry policy belongs to lister implementations, never to the connector.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::config::ListingConfig;
use crate::errors::ConnectorError;
use crate::types::{ContainerName, DataReference};

/// Shared cancellation flag for an in-flight refresh.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Fresh, uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observers see it on their next check.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True after `cancel`.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller controls for one refresh.
#[derive(Clone, Debug, Default)]
pub struct RefreshOptions {
    /// Upper bound on listing time.
    pub timeout: Option<Duration>,
    /// Flag the caller may set to abandon the refresh.
    pub cancel: Option<CancelFlag>,
}

impl RefreshOptions {
    /// Bound the listing time.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Scope of one listing call.
#[derive(Clone, Debug)]
pub struct ListingQuery {
    /// Container (bucket) to list.
    pub container: ContainerName,
    /// Only keys starting with this prefix.
    pub prefix: String,
    /// Whether keys nested below `prefix` are included.
    pub recursive: bool,
    /// Path delimiter for the recursion check.
    pub delimiter: String,
    /// Caller timeout, passed through unchanged.
    pub timeout: Option<Duration>,
    /// Caller cancellation flag, passed through unchanged.
    pub cancel: Option<CancelFlag>,
}

impl ListingQuery {
    /// Combine the configured scope with per-refresh options.
    pub fn new(listing: &ListingConfig, options: &RefreshOptions) -> Self {
        Self {
            container: listing.container.clone(),
            prefix: listing.prefix.clone(),
            recursive: listing.recursive,
            delimiter: listing.delimiter.clone(),
            timeout: options.timeout,
            cancel: options.cancel.clone(),
        }
    }

    /// Error to abort with if the caller cancelled or the timeout elapsed since `started`.
    pub fn interruption(&self, started: Instant) -> Option<ConnectorError> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Some(ConnectorError::Cancelled);
        }
        match self.timeout {
            Some(timeout) if started.elapsed() > timeout => Some(ConnectorError::TimedOut(timeout)),
            _ => None,
        }
    }

    /// True when `key` is within the prefix and, for non-recursive queries,
    /// not nested below it.
    pub fn admits(&self, key: &str) -> bool {
        let Some(rest) = key.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        self.recursive || self.delimiter.is_empty() || !rest.contains(self.delimiter.as_str())
    }
}

/// Source of raw references, e.g. a cloud blob lister.
///
/// Results are returned in the remote system's order; the connector imposes
/// no sort. Implementations should honor `query.timeout` and `query.cancel`
/// where the backend allows it.
pub trait KeyLister: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &str;
    /// List keys within `query`'s scope.
    fn list(&self, query: &ListingQuery) -> Result<Vec<DataReference>, ConnectorError>;
}

/// In-memory lister for tests and small fixed catalogs.
///
/// Clones share the same key set, so a test can keep a handle and swap the
/// listing between refreshes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryKeyLister {
    keys: Arc<RwLock<Vec<DataReference>>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryKeyLister {
    /// Lister serving `keys` in the given order.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DataReference>,
    {
        Self {
            keys: Arc::new(RwLock::new(keys.into_iter().map(Into::into).collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the keys returned by later listings.
    pub fn set_keys<I, S>(&self, keys: I) -> Result<(), ConnectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<DataReference>,
    {
        let mut guard = self
            .keys
            .write()
            .map_err(|_| ConnectorError::Internal("in-memory key set lock poisoned".into()))?;
        *guard = keys.into_iter().map(Into::into).collect();
        Ok(())
    }

    /// Number of `list` calls served.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl KeyLister for InMemoryKeyLister {
    fn id(&self) -> &str {
        "in_memory"
    }

    fn list(&self, query: &ListingQuery) -> Result<Vec<DataReference>, ConnectorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = query.interruption(Instant::now()) {
            return Err(err);
        }
        let guard = self.keys.read().map_err(|_| ConnectorError::ListerUnavailable {
            container: query.container.clone(),
            reason: "in-memory key set lock poisoned".into(),
        })?;
        Ok(guard.iter().filter(|key| query.admits(key)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(prefix: &str, recursive: bool) -> ListingQuery {
        ListingQuery::new(
            &ListingConfig {
                container: "my_container".into(),
                prefix: prefix.into(),
                recursive,
                ..ListingConfig::default()
            },
            &RefreshOptions::default(),
        )
    }

    #[test]
    fn in_memory_lister_applies_prefix_and_recursion() {
        let lister = InMemoryKeyLister::new([
            "yellow_trip_data_sample_2018-01.csv",
            "2018/yellow_trip_data_sample_2018-01.csv",
            "2018/2018-04/yellow_trip_data_sample_2018-04.csv",
        ]);
        assert_eq!(lister.list(&query("", true)).unwrap().len(), 3);
        assert_eq!(
            lister.list(&query("2018/", false)).unwrap(),
            vec!["2018/yellow_trip_data_sample_2018-01.csv".to_string()]
        );
        assert_eq!(lister.list(&query("2018/", true)).unwrap().len(), 2);
        assert_eq!(lister.call_count(), 3);
    }

    #[test]
    fn clones_share_the_key_set() {
        let lister = InMemoryKeyLister::new(["a"]);
        let handle = lister.clone();
        handle.set_keys(["b", "c"]).unwrap();
        assert_eq!(
            lister.list(&query("", true)).unwrap(),
            vec!["b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn cancelled_query_is_interrupted() {
        let cancel = CancelFlag::new();
        let options = RefreshOptions::default().with_cancel(cancel.clone());
        let query = ListingQuery::new(&ListingConfig::default(), &options);
        assert!(query.interruption(Instant::now()).is_none());
        cancel.cancel();
        assert!(matches!(
            query.interruption(Instant::now()),
            Some(ConnectorError::Cancelled)
        ));
        assert!(InMemoryKeyLister::new(["a"]).list(&query).is_err());
    }

    #[test]
    fn elapsed_timeout_is_interrupted() {
        let options = RefreshOptions::default().with_timeout(Duration::ZERO);
        let query = ListingQuery::new(&ListingConfig::default(), &options);
        let started = Instant::now() - Duration::from_millis(5);
        assert!(matches!(
            query.interruption(started),
            Some(ConnectorError::TimedOut(_))
        ));
    }
}
