//! Provider-side route lifecycle: expiry metadata and the expired-route sweep.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::EmailProvider;
use crate::error::ProviderError;

/// Largest page requested when listing routes for a sweep.
pub const SWEEP_PAGE_SIZE: usize = 1000;

/// A forwarding rule as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRoute {
    pub id: String,
    /// Opaque provider-native metadata. Providers without a dedicated expiry
    /// field carry the route's expiry here (see [`RouteExpiry`]).
    pub metadata: String,
    pub expression: String,
    pub actions: Vec<String>,
}

/// Expiry marker embedded in a route's free-text metadata as decimal epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteExpiry(pub i64);

impl RouteExpiry {
    pub fn encode(self) -> String {
        self.0.to_string()
    }

    pub fn decode(metadata: &str) -> Result<Self, std::num::ParseIntError> {
        metadata.trim().parse().map(Self)
    }

    /// An expiry at or before `now` has lapsed.
    pub fn has_lapsed(self, now: i64) -> bool {
        self.0 <= now
    }
}

/// Listing and deletion of provider-side routes.
#[async_trait]
pub trait RouteDirectory: Send + Sync {
    async fn list_routes(&self, limit: usize) -> Result<Vec<ProviderRoute>, ProviderError>;

    async fn delete_route(&self, id: &str) -> Result<(), ProviderError>;
}

/// A route the sweep could not handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFailure {
    pub route_id: String,
    pub reason: String,
}

/// Outcome of one sweep. Each route is handled independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub deleted: Vec<String>,
    /// Routes whose expiry marker could not be parsed.
    pub skipped: Vec<RouteFailure>,
    /// Expired routes whose deletion failed.
    pub failed: Vec<RouteFailure>,
}

/// Delete every route whose embedded expiry is at or before `now`.
///
/// Only a failure to list routes aborts the sweep. A malformed marker or a
/// failed deletion is logged, recorded in the report, and the sweep moves on.
pub async fn sweep_expired_routes<D>(directory: &D, now: i64) -> Result<SweepReport, ProviderError>
where
    D: RouteDirectory + ?Sized,
{
    let routes = directory.list_routes(SWEEP_PAGE_SIZE).await?;
    let mut report = SweepReport {
        examined: routes.len(),
        ..Default::default()
    };

    for route in routes {
        let expiry = match RouteExpiry::decode(&route.metadata) {
            Ok(expiry) => expiry,
            Err(e) => {
                warn!(route_id = %route.id, "Failed to parse route expiry: {e}");
                report.skipped.push(RouteFailure {
                    route_id: route.id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !expiry.has_lapsed(now) {
            continue;
        }

        match directory.delete_route(&route.id).await {
            Ok(()) => {
                debug!(route_id = %route.id, expiry = expiry.0, "Expired route deleted");
                report.deleted.push(route.id);
            }
            Err(e) => {
                warn!(route_id = %route.id, "Failed to delete expired route: {e}");
                report.failed.push(RouteFailure {
                    route_id: route.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Current instant in epoch seconds.
pub(crate) fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Periodically sweep expired routes on `provider`.
///
/// The first tick is skipped so a fresh boot does not immediately hit the
/// provider API.
pub fn spawn_route_sweeper(
    provider: Arc<dyn EmailProvider>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match provider.delete_expired_routes().await {
                Ok(report) => info!(
                    provider = provider.name(),
                    examined = report.examined,
                    deleted = report.deleted.len(),
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "Route sweep finished"
                ),
                Err(e) => warn!(provider = provider.name(), "Route sweep failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    /// In-memory route table. Deletions of ids in `undeletable` fail.
    #[derive(Default)]
    pub(crate) struct FakeDirectory {
        pub routes: Mutex<BTreeMap<String, ProviderRoute>>,
        pub undeletable: HashSet<String>,
        pub list_fails: bool,
    }

    impl FakeDirectory {
        pub fn with_routes(routes: &[(&str, &str)]) -> Self {
            let dir = Self::default();
            {
                let mut table = dir.routes.lock().unwrap();
                for (id, metadata) in routes {
                    table.insert(
                        id.to_string(),
                        ProviderRoute {
                            id: id.to_string(),
                            metadata: metadata.to_string(),
                            expression: String::new(),
                            actions: Vec::new(),
                        },
                    );
                }
            }
            dir
        }

        pub fn ids(&self) -> Vec<String> {
            self.routes.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl RouteDirectory for FakeDirectory {
        async fn list_routes(&self, limit: usize) -> Result<Vec<ProviderRoute>, ProviderError> {
            if self.list_fails {
                return Err(ProviderError::RequestFailed {
                    provider: "fake".into(),
                    operation: "list_routes".into(),
                    reason: "connection refused".into(),
                });
            }
            Ok(self
                .routes
                .lock()
                .unwrap()
                .values()
                .take(limit)
                .cloned()
                .collect())
        }

        async fn delete_route(&self, id: &str) -> Result<(), ProviderError> {
            if self.undeletable.contains(id) {
                return Err(ProviderError::Api {
                    provider: "fake".into(),
                    operation: "delete_route".into(),
                    status: 500,
                    body: "boom".into(),
                });
            }
            self.routes.lock().unwrap().remove(id);
            Ok(())
        }
    }

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn expiry_encode_decode() {
        assert_eq!(RouteExpiry(1_700_000_000).encode(), "1700000000");
        assert_eq!(RouteExpiry::decode("1700000000"), Ok(RouteExpiry(1_700_000_000)));
        assert_eq!(RouteExpiry::decode(" 42 "), Ok(RouteExpiry(42)));
        assert!(RouteExpiry::decode("inbox for bob").is_err());
        assert!(RouteExpiry::decode("").is_err());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        assert!(RouteExpiry(NOW).has_lapsed(NOW));
        assert!(RouteExpiry(NOW - 1).has_lapsed(NOW));
        assert!(!RouteExpiry(NOW + 1).has_lapsed(NOW));
    }

    #[tokio::test]
    async fn removes_only_lapsed_routes() {
        let just_past = (NOW - 1).to_string();
        let exactly_now = NOW.to_string();
        let dir = FakeDirectory::with_routes(&[
            ("1234", "1"),
            ("91011", just_past.as_str()),
            ("edge", exactly_now.as_str()),
            ("5678", "2124941352"),
        ]);

        let report = sweep_expired_routes(&dir, NOW).await.unwrap();

        assert_eq!(report.examined, 4);
        assert_eq!(report.deleted.len(), 3);
        assert_eq!(dir.ids(), vec!["5678"]);
    }

    #[tokio::test]
    async fn malformed_marker_does_not_stop_sweep() {
        let dir = FakeDirectory::with_routes(&[
            ("a", "not-a-number"),
            ("b", "1"),
            ("c", "2124941352"),
        ]);

        let report = sweep_expired_routes(&dir, NOW).await.unwrap();

        assert_eq!(report.deleted, vec!["b"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].route_id, "a");
        assert_eq!(dir.ids(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn failed_delete_is_reported_and_sweep_continues() {
        let mut dir = FakeDirectory::with_routes(&[("a", "1"), ("b", "2"), ("c", "3")]);
        dir.undeletable.insert("b".into());

        let report = sweep_expired_routes(&dir, NOW).await.unwrap();

        assert_eq!(report.deleted, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].route_id, "b");
        assert_eq!(dir.ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn second_sweep_deletes_nothing() {
        let dir = FakeDirectory::with_routes(&[("a", "1"), ("b", "2124941352")]);

        let first = sweep_expired_routes(&dir, NOW).await.unwrap();
        let second = sweep_expired_routes(&dir, NOW).await.unwrap();

        assert_eq!(first.deleted, vec!["a"]);
        assert!(second.deleted.is_empty());
        assert_eq!(dir.ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn empty_route_set() {
        let dir = FakeDirectory::default();
        assert_eq!(
            sweep_expired_routes(&dir, NOW).await.unwrap(),
            SweepReport::default()
        );
    }

    #[tokio::test]
    async fn listing_failure_aborts() {
        let dir = FakeDirectory {
            list_fails: true,
            ..Default::default()
        };
        assert!(sweep_expired_routes(&dir, NOW).await.is_err());
    }
}
