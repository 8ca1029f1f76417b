//! Core Janitor implementation: one reaping pass across all providers

use crate::{JanitorConfig, JanitorMetrics, ProviderReport, SweepReport};
use chrono::{DateTime, Utc};
use staler_domain::{is_stale, Provider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Janitor service that removes stale items from a fixed set of providers
///
/// Responsible for:
/// - Listing every provider concurrently
/// - Deciding staleness centrally, against each provider's expiry
/// - Deleting stale items, isolating provider and item failures
/// - Collecting metrics on cleanup operations
///
/// # Examples
///
/// ```no_run
/// use staler_janitor::{Janitor, JanitorConfig};
/// use staler_domain::Provider;
/// use std::sync::Arc;
///
/// # async fn example(providers: Vec<Arc<dyn Provider>>) {
/// let mut janitor = Janitor::new(JanitorConfig::default(), providers);
///
/// // Perform a single pass
/// let report = janitor.sweep().await;
/// println!("deleted {} items", report.total_deleted());
/// println!("{}", janitor.metrics().summary());
/// # }
/// ```
pub struct Janitor {
    config: JanitorConfig,
    providers: Vec<Arc<dyn Provider>>,
    metrics: JanitorMetrics,
}

impl Janitor {
    /// Create a new Janitor over the given providers
    pub fn new(config: JanitorConfig, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            config,
            providers,
            metrics: JanitorMetrics::new(),
        }
    }

    /// The configuration this Janitor runs with
    pub fn config(&self) -> &JanitorConfig {
        &self.config
    }

    /// The registered providers
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Get a reference to the current metrics
    pub fn metrics(&self) -> &JanitorMetrics {
        &self.metrics
    }

    /// Reset metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Perform a complete reaping pass, measuring age against the current time
    pub async fn sweep(&mut self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Perform a complete reaping pass, measuring age against `now`
    ///
    /// Every provider is processed in its own task. The pass returns once all
    /// of them have finished; a provider whose listing fails, or whose task
    /// panics, only loses its own share of the pass.
    pub async fn sweep_at(&mut self, now: DateTime<Utc>) -> SweepReport {
        let start = Instant::now();
        tracing::info!("Checking for and removing stale items");

        let mut tasks = JoinSet::new();
        let mut slots = HashMap::with_capacity(self.providers.len());

        for (index, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let dry_run = self.config.dry_run;
            let handle = tasks.spawn(async move { reap_provider(provider.as_ref(), now, dry_run).await });
            slots.insert(handle.id(), index);
        }

        let mut reports: Vec<Option<ProviderReport>> = vec![None; self.providers.len()];
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, report)) => {
                    if let Some(&index) = slots.get(&id) {
                        reports[index] = Some(report);
                    }
                }
                Err(e) => {
                    let Some(&index) = slots.get(&e.id()) else {
                        continue;
                    };
                    let label = self.providers[index].identify();
                    tracing::error!("Reaping task for {} failed: {}", label, e);
                    reports[index] = Some(ProviderReport::list_failed(label, e.to_string()));
                }
            }
        }

        let report = SweepReport {
            providers: reports.into_iter().flatten().collect(),
            elapsed: start.elapsed(),
        };
        self.metrics.record_sweep(&report);

        tracing::info!(
            "Checked for and removed any stale items: {} deleted, {} failed deletions, {} providers failed to list",
            report.total_deleted(),
            report.total_failed_deletes(),
            report.failed_providers()
        );

        report
    }
}

/// One provider's share of a pass: list, filter, delete in list order
async fn reap_provider(provider: &dyn Provider, now: DateTime<Utc>, dry_run: bool) -> ProviderReport {
    let label = provider.identify();
    tracing::info!("Checking {}", label);

    let items = match provider.list().await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("Could not list items for {}: {}", label, e);
            return ProviderReport::list_failed(label, e.to_string());
        }
    };

    let expiry = provider.expiry();
    let mut report = ProviderReport::new(label);
    report.listed = items.len();

    for item in &items {
        let stale = is_stale(item, expiry, now);
        tracing::debug!(
            "Checked {} item '{}' (age {}, stale: {})",
            label,
            item,
            item.age,
            stale
        );
        if !stale {
            continue;
        }
        report.stale += 1;

        if dry_run {
            tracing::info!("DRY RUN: Would delete stale {} item with id '{}'", label, item);
            continue;
        }

        tracing::info!("Deleting stale {} item with id '{}'", label, item);
        match provider.delete(item).await {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                tracing::warn!("Could not delete stale {} item with id '{}': {}", label, item, e);
                report.failed_deletes += 1;
            }
        }
    }

    tracing::info!(
        "Finished {}: {} listed, {} stale, {} deleted",
        label,
        report.listed,
        report.stale,
        report.deleted
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use staler_domain::{Item, ReapError};
    use std::sync::Mutex;
    use std::time::Duration;

    const MONTH: Duration = Duration::from_secs(30 * 86400);

    // Mock provider for testing
    struct MockProvider {
        label: String,
        expiry: Duration,
        items: Mutex<Vec<Item>>,
        fail_list: bool,
        fail_delete: Vec<String>,
        deleted: Mutex<Vec<String>>,
        panic_on_list: bool,
    }

    impl MockProvider {
        fn new(label: &str, items: Vec<Item>) -> Self {
            Self {
                label: label.to_string(),
                expiry: MONTH,
                items: Mutex::new(items),
                fail_list: false,
                fail_delete: Vec::new(),
                deleted: Mutex::new(Vec::new()),
                panic_on_list: false,
            }
        }

        fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn expiry(&self) -> Duration {
            self.expiry
        }

        async fn list(&self) -> Result<Vec<Item>, ReapError> {
            if self.panic_on_list {
                panic!("provider blew up");
            }
            if self.fail_list {
                return Err(ReapError::List("unreachable".to_string()));
            }
            Ok(self.items.lock().unwrap().clone())
        }

        async fn delete(&self, item: &Item) -> Result<(), ReapError> {
            if self.fail_delete.contains(&item.id) {
                return Err(ReapError::Delete(format!("permission denied: {}", item)));
            }
            self.items.lock().unwrap().retain(|i| i.id != item.id);
            self.deleted.lock().unwrap().push(item.id.clone());
            Ok(())
        }

        fn identify(&self) -> &str {
            &self.label
        }
    }

    fn aged(id: &str, now: DateTime<Utc>, days: i64) -> Item {
        Item::new(id, now - TimeDelta::days(days))
    }

    #[tokio::test]
    async fn test_janitor_creation() {
        let janitor = Janitor::new(JanitorConfig::default(), Vec::new());
        assert_eq!(janitor.metrics().sweep_count, 0);
        assert!(janitor.providers().is_empty());
    }

    #[tokio::test]
    async fn test_deletes_only_stale_items() {
        let now = Utc::now();
        let provider = Arc::new(MockProvider::new(
            "mock",
            vec![aged("old", now, 45), aged("fresh", now, 10)],
        ));
        let mut janitor = Janitor::new(JanitorConfig::default(), vec![provider.clone()]);

        let report = janitor.sweep_at(now).await;

        assert_eq!(provider.deleted(), vec!["old"]);
        let mock = report.provider("mock").unwrap();
        assert_eq!(mock.listed, 2);
        assert_eq!(mock.stale, 1);
        assert_eq!(mock.deleted, 1);
    }

    #[tokio::test]
    async fn test_deletes_in_list_order() {
        let now = Utc::now();
        let provider = Arc::new(MockProvider::new(
            "ordered",
            vec![aged("c", now, 90), aged("a", now, 31), aged("b", now, 400)],
        ));
        let mut janitor = Janitor::new(JanitorConfig::default(), vec![provider.clone()]);

        janitor.sweep_at(now).await;

        assert_eq!(provider.deleted(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_stop_other_items() {
        let now = Utc::now();
        let mut mock = MockProvider::new(
            "flaky",
            vec![aged("x", now, 60), aged("y", now, 60), aged("z", now, 60)],
        );
        mock.fail_delete = vec!["x".to_string()];
        let provider = Arc::new(mock);
        let mut janitor = Janitor::new(JanitorConfig::default(), vec![provider.clone()]);

        let report = janitor.sweep_at(now).await;

        assert_eq!(provider.deleted(), vec!["y", "z"]);
        let flaky = report.provider("flaky").unwrap();
        assert_eq!(flaky.deleted, 2);
        assert_eq!(flaky.failed_deletes, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_list_failure_is_isolated() {
        let now = Utc::now();
        let first = Arc::new(MockProvider::new("first", vec![aged("1", now, 45), aged("2", now, 5)]));
        let mut broken = MockProvider::new("broken", vec![aged("3", now, 45)]);
        broken.fail_list = true;
        let broken = Arc::new(broken);
        let third = Arc::new(MockProvider::new("third", vec![aged("4", now, 100)]));

        let mut janitor = Janitor::new(
            JanitorConfig::default(),
            vec![first.clone(), broken.clone(), third.clone()],
        );
        let report = janitor.sweep_at(now).await;

        assert_eq!(first.deleted(), vec!["1"]);
        assert!(broken.deleted().is_empty());
        assert_eq!(third.deleted(), vec!["4"]);

        assert_eq!(report.providers.len(), 3);
        assert_eq!(report.failed_providers(), 1);
        assert_eq!(report.total_deleted(), 2);
        assert!(report.provider("broken").unwrap().list_error.is_some());
    }

    #[tokio::test]
    async fn test_panicking_provider_is_isolated() {
        let now = Utc::now();
        let mut exploding = MockProvider::new("exploding", Vec::new());
        exploding.panic_on_list = true;
        let healthy = Arc::new(MockProvider::new("healthy", vec![aged("h", now, 45)]));

        let mut janitor = Janitor::new(
            JanitorConfig::default(),
            vec![Arc::new(exploding), healthy.clone()],
        );
        let report = janitor.sweep_at(now).await;

        assert_eq!(healthy.deleted(), vec!["h"]);
        assert_eq!(report.providers[0].provider, "exploding");
        assert!(report.providers[0].list_error.is_some());
    }

    #[tokio::test]
    async fn test_sweep_respects_dry_run() {
        let now = Utc::now();
        let provider = Arc::new(MockProvider::new("mock", vec![aged("old", now, 45)]));
        let config = JanitorConfig::default().with_dry_run(true);
        let mut janitor = Janitor::new(config, vec![provider.clone()]);

        let report = janitor.sweep_at(now).await;

        assert!(provider.deleted().is_empty());
        assert_eq!(report.total_stale(), 1);
        assert_eq!(report.total_deleted(), 0);
    }

    #[tokio::test]
    async fn test_second_pass_only_sees_survivors() {
        let now = Utc::now();
        let provider = Arc::new(MockProvider::new(
            "mock",
            vec![aged("old", now, 45), aged("fresh", now, 10)],
        ));
        let mut janitor = Janitor::new(JanitorConfig::default(), vec![provider.clone()]);

        let first = janitor.sweep_at(now).await;
        let second = janitor.sweep_at(now).await;

        assert_eq!(first.total_deleted(), 1);
        assert_eq!(second.total_deleted(), 0);
        assert_eq!(second.provider("mock").unwrap().listed, 1);
        assert_eq!(provider.deleted(), vec!["old"]);
    }

    #[tokio::test]
    async fn test_metrics_accumulate_and_reset() {
        let now = Utc::now();
        let provider = Arc::new(MockProvider::new("mock", vec![aged("old", now, 45)]));
        let mut janitor = Janitor::new(JanitorConfig::default(), vec![provider]);

        janitor.sweep_at(now).await;
        janitor.sweep_at(now).await;

        assert_eq!(janitor.metrics().sweep_count, 2);
        assert_eq!(janitor.metrics().total_deleted(), 1);

        janitor.reset_metrics();
        assert_eq!(janitor.metrics().sweep_count, 0);
    }
}
