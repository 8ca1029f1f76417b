//! Metrics collection for Janitor operations

use std::collections::HashMap;
use std::time::Duration;

/// Outcome of one provider's part of a reaping pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReport {
    /// Provider label, as returned by `Provider::identify`
    pub provider: String,

    /// Items returned by `list()`
    pub listed: usize,

    /// Listed items found stale
    pub stale: usize,

    /// Stale items successfully deleted
    pub deleted: usize,

    /// Stale items whose deletion failed
    pub failed_deletes: usize,

    /// Set when listing failed and the provider sat this pass out
    pub list_error: Option<String>,
}

impl ProviderReport {
    /// Empty report for the named provider
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Report for a provider whose listing failed
    pub fn list_failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            list_error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Whether the provider listed successfully
    pub fn listed_ok(&self) -> bool {
        self.list_error.is_none()
    }
}

/// Outcome of one complete reaping pass
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// One report per registered provider, in registration order
    pub providers: Vec<ProviderReport>,

    /// Wall-clock duration of the pass
    pub elapsed: Duration,
}

impl SweepReport {
    /// Report for a given provider label
    pub fn provider(&self, label: &str) -> Option<&ProviderReport> {
        self.providers.iter().find(|r| r.provider == label)
    }

    /// Items deleted across all providers
    pub fn total_deleted(&self) -> usize {
        self.providers.iter().map(|r| r.deleted).sum()
    }

    /// Items found stale across all providers
    pub fn total_stale(&self) -> usize {
        self.providers.iter().map(|r| r.stale).sum()
    }

    /// Deletions that failed across all providers
    pub fn total_failed_deletes(&self) -> usize {
        self.providers.iter().map(|r| r.failed_deletes).sum()
    }

    /// Providers whose listing failed
    pub fn failed_providers(&self) -> usize {
        self.providers.iter().filter(|r| !r.listed_ok()).count()
    }
}

/// Metrics accumulated across reaping passes
///
/// Tracks deletions and failures per provider label.
#[derive(Debug, Clone, Default)]
pub struct JanitorMetrics {
    /// Items deleted per provider
    pub deleted: HashMap<String, usize>,

    /// Failed deletions per provider
    pub failed_deletes: HashMap<String, usize>,

    /// Failed listings per provider
    pub failed_lists: HashMap<String, usize>,

    /// Total sweep iterations completed
    pub sweep_count: usize,

    /// Total time spent sweeping
    pub total_runtime: Duration,
}

impl JanitorMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished pass into the totals
    pub fn record_sweep(&mut self, report: &SweepReport) {
        for provider in &report.providers {
            if provider.deleted > 0 {
                *self.deleted.entry(provider.provider.clone()).or_insert(0) += provider.deleted;
            }
            if provider.failed_deletes > 0 {
                *self
                    .failed_deletes
                    .entry(provider.provider.clone())
                    .or_insert(0) += provider.failed_deletes;
            }
            if !provider.listed_ok() {
                *self
                    .failed_lists
                    .entry(provider.provider.clone())
                    .or_insert(0) += 1;
            }
        }
        self.sweep_count += 1;
        self.total_runtime += report.elapsed;
    }

    /// Get total items deleted across all providers
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    /// Get total failed deletions across all providers
    pub fn total_failed_deletes(&self) -> usize {
        self.failed_deletes.values().sum()
    }

    /// Get total failed listings across all providers
    pub fn total_failed_lists(&self) -> usize {
        self.failed_lists.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        self.deleted.clear();
        self.failed_deletes.clear();
        self.failed_lists.clear();
        self.sweep_count = 0;
        self.total_runtime = Duration::ZERO;
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Janitor Metrics Summary".to_string(),
            "======================".to_string(),
            format!("Sweep cycles: {}", self.sweep_count),
            format!("Total runtime: {}s", self.total_runtime.as_secs()),
            String::new(),
        ];

        let sections = [
            ("Deletions by provider:", &self.deleted, self.total_deleted()),
            (
                "Failed deletions by provider:",
                &self.failed_deletes,
                self.total_failed_deletes(),
            ),
            (
                "Failed listings by provider:",
                &self.failed_lists,
                self.total_failed_lists(),
            ),
        ];

        for (title, counts, total) in sections {
            if counts.is_empty() {
                continue;
            }
            let mut entries: Vec<_> = counts.iter().collect();
            entries.sort();

            lines.push(title.to_string());
            for (provider, count) in entries {
                lines.push(format!("  {}: {}", provider, count));
            }
            lines.push(format!("  Total: {}", total));
            lines.push(String::new());
        }

        lines.join("\n").trim_end().to_string()
    }
}
