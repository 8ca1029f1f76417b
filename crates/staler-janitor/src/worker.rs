//! Background worker for continuous Janitor operation

use crate::{Janitor, JanitorError, JanitorMetrics};
use std::future::Future;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Background worker that runs reaping passes on a schedule
///
/// The first pass runs immediately, then one every `sweep_interval`.
///
/// # Examples
///
/// ```no_run
/// use staler_janitor::{Janitor, JanitorConfig, JanitorWorker};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let janitor = Janitor::new(JanitorConfig::default(), Vec::new());
///     let mut worker = JanitorWorker::new(janitor)?;
///
///     // Run indefinitely (until Ctrl+C)
///     worker.run().await?;
///     Ok(())
/// }
/// ```
pub struct JanitorWorker {
    janitor: Janitor,
    interval: Duration,
}

impl JanitorWorker {
    /// Create a new background worker around a Janitor
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Config`] if the Janitor's configuration is invalid.
    pub fn new(janitor: Janitor) -> Result<Self, JanitorError> {
        janitor.config().validate()?;
        let interval = janitor.config().sweep_interval;
        Ok(Self { janitor, interval })
    }

    /// Run the worker until a shutdown signal (Ctrl+C) is received
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed.
    pub async fn run(&mut self) -> Result<(), JanitorError> {
        let (signal_tx, signal_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let _ = signal_tx.send(tokio::signal::ctrl_c().await);
        });

        self.run_until(async move {
            match signal_rx.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(JanitorError::Worker(format!(
                    "Failed to listen for shutdown signal: {}",
                    e
                ))),
                Err(_) => Err(JanitorError::Worker("Signal listener went away".to_string())),
            }
        })
        .await
    }

    /// Run the worker until `shutdown` resolves
    ///
    /// A pass already in progress is finished before shutting down.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<(), JanitorError>
    where
        S: Future<Output = Result<(), JanitorError>>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!("Janitor worker started (interval: {:?})", self.interval);

        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting sweep cycle");
                    self.janitor.sweep().await;
                }
                signal = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping janitor");
                    break signal;
                }
            }
        };

        tracing::info!("Janitor stopped. Final metrics:\n{}", self.metrics().summary());

        outcome
    }

    /// Run for a specific number of cycles (useful for testing)
    pub async fn run_cycles(&mut self, cycles: usize) -> Result<(), JanitorError> {
        let mut ticker = interval(self.interval);

        tracing::info!(
            "Janitor worker started for {} cycles (interval: {:?})",
            cycles,
            self.interval
        );

        for cycle in 0..cycles {
            ticker.tick().await;

            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);
            let report = self.janitor.sweep().await;
            tracing::info!(
                "Sweep {}/{} completed: {} deleted",
                cycle + 1,
                cycles,
                report.total_deleted()
            );
        }

        tracing::info!(
            "Janitor finished {} cycles. Final metrics:\n{}",
            cycles,
            self.metrics().summary()
        );

        Ok(())
    }

    /// Get a reference to the janitor's current metrics
    pub fn metrics(&self) -> &JanitorMetrics {
        self.janitor.metrics()
    }

    /// Reset the janitor's metrics counters
    pub fn reset_metrics(&mut self) {
        self.janitor.reset_metrics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JanitorConfig;
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use staler_domain::{Item, Provider, ReapError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Lists one ancient item on every call and counts calls
    struct CountingProvider {
        lists: AtomicUsize,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn expiry(&self) -> Duration {
            Duration::from_secs(60)
        }

        async fn list(&self) -> Result<Vec<Item>, ReapError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Item::new("ancient", Utc::now() - TimeDelta::days(1))])
        }

        async fn delete(&self, _item: &Item) -> Result<(), ReapError> {
            Ok(())
        }

        fn identify(&self) -> &str {
            "counting"
        }
    }

    fn worker_with(provider: Arc<CountingProvider>, interval: Duration) -> JanitorWorker {
        let config = JanitorConfig::default().with_sweep_interval(interval);
        JanitorWorker::new(Janitor::new(config, vec![provider])).unwrap()
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = JanitorConfig::default().with_sweep_interval(Duration::ZERO);
        let result = JanitorWorker::new(Janitor::new(config, Vec::new()));
        assert!(matches!(result, Err(JanitorError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycles() {
        let provider = Arc::new(CountingProvider { lists: AtomicUsize::new(0) });
        let mut worker = worker_with(provider.clone(), Duration::from_secs(60));

        worker.run_cycles(3).await.unwrap();

        assert_eq!(worker.metrics().sweep_count, 3);
        assert_eq!(worker.metrics().total_deleted(), 3);
        assert_eq!(provider.lists.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let provider = Arc::new(CountingProvider { lists: AtomicUsize::new(0) });
        let mut worker = worker_with(provider.clone(), Duration::from_secs(60));

        // Passes at t=0, 60 and 120; shutdown at t=150.
        worker
            .run_until(async {
                tokio::time::sleep(Duration::from_secs(150)).await;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(worker.metrics().sweep_count, 3);
        assert_eq!(provider.lists.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_error_is_returned() {
        let provider = Arc::new(CountingProvider { lists: AtomicUsize::new(0) });
        let mut worker = worker_with(provider, Duration::from_secs(60));

        let result = worker
            .run_until(async { Err(JanitorError::Worker("no signals".to_string())) })
            .await;

        assert!(matches!(result, Err(JanitorError::Worker(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_metrics() {
        let provider = Arc::new(CountingProvider { lists: AtomicUsize::new(0) });
        let mut worker = worker_with(provider, Duration::from_secs(60));

        worker.run_cycles(1).await.unwrap();
        assert_eq!(worker.metrics().sweep_count, 1);

        worker.reset_metrics();
        assert_eq!(worker.metrics().sweep_count, 0);
    }
}
