//! Fan-out/fan-in enumeration of items that each need their own lookup
//!
//! Some providers can only tell an item's age by querying it individually
//! (one "latest activity" call per followed account, say). The [`Enumerator`]
//! spawns one task per key and merges what they produce into a single list.
//!
//! Every task publishes exactly one outcome into a channel sized to the
//! fan-out, so publishing never waits on the collector. Completion is a
//! counted barrier that only reaches zero after each outcome is published.
//! The first error ends the enumeration and aborts whatever is still running.

use staler_domain::{Item, ReapError};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;

/// Runs per-key lookups concurrently and merges their items
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use staler_domain::Item;
/// use staler_janitor::Enumerator;
///
/// # #[tokio::main]
/// # async fn main() {
/// let enumerator = Enumerator::new();
/// let items = enumerator
///     .collect(vec![1u64, 2, 3], |id| async move { Ok(Item::new(id.to_string(), Utc::now())) })
///     .await
///     .unwrap();
///
/// assert_eq!(items.len(), 3);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Enumerator {
    lookup_timeout: Option<Duration>,
}

impl Enumerator {
    /// Create an enumerator with no per-lookup time limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the enumeration if any single lookup takes longer than `timeout`
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }

    /// The per-lookup time limit, if any
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout
    }

    /// Look up every key concurrently and collect the resulting items
    ///
    /// `lookup` is called once per key on the calling task; the futures it
    /// returns are spawned. Items come back in completion order.
    ///
    /// # Errors
    ///
    /// The first failed (or timed out, or panicked) lookup is returned as
    /// [`ReapError::Enumeration`]; outstanding lookups are aborted.
    pub async fn collect<K, F, Fut>(&self, keys: Vec<K>, lookup: F) -> Result<Vec<Item>, ReapError>
    where
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<Item, ReapError>> + Send + 'static,
    {
        let total = keys.len();
        if total == 0 {
            tracing::debug!("Nothing to enumerate");
            return Ok(Vec::new());
        }

        tracing::debug!("Fanning out {} lookups", total);

        let (item_tx, mut item_rx) = mpsc::channel::<Item>(total);
        let (error_tx, mut error_rx) = mpsc::channel::<ReapError>(total);
        let barrier = Arc::new(CompletionBarrier::new(total));
        let mut tasks = JoinSet::new();

        for key in keys {
            let lookup = lookup(key);
            let mut slot = OutcomeSlot {
                items: item_tx.clone(),
                errors: error_tx.clone(),
                barrier: Arc::clone(&barrier),
                published: false,
            };
            let timeout = self.lookup_timeout;

            tasks.spawn(async move {
                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, lookup).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ReapError::Enumeration(format!(
                            "lookup timed out after {:?}",
                            limit
                        ))),
                    },
                    None => lookup.await,
                };
                slot.publish(outcome);
            });
        }

        // Only the slots hold senders now.
        drop(item_tx);
        drop(error_tx);

        tracing::debug!("Collecting {} lookup results", total);

        let mut items = Vec::with_capacity(total);
        loop {
            tokio::select! {
                biased;
                Some(error) = error_rx.recv() => {
                    tasks.abort_all();
                    return Err(into_enumeration_error(error));
                }
                Some(item) = item_rx.recv() => {
                    items.push(item);
                }
                _ = barrier.wait() => break,
            }
        }

        // Every outcome is published before the barrier counts down, so
        // whatever the select left behind is already buffered.
        if let Ok(error) = error_rx.try_recv() {
            return Err(into_enumeration_error(error));
        }
        while let Ok(item) = item_rx.try_recv() {
            items.push(item);
        }

        tracing::debug!("Enumeration finished with {} items", items.len());
        Ok(items)
    }
}

fn into_enumeration_error(error: ReapError) -> ReapError {
    match error {
        ReapError::Enumeration(_) => error,
        other => ReapError::Enumeration(other.to_string()),
    }
}

/// Counts outstanding lookups down to zero and wakes the collector there
#[derive(Debug)]
struct CompletionBarrier {
    remaining: AtomicUsize,
    notify: Notify,
}

impl CompletionBarrier {
    fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            notify: Notify::new(),
        }
    }

    fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            // notify_one stores a permit if the collector isn't waiting yet.
            self.notify.notify_one();
        }
    }

    async fn wait(&self) {
        while self.remaining.load(Ordering::Acquire) > 0 {
            self.notify.notified().await;
        }
    }
}

/// A task's one-shot right to publish an outcome and arrive at the barrier
///
/// Dropped without publishing (panic, abort) it reports an error instead, so
/// the barrier always reaches zero.
struct OutcomeSlot {
    items: mpsc::Sender<Item>,
    errors: mpsc::Sender<ReapError>,
    barrier: Arc<CompletionBarrier>,
    published: bool,
}

impl OutcomeSlot {
    fn publish(&mut self, outcome: Result<Item, ReapError>) {
        // Capacity equals the fan-out, so try_send only fails once the
        // collector has gone away, and then nobody needs the outcome.
        match outcome {
            Ok(item) => {
                let _ = self.items.try_send(item);
            }
            Err(error) => {
                let _ = self.errors.try_send(error);
            }
        }
        self.published = true;
        self.barrier.arrive();
    }
}

impl Drop for OutcomeSlot {
    fn drop(&mut self) {
        if !self.published {
            self.publish(Err(ReapError::Enumeration(
                "lookup task ended without reporting a result".to_string(),
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;

    fn item_for(id: u64) -> Item {
        Item::new(id.to_string(), DateTime::from_timestamp(id as i64, 0).unwrap())
    }

    #[tokio::test]
    async fn test_empty_keys_yield_empty_list() {
        let items = Enumerator::new()
            .collect(Vec::<u64>::new(), |id| async move { Ok(item_for(id)) })
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_merge_is_set_equal_to_lookups() {
        let keys: Vec<u64> = (0..500).collect();

        let items = Enumerator::new()
            .collect(keys.clone(), |id| async move {
                // Scramble completion order.
                tokio::time::sleep(Duration::from_millis(id % 7)).await;
                Ok(item_for(id))
            })
            .await
            .unwrap();

        assert_eq!(items.len(), keys.len());
        let got: HashSet<Item> = items.into_iter().collect();
        let want: HashSet<Item> = keys.into_iter().map(item_for).collect();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn test_first_error_fails_enumeration() {
        let result = Enumerator::new()
            .collect((0..20u64).collect(), |id| async move {
                if id == 13 {
                    Err(ReapError::List("user 13 is private".to_string()))
                } else {
                    Ok(item_for(id))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ReapError::Enumeration(ref msg) if msg.contains("user 13")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_does_not_wait_for_hung_lookups() {
        let released = Arc::new(AtomicBool::new(false));

        let result = Enumerator::new()
            .collect((0..100u64).collect(), |id| {
                let released = Arc::clone(&released);
                async move {
                    if id == 0 {
                        return Err(ReapError::Enumeration("boom".to_string()));
                    }
                    // Never completes on its own.
                    std::future::pending::<()>().await;
                    released.store(true, Ordering::SeqCst);
                    Ok(item_for(id))
                }
            })
            .await;

        assert!(result.is_err());
        assert!(!released.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout() {
        let result = Enumerator::new()
            .with_lookup_timeout(Duration::from_secs(5))
            .collect(vec![1u64, 2], |id| async move {
                if id == 2 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(item_for(id))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_panicking_lookup_is_reported() {
        let result = Enumerator::new()
            .collect(vec![1u64, 2, 3], |id| async move {
                if id == 2 {
                    panic!("lookup exploded");
                }
                Ok(item_for(id))
            })
            .await;

        assert!(matches!(result, Err(ReapError::Enumeration(_))));
    }

    #[tokio::test]
    async fn test_never_active_items_pass_through() {
        let items = Enumerator::new()
            .collect(vec!["quiet".to_string()], |id| async move { Ok(Item::never_active(id)) })
            .await
            .unwrap();

        assert_eq!(items, vec![Item::never_active("quiet")]);
    }

    #[tokio::test]
    async fn test_barrier_counts_down() {
        let barrier = Arc::new(CompletionBarrier::new(3));
        for _ in 0..3 {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.arrive() });
        }
        barrier.wait().await;
        assert_eq!(barrier.remaining.load(Ordering::SeqCst), 0);
    }
}
