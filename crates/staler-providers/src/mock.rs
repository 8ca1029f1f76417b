//! In-memory provider for testing

use async_trait::async_trait;
use staler_domain::{Item, Provider, ReapError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Mock provider holding its items in memory
///
/// No network calls are made. Listing and deletion can be scripted to fail,
/// and every delete attempt is recorded. Clones share the same state, so a
/// test can keep a handle after registering a clone with a Janitor.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use staler_domain::{Item, Provider};
/// use staler_providers::MockProvider;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let provider = MockProvider::new("mock items", Duration::from_secs(60))
///     .with_items(vec![Item::new("a", Utc::now())]);
///
/// provider.delete(&Item::new("a", Utc::now())).await.unwrap();
/// assert_eq!(provider.deleted(), vec!["a"]);
/// assert!(provider.list().await.unwrap().is_empty());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    label: String,
    expiry: Duration,
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    items: Vec<Item>,
    list_error: Option<ReapError>,
    delete_errors: HashSet<String>,
    deleted: Vec<String>,
    delete_attempts: Vec<String>,
    list_calls: usize,
}

impl MockProvider {
    /// Create an empty provider with the given label and expiry
    pub fn new(label: impl Into<String>, expiry: Duration) -> Self {
        Self {
            label: label.into(),
            expiry,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Replace the provider's items
    pub fn with_items(self, items: Vec<Item>) -> Self {
        self.state().items = items;
        self
    }

    /// Make every `list()` fail with `error`
    pub fn with_list_error(self, error: ReapError) -> Self {
        self.state().list_error = Some(error);
        self
    }

    /// Make deleting the item with `id` fail
    pub fn with_delete_error(self, id: impl Into<String>) -> Self {
        self.state().delete_errors.insert(id.into());
        self
    }

    /// Add an item
    pub fn push_item(&self, item: Item) {
        self.state().items.push(item);
    }

    /// Items currently held
    pub fn items(&self) -> Vec<Item> {
        self.state().items.clone()
    }

    /// Ids successfully deleted, in order
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    /// Ids of every delete attempt, including failed ones
    pub fn delete_attempts(&self) -> Vec<String> {
        self.state().delete_attempts.clone()
    }

    /// Number of times `list()` was called
    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn expiry(&self) -> Duration {
        self.expiry
    }

    async fn list(&self) -> Result<Vec<Item>, ReapError> {
        let mut state = self.state();
        state.list_calls += 1;
        if let Some(error) = &state.list_error {
            return Err(error.clone());
        }
        Ok(state.items.clone())
    }

    async fn delete(&self, item: &Item) -> Result<(), ReapError> {
        let mut state = self.state();
        state.delete_attempts.push(item.id.clone());

        if state.delete_errors.contains(&item.id) {
            return Err(ReapError::Delete(format!("Mock refused to delete '{}'", item.id)));
        }

        let before = state.items.len();
        state.items.retain(|i| i.id != item.id);
        if state.items.len() == before {
            return Err(ReapError::Delete(format!("No such item '{}'", item.id)));
        }
        state.deleted.push(item.id.clone());
        Ok(())
    }

    fn identify(&self) -> &str {
        &self.label
    }
}
