//! Twitter Provider Implementation
//!
//! Reaps followed accounts that have gone quiet. An account's age is the
//! creation time of its most recent tweet, which takes one lookup per
//! followed account; those lookups run through the [`Enumerator`].
//!
//! Talks to the v2 API with a user-context bearer token.

use crate::{describe_failure, http_client};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use staler_domain::{Item, Provider, ReapError};
use staler_janitor::Enumerator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Base URL of the Twitter v2 API
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/2";

/// Page size for the following list (the API maximum)
const FOLLOWING_PAGE_SIZE: &str = "1000";

/// Who the authenticated user follows, and what those accounts last did
///
/// The seam between [`TwitterFollowing`] and the network.
#[async_trait]
pub trait SocialGraph: Send + Sync + 'static {
    /// Ids of every account the authenticated user follows
    async fn following_ids(&self) -> Result<Vec<String>, ReapError>;

    /// Creation time of the account's most recent tweet, `None` if it never tweeted
    async fn latest_activity(&self, account_id: &str) -> Result<Option<DateTime<Utc>>, ReapError>;

    /// Stop following the account
    async fn unfollow(&self, account_id: &str) -> Result<(), ReapError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    created_at: Option<DateTime<Utc>>,
}

impl<T> Envelope<T> {
    /// Payload of a response, treating "errors without data" as failure
    fn into_data(self, what: &str) -> Result<Option<T>, String> {
        if self.data.is_none() && !self.errors.is_empty() {
            let problems: Vec<String> = self
                .errors
                .iter()
                .map(|p| {
                    p.detail
                        .clone()
                        .or_else(|| p.title.clone())
                        .unwrap_or_else(|| "unknown problem".to_string())
                })
                .collect();
            return Err(format!("{}: {}", what, problems.join("; ")));
        }
        Ok(self.data)
    }
}

fn newest(tweets: Vec<Tweet>) -> Option<DateTime<Utc>> {
    tweets.into_iter().filter_map(|t| t.created_at).max()
}

/// [`SocialGraph`] backed by the Twitter v2 HTTP API
pub struct TwitterApi {
    base_url: String,
    token: String,
    client: reqwest::Client,
    me: OnceCell<String>,
}

impl TwitterApi {
    /// Create a client for the public API
    ///
    /// # Errors
    ///
    /// Returns [`ReapError::Construction`] if `access_token` is empty.
    pub fn new(access_token: &str) -> Result<Self, ReapError> {
        Self::with_base_url(access_token, DEFAULT_API_BASE)
    }

    /// Create a client against a different API root
    pub fn with_base_url(access_token: &str, base_url: &str) -> Result<Self, ReapError> {
        if access_token.trim().is_empty() {
            return Err(ReapError::Construction(
                "twitter access token cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: access_token.trim().to_string(),
            client: http_client()?,
            me: OnceCell::new(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Envelope<T>, String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", url, e))?;

        if !response.status().is_success() {
            return Err(describe_failure(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response from {}: {}", url, e))
    }

    /// Id of the authenticated user, resolved once
    async fn me(&self) -> Result<&str, String> {
        self.me
            .get_or_try_init(|| async {
                let envelope: Envelope<User> = self.get("/users/me", &[]).await?;
                envelope
                    .into_data("resolving the authenticated user")?
                    .map(|user| user.id)
                    .ok_or_else(|| "no user in /users/me response".to_string())
            })
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl SocialGraph for TwitterApi {
    async fn following_ids(&self) -> Result<Vec<String>, ReapError> {
        let me = self.me().await.map_err(ReapError::List)?;
        let path = format!("/users/{}/following", me);

        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("max_results", FOLLOWING_PAGE_SIZE)];
            if let Some(token) = cursor.as_deref() {
                query.push(("pagination_token", token));
            }

            let page: Envelope<Vec<User>> = self.get(&path, &query).await.map_err(ReapError::List)?;
            let next = page.meta.as_ref().and_then(|m| m.next_token.clone());
            let users = page
                .into_data("listing followed accounts")
                .map_err(ReapError::List)?
                .unwrap_or_default();
            ids.extend(users.into_iter().map(|u| u.id));

            match next {
                Some(token) => cursor = Some(token),
                None => break,
            }
        }

        tracing::debug!("Following {} accounts", ids.len());
        Ok(ids)
    }

    async fn latest_activity(&self, account_id: &str) -> Result<Option<DateTime<Utc>>, ReapError> {
        let path = format!("/users/{}/tweets", account_id);
        let envelope: Envelope<Vec<Tweet>> = self
            .get(&path, &[("max_results", "5"), ("tweet.fields", "created_at")])
            .await
            .map_err(ReapError::Enumeration)?;

        let tweets = envelope
            .into_data(&format!("looking up tweets of {}", account_id))
            .map_err(ReapError::Enumeration)?
            .unwrap_or_default();
        Ok(newest(tweets))
    }

    async fn unfollow(&self, account_id: &str) -> Result<(), ReapError> {
        let me = self.me().await.map_err(ReapError::Delete)?;
        let url = format!("{}/users/{}/following/{}", self.base_url, me, account_id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ReapError::Delete(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ReapError::Delete(describe_failure(response).await));
        }
        Ok(())
    }
}

/// Provider for accounts followed on Twitter
///
/// # Examples
///
/// ```no_run
/// use staler_providers::TwitterFollowing;
/// use std::time::Duration;
///
/// let following = TwitterFollowing::new(
///     "user-access-token",
///     Duration::from_secs(180 * 86400),
///     Some(Duration::from_secs(30)),
/// )
/// .unwrap();
/// ```
pub struct TwitterFollowing<G: SocialGraph = TwitterApi> {
    expiry: Duration,
    graph: Arc<G>,
    enumerator: Enumerator,
}

impl TwitterFollowing<TwitterApi> {
    /// Create a provider over the public API
    ///
    /// # Errors
    ///
    /// Returns [`ReapError::Construction`] if `access_token` is empty.
    pub fn new(
        access_token: &str,
        expiry: Duration,
        lookup_timeout: Option<Duration>,
    ) -> Result<Self, ReapError> {
        let provider = Self::with_graph(TwitterApi::new(access_token)?, expiry);
        Ok(match lookup_timeout {
            Some(limit) => provider.with_lookup_timeout(limit),
            None => provider,
        })
    }
}

impl<G: SocialGraph> TwitterFollowing<G> {
    /// Create a provider over any social graph
    pub fn with_graph(graph: G, expiry: Duration) -> Self {
        Self {
            expiry,
            graph: Arc::new(graph),
            enumerator: Enumerator::new(),
        }
    }

    /// Bound each latest-activity lookup
    pub fn with_lookup_timeout(mut self, limit: Duration) -> Self {
        self.enumerator = self.enumerator.with_lookup_timeout(limit);
        self
    }

    /// The time limit on each latest-activity lookup, if any
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.enumerator.lookup_timeout()
    }

    /// The underlying graph
    pub fn graph(&self) -> &G {
        &self.graph
    }
}

#[async_trait]
impl<G: SocialGraph> Provider for TwitterFollowing<G> {
    fn expiry(&self) -> Duration {
        self.expiry
    }

    async fn list(&self) -> Result<Vec<Item>, ReapError> {
        let ids = self.graph.following_ids().await.map_err(|e| match e {
            ReapError::List(_) => e,
            other => ReapError::List(other.to_string()),
        })?;

        self.enumerator
            .collect(ids, |id| {
                let graph = Arc::clone(&self.graph);
                async move {
                    Ok(match graph.latest_activity(&id).await? {
                        Some(at) => Item::new(id, at),
                        None => Item::never_active(id),
                    })
                }
            })
            .await
    }

    async fn delete(&self, item: &Item) -> Result<(), ReapError> {
        if item.id.is_empty() || !item.id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReapError::Delete(format!(
                "Malformed account id '{}'",
                item.id
            )));
        }
        self.graph.unfollow(&item.id).await
    }

    fn identify(&self) -> &str {
        "Twitter followings"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const HALF_YEAR: Duration = Duration::from_secs(180 * 86400);

    #[derive(Default)]
    struct FakeGraph {
        last_tweet: HashMap<String, Option<DateTime<Utc>>>,
        broken: Vec<String>,
        unfollowed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SocialGraph for FakeGraph {
        async fn following_ids(&self) -> Result<Vec<String>, ReapError> {
            let mut ids: Vec<String> = self.last_tweet.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }

        async fn latest_activity(&self, account_id: &str) -> Result<Option<DateTime<Utc>>, ReapError> {
            if self.broken.iter().any(|b| b == account_id) {
                return Err(ReapError::Enumeration(format!("{} is suspended", account_id)));
            }
            Ok(self.last_tweet.get(account_id).copied().flatten())
        }

        async fn unfollow(&self, account_id: &str) -> Result<(), ReapError> {
            self.unfollowed.lock().unwrap().push(account_id.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_empty_token_is_construction_error() {
        assert!(matches!(
            TwitterFollowing::new("", HALF_YEAR, None),
            Err(ReapError::Construction(_))
        ));
    }

    #[test]
    fn test_identify() {
        let provider = TwitterFollowing::new("token", HALF_YEAR, None).unwrap();
        assert_eq!(provider.identify(), "Twitter followings");
        assert_eq!(provider.expiry(), HALF_YEAR);
        assert_eq!(provider.lookup_timeout(), None);
    }

    #[test]
    fn test_lookup_timeout_reaches_enumerator() {
        let limit = Duration::from_secs(12);
        let provider = TwitterFollowing::new("token", HALF_YEAR, Some(limit)).unwrap();
        assert_eq!(provider.lookup_timeout(), Some(limit));
    }

    #[tokio::test]
    async fn test_list_ages_accounts_by_latest_tweet() {
        let recent = Utc::now() - TimeDelta::days(3);
        let mut graph = FakeGraph::default();
        graph.last_tweet.insert("100".to_string(), Some(recent));
        graph.last_tweet.insert("200".to_string(), None);

        let provider = TwitterFollowing::with_graph(graph, HALF_YEAR);
        let mut items = provider.list().await.unwrap();
        items.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(items, vec![Item::new("100", recent), Item::never_active("200")]);
    }

    #[tokio::test]
    async fn test_failed_lookup_fails_list() {
        let mut graph = FakeGraph::default();
        graph.last_tweet.insert("1".to_string(), Some(Utc::now()));
        graph.last_tweet.insert("2".to_string(), Some(Utc::now()));
        graph.broken.push("2".to_string());

        let provider = TwitterFollowing::with_graph(graph, HALF_YEAR);
        let err = provider.list().await.unwrap_err();
        assert!(matches!(err, ReapError::Enumeration(ref msg) if msg.contains("suspended")));
    }

    #[tokio::test]
    async fn test_delete_rejects_non_numeric_id() {
        let provider = TwitterFollowing::with_graph(FakeGraph::default(), HALF_YEAR);

        let err = provider.delete(&Item::never_active("@someone")).await.unwrap_err();
        assert!(matches!(err, ReapError::Delete(_)));
        assert!(provider.graph().unfollowed.lock().unwrap().is_empty());

        provider.delete(&Item::never_active("12345")).await.unwrap();
        assert_eq!(*provider.graph().unfollowed.lock().unwrap(), vec!["12345"]);
    }

    #[test]
    fn test_newest_tweet_wins() {
        let body = r#"{"data": [
            {"id": "3", "text": "c", "created_at": "2024-03-01T10:00:00.000Z"},
            {"id": "2", "text": "b", "created_at": "2024-05-01T10:00:00.000Z"},
            {"id": "1", "text": "a"}
        ], "meta": {"result_count": 3}}"#;
        let envelope: Envelope<Vec<Tweet>> = serde_json::from_str(body).unwrap();
        let tweets = envelope.into_data("tweets").unwrap().unwrap();

        assert_eq!(
            newest(tweets).unwrap().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_no_tweets_means_no_activity() {
        let envelope: Envelope<Vec<Tweet>> =
            serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        let tweets = envelope.into_data("tweets").unwrap().unwrap_or_default();
        assert_eq!(newest(tweets), None);
    }

    #[test]
    fn test_errors_without_data_are_failures() {
        let body = r#"{"errors": [{"title": "Authorization Error", "detail": "Sorry, you are not authorized"}]}"#;
        let envelope: Envelope<Vec<User>> = serde_json::from_str(body).unwrap();
        let err = envelope.into_data("listing").unwrap_err();
        assert!(err.contains("not authorized"));
    }

    #[test]
    fn test_following_page_cursor() {
        let body = r#"{"data": [{"id": "1", "name": "a", "username": "a"}], "meta": {"result_count": 1, "next_token": "ABC"}}"#;
        let envelope: Envelope<Vec<User>> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.meta.as_ref().unwrap().next_token.as_deref(), Some("ABC"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_list_error() {
        let api = TwitterApi::with_base_url("token", "http://127.0.0.1:1").unwrap();
        let provider = TwitterFollowing::with_graph(api, HALF_YEAR);
        assert!(matches!(provider.list().await, Err(ReapError::List(_))));
    }
}
