//! Transmission Provider Implementation
//!
//! Reaps finished torrents (and their downloaded data) through Transmission's
//! JSON-RPC interface. A torrent's age is its last activity.
//!
//! # Examples
//!
//! ```no_run
//! use staler_providers::TransmissionTorrents;
//! use std::time::Duration;
//!
//! let torrents = TransmissionTorrents::new(
//!     "seedbox.local",
//!     Some("admin"),
//!     Some("secret"),
//!     Duration::from_secs(30 * 86400),
//! )
//! .unwrap();
//! ```

use crate::{describe_failure, http_client};
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;
use staler_domain::{Item, Provider, ReapError};
use std::sync::Mutex;
use std::time::Duration;

/// Port Transmission's RPC server listens on unless told otherwise
pub const DEFAULT_RPC_PORT: u16 = 9091;

/// Header carrying Transmission's CSRF session token
const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Build the RPC endpoint URL from a host setting
///
/// Accepts a bare host (`seedbox.local`), a host with port
/// (`seedbox.local:8080`) or a full URL.
pub fn rpc_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else if host.contains(':') {
        format!("http://{}", host)
    } else {
        format!("http://{}:{}", host, DEFAULT_RPC_PORT)
    };

    if base.ends_with("/transmission/rpc") {
        base
    } else {
        format!("{}/transmission/rpc", base)
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: String,
    arguments: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    torrents: Vec<Torrent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Torrent {
    id: i64,
    #[serde(default)]
    is_finished: bool,
    #[serde(default)]
    activity_date: i64,
}

/// Provider for finished Transmission torrents
pub struct TransmissionTorrents {
    expiry: Duration,
    rpc_url: String,
    credentials: Option<(String, String)>,
    client: reqwest::Client,
    session_id: Mutex<Option<String>>,
}

impl TransmissionTorrents {
    /// Create a new provider for finished Transmission torrents
    ///
    /// `user` and `password` enable basic authentication when `user` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ReapError::Construction`] if `host` is empty.
    pub fn new(
        host: &str,
        user: Option<&str>,
        password: Option<&str>,
        expiry: Duration,
    ) -> Result<Self, ReapError> {
        if host.trim().is_empty() {
            return Err(ReapError::Construction(
                "transmission host cannot be empty".to_string(),
            ));
        }

        let credentials = user
            .filter(|u| !u.is_empty())
            .map(|u| (u.to_string(), password.unwrap_or_default().to_string()));

        Ok(Self {
            expiry,
            rpc_url: rpc_url(host),
            credentials,
            client: http_client()?,
            session_id: Mutex::new(None),
        })
    }

    /// The RPC endpoint this provider talks to
    pub fn endpoint(&self) -> &str {
        &self.rpc_url
    }

    fn current_session(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store_session(&self, id: String) {
        *self
            .session_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id);
    }

    /// Invoke one RPC method
    ///
    /// Transmission answers 409 with a fresh session id until the client
    /// presents it, so a 409 is followed by exactly one re-send.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        arguments: serde_json::Value,
    ) -> Result<T, String> {
        let body = RpcRequest { method, arguments };

        for _ in 0..2 {
            let mut request = self.client.post(&self.rpc_url).json(&body);
            if let Some((user, password)) = &self.credentials {
                request = request.basic_auth(user, Some(password));
            }
            if let Some(session) = self.current_session() {
                request = request.header(SESSION_HEADER, session);
            }

            let response = request
                .send()
                .await
                .map_err(|e| format!("Request to {} failed: {}", self.rpc_url, e))?;

            if response.status() == reqwest::StatusCode::CONFLICT {
                let session = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| "409 without a session id".to_string())?;
                tracing::debug!("Refreshed Transmission session id");
                self.store_session(session.to_string());
                continue;
            }

            if !response.status().is_success() {
                return Err(describe_failure(response).await);
            }

            let parsed: RpcResponse<T> = response
                .json()
                .await
                .map_err(|e| format!("Failed to parse {} response: {}", method, e))?;

            if parsed.result != "success" {
                return Err(format!("{} failed: {}", method, parsed.result));
            }
            return parsed
                .arguments
                .ok_or_else(|| format!("{} response had no arguments", method));
        }

        Err("Transmission kept rejecting the session id".to_string())
    }
}

fn finished_items(list: TorrentList) -> Result<Vec<Item>, ReapError> {
    list.torrents
        .into_iter()
        .filter(|t| t.is_finished)
        .map(|t| {
            Item::at_unix(t.id.to_string(), t.activity_date).ok_or_else(|| {
                ReapError::List(format!("Invalid activity date for torrent {}", t.id))
            })
        })
        .collect()
}

#[async_trait]
impl Provider for TransmissionTorrents {
    fn expiry(&self) -> Duration {
        self.expiry
    }

    async fn list(&self) -> Result<Vec<Item>, ReapError> {
        let list: TorrentList = self
            .call(
                "torrent-get",
                json!({ "fields": ["id", "isFinished", "activityDate"] }),
            )
            .await
            .map_err(ReapError::List)?;

        finished_items(list)
    }

    async fn delete(&self, item: &Item) -> Result<(), ReapError> {
        let id: i64 = item
            .id
            .parse()
            .map_err(|_| ReapError::Delete(format!("Malformed torrent id '{}'", item.id)))?;

        self.call::<IgnoredAny>(
            "torrent-remove",
            json!({ "ids": [id], "delete-local-data": true }),
        )
        .await
        .map(|_| ())
        .map_err(ReapError::Delete)
    }

    fn identify(&self) -> &str {
        "Transmission torrents"
    }
}
