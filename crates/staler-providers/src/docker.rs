//! Docker Provider Implementations
//!
//! Talks to the Docker Engine API to reap exited containers and old images.
//! The endpoint comes from explicit configuration, then the `DOCKER_HOST`
//! environment variable, then the local daemon socket
//! ([`DEFAULT_DOCKER_HOST`]).
//!
//! Unix sockets and plain TCP endpoints are supported.
//!
//! # Examples
//!
//! ```no_run
//! use staler_providers::{DockerContainers, DockerImages};
//! use std::time::Duration;
//!
//! let month = Duration::from_secs(30 * 86400);
//! let containers = DockerContainers::new(Some("tcp://127.0.0.1:2375"), month).unwrap();
//! let images = DockerImages::new(None, month).unwrap();
//! ```

use crate::DEFAULT_TIMEOUT_SECS;
use async_trait::async_trait;
use bollard::container::{ListContainersOptions, RemoveContainerOptions};
use bollard::image::{ListImagesOptions, RemoveImageOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use staler_domain::{Item, Provider, ReapError};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Docker endpoint used when neither configuration nor `DOCKER_HOST` names one
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Where the Docker daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Path of a local unix socket
    Unix(String),
    /// `host:port` of a plain TCP endpoint
    Tcp(String),
}

impl DockerEndpoint {
    /// Parse a Docker host string (`unix://`, `tcp://` or `http://`)
    ///
    /// # Errors
    ///
    /// Returns [`ReapError::Construction`] for TLS, named pipe or otherwise
    /// unsupported endpoints.
    pub fn parse(raw: &str) -> Result<Self, ReapError> {
        let raw = raw.trim();

        if let Some(path) = raw.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ReapError::Construction(
                    "Docker host 'unix://' names no socket".to_string(),
                ));
            }
            return Ok(Self::Unix(path.to_string()));
        }

        let raw = raw.trim_end_matches('/');
        if let Some(authority) = raw
            .strip_prefix("tcp://")
            .or_else(|| raw.strip_prefix("http://"))
        {
            if authority.is_empty() || authority.contains('/') {
                return Err(ReapError::Construction(format!(
                    "Malformed Docker host '{}'",
                    raw
                )));
            }
            return Ok(Self::Tcp(authority.to_string()));
        }

        if raw.starts_with("https://") {
            return Err(ReapError::Construction(format!(
                "Docker host '{}' needs TLS, which is not supported",
                raw
            )));
        }

        Err(ReapError::Construction(format!(
            "Unsupported Docker host '{}'",
            raw
        )))
    }
}

impl fmt::Display for DockerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerEndpoint::Unix(path) => write!(f, "unix://{}", path),
            DockerEndpoint::Tcp(authority) => write!(f, "tcp://{}", authority),
        }
    }
}

/// Resolve the Docker endpoint from configuration and the environment
///
/// `explicit` wins over `from_env` (the value of `DOCKER_HOST`), which wins
/// over [`DEFAULT_DOCKER_HOST`]. Blank values count as unset.
pub fn resolve_docker_host(
    explicit: Option<&str>,
    from_env: Option<&str>,
) -> Result<DockerEndpoint, ReapError> {
    let raw = explicit
        .filter(|h| !h.trim().is_empty())
        .or(from_env.filter(|h| !h.trim().is_empty()))
        .unwrap_or(DEFAULT_DOCKER_HOST);

    DockerEndpoint::parse(raw)
}

/// Docker client shared by the container and image providers' constructors
///
/// Not shared at runtime: every Docker provider builds its own.
struct DockerClient {
    endpoint: DockerEndpoint,
    docker: Docker,
}

impl DockerClient {
    fn new(host: Option<&str>) -> Result<Self, ReapError> {
        let from_env = std::env::var("DOCKER_HOST").ok();
        let endpoint = resolve_docker_host(host, from_env.as_deref())?;
        let docker = connect(&endpoint)?;
        tracing::debug!("Using Docker daemon at {}", endpoint);
        Ok(Self { endpoint, docker })
    }
}

fn connect(endpoint: &DockerEndpoint) -> Result<Docker, ReapError> {
    let connected = match endpoint {
        #[cfg(unix)]
        DockerEndpoint::Unix(path) => {
            Docker::connect_with_unix(path, DEFAULT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
        #[cfg(not(unix))]
        DockerEndpoint::Unix(_) => {
            return Err(ReapError::Construction(format!(
                "Docker host '{}' is a unix socket, which this platform lacks",
                endpoint
            )))
        }
        DockerEndpoint::Tcp(authority) => {
            Docker::connect_with_http(authority, DEFAULT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
    };

    connected.map_err(|e| {
        ReapError::Construction(format!("Failed to set up Docker client for {}: {}", endpoint, e))
    })
}

fn to_item(id: Option<String>, created: Option<i64>) -> Result<Item, ReapError> {
    let id = id.ok_or_else(|| ReapError::List("Docker returned an entry without an id".to_string()))?;
    created
        .and_then(|secs| Item::at_unix(id.clone(), secs))
        .ok_or_else(|| ReapError::List(format!("Invalid creation time for {}", id)))
}

fn check_id(id: &str) -> Result<&str, ReapError> {
    if id.is_empty() || id.contains('/') || id.contains('?') || id.contains('#') {
        return Err(ReapError::Delete(format!("Malformed Docker id '{}'", id)));
    }
    Ok(id)
}

/// Provider for exited Docker containers
///
/// Age is the container's creation time.
pub struct DockerContainers {
    expiry: Duration,
    client: DockerClient,
}

impl DockerContainers {
    /// Create a new provider for exited Docker containers
    ///
    /// # Errors
    ///
    /// Returns [`ReapError::Construction`] if the Docker endpoint is unusable.
    pub fn new(host: Option<&str>, expiry: Duration) -> Result<Self, ReapError> {
        Ok(Self {
            expiry,
            client: DockerClient::new(host)?,
        })
    }

    /// The Docker daemon this provider talks to
    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.client.endpoint
    }
}

#[async_trait]
impl Provider for DockerContainers {
    fn expiry(&self) -> Duration {
        self.expiry
    }

    async fn list(&self) -> Result<Vec<Item>, ReapError> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: HashMap::from([("status".to_string(), vec!["exited".to_string()])]),
            ..Default::default()
        };

        let summaries = self
            .client
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ReapError::List(e.to_string()))?;

        summaries
            .into_iter()
            .map(|s| to_item(s.id, s.created))
            .collect()
    }

    async fn delete(&self, item: &Item) -> Result<(), ReapError> {
        let id = check_id(&item.id)?;
        self.client
            .docker
            .remove_container(id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| ReapError::Delete(e.to_string()))
    }

    fn identify(&self) -> &str {
        "Docker containers"
    }
}

/// Provider for Docker images
///
/// Age is the image's creation time. Deletion is forced and prunes untagged
/// parents.
pub struct DockerImages {
    expiry: Duration,
    client: DockerClient,
}

impl DockerImages {
    /// Create a new provider for Docker images
    ///
    /// # Errors
    ///
    /// Returns [`ReapError::Construction`] if the Docker endpoint is unusable.
    pub fn new(host: Option<&str>, expiry: Duration) -> Result<Self, ReapError> {
        Ok(Self {
            expiry,
            client: DockerClient::new(host)?,
        })
    }

    /// The Docker daemon this provider talks to
    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.client.endpoint
    }
}

#[async_trait]
impl Provider for DockerImages {
    fn expiry(&self) -> Duration {
        self.expiry
    }

    async fn list(&self) -> Result<Vec<Item>, ReapError> {
        let options = ListImagesOptions::<String> {
            all: true,
            ..Default::default()
        };

        let summaries = self
            .client
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| ReapError::List(e.to_string()))?;

        summaries
            .into_iter()
            .map(|s| to_item(Some(s.id), Some(s.created)))
            .collect()
    }

    async fn delete(&self, item: &Item) -> Result<(), ReapError> {
        let id = check_id(&item.id)?;
        let options = RemoveImageOptions {
            force: true,
            noprune: false,
        };

        self.client
            .docker
            .remove_image(id, Some(options), None)
            .await
            .map(|_| ())
            .map_err(|e| ReapError::Delete(e.to_string()))
    }

    fn identify(&self) -> &str {
        "Docker images"
    }
}
