//! Configuration management for the CLI.

use crate::cli::ProviderOverrides;
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use staler_janitor::JanitorConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DAY: u64 = 24 * 60 * 60;

/// A month, as far as expiries are concerned.
const MONTH: Duration = Duration::from_secs(30 * DAY);

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// How reaping passes are run
    #[serde(default)]
    pub janitor: JanitorConfig,

    /// Docker containers and images
    #[serde(default)]
    pub docker: DockerSettings,

    /// Transmission torrents
    #[serde(default)]
    pub transmission: TransmissionSettings,

    /// Twitter followings
    #[serde(default)]
    pub twitter: TwitterSettings,
}

/// Docker provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerSettings {
    /// Reap Docker resources at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Docker endpoint; falls back to `DOCKER_HOST`, then the local socket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Duration for exited containers until they become stale
    #[serde(default = "default_month", with = "humantime_serde")]
    pub container_expiry: Duration,

    /// Duration for images until they become stale
    #[serde(default = "default_month", with = "humantime_serde")]
    pub image_expiry: Duration,
}

/// Transmission provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionSettings {
    /// Reap torrents at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host of the Transmission server
    #[serde(default = "default_transmission_host")]
    pub host: String,

    /// Username, empty for none
    #[serde(default)]
    pub user: String,

    /// Password
    #[serde(default)]
    pub password: String,

    /// Duration for finished torrents until they become stale
    #[serde(default = "default_month", with = "humantime_serde")]
    pub torrent_expiry: Duration,
}

/// Twitter provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterSettings {
    /// Reap followings at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// User access token
    #[serde(default)]
    pub access_token: String,

    /// Duration without new tweets until a following becomes stale
    #[serde(default = "default_following_expiry", with = "humantime_serde")]
    pub following_expiry: Duration,

    /// Time limit for each latest-tweet lookup; zero means no limit
    #[serde(default = "default_lookup_timeout", with = "humantime_serde")]
    pub lookup_timeout: Duration,
}

impl TwitterSettings {
    /// The lookup time limit, if there is one
    pub fn lookup_limit(&self) -> Option<Duration> {
        Some(self.lookup_timeout).filter(|limit| !limit.is_zero())
    }
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".staler").join("config.toml"))
    }

    /// Load configuration from `path`, or the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::path()?,
        };

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            Self::parse(&contents)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.janitor.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A copy with secrets masked, fit for printing.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [&mut copy.transmission.password, &mut copy.twitter.access_token] {
            if !secret.is_empty() {
                *secret = "********".to_string();
            }
        }
        copy
    }

    /// Apply command-line overrides on top of the file settings.
    pub fn apply(&mut self, dry_run: bool, overrides: &ProviderOverrides) {
        if dry_run {
            self.janitor.dry_run = true;
        }

        if overrides.no_docker {
            self.docker.enabled = false;
        }
        if let Some(host) = &overrides.docker_host {
            self.docker.host = Some(host.clone());
        }
        if let Some(expiry) = overrides.docker_container_expiry {
            self.docker.container_expiry = expiry;
        }
        if let Some(expiry) = overrides.docker_image_expiry {
            self.docker.image_expiry = expiry;
        }

        if overrides.no_transmission {
            self.transmission.enabled = false;
        }
        if let Some(host) = &overrides.transmission_host {
            self.transmission.host = host.clone();
        }
        if let Some(user) = &overrides.transmission_user {
            self.transmission.user = user.clone();
        }
        if let Some(password) = &overrides.transmission_password {
            self.transmission.password = password.clone();
        }
        if let Some(expiry) = overrides.transmission_torrent_expiry {
            self.transmission.torrent_expiry = expiry;
        }

        if overrides.no_twitter {
            self.twitter.enabled = false;
        }
        if let Some(token) = &overrides.twitter_access_token {
            self.twitter.access_token = token.clone();
        }
        if let Some(expiry) = overrides.twitter_following_expiry {
            self.twitter.following_expiry = expiry;
        }
        if let Some(timeout) = overrides.twitter_lookup_timeout {
            self.twitter.lookup_timeout = timeout;
        }
    }
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: None,
            container_expiry: MONTH,
            image_expiry: MONTH,
        }
    }
}

impl Default for TransmissionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_transmission_host(),
            user: String::new(),
            password: String::new(),
            torrent_expiry: MONTH,
        }
    }
}

impl Default for TwitterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            access_token: String::new(),
            following_expiry: default_following_expiry(),
            lookup_timeout: default_lookup_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_month() -> Duration {
    MONTH
}

fn default_following_expiry() -> Duration {
    6 * MONTH
}

fn default_lookup_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_transmission_host() -> String {
    "localhost".to_string()
}
