//! CLI command definitions and argument parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Staler - cleans up stale things.
#[derive(Debug, Parser)]
#[command(name = "staler")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.staler/config.toml)
    #[arg(short, long, global = true, env = "STALER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log stale items instead of deleting them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: ProviderOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run a single reaping pass and exit (default)
    Run,

    /// Run a reaping pass every sweep interval until interrupted
    Watch,

    /// Print the effective configuration as TOML
    Config,
}

/// Per-provider settings that override the configuration file.
#[derive(Debug, Default, Clone, Args)]
pub struct ProviderOverrides {
    /// Skip Docker containers and images
    #[arg(long, global = true)]
    pub no_docker: bool,

    /// Docker endpoint (unix:// or tcp://)
    #[arg(long, global = true)]
    pub docker_host: Option<String>,

    /// Duration for exited Docker containers until they become stale
    #[arg(long, global = true, value_parser = parse_duration)]
    pub docker_container_expiry: Option<Duration>,

    /// Duration for Docker images until they become stale
    #[arg(long, global = true, value_parser = parse_duration)]
    pub docker_image_expiry: Option<Duration>,

    /// Skip Transmission torrents
    #[arg(long, global = true)]
    pub no_transmission: bool,

    /// Host for Transmission server
    #[arg(long, global = true, env = "STALER_TRANSMISSION_HOST")]
    pub transmission_host: Option<String>,

    /// Username for Transmission server
    #[arg(long, global = true, env = "STALER_TRANSMISSION_USER")]
    pub transmission_user: Option<String>,

    /// Password for Transmission server
    #[arg(long, global = true, env = "STALER_TRANSMISSION_PASSWORD", hide_env_values = true)]
    pub transmission_password: Option<String>,

    /// Duration for finished Transmission torrents until they become stale
    #[arg(long, global = true, value_parser = parse_duration)]
    pub transmission_torrent_expiry: Option<Duration>,

    /// Skip Twitter followings
    #[arg(long, global = true)]
    pub no_twitter: bool,

    /// User access token for Twitter
    #[arg(long, global = true, env = "STALER_TWITTER_ACCESS_TOKEN", hide_env_values = true)]
    pub twitter_access_token: Option<String>,

    /// Duration for Twitter followings with no new tweets until they become stale
    #[arg(long, global = true, value_parser = parse_duration)]
    pub twitter_following_expiry: Option<Duration>,

    /// Time limit for looking up one account's latest tweet (0s for none)
    #[arg(long, global = true, value_parser = parse_duration)]
    pub twitter_lookup_timeout: Option<Duration>,
}

/// Parse a human-readable duration such as `30days` or `720h`.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}
