//! Staler CLI library.
//!
//! This library provides the core functionality for the Staler command-line interface,
//! including argument parsing, configuration management and provider construction.

pub mod cli;
pub mod config;
pub mod error;
pub mod providers;

pub use cli::{Cli, Command, ProviderOverrides};
pub use config::Config;
pub use error::{CliError, Result};
pub use providers::build_providers;
