//! CLI module for the deployment group registry
//!
//! Provides subcommands for working with registry data offline:
//! - `validate`: check a deployment group attribute document
//! - `replay`: apply a recorded operation log and print the emitted events

pub mod replay;
pub mod validate;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Deployment group registry tooling
#[derive(Parser)]
#[command(name = "deployment-registry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a deployment group attribute document
    Validate(validate::ValidateArgs),

    /// Replay an operation log against a fresh registry
    Replay(replay::ReplayArgs),
}

/// Load configuration and install logging, shared by every command
fn load_config() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);
    config
}
