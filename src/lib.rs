//! Deployment Group Registry
//!
//! Keeps a team's deployment groups together with their secrets,
//! environment variables, agent keys and live activity counters:
//! - Field-level validation with normalized URLs and names
//! - Per-team serialized mutations over whole-group snapshots
//! - Ordered per-team change notifications over broadcast channels

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod state;

pub use config::AppConfig;
pub use state::AppState;

use std::sync::Arc;

use infrastructure::deployment_group::{
    BroadcastNotifier, DeploymentGroupService, InMemoryDeploymentGroupRepository,
};
use tracing::info;

/// Create the application state with default configuration
pub fn create_app_state() -> AppState {
    create_app_state_with_config(&AppConfig::default())
}

/// Create the application state with custom configuration
pub fn create_app_state_with_config(config: &AppConfig) -> AppState {
    let notifier = Arc::new(BroadcastNotifier::new(config.notifier.channel_capacity));
    let repository = Arc::new(InMemoryDeploymentGroupRepository::new());
    let deployment_groups = Arc::new(DeploymentGroupService::new(repository, notifier.clone()));

    info!(
        channel_capacity = notifier.capacity(),
        "Deployment group registry initialized"
    );

    AppState {
        deployment_groups,
        notifier,
    }
}
