//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::deployment_group::{
    BroadcastNotifier, DeploymentGroupService, InMemoryDeploymentGroupRepository,
};

pub type DeploymentGroups = DeploymentGroupService<InMemoryDeploymentGroupRepository>;

/// Registry service plus the notifier it publishes to
#[derive(Debug, Clone)]
pub struct AppState {
    pub deployment_groups: Arc<DeploymentGroups>,
    pub notifier: Arc<BroadcastNotifier>,
}
