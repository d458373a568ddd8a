//! Deployment group infrastructure implementations

mod agent_key;
mod notifier;
mod repository;
mod service;

pub use agent_key::AgentKeyGenerator;
pub use notifier::BroadcastNotifier;
pub use repository::InMemoryDeploymentGroupRepository;
pub use service::DeploymentGroupService;
