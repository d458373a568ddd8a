//! Deployment group domain module
//!
//! A deployment group is a named target configuration inside a team that apps
//! are deployed to and agents join. It owns its secrets, environment variables
//! and agent keys.

mod agent_key;
mod attrs;
mod entity;
mod environment_variable;
mod event;
mod repository;
mod secret;
mod validation;

pub use agent_key::{AgentKey, AgentKeyId};
pub use attrs::{DeploymentGroupAttrs, EntryAttrs, EnvironmentVariableAttrs, SecretAttrs};
pub use entity::{
    ActivityCounts, ActivityKind, AuthorizationGroup, Clustering, DeploymentGroup,
    DeploymentGroupId, DeploymentMode,
};
pub use environment_variable::EnvironmentVariable;
pub use event::{AgentEvent, AppDeploymentEvent, DeploymentGroupEvent, DeploymentGroupNotifier};
pub use repository::DeploymentGroupRepository;
pub use secret::{normalize_secret_name, Secret};
pub use validation::{
    normalize_url, validate, validate_environment_variable, validate_secret, validate_url,
    FieldError, FieldErrors, ValidatedEntry, ValidatedGroup,
};
