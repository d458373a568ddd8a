//! Domain layer - Deployment groups and the teams that own them

pub mod deployment_group;
pub mod error;
pub mod team;

pub use deployment_group::{
    DeploymentGroup, DeploymentGroupAttrs, DeploymentGroupEvent, DeploymentGroupId,
    DeploymentGroupNotifier, DeploymentGroupRepository, FieldError, FieldErrors,
};
pub use error::DomainError;
pub use team::TeamId;
