//! Deployment group repository trait

use async_trait::async_trait;

use super::entity::{ActivityCounts, ActivityKind, DeploymentGroup, DeploymentGroupId};
use crate::domain::team::TeamId;
use crate::domain::DomainError;

/// Store of deployment group aggregates
///
/// `create` and `update` enforce name uniqueness per team. `delete` removes the
/// group together with its nested records and activity counters.
#[async_trait]
pub trait DeploymentGroupRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: &DeploymentGroupId) -> Result<Option<DeploymentGroup>, DomainError>;

    async fn find_by_name(
        &self,
        team_id: &TeamId,
        name: &str,
    ) -> Result<Option<DeploymentGroup>, DomainError>;

    /// Groups of a team, sorted by name
    async fn list_by_team(&self, team_id: &TeamId) -> Result<Vec<DeploymentGroup>, DomainError>;

    async fn names_by_team(&self, team_id: &TeamId) -> Result<Vec<String>, DomainError>;

    async fn count_by_team(&self, team_id: &TeamId) -> Result<usize, DomainError>;

    async fn create(&self, group: DeploymentGroup) -> Result<DeploymentGroup, DomainError>;

    async fn update(&self, group: DeploymentGroup) -> Result<DeploymentGroup, DomainError>;

    /// Returns the removed group, if it existed
    async fn delete(&self, id: &DeploymentGroupId)
        -> Result<Option<DeploymentGroup>, DomainError>;

    async fn activity(&self, id: &DeploymentGroupId) -> Result<ActivityCounts, DomainError>;

    async fn record_activity(
        &self,
        id: &DeploymentGroupId,
        kind: ActivityKind,
    ) -> Result<ActivityCounts, DomainError>;
}
