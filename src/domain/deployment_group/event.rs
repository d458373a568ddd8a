//! Change notifications and consumed activity events

use serde::{Deserialize, Serialize};

use super::entity::{DeploymentGroup, DeploymentGroupId};
use crate::domain::team::TeamId;

/// Published after every successful registry mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DeploymentGroupEvent {
    #[serde(rename = "deployment_group_created")]
    Created { deployment_group: DeploymentGroup },

    #[serde(rename = "deployment_group_updated")]
    Updated { deployment_group: DeploymentGroup },

    #[serde(rename = "deployment_group_deleted")]
    Deleted {
        team_id: TeamId,
        id: DeploymentGroupId,
    },
}

impl DeploymentGroupEvent {
    pub fn created(group: DeploymentGroup) -> Self {
        Self::Created {
            deployment_group: group,
        }
    }

    pub fn updated(group: DeploymentGroup) -> Self {
        Self::Updated {
            deployment_group: group,
        }
    }

    pub fn deleted(team_id: TeamId, id: DeploymentGroupId) -> Self {
        Self::Deleted { team_id, id }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "deployment_group_created",
            Self::Updated { .. } => "deployment_group_updated",
            Self::Deleted { .. } => "deployment_group_deleted",
        }
    }

    /// Team whose subscribers receive this event
    pub fn team_id(&self) -> &TeamId {
        match self {
            Self::Created { deployment_group } | Self::Updated { deployment_group } => {
                deployment_group.team_id()
            }
            Self::Deleted { team_id, .. } => team_id,
        }
    }

    pub fn deployment_group_id(&self) -> &DeploymentGroupId {
        match self {
            Self::Created { deployment_group } | Self::Updated { deployment_group } => {
                deployment_group.id()
            }
            Self::Deleted { id, .. } => id,
        }
    }
}

/// Receives registry change events
///
/// Called while the team's mutations are serialized, so implementations must
/// not block.
pub trait DeploymentGroupNotifier: Send + Sync + std::fmt::Debug {
    fn publish(&self, event: DeploymentGroupEvent);
}

/// An agent connected to (or disconnected from) a deployment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(alias = "hub_id")]
    pub team_id: TeamId,
    pub deployment_group_id: DeploymentGroupId,
}

/// An app deployment was started in a deployment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDeploymentEvent {
    #[serde(alias = "hub_id")]
    pub team_id: TeamId,
    pub deployment_group_id: DeploymentGroupId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deployment_group::{validate, DeploymentGroupAttrs, DeploymentMode};

    fn group() -> DeploymentGroup {
        let attrs = DeploymentGroupAttrs::new("production", DeploymentMode::Offline);
        DeploymentGroup::new(
            TeamId::new("team-acme").unwrap(),
            validate(&attrs, Vec::<String>::new()).unwrap(),
        )
    }

    #[test]
    fn test_event_serialization_tags() {
        let group = group();
        let created = serde_json::to_value(DeploymentGroupEvent::created(group.clone())).unwrap();
        assert_eq!(created["event"], "deployment_group_created");
        assert_eq!(created["deployment_group"]["name"], "production");

        let deleted = serde_json::to_value(DeploymentGroupEvent::deleted(
            group.team_id().clone(),
            group.id().clone(),
        ))
        .unwrap();
        assert_eq!(deleted["event"], "deployment_group_deleted");
        assert_eq!(deleted["id"], group.id().as_str());
    }

    #[test]
    fn test_event_scope() {
        let group = group();
        let event = DeploymentGroupEvent::updated(group.clone());

        assert_eq!(event.name(), "deployment_group_updated");
        assert_eq!(event.team_id().as_str(), "team-acme");
        assert_eq!(event.deployment_group_id(), group.id());
    }

    #[test]
    fn test_agent_event_accepts_hub_id() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"hub_id": "team-acme", "deployment_group_id": "dg-1"}"#)
                .unwrap();
        assert_eq!(event.team_id.as_str(), "team-acme");
        assert_eq!(event.deployment_group_id.as_str(), "dg-1");
    }
}
