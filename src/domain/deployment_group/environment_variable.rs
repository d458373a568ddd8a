//! Environment variables scoped to a deployment group

use serde::{Deserialize, Serialize};

use super::entity::DeploymentGroupId;
use crate::domain::team::TeamId;

/// Environment variable set on every app deployed to the group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    name: String,
    value: String,
    team_id: TeamId,
    deployment_group_id: DeploymentGroupId,
}

impl EnvironmentVariable {
    pub fn new(
        name: impl AsRef<str>,
        value: impl Into<String>,
        team_id: TeamId,
        deployment_group_id: DeploymentGroupId,
    ) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            value: value.into(),
            team_id,
            deployment_group_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub fn deployment_group_id(&self) -> &DeploymentGroupId {
        &self.deployment_group_id
    }

    pub(crate) fn set_value(&mut self, value: String) {
        self.value = value;
    }
}
