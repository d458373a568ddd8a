//! Agent keys used by agents to join a deployment group

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::DeploymentGroupId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentKeyId(String);

impl AgentKeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque credential an agent presents when joining its group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentKey {
    id: AgentKeyId,
    key: String,
    deployment_group_id: DeploymentGroupId,
    created_at: DateTime<Utc>,
}

impl AgentKey {
    pub fn new(key: impl Into<String>, deployment_group_id: DeploymentGroupId) -> Self {
        Self {
            id: AgentKeyId::new(Uuid::new_v4().to_string()),
            key: key.into(),
            deployment_group_id,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &AgentKeyId {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn deployment_group_id(&self) -> &DeploymentGroupId {
        &self.deployment_group_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
