//! Secrets scoped to a deployment group

use serde::{Deserialize, Serialize};

use super::entity::DeploymentGroupId;
use crate::domain::team::TeamId;

/// Named secret value exposed to apps of a deployment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    name: String,
    value: String,
    team_id: TeamId,
    deployment_group_id: DeploymentGroupId,
}

impl Secret {
    /// Create a secret; the name is stored upper-cased
    pub fn new(
        name: impl AsRef<str>,
        value: impl Into<String>,
        team_id: TeamId,
        deployment_group_id: DeploymentGroupId,
    ) -> Self {
        Self {
            name: normalize_secret_name(name.as_ref()),
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

/// Secret names are case-insensitive and stored upper-cased
pub fn normalize_secret_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_normalized() {
        let secret = Secret::new(
            "  api_token ",
            "abc",
            TeamId::new("hub-1").unwrap(),
            DeploymentGroupId::new("dg-1"),
        );

        assert_eq!(secret.name(), "API_TOKEN");
        assert_eq!(secret.value(), "abc");
        assert_eq!(secret.deployment_group_id().as_str(), "dg-1");
    }
}
