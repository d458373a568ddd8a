//! Deployment group entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent_key::{AgentKey, AgentKeyId};
use super::environment_variable::EnvironmentVariable;
use super::secret::{normalize_secret_name, Secret};
use super::validation::ValidatedGroup;
use crate::domain::team::TeamId;
use crate::domain::DomainError;

/// Deployment group identifier, assigned by the registry on creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentGroupId(String);

impl DeploymentGroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeploymentGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeploymentGroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeploymentGroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether apps in the group are served by connected agents or deployed manually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    Online,
    Offline,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::str::FromStr for DeploymentMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How agents of an online group discover each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clustering {
    Auto,
    Dns,
}

impl Clustering {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Dns => "dns",
        }
    }
}

impl std::str::FromStr for Clustering {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "dns" => Ok(Self::Dns),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Clustering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity-provider group allowed to access apps of a deployment group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationGroup {
    pub provider_id: String,
    pub group_name: String,
}

impl AuthorizationGroup {
    pub fn new(provider_id: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            group_name: group_name.into(),
        }
    }
}

/// Counters derived from agent and app deployment events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub agents: u64,
    pub app_deployments: u64,
}

/// Externally reported activity affecting a group's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    AgentJoined,
    AgentLeft,
    AppDeploymentStarted,
}

impl ActivityCounts {
    /// Apply one activity; leaving never drops the agent count below zero
    pub fn apply(&mut self, kind: ActivityKind) {
        match kind {
            ActivityKind::AgentJoined => self.agents += 1,
            ActivityKind::AgentLeft => self.agents = self.agents.saturating_sub(1),
            ActivityKind::AppDeploymentStarted => self.app_deployments += 1,
        }
    }
}

/// Deployment group aggregate
///
/// Secrets, environment variables and agent keys are owned by the group and
/// always replaced together with it, so a stored snapshot is never partially
/// updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentGroup {
    id: DeploymentGroupId,
    team_id: TeamId,
    name: String,
    mode: DeploymentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    clustering: Option<Clustering>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    teams_auth: bool,
    groups_auth: bool,
    authorization_groups: Vec<AuthorizationGroup>,
    secrets: Vec<Secret>,
    agent_keys: Vec<AgentKey>,
    environment_variables: Vec<EnvironmentVariable>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeploymentGroup {
    /// Build a new group from validated attributes with a freshly generated id
    pub fn new(team_id: TeamId, attrs: ValidatedGroup) -> Self {
        Self::with_id(DeploymentGroupId::generate(), team_id, attrs)
    }

    pub fn with_id(id: DeploymentGroupId, team_id: TeamId, attrs: ValidatedGroup) -> Self {
        let now = Utc::now();

        Self {
            id,
            team_id,
            name: attrs.name,
            mode: attrs.mode,
            clustering: attrs.clustering,
            url: attrs.url,
            teams_auth: attrs.teams_auth,
            groups_auth: attrs.groups_auth,
            authorization_groups: attrs.authorization_groups,
            secrets: Vec::new(),
            agent_keys: Vec::new(),
            environment_variables: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    // Getters

    pub fn id(&self) -> &DeploymentGroupId {
        &self.id
    }

    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn clustering(&self) -> Option<Clustering> {
        self.clustering
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn teams_auth(&self) -> bool {
        self.teams_auth
    }

    pub fn groups_auth(&self) -> bool {
        self.groups_auth
    }

    pub fn authorization_groups(&self) -> &[AuthorizationGroup] {
        &self.authorization_groups
    }

    pub fn secrets(&self) -> &[Secret] {
        &self.secrets
    }

    pub fn agent_keys(&self) -> &[AgentKey] {
        &self.agent_keys
    }

    pub fn environment_variables(&self) -> &[EnvironmentVariable] {
        &self.environment_variables
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn secret(&self, name: &str) -> Option<&Secret> {
        let name = normalize_secret_name(name);
        self.secrets.iter().find(|s| s.name() == name)
    }

    pub fn environment_variable(&self, name: &str) -> Option<&EnvironmentVariable> {
        let name = name.trim();
        self.environment_variables.iter().find(|v| v.name() == name)
    }

    pub fn secret_names(&self) -> Vec<&str> {
        self.secrets.iter().map(Secret::name).collect()
    }

    pub fn environment_variable_names(&self) -> Vec<&str> {
        self.environment_variables
            .iter()
            .map(EnvironmentVariable::name)
            .collect()
    }

    // Mutators

    /// Replace the group's own settings, keeping nested records
    pub fn apply(&mut self, attrs: ValidatedGroup) {
        self.name = attrs.name;
        self.mode = attrs.mode;
        self.clustering = attrs.clustering;
        self.url = attrs.url;
        self.teams_auth = attrs.teams_auth;
        self.groups_auth = attrs.groups_auth;
        self.authorization_groups = attrs.authorization_groups;
        self.touch();
    }

    pub fn add_secret(&mut self, secret: Secret) -> Result<(), DomainError> {
        self.ensure_owned(secret.team_id(), secret.deployment_group_id())?;

        if self.secret(secret.name()).is_some() {
            return Err(DomainError::conflict(format!(
                "Secret '{}' has already been taken",
                secret.name()
            )));
        }

        self.secrets.push(secret);
        self.touch();
        Ok(())
    }

    pub fn update_secret(&mut self, name: &str, value: String) -> Result<(), DomainError> {
        let name = normalize_secret_name(name);
        let secret = self
            .secrets
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| DomainError::not_found(format!("Secret '{}' not found", name)))?;

        secret.set_value(value);
        self.touch();
        Ok(())
    }

    pub fn remove_secret(&mut self, name: &str) -> Result<Secret, DomainError> {
        let name = normalize_secret_name(name);
        let index = self
            .secrets
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| DomainError::not_found(format!("Secret '{}' not found", name)))?;

        let removed = self.secrets.remove(index);
        self.touch();
        Ok(removed)
    }

    pub fn add_environment_variable(
        &mut self,
        variable: EnvironmentVariable,
    ) -> Result<(), DomainError> {
        self.ensure_owned(variable.team_id(), variable.deployment_group_id())?;

        if self.environment_variable(variable.name()).is_some() {
            return Err(DomainError::conflict(format!(
                "Environment variable '{}' has already been taken",
                variable.name()
            )));
        }

        self.environment_variables.push(variable);
        self.touch();
        Ok(())
    }

    pub fn update_environment_variable(
        &mut self,
        name: &str,
        value: String,
    ) -> Result<(), DomainError> {
        let name = name.trim();
        let variable = self
            .environment_variables
            .iter_mut()
            .find(|v| v.name() == name)
            .ok_or_else(|| {
                DomainError::not_found(format!("Environment variable '{}' not found", name))
            })?;

        variable.set_value(value);
        self.touch();
        Ok(())
    }

    pub fn remove_environment_variable(
        &mut self,
        name: &str,
    ) -> Result<EnvironmentVariable, DomainError> {
        let name = name.trim();
        let index = self
            .environment_variables
            .iter()
            .position(|v| v.name() == name)
            .ok_or_else(|| {
                DomainError::not_found(format!("Environment variable '{}' not found", name))
            })?;

        let removed = self.environment_variables.remove(index);
        self.touch();
        Ok(removed)
    }

    pub fn add_agent_key(&mut self, key: AgentKey) -> Result<(), DomainError> {
        if key.deployment_group_id() != &self.id {
            return Err(DomainError::validation(format!(
                "Agent key belongs to deployment group '{}'",
                key.deployment_group_id()
            )));
        }

        self.agent_keys.push(key);
        self.touch();
        Ok(())
    }

    pub fn remove_agent_key(&mut self, id: &AgentKeyId) -> Result<AgentKey, DomainError> {
        let index = self
            .agent_keys
            .iter()
            .position(|k| k.id() == id)
            .ok_or_else(|| DomainError::not_found(format!("Agent key '{}' not found", id)))?;

        let removed = self.agent_keys.remove(index);
        self.touch();
        Ok(removed)
    }

    fn ensure_owned(
        &self,
        team_id: &TeamId,
        deployment_group_id: &DeploymentGroupId,
    ) -> Result<(), DomainError> {
        if team_id != &self.team_id || deployment_group_id != &self.id {
            return Err(DomainError::validation(format!(
                "Record belongs to deployment group '{}' in team '{}'",
                deployment_group_id, team_id
            )));
        }

        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deployment_group::{validate, DeploymentGroupAttrs};

    fn team() -> TeamId {
        TeamId::new("team-acme").unwrap()
    }

    fn group(name: &str) -> DeploymentGroup {
        let attrs = DeploymentGroupAttrs::new(name, DeploymentMode::Online);
        let validated = validate(&attrs, Vec::<String>::new()).unwrap();
        DeploymentGroup::new(team(), validated)
    }

    #[test]
    fn test_mode_and_clustering_parse() {
        assert_eq!("online".parse(), Ok(DeploymentMode::Online));
        assert_eq!(" Offline ".parse(), Ok(DeploymentMode::Offline));
        assert!("hybrid".parse::<DeploymentMode>().is_err());
        assert_eq!("dns".parse(), Ok(Clustering::Dns));
        assert!("".parse::<Clustering>().is_err());
    }

    #[test]
    fn test_new_group_defaults() {
        let group = group("production");

        assert_eq!(group.name(), "production");
        assert_eq!(group.mode(), DeploymentMode::Online);
        assert!(group.teams_auth());
        assert!(!group.groups_auth());
        assert!(group.secrets().is_empty());
        assert!(group.environment_variables().is_empty());
        assert!(group.agent_keys().is_empty());
        assert!(!group.id().as_str().is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(group("a").id(), group("b").id());
    }

    #[test]
    fn test_secret_lifecycle() {
        let mut group = group("production");
        let secret = Secret::new("db_password", "s3cret", team(), group.id().clone());

        group.add_secret(secret).unwrap();
        assert_eq!(group.secret_names(), vec!["DB_PASSWORD"]);

        group
            .update_secret("DB_PASSWORD", "rotated".to_string())
            .unwrap();
        assert_eq!(group.secret("db_password").unwrap().value(), "rotated");

        group.remove_secret("DB_PASSWORD").unwrap();
        assert!(group.secrets().is_empty());
        assert!(group.remove_secret("DB_PASSWORD").unwrap_err().is_not_found());
    }

    #[test]
    fn test_duplicate_secret_is_conflict() {
        let mut group = group("production");
        let id = group.id().clone();

        group
            .add_secret(Secret::new("TOKEN", "a", team(), id.clone()))
            .unwrap();
        let err = group
            .add_secret(Secret::new("token", "b", team(), id))
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(group.secret("TOKEN").unwrap().value(), "a");
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let mut group = group("production");
        let other = DeploymentGroupId::new("other");

        let err = group
            .add_secret(Secret::new("TOKEN", "a", team(), other))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(group.secrets().is_empty());
    }

    #[test]
    fn test_environment_variable_lifecycle() {
        let mut group = group("production");
        let id = group.id().clone();

        group
            .add_environment_variable(EnvironmentVariable::new("PORT", "8080", team(), id.clone()))
            .unwrap();
        assert!(group
            .add_environment_variable(EnvironmentVariable::new("PORT", "9090", team(), id))
            .unwrap_err()
            .is_conflict());

        group
            .update_environment_variable("PORT", "9090".to_string())
            .unwrap();
        assert_eq!(group.environment_variable("PORT").unwrap().value(), "9090");

        group.remove_environment_variable("PORT").unwrap();
        assert!(group.environment_variables().is_empty());
        assert!(group
            .update_environment_variable("PORT", "1".to_string())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_agent_key_lifecycle() {
        let mut group = group("production");
        let key = AgentKey::new("lb_ak_test", group.id().clone());
        let key_id = key.id().clone();

        group.add_agent_key(key).unwrap();
        assert_eq!(group.agent_keys().len(), 1);

        group.remove_agent_key(&key_id).unwrap();
        assert!(group.agent_keys().is_empty());
        assert!(group.remove_agent_key(&key_id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_activity_counts() {
        let mut counts = ActivityCounts::default();

        counts.apply(ActivityKind::AgentLeft);
        assert_eq!(counts.agents, 0);

        counts.apply(ActivityKind::AgentJoined);
        counts.apply(ActivityKind::AgentJoined);
        counts.apply(ActivityKind::AppDeploymentStarted);
        assert_eq!(
            counts,
            ActivityCounts {
                agents: 2,
                app_deployments: 1
            }
        );
    }

    #[test]
    fn test_serialization_omits_empty_optionals() {
        let group = group("staging");
        let json = serde_json::to_value(&group).unwrap();

        assert_eq!(json["mode"], "online");
        assert_eq!(json["team_id"], "team-acme");
        assert!(json.get("url").is_none());
        assert!(json.get("clustering").is_none());
    }
}
