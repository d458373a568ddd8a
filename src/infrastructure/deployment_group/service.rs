//! Deployment group service
//!
//! Serializes every mutation of a team's groups behind one async lock per
//! team, writes the whole aggregate back in a single repository call and
//! publishes the resulting event before releasing the lock. Per-team event
//! order therefore matches the order in which mutations were applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::agent_key::AgentKeyGenerator;
use crate::domain::deployment_group::{
    validate, validate_environment_variable, validate_secret, ActivityCounts, ActivityKind,
    AgentEvent, AgentKey, AgentKeyId, AppDeploymentEvent, DeploymentGroup, DeploymentGroupAttrs,
    DeploymentGroupEvent, DeploymentGroupId, DeploymentGroupNotifier, DeploymentGroupRepository,
    EntryAttrs, EnvironmentVariable, FieldError, FieldErrors, Secret,
};
use crate::domain::team::TeamId;
use crate::domain::DomainError;

/// Registry of deployment groups and their nested records
#[derive(Debug)]
pub struct DeploymentGroupService<R: DeploymentGroupRepository> {
    repository: Arc<R>,
    notifier: Arc<dyn DeploymentGroupNotifier>,
    agent_keys: AgentKeyGenerator,
    team_locks: Mutex<HashMap<TeamId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<R: DeploymentGroupRepository> DeploymentGroupService<R> {
    pub fn new(repository: Arc<R>, notifier: Arc<dyn DeploymentGroupNotifier>) -> Self {
        Self {
            repository,
            notifier,
            agent_keys: AgentKeyGenerator::default(),
            team_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_agent_key_generator(mut self, generator: AgentKeyGenerator) -> Self {
        self.agent_keys = generator;
        self
    }

    /// Create a deployment group in a team
    pub async fn create(
        &self,
        team_id: &TeamId,
        attrs: DeploymentGroupAttrs,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(team_id = %team_id, name = ?attrs.name, "Creating deployment group");

        check_scope(attrs.hub_id.as_deref(), team_id.as_str(), "hub_id")?;

        let lock = self.team_lock(team_id)?;
        let _guard = lock.lock().await;

        let existing = self.repository.names_by_team(team_id).await?;
        let validated = validate(&attrs, &existing).map_err(log_rejection)?;

        let group = self
            .repository
            .create(DeploymentGroup::new(team_id.clone(), validated))
            .await?;

        info!(team_id = %team_id, id = %group.id(), name = %group.name(), "Deployment group created");
        self.notifier
            .publish(DeploymentGroupEvent::created(group.clone()));

        Ok(group)
    }

    /// Replace a group's own settings; nested records are kept
    pub async fn update(
        &self,
        id: &DeploymentGroupId,
        attrs: DeploymentGroupAttrs,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, "Updating deployment group");

        self.mutate(id, |group, other_names| {
            check_scope(attrs.hub_id.as_deref(), group.team_id().as_str(), "hub_id")?;
            let validated = validate(&attrs, other_names).map_err(log_rejection)?;
            group.apply(validated);
            Ok(())
        })
        .await
    }

    pub async fn get(&self, id: &DeploymentGroupId) -> Result<DeploymentGroup, DomainError> {
        debug!(id = %id, "Getting deployment group");
        self.load(id).await
    }

    pub async fn get_by_name(
        &self,
        team_id: &TeamId,
        name: &str,
    ) -> Result<DeploymentGroup, DomainError> {
        self.repository
            .find_by_name(team_id, name)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "Deployment group '{}' not found in team '{}'",
                    name, team_id
                ))
            })
    }

    /// Groups of a team, sorted by name
    pub async fn list(&self, team_id: &TeamId) -> Result<Vec<DeploymentGroup>, DomainError> {
        debug!(team_id = %team_id, "Listing deployment groups");
        self.repository.list_by_team(team_id).await
    }

    pub async fn count(&self, team_id: &TeamId) -> Result<usize, DomainError> {
        self.repository.count_by_team(team_id).await
    }

    /// Delete a group with all of its secrets, environment variables, agent
    /// keys and counters
    pub async fn delete(&self, id: &DeploymentGroupId) -> Result<(), DomainError> {
        info!(id = %id, "Deleting deployment group");

        let team_id = self.load(id).await?.team_id().clone();
        let lock = self.team_lock(&team_id)?;
        let _guard = lock.lock().await;

        self.repository
            .delete(id)
            .await?
            .ok_or_else(|| group_not_found(id))?;

        info!(team_id = %team_id, id = %id, "Deployment group deleted");
        self.notifier
            .publish(DeploymentGroupEvent::deleted(team_id.clone(), id.clone()));

        if self.repository.count_by_team(&team_id).await? == 0 {
            self.release_team_lock(&team_id, &lock)?;
        }

        Ok(())
    }

    pub async fn add_secret(
        &self,
        id: &DeploymentGroupId,
        attrs: EntryAttrs,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, name = ?attrs.name, "Adding secret");

        self.mutate(id, |group, _| {
            check_scope(attrs.hub_id.as_deref(), group.team_id().as_str(), "hub_id")?;
            check_scope(
                attrs.deployment_group_id.as_deref(),
                group.id().as_str(),
                "deployment_group_id",
            )?;

            let entry = validate_secret(&attrs, group.secret_names()).map_err(log_rejection)?;
            let secret = Secret::new(
                entry.name,
                entry.value,
                group.team_id().clone(),
                group.id().clone(),
            );
            group.add_secret(secret)
        })
        .await
    }

    pub async fn update_secret(
        &self,
        id: &DeploymentGroupId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, name = %name, "Updating secret");
        let value = value.into();

        self.mutate(id, |group, _| {
            // Existence is checked first so a missing secret is NotFound
            // regardless of the new value
            if group.secret(name).is_none() {
                return Err(DomainError::not_found(format!("Secret '{}' not found", name)));
            }

            if value.is_empty() {
                let mut errors = FieldErrors::new();
                errors.add("value", FieldError::Blank);
                return Err(errors.into());
            }

            group.update_secret(name, value)
        })
        .await
    }

    pub async fn delete_secret(
        &self,
        id: &DeploymentGroupId,
        name: &str,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, name = %name, "Deleting secret");

        self.mutate(id, |group, _| group.remove_secret(name).map(|_| ()))
            .await
    }

    pub async fn add_environment_variable(
        &self,
        id: &DeploymentGroupId,
        attrs: EntryAttrs,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, name = ?attrs.name, "Adding environment variable");

        self.mutate(id, |group, _| {
            check_scope(attrs.hub_id.as_deref(), group.team_id().as_str(), "hub_id")?;
            check_scope(
                attrs.deployment_group_id.as_deref(),
                group.id().as_str(),
                "deployment_group_id",
            )?;

            let entry = validate_environment_variable(&attrs, group.environment_variable_names())
                .map_err(log_rejection)?;
            let variable = EnvironmentVariable::new(
                entry.name,
                entry.value,
                group.team_id().clone(),
                group.id().clone(),
            );
            group.add_environment_variable(variable)
        })
        .await
    }

    pub async fn update_environment_variable(
        &self,
        id: &DeploymentGroupId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, name = %name, "Updating environment variable");
        let value = value.into();

        self.mutate(id, |group, _| group.update_environment_variable(name, value))
            .await
    }

    pub async fn remove_environment_variable(
        &self,
        id: &DeploymentGroupId,
        name: &str,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, name = %name, "Removing environment variable");

        self.mutate(id, |group, _| {
            group.remove_environment_variable(name).map(|_| ())
        })
        .await
    }

    pub async fn count_environment_variables(
        &self,
        id: &DeploymentGroupId,
    ) -> Result<usize, DomainError> {
        Ok(self.load(id).await?.environment_variables().len())
    }

    /// Issue a new agent key for the group
    pub async fn add_agent_key(
        &self,
        id: &DeploymentGroupId,
    ) -> Result<(DeploymentGroup, AgentKey), DomainError> {
        info!(id = %id, "Creating agent key");

        let key = AgentKey::new(self.agent_keys.generate(), id.clone());
        let created = key.clone();
        let group = self.mutate(id, |group, _| group.add_agent_key(key)).await?;

        Ok((group, created))
    }

    pub async fn delete_agent_key(
        &self,
        id: &DeploymentGroupId,
        key_id: &AgentKeyId,
    ) -> Result<DeploymentGroup, DomainError> {
        info!(id = %id, key_id = %key_id, "Deleting agent key");

        self.mutate(id, |group, _| group.remove_agent_key(key_id).map(|_| ()))
            .await
    }

    pub async fn agent_joined(&self, event: &AgentEvent) -> Result<ActivityCounts, DomainError> {
        self.record(&event.team_id, &event.deployment_group_id, ActivityKind::AgentJoined)
            .await
    }

    pub async fn agent_left(&self, event: &AgentEvent) -> Result<ActivityCounts, DomainError> {
        self.record(&event.team_id, &event.deployment_group_id, ActivityKind::AgentLeft)
            .await
    }

    pub async fn app_deployment_started(
        &self,
        event: &AppDeploymentEvent,
    ) -> Result<ActivityCounts, DomainError> {
        self.record(
            &event.team_id,
            &event.deployment_group_id,
            ActivityKind::AppDeploymentStarted,
        )
        .await
    }

    pub async fn count_agents(&self, id: &DeploymentGroupId) -> Result<u64, DomainError> {
        Ok(self.repository.activity(id).await?.agents)
    }

    pub async fn count_app_deployments(&self, id: &DeploymentGroupId) -> Result<u64, DomainError> {
        Ok(self.repository.activity(id).await?.app_deployments)
    }

    pub async fn activity(&self, id: &DeploymentGroupId) -> Result<ActivityCounts, DomainError> {
        self.repository.activity(id).await
    }

    async fn record(
        &self,
        team_id: &TeamId,
        id: &DeploymentGroupId,
        kind: ActivityKind,
    ) -> Result<ActivityCounts, DomainError> {
        let not_in_team = || {
            DomainError::not_found(format!(
                "Deployment group '{}' not found in team '{}'",
                id, team_id
            ))
        };

        if self.load(id).await?.team_id() != team_id {
            return Err(not_in_team());
        }

        let lock = self.team_lock(team_id)?;
        let _guard = lock.lock().await;

        // The group may have been deleted while waiting for the lock
        if self.load(id).await?.team_id() != team_id {
            return Err(not_in_team());
        }

        let counts = self.repository.record_activity(id, kind).await?;
        debug!(
            team_id = %team_id,
            id = %id,
            ?kind,
            agents = counts.agents,
            app_deployments = counts.app_deployments,
            "Activity recorded"
        );

        Ok(counts)
    }

    /// Apply `op` to the current snapshot under the team lock, store the
    /// result and publish it
    ///
    /// `op` also receives the names of the team's other groups. If it fails,
    /// nothing is stored or published.
    async fn mutate<F>(&self, id: &DeploymentGroupId, op: F) -> Result<DeploymentGroup, DomainError>
    where
        F: FnOnce(&mut DeploymentGroup, &[String]) -> Result<(), DomainError> + Send,
    {
        let team_id = self.load(id).await?.team_id().clone();
        let lock = self.team_lock(&team_id)?;
        let _guard = lock.lock().await;

        // Re-read under the lock; the group may have changed or gone meanwhile
        let mut group = self.load(id).await?;
        let other_names: Vec<String> = self
            .repository
            .names_by_team(&team_id)
            .await?
            .into_iter()
            .filter(|name| name != group.name())
            .collect();

        op(&mut group, &other_names)?;

        let group = self.repository.update(group).await?;
        self.notifier
            .publish(DeploymentGroupEvent::updated(group.clone()));

        Ok(group)
    }

    async fn load(&self, id: &DeploymentGroupId) -> Result<DeploymentGroup, DomainError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| group_not_found(id))
    }

    fn team_lock(&self, team_id: &TeamId) -> Result<Arc<tokio::sync::Mutex<()>>, DomainError> {
        let mut locks = self
            .team_locks
            .lock()
            .map_err(|e| DomainError::internal(format!("Failed to acquire team locks: {}", e)))?;

        Ok(locks.entry(team_id.clone()).or_default().clone())
    }

    /// Forget the lock of a team that has no groups left
    ///
    /// Skipped while any other task holds a handle to the lock, so waiters
    /// keep serializing on the same mutex.
    fn release_team_lock(
        &self,
        team_id: &TeamId,
        lock: &Arc<tokio::sync::Mutex<()>>,
    ) -> Result<(), DomainError> {
        let mut locks = self
            .team_locks
            .lock()
            .map_err(|e| DomainError::internal(format!("Failed to acquire team locks: {}", e)))?;

        let unshared = locks
            .get(team_id)
            .is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(lock) == 2);

        if unshared {
            locks.remove(team_id);
            debug!(team_id = %team_id, "Released team lock");
        }

        Ok(())
    }

    #[cfg(test)]
    fn tracked_teams(&self) -> usize {
        self.team_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

fn group_not_found(id: &DeploymentGroupId) -> DomainError {
    DomainError::not_found(format!("Deployment group '{}' not found", id))
}

/// A record may name its owner explicitly; if it does, it must match
fn check_scope(given: Option<&str>, expected: &str, field: &str) -> Result<(), DomainError> {
    match given {
        Some(given) if !given.is_empty() && given != expected => {
            let mut errors = FieldErrors::new();
            errors.add(field, FieldError::Invalid);
            Err(errors.into())
        }
        _ => Ok(()),
    }
}

fn log_rejection(errors: FieldErrors) -> DomainError {
    warn!(errors = %errors, "Rejected deployment group change");
    errors.into()
}
