//! In-memory deployment group repository

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::deployment_group::{
    ActivityCounts, ActivityKind, DeploymentGroup, DeploymentGroupId, DeploymentGroupRepository,
};
use crate::domain::team::TeamId;
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Tables {
    groups: HashMap<DeploymentGroupId, DeploymentGroup>,
    /// Unique secondary index on (team, name)
    names: HashMap<(TeamId, String), DeploymentGroupId>,
    activity: HashMap<DeploymentGroupId, ActivityCounts>,
}

/// Thread-safe in-memory implementation of DeploymentGroupRepository
///
/// Groups are stored whole, so readers always see a complete snapshot of a
/// group's nested collections. Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryDeploymentGroupRepository {
    tables: RwLock<Tables>,
}

impl InMemoryDeploymentGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DomainError> {
        self.tables
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, DomainError> {
        self.tables
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

fn name_key(group: &DeploymentGroup) -> (TeamId, String) {
    (group.team_id().clone(), group.name().to_string())
}

fn name_taken(name: &str) -> DomainError {
    DomainError::conflict(format!("Deployment group name '{}' has already been taken", name))
}

#[async_trait]
impl DeploymentGroupRepository for InMemoryDeploymentGroupRepository {
    async fn get(&self, id: &DeploymentGroupId) -> Result<Option<DeploymentGroup>, DomainError> {
        Ok(self.read()?.groups.get(id).cloned())
    }

    async fn find_by_name(
        &self,
        team_id: &TeamId,
        name: &str,
    ) -> Result<Option<DeploymentGroup>, DomainError> {
        let tables = self.read()?;

        Ok(tables
            .names
            .get(&(team_id.clone(), name.to_string()))
            .and_then(|id| tables.groups.get(id))
            .cloned())
    }

    async fn list_by_team(&self, team_id: &TeamId) -> Result<Vec<DeploymentGroup>, DomainError> {
        let tables = self.read()?;
        let mut result: Vec<DeploymentGroup> = tables
            .groups
            .values()
            .filter(|g| g.team_id() == team_id)
            .cloned()
            .collect();

        result.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(result)
    }

    async fn names_by_team(&self, team_id: &TeamId) -> Result<Vec<String>, DomainError> {
        let tables = self.read()?;

        Ok(tables
            .names
            .keys()
            .filter(|(team, _)| team == team_id)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn count_by_team(&self, team_id: &TeamId) -> Result<usize, DomainError> {
        let tables = self.read()?;
        Ok(tables.names.keys().filter(|(team, _)| team == team_id).count())
    }

    async fn create(&self, group: DeploymentGroup) -> Result<DeploymentGroup, DomainError> {
        let mut tables = self.write()?;

        if tables.groups.contains_key(group.id()) {
            return Err(DomainError::conflict(format!(
                "Deployment group '{}' already exists",
                group.id()
            )));
        }

        let key = name_key(&group);

        if tables.names.contains_key(&key) {
            return Err(name_taken(group.name()));
        }

        tables.names.insert(key, group.id().clone());
        tables
            .activity
            .insert(group.id().clone(), ActivityCounts::default());
        tables.groups.insert(group.id().clone(), group.clone());
        Ok(group)
    }

    async fn update(&self, group: DeploymentGroup) -> Result<DeploymentGroup, DomainError> {
        let mut tables = self.write()?;

        let previous_key = match tables.groups.get(group.id()) {
            Some(existing) => name_key(existing),
            None => {
                return Err(DomainError::not_found(format!(
                    "Deployment group '{}' not found",
                    group.id()
                )))
            }
        };
        let key = name_key(&group);

        if key != previous_key {
            if tables.names.contains_key(&key) {
                return Err(name_taken(group.name()));
            }

            tables.names.remove(&previous_key);
            tables.names.insert(key, group.id().clone());
        }

        tables.groups.insert(group.id().clone(), group.clone());
        Ok(group)
    }

    async fn delete(
        &self,
        id: &DeploymentGroupId,
    ) -> Result<Option<DeploymentGroup>, DomainError> {
        let mut tables = self.write()?;
        let removed = tables.groups.remove(id);

        if let Some(ref group) = removed {
            tables.names.remove(&name_key(group));
            tables.activity.remove(id);
        }

        Ok(removed)
    }

    async fn activity(&self, id: &DeploymentGroupId) -> Result<ActivityCounts, DomainError> {
        self.read()?
            .activity
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("Deployment group '{}' not found", id)))
    }

    async fn record_activity(
        &self,
        id: &DeploymentGroupId,
        kind: ActivityKind,
    ) -> Result<ActivityCounts, DomainError> {
        let mut tables = self.write()?;
        let counts = tables
            .activity
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("Deployment group '{}' not found", id)))?;

        counts.apply(kind);
        Ok(*counts)
    }
}
