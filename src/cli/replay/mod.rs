//! Replay command - applies an operation log to a fresh registry
//!
//! Every event the registry emits is written to stdout as one JSON line, in
//! the order subscribers of the owning team observe it.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::domain::deployment_group::{
    AgentEvent, AppDeploymentEvent, DeploymentGroupAttrs, DeploymentGroupEvent, EntryAttrs,
};
use crate::domain::{DeploymentGroupId, DomainError, TeamId};
use crate::state::AppState;

/// Arguments for the replay command
#[derive(Args, Clone)]
pub struct ReplayArgs {
    /// JSON file holding an array of operations
    pub file: PathBuf,

    /// Stop at the first failing operation
    #[arg(long)]
    pub fail_fast: bool,
}

/// One recorded registry operation
///
/// Groups are referenced by name within their team, since ids are only
/// assigned during the replay.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayOp {
    Create {
        team: TeamId,
        #[serde(default)]
        attrs: DeploymentGroupAttrs,
    },
    Update {
        team: TeamId,
        group: String,
        #[serde(default)]
        attrs: DeploymentGroupAttrs,
    },
    AddSecret {
        team: TeamId,
        group: String,
        name: String,
        value: String,
    },
    UpdateSecret {
        team: TeamId,
        group: String,
        name: String,
        value: String,
    },
    DeleteSecret {
        team: TeamId,
        group: String,
        name: String,
    },
    AddEnvironmentVariable {
        team: TeamId,
        group: String,
        name: String,
        #[serde(default)]
        value: String,
    },
    UpdateEnvironmentVariable {
        team: TeamId,
        group: String,
        name: String,
        #[serde(default)]
        value: String,
    },
    RemoveEnvironmentVariable {
        team: TeamId,
        group: String,
        name: String,
    },
    AddAgentKey {
        team: TeamId,
        group: String,
    },
    AgentJoined {
        team: TeamId,
        group: String,
    },
    AgentLeft {
        team: TeamId,
        group: String,
    },
    AppDeploymentStarted {
        team: TeamId,
        group: String,
    },
    Delete {
        team: TeamId,
        group: String,
    },
}

impl ReplayOp {
    pub fn team(&self) -> &TeamId {
        match self {
            Self::Create { team, .. }
            | Self::Update { team, .. }
            | Self::AddSecret { team, .. }
            | Self::UpdateSecret { team, .. }
            | Self::DeleteSecret { team, .. }
            | Self::AddEnvironmentVariable { team, .. }
            | Self::UpdateEnvironmentVariable { team, .. }
            | Self::RemoveEnvironmentVariable { team, .. }
            | Self::AddAgentKey { team, .. }
            | Self::AgentJoined { team, .. }
            | Self::AgentLeft { team, .. }
            | Self::AppDeploymentStarted { team, .. }
            | Self::Delete { team, .. } => team,
        }
    }
}

/// Counts of applied and rejected operations
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub failed: usize,
    pub events: usize,
}

/// Run the replay command
pub async fn run(args: ReplayArgs) -> anyhow::Result<()> {
    let config = super::load_config();

    let document = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let ops: Vec<ReplayOp> =
        serde_json::from_str(&document).context("Invalid operation log")?;

    let state = crate::create_app_state_with_config(&config);
    let mut stdout = std::io::stdout().lock();
    let summary = replay(&state, ops, args.fail_fast, &mut stdout).await?;

    info!(
        applied = summary.applied,
        failed = summary.failed,
        events = summary.events,
        "Replay finished"
    );

    if summary.failed > 0 {
        anyhow::bail!("{} operation(s) failed", summary.failed);
    }

    Ok(())
}

/// Apply `ops` in order, writing each emitted event as a JSON line to `out`
///
/// Failed operations are logged and skipped unless `fail_fast` is set.
pub async fn replay<W: Write>(
    state: &AppState,
    ops: Vec<ReplayOp>,
    fail_fast: bool,
    out: &mut W,
) -> anyhow::Result<ReplaySummary> {
    let mut receivers: HashMap<TeamId, broadcast::Receiver<DeploymentGroupEvent>> = HashMap::new();
    let mut summary = ReplaySummary::default();

    for (index, op) in ops.into_iter().enumerate() {
        let team = op.team().clone();

        if !receivers.contains_key(&team) {
            receivers.insert(team.clone(), state.notifier.subscribe(&team)?);
        }

        match apply(state, op).await {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                warn!(index, team_id = %team, error = %e, "Operation failed");
                summary.failed += 1;

                if fail_fast {
                    return Err(anyhow::Error::new(e).context(format!("Operation {} failed", index)));
                }
            }
        }

        if let Some(rx) = receivers.get_mut(&team) {
            summary.events += drain(rx, out)?;
        }
    }

    out.flush()?;
    Ok(summary)
}

fn drain<W: Write>(
    rx: &mut broadcast::Receiver<DeploymentGroupEvent>,
    out: &mut W,
) -> anyhow::Result<usize> {
    let mut written = 0;

    loop {
        match rx.try_recv() {
            Ok(event) => {
                serde_json::to_writer(&mut *out, &event)?;
                writeln!(out)?;
                written += 1;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Replay output lagged behind the registry");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(written),
        }
    }
}

async fn apply(state: &AppState, op: ReplayOp) -> Result<(), DomainError> {
    let groups = &state.deployment_groups;

    match op {
        ReplayOp::Create { team, attrs } => {
            groups.create(&team, attrs).await?;
        }
        ReplayOp::Update { team, group, attrs } => {
            let id = resolve(state, &team, &group).await?;
            groups.update(&id, attrs).await?;
        }
        ReplayOp::AddSecret {
            team,
            group,
            name,
            value,
        } => {
            let id = resolve(state, &team, &group).await?;
            groups.add_secret(&id, EntryAttrs::new(name, value)).await?;
        }
        ReplayOp::UpdateSecret {
            team,
            group,
            name,
            value,
        } => {
            let id = resolve(state, &team, &group).await?;
            groups.update_secret(&id, &name, value).await?;
        }
        ReplayOp::DeleteSecret { team, group, name } => {
            let id = resolve(state, &team, &group).await?;
            groups.delete_secret(&id, &name).await?;
        }
        ReplayOp::AddEnvironmentVariable {
            team,
            group,
            name,
            value,
        } => {
            let id = resolve(state, &team, &group).await?;
            groups
                .add_environment_variable(&id, EntryAttrs::new(name, value))
                .await?;
        }
        ReplayOp::UpdateEnvironmentVariable {
            team,
            group,
            name,
            value,
        } => {
            let id = resolve(state, &team, &group).await?;
            groups.update_environment_variable(&id, &name, value).await?;
        }
        ReplayOp::RemoveEnvironmentVariable { team, group, name } => {
            let id = resolve(state, &team, &group).await?;
            groups.remove_environment_variable(&id, &name).await?;
        }
        ReplayOp::AddAgentKey { team, group } => {
            let id = resolve(state, &team, &group).await?;
            groups.add_agent_key(&id).await?;
        }
        ReplayOp::AgentJoined { team, group } => {
            let deployment_group_id = resolve(state, &team, &group).await?;
            groups
                .agent_joined(&AgentEvent {
                    team_id: team,
                    deployment_group_id,
                })
                .await?;
        }
        ReplayOp::AgentLeft { team, group } => {
            let deployment_group_id = resolve(state, &team, &group).await?;
            groups
                .agent_left(&AgentEvent {
                    team_id: team,
                    deployment_group_id,
                })
                .await?;
        }
        ReplayOp::AppDeploymentStarted { team, group } => {
            let deployment_group_id = resolve(state, &team, &group).await?;
            groups
                .app_deployment_started(&AppDeploymentEvent {
                    team_id: team,
                    deployment_group_id,
                })
                .await?;
        }
        ReplayOp::Delete { team, group } => {
            let id = resolve(state, &team, &group).await?;
            groups.delete(&id).await?;
        }
    }

    Ok(())
}

async fn resolve(
    state: &AppState,
    team: &TeamId,
    name: &str,
) -> Result<DeploymentGroupId, DomainError> {
    let group = state.deployment_groups.get_by_name(team, name).await?;
    Ok(group.id().clone())
}
