// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::command::{
    permissions, Command, CommandError, CommandResult, CommandType, ExecutionContext,
    ValidationResult,
};
use crate::domain::resources::{ResourceMetrics, ResourceSampler};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarmflow_swarm::{AgentId, AgentSpec, SwarmId, SwarmManager};
use tracing::debug;

pub const AGENT_SPAWN_ESTIMATE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpawnParams {
    pub swarm_id: Option<SwarmId>,
    pub agent_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Adds one agent to an existing swarm; undo destroys it again.
pub struct AgentSpawnCommand {
    params: AgentSpawnParams,
    manager: Arc<dyn SwarmManager>,
    sampler: Arc<dyn ResourceSampler>,
    agent_id: Mutex<Option<AgentId>>,
}

impl AgentSpawnCommand {
    pub fn new(
        params: AgentSpawnParams,
        manager: Arc<dyn SwarmManager>,
        sampler: Arc<dyn ResourceSampler>,
    ) -> Self {
        Self {
            params,
            manager,
            sampler,
            agent_id: Mutex::new(None),
        }
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        *self.agent_id.lock()
    }
}

impl std::fmt::Debug for AgentSpawnCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSpawnCommand")
            .field("params", &self.params)
            .field("agent_id", &self.agent_id())
            .finish()
    }
}

#[async_trait]
impl Command for AgentSpawnCommand {
    async fn validate(&self, context: &ExecutionContext) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.params.agent_type.trim().is_empty() {
            result.error("Agent type is required");
        }

        if !context.has_permission(permissions::AGENT_SPAWN) {
            result.error(format!(
                "Missing required permission: {}",
                permissions::AGENT_SPAWN
            ));
        }

        match self.params.swarm_id {
            None => result.error("Swarm ID is required"),
            Some(swarm_id) => match self.manager.get_swarm_status(swarm_id).await {
                Ok(status) if status.healthy => {}
                Ok(_) => result.error(format!("Target swarm {} is not healthy", swarm_id)),
                Err(e) => result.error(format!("Target swarm {} is unavailable: {}", swarm_id, e)),
            },
        }

        result
    }

    async fn execute(&self, _context: &ExecutionContext) -> CommandResult {
        let started = Instant::now();
        let Some(swarm_id) = self.params.swarm_id else {
            return CommandResult::failure("Swarm ID is required", started.elapsed());
        };

        let spec = AgentSpec {
            agent_type: self.params.agent_type.clone(),
            name: self.params.name.clone(),
            capabilities: self.params.capabilities.clone(),
        };

        let before = self.sampler.sample();
        let outcome = self.manager.spawn_agent(swarm_id, spec).await;
        let after = self.sampler.sample();

        match outcome {
            Ok(agent_id) => {
                *self.agent_id.lock() = Some(agent_id);
                debug!(%swarm_id, %agent_id, "Agent spawned by command");
                CommandResult::success(
                    serde_json::json!({
                        "agentId": agent_id,
                        "swarmId": swarm_id,
                        "agentType": self.params.agent_type,
                    }),
                    started.elapsed(),
                    ResourceMetrics::delta(&before, &after),
                )
                .with_metadata("commandType", serde_json::json!(CommandType::AgentSpawn))
            }
            Err(e) => CommandResult::failure(format!("Failed to spawn agent: {}", e), started.elapsed()),
        }
    }

    async fn undo(&self) -> Result<(), CommandError> {
        let agent_id = self
            .agent_id()
            .ok_or(CommandError::NothingToUndo(CommandType::AgentSpawn))?;

        self.manager.destroy_agent(agent_id).await?;
        *self.agent_id.lock() = None;
        debug!(%agent_id, "Agent spawn undone");
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.agent_id.lock().is_some()
    }

    fn command_type(&self) -> CommandType {
        CommandType::AgentSpawn
    }

    fn estimated_duration(&self) -> Duration {
        AGENT_SPAWN_ESTIMATE
    }

    fn description(&self) -> String {
        match self.params.swarm_id {
            Some(swarm_id) => format!("Spawn {} agent in swarm {}", self.params.agent_type, swarm_id),
            None => format!("Spawn {} agent", self.params.agent_type),
        }
    }

    fn required_permissions(&self) -> Vec<&'static str> {
        vec![permissions::AGENT_SPAWN]
    }

    fn try_clone(&self) -> Option<Arc<dyn Command>> {
        Some(Arc::new(Self::new(
            self.params.clone(),
            self.manager.clone(),
            self.sampler.clone(),
        )))
    }
}
